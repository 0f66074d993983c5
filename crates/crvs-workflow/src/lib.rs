pub mod bundle;
pub mod config;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod identifiers;
pub mod lifecycle;
pub mod modifier;
pub mod observability;
pub mod provenance;
pub mod server;
pub mod status;
pub mod tracking;

pub use config::WorkflowConfig;
pub use constants::SpecNamespace;
pub use error::{ErrorCategory, WorkflowError, WorkflowResult};
pub use gateway::{
    DynGateway, GatewayError, HttpGateway, HttpGatewayConfig, InMemoryGateway, RegistrationGateway,
    RegistrationNumber,
};
pub use lifecycle::StatusTransition;
pub use modifier::{BundleModifier, ModifiedBundle};
pub use observability::init_tracing;
pub use server::{WorkflowServer, build_router};
pub use status::{EventType, RegistrationStatus};
pub use tracking::{RandomTrackingIds, TrackingIdGenerator};
