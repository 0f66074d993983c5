pub mod error;
pub mod fhir_reference;
pub mod keyed;
pub mod resource;
pub mod time;

pub use error::{CoreError, ErrorCategory, Result};
pub use fhir_reference::{FhirReference, UnresolvableReference, parse_reference};
pub use keyed::{KeyedList, object_field};
pub use resource::{
    checked_resource_id, generate_id, is_valid_id, resource_id, resource_type, urn_uuid,
};
pub use time::{format_rfc3339, now_rfc3339};
