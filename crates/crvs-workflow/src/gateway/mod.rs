//! Access to the services a registration transition depends on.
//!
//! The lifecycle code only talks to [`RegistrationGateway`]. Two
//! implementations exist:
//!
//! - [`HttpGateway`] - the FHIR store, user-management and resources services over HTTP
//! - [`InMemoryGateway`] - a seeded in-process gateway for tests and local runs

mod cache;
mod http;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use crvs_core::FhirReference;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::OFFICE_LOCATION_CODE;

pub use cache::{ResourceCache, ResourceCacheConfig};
pub use http::{HttpGateway, HttpGatewayConfig};
pub use memory::{InMemoryGateway, RegistrationNumberRequest};

/// Errors returned by gateway calls. They are surfaced to callers unchanged;
/// retrying is left to the transport layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// A resource that must exist was not found.
    #[error("Resource not found: {resource_type}/{id}")]
    NotFound { resource_type: String, id: String },

    /// The upstream service answered with a non-success status.
    #[error("HTTP error from {url}: status {status}")]
    Http { url: String, status: u16 },

    /// The request could not be sent or the response not received.
    #[error("Network error: {0}")]
    Network(String),

    /// The response body was not the expected JSON.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The response parsed but lacks required content.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    #[must_use]
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Response of the registration numbering service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationNumber {
    pub registration_number: String,
}

/// The external collaborators of the registration lifecycle.
#[async_trait]
pub trait RegistrationGateway: Send + Sync {
    /// Reads a resource from the backing FHIR store. `None` when it does not exist.
    async fn fetch_resource(&self, reference: &FhirReference) -> Result<Option<Value>, GatewayError>;

    /// Resolves the Practitioner resource of an authenticated user.
    async fn practitioner_for_user(&self, user_id: &str, token: &str) -> Result<Value, GatewayError>;

    /// The registration office the practitioner works from.
    async fn practitioner_primary_office(&self, practitioner_id: &str) -> Result<Value, GatewayError>;

    /// The administrative area the practitioner is responsible for.
    async fn practitioner_catchment_location(
        &self,
        practitioner_id: &str,
    ) -> Result<Value, GatewayError>;

    /// Requests a permanent registration number for a tracked declaration.
    async fn request_registration_number(
        &self,
        tracking_id: &str,
        practitioner_id: &str,
        token: &str,
    ) -> Result<RegistrationNumber, GatewayError>;

    /// Reads a Practitioner by id, failing when it does not exist.
    async fn practitioner_by_id(&self, practitioner_id: &str) -> Result<Value, GatewayError> {
        self.fetch_resource(&FhirReference::new("Practitioner", practitioner_id))
            .await?
            .ok_or_else(|| GatewayError::not_found("Practitioner", practitioner_id))
    }
}

/// Type alias for a shared gateway trait object.
pub type DynGateway = Arc<dyn RegistrationGateway>;

/// Returns `true` when a Location is typed as a registration office.
pub fn is_office_location(location: &Value) -> bool {
    location
        .get("type")
        .and_then(|t| t.get("coding"))
        .and_then(Value::as_array)
        .is_some_and(|codings| {
            codings
                .iter()
                .any(|coding| coding.get("code").and_then(Value::as_str) == Some(OFFICE_LOCATION_CODE))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_office_classification() {
        let office = json!({
            "resourceType": "Location",
            "id": "L1",
            "type": { "coding": [{ "system": "http://opencrvs.org/specs/location-type", "code": "CRVS_OFFICE" }] }
        });
        let area = json!({
            "resourceType": "Location",
            "id": "L2",
            "type": { "coding": [{ "code": "ADMIN_STRUCTURE" }] }
        });
        assert!(is_office_location(&office));
        assert!(!is_office_location(&area));
        assert!(!is_office_location(&json!({ "resourceType": "Location" })));
    }

    #[test]
    fn test_gateway_error_display() {
        assert_eq!(
            GatewayError::not_found("Location", "L9").to_string(),
            "Resource not found: Location/L9"
        );
        assert!(GatewayError::not_found("Task", "t").is_not_found());
        assert_eq!(
            GatewayError::Http {
                url: "http://fhir/Task/1".to_string(),
                status: 503
            }
            .to_string(),
            "HTTP error from http://fhir/Task/1: status 503"
        );
    }

    #[test]
    fn test_registration_number_wire_format() {
        let parsed: RegistrationNumber =
            serde_json::from_value(json!({ "registrationNumber": "2024B1234567" })).unwrap();
        assert_eq!(parsed.registration_number, "2024B1234567");
    }
}
