use std::sync::Mutex;

use async_trait::async_trait;
use crvs_core::{FhirReference, resource_id, resource_type};
use dashmap::DashMap;
use serde_json::Value;

use super::{GatewayError, RegistrationGateway, RegistrationNumber};

/// A registration number request observed by [`InMemoryGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationNumberRequest {
    pub tracking_id: String,
    pub practitioner_id: String,
    pub token: String,
}

#[derive(Debug, Clone)]
struct PractitionerLocations {
    office_id: String,
    catchment_id: String,
}

/// An in-process gateway seeded with resources.
///
/// Registration numbers are `RN-<tracking id>` and every request is recorded.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    resources: DashMap<String, Value>,
    users: DashMap<String, String>,
    locations: DashMap<String, PractitionerLocations>,
    number_requests: Mutex<Vec<RegistrationNumberRequest>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a resource under `Type/id`, replacing any previous version.
    pub fn put_resource(&self, resource: Value) {
        let (Some(kind), Some(id)) = (resource_type(&resource), resource_id(&resource)) else {
            tracing::warn!("ignoring resource without resourceType or id");
            return;
        };
        let key = format!("{kind}/{id}");
        self.resources.insert(key, resource);
    }

    #[must_use]
    pub fn with_resource(self, resource: Value) -> Self {
        self.put_resource(resource);
        self
    }

    pub fn remove_resource(&self, reference: &FhirReference) -> Option<Value> {
        self.resources.remove(&reference.to_relative()).map(|(_, v)| v)
    }

    /// Maps a user-management user to a Practitioner id.
    #[must_use]
    pub fn link_user(self, user_id: impl Into<String>, practitioner_id: impl Into<String>) -> Self {
        self.users.insert(user_id.into(), practitioner_id.into());
        self
    }

    /// Assigns the practitioner's primary office and catchment area.
    #[must_use]
    pub fn assign_locations(
        self,
        practitioner_id: impl Into<String>,
        office_id: impl Into<String>,
        catchment_id: impl Into<String>,
    ) -> Self {
        self.locations.insert(
            practitioner_id.into(),
            PractitionerLocations {
                office_id: office_id.into(),
                catchment_id: catchment_id.into(),
            },
        );
        self
    }

    pub fn registration_number_requests(&self) -> Vec<RegistrationNumberRequest> {
        self.number_requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn location(&self, id: &str) -> Result<Value, GatewayError> {
        self.resources
            .get(&format!("Location/{id}"))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| GatewayError::not_found("Location", id))
    }

    fn assigned(&self, practitioner_id: &str) -> Result<PractitionerLocations, GatewayError> {
        self.locations
            .get(practitioner_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| GatewayError::not_found("PractitionerRole", practitioner_id))
    }
}

#[async_trait]
impl RegistrationGateway for InMemoryGateway {
    async fn fetch_resource(&self, reference: &FhirReference) -> Result<Option<Value>, GatewayError> {
        Ok(self
            .resources
            .get(&reference.to_relative())
            .map(|entry| entry.value().clone()))
    }

    async fn practitioner_for_user(&self, user_id: &str, _token: &str) -> Result<Value, GatewayError> {
        let practitioner_id = self
            .users
            .get(user_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| GatewayError::not_found("User", user_id))?;
        self.practitioner_by_id(&practitioner_id).await
    }

    async fn practitioner_primary_office(&self, practitioner_id: &str) -> Result<Value, GatewayError> {
        let assigned = self.assigned(practitioner_id)?;
        self.location(&assigned.office_id)
    }

    async fn practitioner_catchment_location(
        &self,
        practitioner_id: &str,
    ) -> Result<Value, GatewayError> {
        let assigned = self.assigned(practitioner_id)?;
        self.location(&assigned.catchment_id)
    }

    async fn request_registration_number(
        &self,
        tracking_id: &str,
        practitioner_id: &str,
        token: &str,
    ) -> Result<RegistrationNumber, GatewayError> {
        if let Ok(mut requests) = self.number_requests.lock() {
            requests.push(RegistrationNumberRequest {
                tracking_id: tracking_id.to_string(),
                practitioner_id: practitioner_id.to_string(),
                token: token.to_string(),
            });
        }
        Ok(RegistrationNumber {
            registration_number: format!("RN-{tracking_id}"),
        })
    }
}
