//! HTTP implementation of [`RegistrationGateway`].

use std::time::Duration;

use async_trait::async_trait;
use crvs_core::{FhirReference, parse_reference, resource_id};
use serde::Deserialize;
use serde_json::{Value, json};

use super::cache::{ResourceCache, ResourceCacheConfig};
use super::{GatewayError, RegistrationGateway, RegistrationNumber, is_office_location};

/// Endpoints and transport settings of the HTTP gateway.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Base URL of the FHIR store, e.g. `http://localhost:3447/fhir`.
    pub fhir_url: String,
    /// Base URL of the user-management service.
    pub user_mgnt_url: String,
    /// Base URL of the resources service issuing registration numbers.
    pub resources_url: String,
    pub request_timeout: Duration,
    pub cache: ResourceCacheConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDetails {
    practitioner_id: Option<String>,
}

/// Talks to the FHIR store, user-management and resources services.
pub struct HttpGateway {
    http_client: reqwest::Client,
    config: HttpGatewayConfig,
    cache: ResourceCache,
}

impl HttpGateway {
    /// Creates a gateway with its own HTTP client.
    ///
    /// # Errors
    /// Returns `GatewayError::Network` if the HTTP client cannot be built.
    pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            cache: ResourceCache::new(config.cache.clone()),
            config,
        })
    }

    fn fhir_endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.fhir_url.trim_end_matches('/'), path)
    }

    fn service_endpoint(base: &str, path: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), path)
    }

    /// Decodes a JSON response, mapping 404 to `None`.
    async fn read_json(url: &str, response: reqwest::Response) -> Result<Option<Value>, GatewayError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            tracing::warn!(url, status = status.as_u16(), "upstream request failed");
            return Err(GatewayError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.json::<Value>().await.map(Some).map_err(|e| {
            tracing::warn!(url, error = %e, "failed to parse upstream response");
            GatewayError::Parse(e.to_string())
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Option<Value>, GatewayError> {
        let response = self
            .http_client
            .get(url)
            .header("Accept", "application/fhir+json")
            .query(query)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url, error = %e, "failed to reach upstream");
                GatewayError::Network(e.to_string())
            })?;
        Self::read_json(url, response).await
    }

    async fn post_json(&self, url: &str, body: &Value, token: &str) -> Result<Option<Value>, GatewayError> {
        let response = self
            .http_client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url, error = %e, "failed to reach upstream");
                GatewayError::Network(e.to_string())
            })?;
        Self::read_json(url, response).await
    }

    /// The practitioner's first PractitionerRole, cached like other
    /// slowly-changing resources.
    async fn practitioner_role(&self, practitioner_id: &str) -> Result<Value, GatewayError> {
        let key = format!("PractitionerRole?practitioner={practitioner_id}");
        let cacheable = self.cache.caches("PractitionerRole");
        if cacheable && let Some(role) = self.cache.get(&key).await {
            return Ok(role);
        }

        let url = self.fhir_endpoint("PractitionerRole");
        let bundle = self
            .get_json(&url, &[("practitioner", practitioner_id)])
            .await?
            .ok_or_else(|| GatewayError::not_found("PractitionerRole", practitioner_id))?;

        let role = bundle
            .get("entry")
            .and_then(Value::as_array)
            .and_then(|entries| entries.first())
            .and_then(|entry| entry.get("resource"))
            .cloned()
            .ok_or_else(|| GatewayError::not_found("PractitionerRole", practitioner_id))?;

        if cacheable {
            self.cache.insert(key, role.clone()).await;
        }
        Ok(role)
    }

    /// All Locations referenced by the practitioner's role.
    async fn practitioner_locations(&self, practitioner_id: &str) -> Result<Vec<Value>, GatewayError> {
        let role = self.practitioner_role(practitioner_id).await?;
        let references = role
            .get("location")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut locations = Vec::with_capacity(references.len());
        for reference in references {
            let Some(raw) = reference.get("reference").and_then(Value::as_str) else {
                continue;
            };
            let parsed = parse_reference(raw, Some(self.config.fhir_url.as_str())).map_err(|e| {
                GatewayError::invalid_response(format!(
                    "PractitionerRole of Practitioner/{practitioner_id} has {e}"
                ))
            })?;
            if let Some(location) = self.fetch_resource(&parsed).await? {
                locations.push(location);
            }
        }
        Ok(locations)
    }
}

#[async_trait]
impl RegistrationGateway for HttpGateway {
    async fn fetch_resource(&self, reference: &FhirReference) -> Result<Option<Value>, GatewayError> {
        let key = reference.to_relative();
        let cacheable = self.cache.caches(&reference.resource_type);
        if cacheable && let Some(resource) = self.cache.get(&key).await {
            return Ok(Some(resource));
        }

        tracing::debug!(reference = %key, "fetching resource from FHIR store");
        let resource = self.get_json(&self.fhir_endpoint(&key), &[]).await?;
        if cacheable && let Some(resource) = &resource {
            self.cache.insert(key, resource.clone()).await;
        }
        Ok(resource)
    }

    async fn practitioner_for_user(&self, user_id: &str, token: &str) -> Result<Value, GatewayError> {
        let url = Self::service_endpoint(&self.config.user_mgnt_url, "getUser");
        let user = self
            .post_json(&url, &json!({ "userId": user_id }), token)
            .await?
            .ok_or_else(|| GatewayError::not_found("User", user_id))?;

        let details: UserDetails =
            serde_json::from_value(user).map_err(|e| GatewayError::Parse(e.to_string()))?;
        let practitioner_id = details.practitioner_id.filter(|id| !id.is_empty()).ok_or_else(|| {
            GatewayError::invalid_response(format!("user {user_id} has no practitionerId"))
        })?;

        self.practitioner_by_id(&practitioner_id).await
    }

    async fn practitioner_primary_office(&self, practitioner_id: &str) -> Result<Value, GatewayError> {
        self.practitioner_locations(practitioner_id)
            .await?
            .into_iter()
            .find(is_office_location)
            .ok_or_else(|| {
                GatewayError::not_found("Location", format!("office of Practitioner/{practitioner_id}"))
            })
    }

    async fn practitioner_catchment_location(
        &self,
        practitioner_id: &str,
    ) -> Result<Value, GatewayError> {
        self.practitioner_locations(practitioner_id)
            .await?
            .into_iter()
            .find(|location| !is_office_location(location) && resource_id(location).is_some())
            .ok_or_else(|| {
                GatewayError::not_found(
                    "Location",
                    format!("catchment area of Practitioner/{practitioner_id}"),
                )
            })
    }

    async fn request_registration_number(
        &self,
        tracking_id: &str,
        practitioner_id: &str,
        token: &str,
    ) -> Result<RegistrationNumber, GatewayError> {
        let url = Self::service_endpoint(&self.config.resources_url, "registration-number");
        let body = json!({ "trackingId": tracking_id, "practitionerId": practitioner_id });
        let response = self
            .post_json(&url, &body, token)
            .await?
            .ok_or_else(|| GatewayError::invalid_response(format!("{url} returned 404")))?;

        let number: RegistrationNumber =
            serde_json::from_value(response).map_err(|e| GatewayError::Parse(e.to_string()))?;
        tracing::info!(
            tracking_id,
            registration_number = %number.registration_number,
            "registration number issued"
        );
        Ok(number)
    }
}
