use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use crvs_api::{ApiError, FHIR_JSON};
use crvs_auth::bearer_token;
use serde_json::{Value, json};

use crate::error::WorkflowError;
use crate::modifier::{BundleModifier, ModifiedBundle};

#[derive(Clone)]
pub struct AppState {
    pub modifier: Arc<BundleModifier>,
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let message = err.to_string();
        match err {
            WorkflowError::InvalidBundle { .. }
            | WorkflowError::InvalidTask { .. }
            | WorkflowError::InvalidPractitioner { .. } => ApiError::bad_request(message),
            WorkflowError::InvalidToken(_) => ApiError::unauthorized(message),
            WorkflowError::DuplicateStatus { .. } => ApiError::conflict(message),
            WorkflowError::ExternalLookup(_) => ApiError::bad_gateway(message),
            WorkflowError::Configuration(_) => ApiError::internal(message),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Transition {
    Declare,
    Validate,
    Register,
    Certify,
}

fn bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))
}

fn parse_document(body: &[u8]) -> Result<Value, ApiError> {
    let document: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?;
    if !document.is_object() {
        return Err(ApiError::bad_request("Body must be a FHIR resource"));
    }
    Ok(document)
}

fn fhir_response(modified: ModifiedBundle) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(&modified.bundle)
        .map_err(|e| ApiError::internal(format!("Failed to serialize response: {e}")))?;
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(FHIR_JSON));
    if let Some(version) = modified.transition.version_id.as_deref()
        && let Ok(etag) = HeaderValue::from_str(&format!("W/\"{version}\""))
    {
        headers.insert(header::ETAG, etag);
    }
    Ok(response)
}

async fn apply(
    state: AppState,
    headers: HeaderMap,
    body: Bytes,
    transition: Transition,
) -> Result<Response, ApiError> {
    let token = bearer(&headers)?;
    let document = parse_document(&body)?;
    let modifier = &state.modifier;
    let result = match transition {
        Transition::Declare => modifier.modify_registration_bundle(document, token).await,
        Transition::Validate => modifier.mark_bundle_as_validated(document, token).await,
        Transition::Register => modifier.mark_bundle_as_registered(document, token).await,
        Transition::Certify => modifier.mark_bundle_as_certified(document, token).await,
    };
    match result {
        Ok(modified) => fhir_response(modified),
        Err(err) => {
            tracing::warn!(?transition, category = %err.category(), error = %err, "transition failed");
            Err(err.into())
        }
    }
}

pub async fn declare(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    apply(state, headers, body, Transition::Declare).await
}

pub async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    apply(state, headers, body, Transition::Validate).await
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    apply(state, headers, body, Transition::Register).await
}

pub async fn certify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    apply(state, headers, body, Transition::Certify).await
}

pub async fn healthz() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use crate::status::RegistrationStatus;
    use crvs_auth::TokenError;

    #[test]
    fn test_workflow_errors_map_to_status_codes() {
        let cases = [
            (WorkflowError::invalid_bundle("x"), StatusCode::BAD_REQUEST),
            (WorkflowError::invalid_task("x"), StatusCode::BAD_REQUEST),
            (WorkflowError::invalid_practitioner("x"), StatusCode::BAD_REQUEST),
            (WorkflowError::from(TokenError::Expired), StatusCode::UNAUTHORIZED),
            (
                WorkflowError::duplicate_status("t", RegistrationStatus::Declared),
                StatusCode::CONFLICT,
            ),
            (
                WorkflowError::from(GatewayError::Network("refused".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (WorkflowError::configuration("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert!(bearer(&headers).is_err());
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer(&headers).unwrap(), "abc.def.ghi");
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert!(bearer(&headers).is_err());
    }

    #[test]
    fn test_parse_document_rejects_non_objects() {
        assert!(parse_document(b"{\"resourceType\":\"Bundle\"}").is_ok());
        assert!(parse_document(b"[1, 2]").is_err());
        assert!(parse_document(b"not json").is_err());
    }
}
