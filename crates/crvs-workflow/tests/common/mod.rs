#![allow(dead_code)]

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use crvs_auth::TokenDecoder;
use crvs_workflow::{BundleModifier, EventType, InMemoryGateway, SpecNamespace};
use serde_json::{Value, json};

pub const TRACKING_ID: &str = "B1234567";

/// An unsigned token for a decoder that does not verify signatures.
pub fn token(sub: &str, scopes: &[&str]) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let claims = json!({ "sub": sub, "scope": scopes, "iss": "opencrvs:auth-service" });
    let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
    format!("{header}.{claims}.c2lnbmF0dXJl")
}

pub fn ns() -> SpecNamespace {
    SpecNamespace::default()
}

/// Practitioner P1 (user `user-1`) working from office L1 with catchment L2.
pub fn gateway() -> Arc<InMemoryGateway> {
    Arc::new(
        InMemoryGateway::new()
            .with_resource(json!({ "resourceType": "Practitioner", "id": "P1" }))
            .with_resource(json!({
                "resourceType": "Location",
                "id": "L1",
                "type": { "coding": [{ "code": "CRVS_OFFICE" }] }
            }))
            .with_resource(json!({
                "resourceType": "Location",
                "id": "L2",
                "type": { "coding": [{ "code": "ADMIN_STRUCTURE" }] }
            }))
            .link_user("user-1", "P1")
            .assign_locations("P1", "L1", "L2"),
    )
}

pub fn modifier(gateway: &Arc<InMemoryGateway>) -> BundleModifier {
    BundleModifier::new(gateway.clone(), TokenDecoder::unverified()).with_tracking_ids(
        |event: EventType| match event {
            EventType::Birth => TRACKING_ID.to_string(),
            EventType::Death => "D7654321".to_string(),
        },
    )
}

pub fn composition_entry(type_code: &str) -> Value {
    json!({
        "fullUrl": "urn:uuid:0a1b2c3d-0000-4000-8000-000000000001",
        "resource": {
            "resourceType": "Composition",
            "status": "preliminary",
            "type": { "coding": [{ "system": "http://opencrvs.org/doc-types", "code": type_code }] },
            "title": "Birth Declaration"
        }
    })
}

pub fn birth_bundle() -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "document",
        "entry": [composition_entry("birth-declaration")]
    })
}

/// A persisted Task as the FHIR store would return it.
pub fn stored_task(id: &str, status: &str, version: &str) -> Value {
    json!({
        "resourceType": "Task",
        "id": id,
        "meta": { "versionId": version },
        "status": "requested",
        "code": { "coding": [{ "system": ns().registration_types(), "code": "BIRTH" }] },
        "identifier": [{ "system": ns().identifier("birth-tracking-id"), "value": TRACKING_ID }],
        "businessStatus": { "coding": [{ "system": ns().reg_status(), "code": status }] }
    })
}

/// A bundle carrying the Composition and the given Task.
pub fn bundle_with_task(task: Value) -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "document",
        "entry": [
            composition_entry("birth-declaration"),
            { "fullUrl": "urn:uuid:0a1b2c3d-0000-4000-8000-000000000002", "resource": task }
        ]
    })
}

pub fn task_of(bundle: &Value) -> &Value {
    crvs_workflow::bundle::task(bundle).expect("bundle has a Task")
}

pub fn extension_refs<'a>(task: &'a Value, name: &str) -> Vec<&'a str> {
    let url = ns().extension(name);
    task["extension"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter(|e| e["url"] == url.as_str())
                .filter_map(|e| e["valueReference"]["reference"].as_str())
                .collect()
        })
        .unwrap_or_default()
}

pub fn identifier_values<'a>(task: &'a Value, name: &str) -> Vec<&'a str> {
    let system = ns().identifier(name);
    task["identifier"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter(|i| i["system"] == system.as_str())
                .filter_map(|i| i["value"].as_str())
                .collect()
        })
        .unwrap_or_default()
}
