//! Small accessors for untyped FHIR resources.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{CoreError, Result};

/// FHIR id: [A-Za-z0-9\-\.]{1,64}
static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-\.]{1,64}$").expect("Invalid id regex"));

/// Returns `resourceType` of a resource document.
pub fn resource_type(resource: &Value) -> Option<&str> {
    resource.get("resourceType").and_then(Value::as_str)
}

/// Returns the non-empty logical id of a resource document.
pub fn resource_id(resource: &Value) -> Option<&str> {
    resource
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

pub fn is_valid_id(id: &str) -> bool {
    ID_REGEX.is_match(id)
}

/// Like [`resource_id`], but rejects ids that are not valid FHIR ids.
///
/// Use this before an id is placed into a request path.
pub fn checked_resource_id(resource: &Value) -> Result<Option<&str>> {
    match resource_id(resource) {
        Some(id) if !is_valid_id(id) => Err(CoreError::invalid_id(id)),
        id => Ok(id),
    }
}

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A fresh `urn:uuid:` full URL for a bundle entry.
pub fn urn_uuid() -> String {
    format!("urn:uuid:{}", generate_id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accessors() {
        let task = json!({ "resourceType": "Task", "id": "t1" });
        assert_eq!(resource_type(&task), Some("Task"));
        assert_eq!(resource_id(&task), Some("t1"));
    }

    #[test]
    fn test_empty_id_is_absent() {
        let task = json!({ "resourceType": "Task", "id": "" });
        assert_eq!(resource_id(&task), None);
        assert_eq!(resource_id(&json!({})), None);
        assert_eq!(checked_resource_id(&task).unwrap(), None);
    }

    #[test]
    fn test_id_pattern() {
        assert!(is_valid_id("t-1"));
        assert!(is_valid_id("0a1b2c3d-0000-4000-8000-000000000001"));
        assert!(is_valid_id(&"a".repeat(64)));
        assert!(!is_valid_id(&"a".repeat(65)));
        assert!(!is_valid_id("t-1/_history/1"));
        assert!(!is_valid_id("t-1?_format=json"));
        assert!(!is_valid_id("t 1"));
    }

    #[test]
    fn test_checked_resource_id() {
        let task = json!({ "resourceType": "Task", "id": "t-1" });
        assert_eq!(checked_resource_id(&task).unwrap(), Some("t-1"));

        let crafted = json!({ "resourceType": "Task", "id": "../Practitioner/P1" });
        assert!(matches!(
            checked_resource_id(&crafted),
            Err(CoreError::InvalidId(_))
        ));
    }

    #[test]
    fn test_urn_uuid_shape() {
        let urn = urn_uuid();
        assert!(urn.starts_with("urn:uuid:"));
        assert!(uuid::Uuid::parse_str(&urn["urn:uuid:".len()..]).is_ok());
    }
}
