//! Navigation of registration bundles.
//!
//! A registration bundle carries the Composition as its first entry and one
//! Task entry holding the workflow state. Entry points other than the
//! initial submission may also receive a bare Task.

use crvs_core::{KeyedList, resource_type, urn_uuid};
use serde_json::{Map, Value, json};

use crate::constants::SpecNamespace;
use crate::error::{WorkflowError, WorkflowResult};
use crate::status::{EventType, RegistrationStatus};

fn entries(document: &Value) -> Option<&Vec<Value>> {
    document.get("entry").and_then(Value::as_array)
}

/// Checks that the bundle has entries and that the first one carries a resource.
pub fn validate_bundle(bundle: &Value) -> WorkflowResult<()> {
    let first = entries(bundle)
        .and_then(|entries| entries.first())
        .ok_or_else(|| WorkflowError::invalid_bundle("bundle has no entries"))?;
    if first.get("resource").is_some_and(Value::is_object) {
        Ok(())
    } else {
        Err(WorkflowError::invalid_bundle("first bundle entry has no resource"))
    }
}

/// The Composition in `entry[0]`.
pub fn composition(bundle: &Value) -> WorkflowResult<&Value> {
    validate_bundle(bundle)?;
    Ok(&bundle["entry"][0]["resource"])
}

pub fn composition_mut(bundle: &mut Value) -> WorkflowResult<&mut Map<String, Value>> {
    validate_bundle(bundle)?;
    bundle["entry"][0]["resource"]
        .as_object_mut()
        .ok_or_else(|| WorkflowError::invalid_bundle("first bundle entry has no resource"))
}

fn composition_type_code(document: &Value) -> Option<&str> {
    entries(document)?
        .first()?
        .get("resource")
        .filter(|resource| resource_type(resource) == Some("Composition"))?
        .pointer("/type/coding/0/code")
        .and_then(Value::as_str)
}

/// The event a document records, read from the Composition type or, for a
/// bare Task or a bundle without a typed Composition, from the Task code.
pub fn event_type(document: &Value) -> WorkflowResult<EventType> {
    if let Some(event) = composition_type_code(document).and_then(EventType::from_composition_code) {
        return Ok(event);
    }
    task(document)
        .and_then(|task| task.pointer("/code/coding/0/code"))
        .and_then(Value::as_str)
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| WorkflowError::invalid_bundle("unable to determine the event type"))
}

/// Notifications are submitted by health systems rather than declared by a user.
pub fn is_event_notification(bundle: &Value) -> bool {
    composition_type_code(bundle).is_some_and(|code| code.ends_with("-notification"))
}

/// Whether the document's Task is an incomplete declaration.
pub fn is_in_progress(document: &Value, ns: &SpecNamespace) -> bool {
    task(document)
        .and_then(|task| task.get("businessStatus"))
        .and_then(|status| status.get("coding"))
        .and_then(Value::as_array)
        .is_some_and(|codings| {
            codings.iter().any(|coding| {
                coding.get("system").and_then(Value::as_str) == Some(ns.reg_status().as_str())
                    && coding.get("code").and_then(Value::as_str)
                        == Some(RegistrationStatus::InProgress.code())
            })
        })
}

fn task_position(bundle: &Value) -> Option<usize> {
    entries(bundle)?.iter().position(|entry| {
        entry
            .get("resource")
            .is_some_and(|resource| resource_type(resource) == Some("Task"))
    })
}

/// The Task of a bundle, or the document itself when it is a Task.
pub fn task(document: &Value) -> Option<&Value> {
    if resource_type(document) == Some("Task") {
        return Some(document);
    }
    let idx = task_position(document)?;
    Some(&document["entry"][idx]["resource"])
}

/// Mutable access to the Task of a bundle or a bare Task.
pub fn task_mut(document: &mut Value) -> WorkflowResult<&mut Value> {
    if resource_type(document) == Some("Task") {
        return Ok(document);
    }
    let idx = task_position(document)
        .ok_or_else(|| WorkflowError::invalid_task("no Task resource found in the document"))?;
    Ok(&mut document["entry"][idx]["resource"])
}

/// Returns the bundle's Task, appending a new one that focuses the
/// Composition when the bundle has none.
pub fn select_or_create_task<'a>(
    bundle: &'a mut Value,
    event: EventType,
    ns: &SpecNamespace,
) -> WorkflowResult<&'a mut Value> {
    validate_bundle(bundle)?;
    if let Some(idx) = task_position(bundle) {
        return Ok(&mut bundle["entry"][idx]["resource"]);
    }

    let focus = bundle["entry"][0]
        .get("fullUrl")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default();
    let mut task = json!({
        "resourceType": "Task",
        "status": "requested",
        "focus": { "reference": focus },
    });
    if let Some(object) = task.as_object_mut() {
        let code = crvs_core::object_field(object, "code");
        KeyedList::open(code, "coding", "system")
            .upsert(&ns.registration_types(), json!({ "code": event.code() }));
    }

    tracing::debug!(event = %event, "bundle has no Task, creating one");
    let entries = bundle
        .get_mut("entry")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| WorkflowError::invalid_bundle("bundle has no entries"))?;
    entries.push(json!({ "fullUrl": urn_uuid(), "resource": task }));
    let last = entries.len() - 1;
    Ok(&mut entries[last]["resource"])
}

/// The JSON object of a Task, rejecting non-object values.
pub fn task_object(task: &mut Value) -> WorkflowResult<&mut Map<String, Value>> {
    task.as_object_mut()
        .ok_or_else(|| WorkflowError::invalid_task("Task resource is not a JSON object"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn birth_bundle() -> Value {
        json!({
            "resourceType": "Bundle",
            "type": "document",
            "entry": [{
                "fullUrl": "urn:uuid:comp-1",
                "resource": {
                    "resourceType": "Composition",
                    "type": { "coding": [{ "system": "http://opencrvs.org/doc-types", "code": "birth-declaration" }] }
                }
            }]
        })
    }

    #[test]
    fn test_validate_bundle() {
        assert!(validate_bundle(&birth_bundle()).is_ok());
        assert!(matches!(
            validate_bundle(&json!({ "resourceType": "Bundle", "entry": [] })),
            Err(WorkflowError::InvalidBundle { .. })
        ));
        assert!(matches!(
            validate_bundle(&json!({ "entry": [{ "fullUrl": "x" }] })),
            Err(WorkflowError::InvalidBundle { .. })
        ));
        assert!(validate_bundle(&json!({})).is_err());
    }

    #[test]
    fn test_event_type_from_composition_and_task() {
        assert_eq!(event_type(&birth_bundle()).unwrap(), EventType::Birth);

        let task = json!({
            "resourceType": "Task",
            "code": { "coding": [{ "system": "http://opencrvs.org/specs/types", "code": "DEATH" }] }
        });
        assert_eq!(event_type(&task).unwrap(), EventType::Death);
        assert!(event_type(&json!({ "resourceType": "Task" })).is_err());
    }

    #[test]
    fn test_notification_classification() {
        let mut bundle = birth_bundle();
        assert!(!is_event_notification(&bundle));
        bundle["entry"][0]["resource"]["type"]["coding"][0]["code"] = json!("birth-notification");
        assert!(is_event_notification(&bundle));
    }

    #[test]
    fn test_select_or_create_task_creates_once() {
        let ns = SpecNamespace::default();
        let mut bundle = birth_bundle();

        let task = select_or_create_task(&mut bundle, EventType::Birth, &ns).unwrap();
        assert_eq!(task["focus"]["reference"], "urn:uuid:comp-1");
        assert_eq!(task["code"]["coding"][0]["code"], "BIRTH");
        task["id"] = json!("t-1");

        select_or_create_task(&mut bundle, EventType::Birth, &ns).unwrap();
        let entries = bundle["entry"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[1]["fullUrl"].as_str().unwrap().starts_with("urn:uuid:"));
        assert_eq!(task_mut(&mut bundle).unwrap()["id"], "t-1");
    }

    #[test]
    fn test_task_from_bare_task_and_missing() {
        let mut bare = json!({ "resourceType": "Task", "id": "t-2" });
        assert_eq!(task_mut(&mut bare).unwrap()["id"], "t-2");

        let mut bundle = birth_bundle();
        assert!(matches!(task_mut(&mut bundle), Err(WorkflowError::InvalidTask { .. })));
        assert!(task(&bundle).is_none());
    }

    #[test]
    fn test_in_progress_classification() {
        let ns = SpecNamespace::default();
        let mut bundle = birth_bundle();
        assert!(!is_in_progress(&bundle, &ns));

        bundle["entry"].as_array_mut().unwrap().push(json!({
            "resource": {
                "resourceType": "Task",
                "businessStatus": { "coding": [{ "system": ns.reg_status(), "code": "IN_PROGRESS" }] }
            }
        }));
        assert!(is_in_progress(&bundle, &ns));
    }
}
