//! Tracking ids and registration numbers.

use crvs_core::KeyedList;
use serde_json::{Value, json};

use crate::bundle::{composition_mut, select_or_create_task, task_object, validate_bundle};
use crate::constants::{COMPOSITION_IDENTIFIER_SYSTEM, SpecNamespace};
use crate::error::{WorkflowError, WorkflowResult};
use crate::gateway::RegistrationGateway;
use crate::status::EventType;
use crate::tracking::TrackingIdGenerator;

/// Generates a tracking id and writes it to the Composition's identifier and
/// to the Task's `<event>-tracking-id` identifier. Returns the new id.
///
/// Calling it again replaces the value in the same slots.
pub fn set_tracking_id(
    bundle: &mut Value,
    event: EventType,
    generator: &dyn TrackingIdGenerator,
    ns: &SpecNamespace,
) -> WorkflowResult<String> {
    validate_bundle(bundle)?;
    let tracking_id = generator.generate(event);

    let composition = composition_mut(bundle)?;
    let identifier = crvs_core::object_field(composition, "identifier");
    identifier
        .entry("system")
        .or_insert_with(|| json!(COMPOSITION_IDENTIFIER_SYSTEM));
    identifier.insert("value".to_string(), json!(tracking_id));

    let task = task_object(select_or_create_task(bundle, event, ns)?)?;
    KeyedList::open(task, "identifier", "system").upsert(
        &ns.identifier(&event.tracking_id_name()),
        json!({ "value": tracking_id }),
    );

    tracing::debug!(tracking_id = %tracking_id, event = %event, "tracking id assigned");
    Ok(tracking_id)
}

/// Reads the `<event>-tracking-id` identifier of a Task.
pub fn tracking_id_from_task<'a>(
    task: &'a Value,
    event: EventType,
    ns: &SpecNamespace,
) -> Option<&'a str> {
    let system = ns.identifier(&event.tracking_id_name());
    task.get("identifier")?
        .as_array()?
        .iter()
        .find(|identifier| identifier.get("system").and_then(Value::as_str) == Some(system.as_str()))?
        .get("value")
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Requests a registration number for the Task's tracking id and stores it
/// under `<event>-registration-number`. Returns the issued number.
pub async fn push_registration_number(
    task: Option<&mut Value>,
    event: EventType,
    practitioner_id: &str,
    token: &str,
    gateway: &dyn RegistrationGateway,
    ns: &SpecNamespace,
) -> WorkflowResult<String> {
    let task = task.ok_or_else(|| WorkflowError::invalid_task("no Task resource found for registration"))?;
    let tracking_id = tracking_id_from_task(task, event, ns)
        .map(str::to_owned)
        .ok_or_else(|| {
            WorkflowError::invalid_task(format!("Task has no {}", event.tracking_id_name()))
        })?;

    let number = gateway
        .request_registration_number(&tracking_id, practitioner_id, token)
        .await
        .inspect_err(|e| {
            tracing::error!(tracking_id = %tracking_id, error = %e, "registration number request failed");
        })?
        .registration_number;

    KeyedList::open(task_object(task)?, "identifier", "system").upsert(
        &ns.identifier(&event.registration_number_name()),
        json!({ "value": number }),
    );
    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryGateway;

    fn bundle() -> Value {
        json!({
            "resourceType": "Bundle",
            "entry": [{
                "fullUrl": "urn:uuid:c1",
                "resource": {
                    "resourceType": "Composition",
                    "type": { "coding": [{ "code": "birth-declaration" }] }
                }
            }]
        })
    }

    #[test]
    fn test_set_tracking_id_overwrites() {
        let ns = SpecNamespace::default();
        let mut bundle = bundle();

        set_tracking_id(&mut bundle, EventType::Birth, &|_: EventType| "B000001".to_string(), &ns)
            .unwrap();
        set_tracking_id(&mut bundle, EventType::Birth, &|_: EventType| "B000002".to_string(), &ns)
            .unwrap();

        assert_eq!(
            bundle["entry"][0]["resource"]["identifier"],
            json!({ "system": "urn:ietf:rfc:3986", "value": "B000002" })
        );
        let task = &bundle["entry"][1]["resource"];
        assert_eq!(
            task["identifier"],
            json!([{ "system": "http://opencrvs.org/specs/id/birth-tracking-id", "value": "B000002" }])
        );
        assert_eq!(tracking_id_from_task(task, EventType::Birth, &ns), Some("B000002"));
        assert_eq!(tracking_id_from_task(task, EventType::Death, &ns), None);
    }

    #[test]
    fn test_set_tracking_id_rejects_empty_bundle() {
        let ns = SpecNamespace::default();
        let mut empty = json!({ "resourceType": "Bundle", "entry": [] });
        let err = set_tracking_id(&mut empty, EventType::Birth, &|_: EventType| "B1".to_string(), &ns)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidBundle { .. }));
    }

    #[tokio::test]
    async fn test_push_registration_number() {
        let ns = SpecNamespace::default();
        let gateway = InMemoryGateway::new();
        let mut task = json!({
            "resourceType": "Task",
            "identifier": [{ "system": ns.identifier("death-tracking-id"), "value": "D123456" }]
        });

        let number = push_registration_number(Some(&mut task), EventType::Death, "P1", "tok", &gateway, &ns)
            .await
            .unwrap();
        assert_eq!(number, "RN-D123456");
        assert_eq!(task["identifier"][1]["system"], ns.identifier("death-registration-number"));
        assert_eq!(task["identifier"][1]["value"], "RN-D123456");
        assert_eq!(gateway.registration_number_requests()[0].practitioner_id, "P1");
    }

    #[tokio::test]
    async fn test_push_registration_number_requires_task_and_tracking_id() {
        let ns = SpecNamespace::default();
        let gateway = InMemoryGateway::new();

        let err = push_registration_number(None, EventType::Birth, "P1", "t", &gateway, &ns)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTask { .. }));

        let mut task = json!({ "resourceType": "Task" });
        let err = push_registration_number(Some(&mut task), EventType::Birth, "P1", "t", &gateway, &ns)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTask { .. }));
        assert!(gateway.registration_number_requests().is_empty());
    }
}
