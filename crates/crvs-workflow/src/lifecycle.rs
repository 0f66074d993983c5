//! Registration status transitions.
//!
//! A transition writes the target code into the Task's reg-status coding
//! after checking it against the persisted Task. The check is a read, not a
//! lock: the `meta.versionId` it observed is returned in
//! [`StatusTransition`] so the caller can persist with `If-Match`.

use crvs_auth::{TokenError, TokenPayload, scopes};
use crvs_core::{FhirReference, KeyedList, checked_resource_id, object_field, resource_id};
use serde::Serialize;
use serde_json::{Value, json};

use crate::bundle::task_object;
use crate::constants::SpecNamespace;
use crate::error::{WorkflowError, WorkflowResult};
use crate::gateway::RegistrationGateway;
use crate::status::{EventType, RegistrationStatus};

/// Outcome of a committed in-memory status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransition {
    pub target: RegistrationStatus,
    /// Status of the persisted Task, if it had one.
    pub previous: Option<RegistrationStatus>,
    /// `meta.versionId` of the persisted Task read by the duplicate check.
    pub version_id: Option<String>,
}

/// The status a user's scopes allow them to put a record into.
pub fn default_status_for(payload: &TokenPayload) -> WorkflowResult<RegistrationStatus> {
    if payload.has_scope(scopes::REGISTER) {
        Ok(RegistrationStatus::Registered)
    } else if payload.has_scope(scopes::VALIDATE) {
        Ok(RegistrationStatus::Validated)
    } else if payload.has_scope(scopes::DECLARE) {
        Ok(RegistrationStatus::Declared)
    } else {
        Err(TokenError::invalid_claims("no registration scope").into())
    }
}

/// Stamps the event type onto the Task's `code`.
///
/// Creates the coding when absent, otherwise overwrites the first code.
pub fn setup_registration_type(task: &mut Value, event: EventType, ns: &SpecNamespace) -> WorkflowResult<()> {
    let code = object_field(task_object(task)?, "code");
    let first = code
        .get_mut("coding")
        .and_then(Value::as_array_mut)
        .and_then(|codings| codings.first_mut())
        .and_then(Value::as_object_mut);
    match first {
        Some(coding) => {
            coding.insert("code".to_string(), json!(event.code()));
        }
        None => {
            code.insert(
                "coding".to_string(),
                json!([{ "system": ns.registration_types(), "code": event.code() }]),
            );
        }
    }
    Ok(())
}

/// Reads the reg-status code of a Task.
pub fn reg_status(task: &Value, ns: &SpecNamespace) -> Option<RegistrationStatus> {
    let system = ns.reg_status();
    task.pointer("/businessStatus/coding")?
        .as_array()?
        .iter()
        .find(|coding| coding.get("system").and_then(Value::as_str) == Some(system.as_str()))?
        .get("code")
        .and_then(Value::as_str)?
        .parse()
        .ok()
}

/// Rejects a transition into `target` when the persisted Task already has
/// that status or is certified.
///
/// Tasks without an id have never been persisted and pass unchecked. An id
/// that is not a valid FHIR id is an [`WorkflowError::InvalidTask`]. On
/// success returns the persisted status and version, if any.
pub async fn check_for_duplicate_status_update(
    task: &Value,
    target: RegistrationStatus,
    gateway: &dyn RegistrationGateway,
    ns: &SpecNamespace,
) -> WorkflowResult<(Option<RegistrationStatus>, Option<String>)> {
    let Some(task_id) = checked_resource_id(task)? else {
        return Ok((None, None));
    };

    let persisted = gateway
        .fetch_resource(&FhirReference::new("Task", task_id))
        .await
        .inspect_err(|e| tracing::error!(task_id, error = %e, "failed to read persisted Task"))?;
    let Some(persisted) = persisted else {
        return Ok((None, None));
    };

    let previous = reg_status(&persisted, ns);
    if let Some(current) = previous
        && (current.is_terminal() || current == target)
    {
        tracing::error!(task_id, status = %current, target = %target, "duplicate status update");
        return Err(WorkflowError::duplicate_status(task_id, current));
    }

    let version_id = persisted
        .pointer("/meta/versionId")
        .and_then(Value::as_str)
        .map(str::to_owned);
    Ok((previous, version_id))
}

/// Moves the Task into `explicit`, or into the status the token's scopes
/// allow when no explicit target is given.
///
/// The Task is left untouched when the transition is rejected.
pub async fn setup_registration_workflow(
    task: &mut Value,
    payload: &TokenPayload,
    explicit: Option<RegistrationStatus>,
    gateway: &dyn RegistrationGateway,
    ns: &SpecNamespace,
) -> WorkflowResult<StatusTransition> {
    let target = match explicit {
        Some(status) => status,
        None => default_status_for(payload)?,
    };

    let (previous, version_id) = check_for_duplicate_status_update(task, target, gateway, ns).await?;

    let business_status = object_field(task_object(task)?, "businessStatus");
    KeyedList::open(business_status, "coding", "system")
        .upsert(&ns.reg_status(), json!({ "code": target.code() }));

    tracing::info!(
        task_id = resource_id(task).unwrap_or("<new>"),
        previous = ?previous,
        target = %target,
        "registration status updated"
    );
    Ok(StatusTransition {
        target,
        previous,
        version_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryGateway;

    fn payload(scope: &[&str]) -> TokenPayload {
        TokenPayload {
            sub: "user-1".to_string(),
            scope: scope.iter().map(|s| s.to_string()).collect(),
            iss: None,
            aud: None,
            exp: None,
        }
    }

    fn persisted_task(ns: &SpecNamespace, status: &str) -> Value {
        json!({
            "resourceType": "Task",
            "id": "t-1",
            "meta": { "versionId": "7" },
            "businessStatus": { "coding": [{ "system": ns.reg_status(), "code": status }] }
        })
    }

    #[test]
    fn test_default_status_from_scopes() {
        assert_eq!(
            default_status_for(&payload(&["declare", "register"])).unwrap(),
            RegistrationStatus::Registered
        );
        assert_eq!(
            default_status_for(&payload(&["validate"])).unwrap(),
            RegistrationStatus::Validated
        );
        assert_eq!(
            default_status_for(&payload(&["declare"])).unwrap(),
            RegistrationStatus::Declared
        );
        assert!(matches!(
            default_status_for(&payload(&["sysadmin"])),
            Err(WorkflowError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_setup_registration_type() {
        let ns = SpecNamespace::default();
        let mut task = json!({ "resourceType": "Task" });
        setup_registration_type(&mut task, EventType::Birth, &ns).unwrap();
        assert_eq!(
            task["code"],
            json!({ "coding": [{ "system": "http://opencrvs.org/specs/types", "code": "BIRTH" }] })
        );

        setup_registration_type(&mut task, EventType::Death, &ns).unwrap();
        assert_eq!(task["code"]["coding"].as_array().unwrap().len(), 1);
        assert_eq!(task["code"]["coding"][0]["code"], "DEATH");
    }

    #[tokio::test]
    async fn test_unpersisted_task_skips_guard() {
        let ns = SpecNamespace::default();
        let gateway = InMemoryGateway::new();
        let mut task = json!({ "resourceType": "Task" });

        let transition = setup_registration_workflow(
            &mut task,
            &payload(&["declare"]),
            None,
            &gateway,
            &ns,
        )
        .await
        .unwrap();

        assert_eq!(transition.target, RegistrationStatus::Declared);
        assert_eq!(transition.previous, None);
        assert_eq!(reg_status(&task, &ns), Some(RegistrationStatus::Declared));
    }

    #[tokio::test]
    async fn test_duplicate_status_is_rejected() {
        let ns = SpecNamespace::default();
        let gateway = InMemoryGateway::new().with_resource(persisted_task(&ns, "DECLARED"));
        let mut task = persisted_task(&ns, "DECLARED");

        let err = setup_registration_workflow(
            &mut task,
            &payload(&["declare"]),
            Some(RegistrationStatus::Declared),
            &gateway,
            &ns,
        )
        .await
        .unwrap_err();
        assert!(err.is_duplicate_status());

        let transition = setup_registration_workflow(
            &mut task,
            &payload(&["validate"]),
            Some(RegistrationStatus::Validated),
            &gateway,
            &ns,
        )
        .await
        .unwrap();
        assert_eq!(transition.previous, Some(RegistrationStatus::Declared));
        assert_eq!(transition.version_id.as_deref(), Some("7"));
        assert_eq!(reg_status(&task, &ns), Some(RegistrationStatus::Validated));
        assert_eq!(task["businessStatus"]["coding"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_certified_is_terminal() {
        let ns = SpecNamespace::default();
        let gateway = InMemoryGateway::new().with_resource(persisted_task(&ns, "CERTIFIED"));

        for target in RegistrationStatus::ALL {
            let mut task = persisted_task(&ns, "REGISTERED");
            let err = setup_registration_workflow(
                &mut task,
                &payload(&["register"]),
                Some(target),
                &gateway,
                &ns,
            )
            .await
            .unwrap_err();
            assert!(err.is_duplicate_status(), "{target} should be rejected");
            assert_eq!(reg_status(&task, &ns), Some(RegistrationStatus::Registered));
        }
    }

    #[tokio::test]
    async fn test_task_id_must_be_a_fhir_id() {
        let ns = SpecNamespace::default();
        let gateway = InMemoryGateway::new().with_resource(persisted_task(&ns, "CERTIFIED"));

        for id in ["t-1/_history/1", "t-1?_format=json", "../Task/t-1"] {
            let mut task = persisted_task(&ns, "DECLARED");
            task["id"] = json!(id);
            let err = setup_registration_workflow(
                &mut task,
                &payload(&["validate"]),
                Some(RegistrationStatus::Validated),
                &gateway,
                &ns,
            )
            .await
            .unwrap_err();
            assert!(matches!(err, WorkflowError::InvalidTask { .. }), "{id}: {err}");
            assert_eq!(reg_status(&task, &ns), Some(RegistrationStatus::Declared));
        }
    }

    #[tokio::test]
    async fn test_missing_persisted_task_has_no_prior_status() {
        let ns = SpecNamespace::default();
        let gateway = InMemoryGateway::new();
        let task = persisted_task(&ns, "DECLARED");

        let (previous, version) =
            check_for_duplicate_status_update(&task, RegistrationStatus::Declared, &gateway, &ns)
                .await
                .unwrap();
        assert_eq!(previous, None);
        assert_eq!(version, None);
    }
}
