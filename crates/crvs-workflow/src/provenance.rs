//! Who touched a record last, from where, and who wrote its notes.

use crvs_core::{KeyedList, now_rfc3339, resource_id};
use serde_json::{Map, Value, json};

use crate::bundle::task_object;
use crate::constants::{EXT_LAST_LOCATION, EXT_LAST_OFFICE, EXT_LAST_USER, SpecNamespace};
use crate::error::{WorkflowError, WorkflowResult};
use crate::gateway::{GatewayError, RegistrationGateway};

/// `Practitioner/<id>` of the acting user.
pub fn practitioner_ref(practitioner: &Value) -> WorkflowResult<String> {
    resource_id(practitioner)
        .map(|id| format!("Practitioner/{id}"))
        .ok_or_else(|| WorkflowError::invalid_practitioner("practitioner has no id"))
}

fn practitioner_id(practitioner: &Value) -> WorkflowResult<&str> {
    resource_id(practitioner).ok_or_else(|| WorkflowError::invalid_practitioner("practitioner has no id"))
}

fn location_ref(location: &Value, what: &str) -> WorkflowResult<String> {
    resource_id(location)
        .map(|id| format!("Location/{id}"))
        .ok_or_else(|| GatewayError::invalid_response(format!("{what} location has no id")).into())
}

fn has_value_reference(task: &Map<String, Value>, url: &str) -> bool {
    task.get("extension")
        .and_then(Value::as_array)
        .is_some_and(|extensions| {
            extensions.iter().any(|extension| {
                extension.get("url").and_then(Value::as_str) == Some(url)
                    && extension.get("valueReference").is_some_and(Value::is_object)
            })
        })
}

fn upsert_reference(task: &mut Map<String, Value>, url: &str, reference: String) {
    KeyedList::open(task, "extension", "url")
        .upsert(url, json!({ "valueReference": { "reference": reference } }));
}

/// Points `regLastLocation` at the practitioner's catchment area and
/// `regLastOffice` at their primary office.
///
/// For notifications an existing `regLastLocation` is kept; the office is
/// always written.
pub async fn setup_last_reg_location(
    task: &mut Value,
    practitioner: &Value,
    is_notification: bool,
    gateway: &dyn RegistrationGateway,
    ns: &SpecNamespace,
) -> WorkflowResult<()> {
    let practitioner_id = practitioner_id(practitioner)?;
    let task = task_object(task)?;

    let last_location = ns.extension(EXT_LAST_LOCATION);
    if is_notification && has_value_reference(task, &last_location) {
        tracing::debug!(practitioner_id, "keeping last location of notification");
    } else {
        let catchment = gateway
            .practitioner_catchment_location(practitioner_id)
            .await
            .inspect_err(|e| tracing::error!(practitioner_id, error = %e, "catchment lookup failed"))?;
        upsert_reference(task, &last_location, location_ref(&catchment, "catchment")?);
    }

    let office = gateway
        .practitioner_primary_office(practitioner_id)
        .await
        .inspect_err(|e| tracing::error!(practitioner_id, error = %e, "office lookup failed"))?;
    upsert_reference(task, &ns.extension(EXT_LAST_OFFICE), location_ref(&office, "office")?);
    Ok(())
}

/// Points `regLastUser` at the practitioner and sets `lastModified` to now.
pub fn setup_last_reg_user(task: &mut Value, practitioner: &Value, ns: &SpecNamespace) -> WorkflowResult<()> {
    let reference = practitioner_ref(practitioner)?;
    let task = task_object(task)?;
    upsert_reference(task, &ns.extension(EXT_LAST_USER), reference);
    task.insert("lastModified".to_string(), json!(now_rfc3339()?));
    Ok(())
}

/// Attributes every unattributed note to the practitioner.
pub fn setup_author_on_notes(task: &mut Value, practitioner: &Value) -> WorkflowResult<()> {
    let Some(notes) = task.get_mut("note").and_then(Value::as_array_mut) else {
        return Ok(());
    };
    let author = practitioner_ref(practitioner)?;
    for note in notes.iter_mut().filter_map(Value::as_object_mut) {
        let attributed = note
            .get("authorString")
            .and_then(Value::as_str)
            .is_some_and(|author| !author.is_empty());
        if !attributed {
            note.insert("authorString".to_string(), json!(author));
        }
    }
    Ok(())
}
