//! Keyed association lists over FHIR JSON arrays.
//!
//! Several FHIR fields are lists whose entries are unique per some string
//! key: `identifier` by `system`, `extension` by `url`, `coding` by
//! `system`. [`KeyedList`] gives those arrays find-or-create semantics so an
//! entry is written once and then updated in place.
//!
//! ```
//! use crvs_core::keyed::KeyedList;
//! use serde_json::{json, Map};
//!
//! let mut task = Map::new();
//! KeyedList::open(&mut task, "identifier", "system")
//!     .upsert("urn:a", json!({ "value": "1" }));
//! KeyedList::open(&mut task, "identifier", "system")
//!     .upsert("urn:a", json!({ "value": "2" }));
//!
//! assert_eq!(task["identifier"], json!([{ "system": "urn:a", "value": "2" }]));
//! ```

use serde_json::{Map, Value};

/// Returns the JSON object stored under `field`, replacing a missing or
/// non-object value with an empty object.
pub fn object_field<'a>(object: &'a mut Map<String, Value>, field: &str) -> &'a mut Map<String, Value> {
    let slot = object
        .entry(field.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just replaced with an object"),
    }
}

fn array_field<'a>(object: &'a mut Map<String, Value>, field: &str) -> &'a mut Vec<Value> {
    let slot = object
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => items,
        _ => unreachable!("slot was just replaced with an array"),
    }
}

/// A mutable view of a JSON array whose entries are keyed by a string field.
#[derive(Debug)]
pub struct KeyedList<'a> {
    items: &'a mut Vec<Value>,
    key_field: &'static str,
}

impl<'a> KeyedList<'a> {
    pub fn new(items: &'a mut Vec<Value>, key_field: &'static str) -> Self {
        Self { items, key_field }
    }

    /// Opens the array stored under `field`, creating it when absent.
    pub fn open(object: &'a mut Map<String, Value>, field: &str, key_field: &'static str) -> Self {
        Self::new(array_field(object, field), key_field)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.get(self.key_field).and_then(Value::as_str) == Some(key))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key).map(|idx| &self.items[idx])
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.position(key).map(move |idx| &mut self.items[idx])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Number of entries carrying `key`. Never more than one for lists that
    /// are only written through [`KeyedList::upsert`].
    pub fn count(&self, key: &str) -> usize {
        self.items
            .iter()
            .filter(|item| item.get(self.key_field).and_then(Value::as_str) == Some(key))
            .count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Writes `fields` into the entry keyed by `key`, appending a new entry
    /// when none exists. Fields not named in `fields` are left untouched.
    ///
    /// `fields` is expected to be a JSON object; any other value only
    /// ensures that the keyed entry exists.
    pub fn upsert(&mut self, key: &str, fields: Value) -> &mut Value {
        let idx = match self.position(key) {
            Some(idx) => idx,
            None => {
                let mut entry = Map::new();
                entry.insert(self.key_field.to_string(), Value::String(key.to_string()));
                self.items.push(Value::Object(entry));
                self.items.len() - 1
            }
        };

        let entry = &mut self.items[idx];
        if !entry.is_object() {
            let mut replacement = Map::new();
            replacement.insert(self.key_field.to_string(), Value::String(key.to_string()));
            *entry = Value::Object(replacement);
        }
        if let (Value::Object(target), Value::Object(source)) = (&mut *entry, fields) {
            for (name, value) in source {
                target.insert(name, value);
            }
        }
        entry
    }
}
