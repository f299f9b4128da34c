//! Encoding between [`TasksDocument`] and the Firestore REST document representation.
//!
//! Firestore wraps every value in a typed object (`{"stringValue": "..."}`,
//! `{"integerValue": "123"}`, ...). Integers travel as decimal strings. Documents written by
//! the web SDK store whole-number JavaScript timestamps as `integerValue`, but a
//! `doubleValue` is accepted as well.

use serde_json::{json, Map, Value};

use crate::error::StoreError;
use crate::models::{Task, TasksDocument, Timestamp};

pub fn encode_document(document: &TasksDocument) -> Value {
    let values: Vec<Value> = document.tasks.iter().map(encode_task).collect();
    json!({
        "fields": {
            "tasks": { "arrayValue": { "values": values } }
        }
    })
}

fn encode_task(task: &Task) -> Value {
    let reminder_at = match task.reminder_at {
        Some(at) => json!({ "integerValue": at.to_string() }),
        None => json!({ "nullValue": null }),
    };
    json!({
        "mapValue": {
            "fields": {
                "id": { "stringValue": task.id },
                "text": { "stringValue": task.text },
                "completed": { "booleanValue": task.completed },
                "reminderAt": reminder_at,
            }
        }
    })
}

pub fn decode_document(value: &Value) -> Result<TasksDocument, StoreError> {
    let Some(fields) = value.get("fields") else {
        // A document with no fields at all.
        return Ok(TasksDocument::default());
    };
    let Some(tasks) = fields.get("tasks") else {
        return Ok(TasksDocument::default());
    };
    let array = tasks
        .get("arrayValue")
        .ok_or_else(|| decode_error("tasks is not an array"))?;
    // An empty Firestore array omits `values` entirely.
    let values: &[Value] = match array.get("values") {
        Some(Value::Array(values)) => values.as_slice(),
        Some(_) => return Err(decode_error("tasks.values is not a list")),
        None => &[],
    };

    // A malformed entry is dropped on its own so the rest of the list still loads.
    let tasks = values
        .iter()
        .enumerate()
        .filter_map(|(index, value)| match decode_task(value) {
            Ok(task) => Some(task),
            Err(reason) => {
                log::warn!("skipping malformed task entry index={index}: {reason}");
                None
            }
        })
        .collect();
    Ok(TasksDocument { tasks })
}

fn decode_task(value: &Value) -> Result<Task, &'static str> {
    let fields = value
        .get("mapValue")
        .and_then(|map| map.get("fields"))
        .and_then(Value::as_object)
        .ok_or("not a map")?;

    let id = string_field(fields, "id")
        .filter(|id| !id.is_empty())
        .ok_or("id missing")?;
    let text = string_field(fields, "text")
        .filter(|text| !text.trim().is_empty())
        .ok_or("text missing")?;
    let completed = fields
        .get("completed")
        .and_then(|v| v.get("booleanValue"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let reminder_at = match fields.get("reminderAt").map(timestamp_value) {
        None => None,
        Some(Ok(at)) => at,
        Some(Err(reason)) => {
            log::warn!("dropping reminder of task id={id}: reminderAt {reason}");
            None
        }
    };

    Ok(Task {
        id,
        text,
        completed,
        reminder_at,
    })
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields
        .get(name)
        .and_then(|v| v.get("stringValue"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn timestamp_value(value: &Value) -> Result<Option<Timestamp>, &'static str> {
    if value.get("nullValue").is_some() {
        return Ok(None);
    }
    if let Some(raw) = value.get("integerValue") {
        return match raw {
            Value::String(text) => text.parse().map(Some).map_err(|_| "is not an integer"),
            Value::Number(number) => number.as_i64().map(Some).ok_or("is not an integer"),
            _ => Err("is not an integer"),
        };
    }
    if let Some(raw) = value.get("stringValue").and_then(Value::as_str) {
        return raw.trim().parse().map(Some).map_err(|_| "is not an integer");
    }
    if let Some(raw) = value.get("doubleValue").and_then(Value::as_f64) {
        return Ok(Some(raw.round() as Timestamp));
    }
    Err("has an unsupported type")
}

fn decode_error(message: &str) -> StoreError {
    StoreError::Decode(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_task(id: &str, completed: bool, reminder_at: Option<Timestamp>) -> Task {
        Task {
            id: id.to_string(),
            text: format!("task \"{id}\""),
            completed,
            reminder_at,
        }
    }

    #[test]
    fn encodes_typed_values() {
        let doc = TasksDocument {
            tasks: vec![make_task("a", true, Some(1_700_000_000_123))],
        };
        let value = encode_document(&doc);
        let task = &value["fields"]["tasks"]["arrayValue"]["values"][0]["mapValue"]["fields"];
        assert_eq!(task["id"], json!({ "stringValue": "a" }));
        assert_eq!(task["completed"], json!({ "booleanValue": true }));
        assert_eq!(
            task["reminderAt"],
            json!({ "integerValue": "1700000000123" })
        );

        let doc = TasksDocument {
            tasks: vec![make_task("b", false, None)],
        };
        let value = encode_document(&doc);
        let task = &value["fields"]["tasks"]["arrayValue"]["values"][0]["mapValue"]["fields"];
        assert_eq!(task["reminderAt"], json!({ "nullValue": null }));
    }

    #[test]
    fn decoding_an_encoded_document_keeps_order_and_fields() {
        let doc = TasksDocument {
            tasks: vec![
                make_task("c", false, Some(5)),
                make_task("a", true, None),
                make_task("b", false, None),
            ],
        };
        assert_eq!(decode_document(&encode_document(&doc)).unwrap(), doc);
    }

    #[test]
    fn empty_array_and_missing_fields_decode_to_empty_list() {
        let empty_array = json!({ "fields": { "tasks": { "arrayValue": {} } } });
        assert!(decode_document(&empty_array).unwrap().tasks.is_empty());

        let no_fields = json!({ "name": "projects/p/databases/(default)/documents/users/u" });
        assert!(decode_document(&no_fields).unwrap().tasks.is_empty());
    }

    #[test]
    fn accepts_sdk_written_values() {
        let value = json!({
            "name": "projects/p/databases/(default)/documents/users/u",
            "fields": { "tasks": { "arrayValue": { "values": [
                { "mapValue": { "fields": {
                    "id": { "stringValue": "x" },
                    "text": { "stringValue": "from web" },
                    "completed": { "booleanValue": false },
                    "reminderAt": { "doubleValue": 1700000000000.0 }
                } } },
                { "mapValue": { "fields": {
                    "id": { "stringValue": "y" },
                    "text": { "stringValue": "no reminder field" }
                } } }
            ] } } },
            "createTime": "2024-01-01T00:00:00Z"
        });
        let doc = decode_document(&value).unwrap();
        assert_eq!(doc.tasks.len(), 2);
        assert_eq!(doc.tasks[0].reminder_at, Some(1_700_000_000_000));
        assert_eq!(doc.tasks[1].reminder_at, None);
        assert!(!doc.tasks[1].completed);
    }

    #[test]
    fn malformed_document_shape_is_a_decode_error() {
        let value = json!({ "fields": { "tasks": { "stringValue": "nope" } } });
        assert!(matches!(decode_document(&value), Err(StoreError::Decode(_))));

        let value = json!({ "fields": { "tasks": { "arrayValue": { "values": "nope" } } } });
        assert!(matches!(decode_document(&value), Err(StoreError::Decode(_))));
    }

    #[test]
    fn malformed_entries_are_skipped_and_the_rest_kept() {
        let value = json!({ "fields": { "tasks": { "arrayValue": { "values": [
            { "mapValue": { "fields": { "text": { "stringValue": "no id" } } } },
            { "mapValue": { "fields": {
                "id": { "stringValue": "keep" },
                "text": { "stringValue": "good one" },
                "reminderAt": { "integerValue": "42" }
            } } },
            { "mapValue": { "fields": { "id": { "stringValue": "blank" } } } },
            { "mapValue": { "fields": {
                "id": { "stringValue": "empty" },
                "text": { "stringValue": "   " }
            } } },
            { "stringValue": "not a map" },
            { "mapValue": { "fields": {
                "id": { "stringValue": "odd" },
                "text": { "stringValue": "odd reminder" },
                "reminderAt": { "stringValue": "soon" }
            } } },
            { "mapValue": { "fields": {
                "id": { "stringValue": "texty" },
                "text": { "stringValue": "reminder as text" },
                "reminderAt": { "stringValue": "1700000000000" }
            } } }
        ] } } } });
        let doc = decode_document(&value).unwrap();
        let ids: Vec<_> = doc.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["keep", "odd", "texty"]);
        assert_eq!(doc.tasks[0].reminder_at, Some(42));
        assert_eq!(doc.tasks[1].reminder_at, None);
        assert_eq!(doc.tasks[2].reminder_at, Some(1_700_000_000_000));
    }
}
