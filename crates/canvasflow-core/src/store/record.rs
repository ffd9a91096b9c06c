//! JSON record helpers shared by the store adapters and the sync bridge.

use super::{Collection, StoreError, StoreResult, Write};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// A flat JSON object as kept by the shared store.
pub type Record = Map<String, Value>;

/// Id of a record, if it has a string `id` field.
pub fn record_id(record: &Record) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Serialize a typed value into a record.
pub fn to_record<T: Serialize>(value: &T) -> StoreResult<Record> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidRecord(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Deserialize a record into a typed value.
pub fn from_record<T: DeserializeOwned>(record: Record) -> StoreResult<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Top-level fields that differ between two records.
///
/// Fields missing from `after` are reported as `null`, which deletes them
/// when the patch is applied.
pub fn diff_records(before: &Record, after: &Record) -> Record {
    let mut patch = Record::new();
    for (key, value) in after {
        if before.get(key) != Some(value) {
            patch.insert(key.clone(), value.clone());
        }
    }
    for key in before.keys() {
        if !after.contains_key(key) {
            patch.insert(key.clone(), Value::Null);
        }
    }
    patch
}

/// Merge a shallow patch into a record. `null` removes the field and the
/// `id` field is never overwritten.
pub fn apply_patch(record: &mut Record, patch: &Record) {
    for (key, value) in patch {
        if key == "id" {
            continue;
        }
        if value.is_null() {
            record.remove(key);
        } else {
            record.insert(key.clone(), value.clone());
        }
    }
}

/// Writes that turn the ordered collection `before` into `after`.
///
/// Records present in both produce a patch only when some field changed.
/// Inserts append, so once the order of `after` departs from `before` every
/// later record is deleted and re-inserted to land in place. Records without
/// an id are ignored.
pub fn diff_collections(collection: Collection, before: &[Record], after: &[Record]) -> Vec<Write> {
    let old: HashMap<&str, &Record> = before
        .iter()
        .filter_map(|r| record_id(r).map(|id| (id, r)))
        .collect();
    let kept: HashSet<&str> = after.iter().filter_map(record_id).collect();
    let surviving: Vec<&str> = before
        .iter()
        .filter_map(record_id)
        .filter(|id| kept.contains(id))
        .collect();
    let mut in_place = true;
    let mut pos = 0;
    let mut writes = Vec::new();

    for record in after {
        let Some(id) = record_id(record) else {
            continue;
        };
        if in_place {
            if surviving.get(pos) == Some(&id) {
                pos += 1;
            } else {
                in_place = false;
            }
        }
        match old.get(id) {
            None => writes.push(Write::Insert {
                collection,
                record: record.clone(),
            }),
            Some(prev) if in_place => {
                let patch = diff_records(prev, record);
                if !patch.is_empty() {
                    writes.push(Write::Patch {
                        collection,
                        id: id.to_string(),
                        patch,
                    });
                }
            }
            Some(_) => {
                writes.push(Write::Delete {
                    collection,
                    id: id.to_string(),
                });
                writes.push(Write::Insert {
                    collection,
                    record: record.clone(),
                });
            }
        }
    }
    for record in before {
        if let Some(id) = record_id(record) {
            if !kept.contains(id) {
                writes.push(Write::Delete {
                    collection,
                    id: id.to_string(),
                });
            }
        }
    }
    writes
}
