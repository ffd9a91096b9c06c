//! Port to the shared document store.
//!
//! The engine never owns durable state. Everything it persists goes through
//! [`DocumentStore`]: three ordered collections of JSON records, narrow
//! per-field patches, batched mutations, undo history that can be paused for
//! the length of a gesture, and change notification.
//!
//! Two adapters ship with the crate: [`MemoryStore`] (in-process, with
//! field-level last-writer-wins for remote writes) and [`LoroStore`] (backed
//! by a Loro CRDT document).

mod crdt;
mod memory;
mod record;

pub use crdt::LoroStore;
pub use memory::{FieldStamp, MemoryStore, StampedWrite};
pub use record::{Record, apply_patch, diff_collections, diff_records, from_record, record_id, to_record};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found in {collection}: {id}")]
    NotFound { collection: Collection, id: String },
    #[error("Record already exists in {collection}: {id}")]
    DuplicateId { collection: Collection, id: String },
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("CRDT error: {0}")]
    Crdt(#[from] loro::LoroError),
    #[error("Store error: {0}")]
    Other(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The ordered collections of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Shapes,
    Connections,
    Comments,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Shapes,
        Collection::Connections,
        Collection::Comments,
    ];

    /// Key of the collection in the shared document.
    pub fn key(self) -> &'static str {
        match self {
            Collection::Shapes => "shapes",
            Collection::Connections => "connections",
            Collection::Comments => "comments",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A single write against one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Write {
    /// Append a new record. The record must carry a string `id`.
    Insert { collection: Collection, record: Record },
    /// Merge changed top-level fields; `null` deletes a field.
    Patch {
        collection: Collection,
        id: String,
        patch: Record,
    },
    /// Remove a record. Deleting a missing record is not an error.
    Delete { collection: Collection, id: String },
}

impl Write {
    pub fn collection(&self) -> Collection {
        match self {
            Write::Insert { collection, .. }
            | Write::Patch { collection, .. }
            | Write::Delete { collection, .. } => *collection,
        }
    }
}

/// Where a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    Local,
    Remote,
    Undo,
    Redo,
}

/// Notification sent to subscribers after the store changed.
#[derive(Debug, Clone)]
pub struct Change {
    pub version: u64,
    pub origin: ChangeOrigin,
    /// Writes applied, when the adapter can describe them.
    pub writes: Vec<Write>,
}

/// Change listener.
pub type Listener = Box<dyn FnMut(&Change)>;

/// Handle returned by [`DocumentStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Trait for shared document store backends.
///
/// Implementations can be in-process, CRDT documents or a hosted real-time
/// service. Single-threaded: listeners run synchronously inside the call that
/// changed the store.
pub trait DocumentStore {
    /// All records of a collection, in order.
    fn records(&self, collection: Collection) -> Vec<Record>;

    /// A single record by id.
    fn get(&self, collection: Collection, id: &str) -> Option<Record>;

    /// Apply a batch of writes as one transaction and one history entry.
    fn mutate(&mut self, writes: Vec<Write>) -> StoreResult<()>;

    fn insert(&mut self, collection: Collection, record: Record) -> StoreResult<()> {
        self.mutate(vec![Write::Insert { collection, record }])
    }

    fn patch(&mut self, collection: Collection, id: &str, patch: Record) -> StoreResult<()> {
        self.mutate(vec![Write::Patch {
            collection,
            id: id.to_string(),
            patch,
        }])
    }

    fn delete(&mut self, collection: Collection, id: &str) -> StoreResult<()> {
        self.mutate(vec![Write::Delete {
            collection,
            id: id.to_string(),
        }])
    }

    /// Stop recording history entries; writes until the matching
    /// [`resume_history`](Self::resume_history) form one undo step.
    /// Calls nest.
    fn pause_history(&mut self);

    fn resume_history(&mut self);

    /// Undo the last local history entry. Returns false if there was none.
    fn undo(&mut self) -> StoreResult<bool>;

    fn redo(&mut self) -> StoreResult<bool>;

    fn can_undo(&self) -> bool;

    fn can_redo(&self) -> bool;

    fn subscribe(&mut self, listener: Listener) -> SubscriptionId;

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool;

    /// Monotonically increasing version, bumped on every change.
    fn version(&self) -> u64;
}

/// Listener registry shared by the adapters.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl Subscribers {
    pub(crate) fn add(&mut self, listener: Listener) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.listeners.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub(crate) fn notify(&mut self, change: &Change) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(change);
        }
    }
}

impl std::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.listeners.len())
            .finish()
    }
}

/// Check a batch before applying it, given a lookup of existing ids.
///
/// Inserts must carry an id that is not taken (also not by an earlier insert
/// in the same batch); patches must target an existing record.
pub(crate) fn validate_writes(
    writes: &[Write],
    exists: impl Fn(Collection, &str) -> bool,
) -> StoreResult<()> {
    let mut inserted: std::collections::HashSet<(Collection, &str)> = Default::default();
    let mut deleted: std::collections::HashSet<(Collection, &str)> = Default::default();
    for write in writes {
        match write {
            Write::Insert { collection, record } => {
                let id = record_id(record).ok_or_else(|| {
                    StoreError::InvalidRecord(format!("{collection} record without an id"))
                })?;
                let live = (exists(*collection, id) && !deleted.contains(&(*collection, id)))
                    || inserted.contains(&(*collection, id));
                if live {
                    return Err(StoreError::DuplicateId {
                        collection: *collection,
                        id: id.to_string(),
                    });
                }
                deleted.remove(&(*collection, id));
                inserted.insert((*collection, id));
            }
            Write::Patch { collection, id, .. } => {
                let live = (exists(*collection, id) && !deleted.contains(&(*collection, id.as_str())))
                    || inserted.contains(&(*collection, id.as_str()));
                if !live {
                    return Err(StoreError::NotFound {
                        collection: *collection,
                        id: id.clone(),
                    });
                }
            }
            Write::Delete { collection, id } => {
                inserted.remove(&(*collection, id.as_str()));
                deleted.insert((*collection, id.as_str()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(id: &str) -> Record {
        match json!({ "id": id }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_validate_rejects_duplicates_and_missing() {
        let exists = |_: Collection, id: &str| id == "a";
        let dup = [Write::Insert {
            collection: Collection::Shapes,
            record: rec("a"),
        }];
        assert!(matches!(validate_writes(&dup, exists), Err(StoreError::DuplicateId { .. })));

        let missing = [Write::Patch {
            collection: Collection::Shapes,
            id: "zzz".into(),
            patch: Record::new(),
        }];
        assert!(matches!(validate_writes(&missing, exists), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_validate_sees_earlier_writes_in_batch() {
        let exists = |_: Collection, _: &str| false;
        let batch = [
            Write::Insert {
                collection: Collection::Shapes,
                record: rec("n"),
            },
            Write::Patch {
                collection: Collection::Shapes,
                id: "n".into(),
                patch: Record::new(),
            },
        ];
        assert!(validate_writes(&batch, exists).is_ok());
    }

    #[test]
    fn test_write_serde_tag() {
        let write = Write::Delete {
            collection: Collection::Comments,
            id: "c1".into(),
        };
        let value = serde_json::to_value(&write).unwrap();
        assert_eq!(value, json!({"op": "delete", "collection": "comments", "id": "c1"}));
    }
}
