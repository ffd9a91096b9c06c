//! Loro-backed document store.
//!
//! # Schema
//!
//! ```text
//! LoroDoc
//! ├── "shapes": LoroMap<id, LoroMap<field, json string>>
//! ├── "shapes_order": LoroList<id>
//! ├── "connections" / "connections_order"
//! └── "comments" / "comments_order"
//! ```
//!
//! Field values are stored as JSON strings, so concurrent writes resolve per
//! field with Loro's map semantics and nested values are replaced whole.

use super::{
    Change, ChangeOrigin, Collection, DocumentStore, Listener, Record, StoreError, StoreResult,
    Subscribers, SubscriptionId, Write, record_id, validate_writes,
};
use crate::config::EngineConfig;
use loro::{
    Container, ExportMode, LoroDoc, LoroList, LoroMap, LoroValue, UndoManager, ValueOrContainer,
    VersionVector,
};
use serde_json::Value;

/// Maximum number of undo steps kept by the undo manager.
const MAX_UNDO_STEPS: usize = 100;

fn order_key(collection: Collection) -> &'static str {
    match collection {
        Collection::Shapes => "shapes_order",
        Collection::Connections => "connections_order",
        Collection::Comments => "comments_order",
    }
}

/// A CRDT-backed store for collaborative editing.
///
/// Local writes are grouped into undo steps by a [`UndoManager`]; pausing
/// history opens an undo group that closes when history resumes.
pub struct LoroStore {
    doc: LoroDoc,
    undo_manager: UndoManager,
    pause_depth: u32,
    merge_interval_ms: i64,
    version: u64,
    subscribers: Subscribers,
}

impl LoroStore {
    /// Create an empty store with no undo merging between commits.
    pub fn new() -> Self {
        Self::with_merge_interval(0)
    }

    /// Create an empty store; commits closer than `merge_interval_ms` merge
    /// into one undo step.
    pub fn with_merge_interval(merge_interval_ms: i64) -> Self {
        Self::from_doc(LoroDoc::new(), merge_interval_ms)
    }

    /// Create an empty store using the configured undo merge interval.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_merge_interval(config.history_merge_interval_ms)
    }

    /// Create a store from a snapshot exported by another peer.
    pub fn from_snapshot(bytes: &[u8]) -> StoreResult<Self> {
        Self::from_snapshot_with_merge_interval(bytes, 0)
    }

    /// Create a store from a snapshot, using the configured undo merge
    /// interval.
    pub fn from_snapshot_with_config(bytes: &[u8], config: &EngineConfig) -> StoreResult<Self> {
        Self::from_snapshot_with_merge_interval(bytes, config.history_merge_interval_ms)
    }

    fn from_snapshot_with_merge_interval(bytes: &[u8], merge_interval_ms: i64) -> StoreResult<Self> {
        let doc = LoroDoc::new();
        doc.import(bytes)?;
        Ok(Self::from_doc(doc, merge_interval_ms))
    }

    fn from_doc(doc: LoroDoc, merge_interval_ms: i64) -> Self {
        let mut undo_manager = UndoManager::new(&doc);
        undo_manager.set_max_undo_steps(MAX_UNDO_STEPS);
        undo_manager.set_merge_interval(merge_interval_ms);
        Self {
            doc,
            undo_manager,
            pause_depth: 0,
            merge_interval_ms,
            version: 0,
            subscribers: Subscribers::default(),
        }
    }

    /// Peer id of the underlying document.
    /// Undo merge interval this store was created with.
    pub fn merge_interval_ms(&self) -> i64 {
        self.merge_interval_ms
    }

    pub fn peer_id(&self) -> u64 {
        self.doc.peer_id()
    }

    /// Get the underlying LoroDoc.
    pub fn loro_doc(&self) -> &LoroDoc {
        &self.doc
    }

    /// Export the document as a snapshot (full state).
    pub fn export_snapshot(&self) -> StoreResult<Vec<u8>> {
        self.doc
            .export(ExportMode::Snapshot)
            .map_err(|e| StoreError::Other(e.to_string()))
    }

    /// Export incremental updates since a version.
    pub fn export_updates(&self, since: &VersionVector) -> StoreResult<Vec<u8>> {
        self.doc
            .export(ExportMode::updates(since))
            .map_err(|e| StoreError::Other(e.to_string()))
    }

    /// Current version vector, for computing update exports.
    pub fn version_vector(&self) -> VersionVector {
        self.doc.oplog_vv()
    }

    /// Import a snapshot or updates from another peer.
    pub fn import(&mut self, bytes: &[u8]) -> StoreResult<()> {
        self.doc.import(bytes)?;
        self.emit(ChangeOrigin::Remote, Vec::new());
        Ok(())
    }

    fn collection_map(&self, collection: Collection) -> LoroMap {
        self.doc.get_map(collection.key())
    }

    fn order_list(&self, collection: Collection) -> LoroList {
        self.doc.get_list(order_key(collection))
    }

    fn order(&self, collection: Collection) -> Vec<String> {
        let list = self.order_list(collection);
        let mut result = Vec::with_capacity(list.len());
        for i in 0..list.len() {
            if let Some(ValueOrContainer::Value(LoroValue::String(id))) = list.get(i) {
                result.push(id.to_string());
            }
        }
        result
    }

    fn exists(&self, collection: Collection, id: &str) -> bool {
        self.collection_map(collection).get(id).is_some()
    }

    fn record_map(&self, collection: Collection, id: &str) -> StoreResult<LoroMap> {
        match self.collection_map(collection).get(id) {
            Some(ValueOrContainer::Container(Container::Map(map))) => Ok(map),
            _ => Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            }),
        }
    }

    fn write_fields(map: &LoroMap, fields: &Record) -> StoreResult<()> {
        for (key, value) in fields {
            if key == "id" {
                continue;
            }
            if value.is_null() {
                map.delete(key)?;
            } else {
                map.insert(key, serde_json::to_string(value)?)?;
            }
        }
        Ok(())
    }

    fn remove_from_order(&self, collection: Collection, id: &str) -> StoreResult<()> {
        let list = self.order_list(collection);
        for i in 0..list.len() {
            if let Some(ValueOrContainer::Value(LoroValue::String(s))) = list.get(i) {
                if s.to_string() == id {
                    list.delete(i, 1)?;
                    break;
                }
            }
        }
        Ok(())
    }

    fn apply(&self, write: &Write) -> StoreResult<()> {
        match write {
            Write::Insert { collection, record } => {
                let id = record_id(record).ok_or_else(|| {
                    StoreError::InvalidRecord(format!("{collection} record without an id"))
                })?;
                let map = self
                    .collection_map(*collection)
                    .insert_container(id, LoroMap::new())?;
                map.insert("id", serde_json::to_string(&Value::from(id))?)?;
                Self::write_fields(&map, record)?;
                self.order_list(*collection)
                    .push(LoroValue::String(id.to_string().into()))?;
            }
            Write::Patch {
                collection,
                id,
                patch,
            } => {
                let map = self.record_map(*collection, id)?;
                Self::write_fields(&map, patch)?;
            }
            Write::Delete { collection, id } => {
                if self.exists(*collection, id) {
                    self.collection_map(*collection).delete(id)?;
                    self.remove_from_order(*collection, id)?;
                }
            }
        }
        Ok(())
    }

    fn emit(&mut self, origin: ChangeOrigin, writes: Vec<Write>) {
        self.version += 1;
        let change = Change {
            version: self.version,
            origin,
            writes,
        };
        self.subscribers.notify(&change);
    }
}

/// Decode one stored record; malformed fields are skipped.
fn decode_record(id: &str, value: &LoroValue) -> Option<Record> {
    let LoroValue::Map(fields) = value else {
        return None;
    };
    let mut record = Record::new();
    for (key, field) in fields.iter() {
        let LoroValue::String(text) = field else {
            continue;
        };
        match serde_json::from_str::<Value>(&text.to_string()) {
            Ok(v) => {
                record.insert(key.to_string(), v);
            }
            Err(e) => log::warn!("Skipping malformed field {key} of {id}: {e}"),
        }
    }
    record.insert("id".into(), Value::from(id));
    Some(record)
}

impl Default for LoroStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for LoroStore {
    fn records(&self, collection: Collection) -> Vec<Record> {
        let LoroValue::Map(all) = self.collection_map(collection).get_deep_value() else {
            return Vec::new();
        };
        self.order(collection)
            .iter()
            .filter_map(|id| all.get(id.as_str()).and_then(|v| decode_record(id, v)))
            .collect()
    }

    fn get(&self, collection: Collection, id: &str) -> Option<Record> {
        let LoroValue::Map(all) = self.collection_map(collection).get_deep_value() else {
            return None;
        };
        all.get(id).and_then(|v| decode_record(id, v))
    }

    fn mutate(&mut self, writes: Vec<Write>) -> StoreResult<()> {
        validate_writes(&writes, |c, id| self.exists(c, id))?;
        if writes.is_empty() {
            return Ok(());
        }
        for write in &writes {
            self.apply(write)?;
        }
        self.doc.commit();
        self.emit(ChangeOrigin::Local, writes);
        Ok(())
    }

    fn pause_history(&mut self) {
        if self.pause_depth == 0 {
            if let Err(e) = self.undo_manager.record_new_checkpoint() {
                log::warn!("Failed to record undo checkpoint: {e}");
            }
            if let Err(e) = self.undo_manager.group_start() {
                log::warn!("Failed to start undo group: {e}");
            }
        }
        self.pause_depth += 1;
    }

    fn resume_history(&mut self) {
        if self.pause_depth == 0 {
            return;
        }
        self.pause_depth -= 1;
        if self.pause_depth == 0 {
            self.undo_manager.group_end();
        }
    }

    fn undo(&mut self) -> StoreResult<bool> {
        let undone = self.undo_manager.undo()?;
        if undone {
            self.emit(ChangeOrigin::Undo, Vec::new());
        }
        Ok(undone)
    }

    fn redo(&mut self) -> StoreResult<bool> {
        let redone = self.undo_manager.redo()?;
        if redone {
            self.emit(ChangeOrigin::Redo, Vec::new());
        }
        Ok(redone)
    }

    fn can_undo(&self) -> bool {
        self.undo_manager.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.undo_manager.can_redo()
    }

    fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        self.subscribers.add(listener)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn shape(id: &str) -> Record {
        rec(json!({"id": id, "type": "card", "x": 1.5, "y": 2.0, "width": 80.0, "height": 40.0,
                   "style": {"opacity": 0.5}}))
    }

    #[test]
    fn test_records_roundtrip_in_order() {
        let mut store = LoroStore::new();
        store.insert(Collection::Shapes, shape("b")).unwrap();
        store.insert(Collection::Shapes, shape("a")).unwrap();
        let records = store.records(Collection::Shapes);
        assert_eq!(records.len(), 2);
        assert_eq!(record_id(&records[0]), Some("b"));
        assert_eq!(records[1]["style"], json!({"opacity": 0.5}));
        assert_eq!(records[1]["x"], json!(1.5));
    }

    #[test]
    fn test_patch_null_deletes_field() {
        let mut store = LoroStore::new();
        store.insert(Collection::Shapes, shape("a")).unwrap();
        store
            .patch(Collection::Shapes, "a", rec(json!({"x": 9.0, "style": null})))
            .unwrap();
        let a = store.get(Collection::Shapes, "a").unwrap();
        assert_eq!(a["x"], json!(9.0));
        assert!(!a.contains_key("style"));
    }

    #[test]
    fn test_delete_removes_from_order() {
        let mut store = LoroStore::new();
        store.insert(Collection::Connections, rec(json!({"id": "c1"}))).unwrap();
        store.delete(Collection::Connections, "c1").unwrap();
        assert!(store.records(Collection::Connections).is_empty());
        assert!(store.delete(Collection::Connections, "c1").is_ok());
    }

    #[test]
    fn test_patch_missing_record_fails() {
        let mut store = LoroStore::new();
        let result = store.patch(Collection::Shapes, "nope", rec(json!({"x": 1})));
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_undo_insert() {
        let mut store = LoroStore::new();
        store.insert(Collection::Shapes, shape("a")).unwrap();
        assert!(store.can_undo());
        assert!(store.undo().unwrap());
        assert!(store.records(Collection::Shapes).is_empty());
        assert!(store.redo().unwrap());
        assert_eq!(store.records(Collection::Shapes).len(), 1);
    }

    #[test]
    fn test_merge_interval_from_config() {
        let config = EngineConfig {
            history_merge_interval_ms: 500,
            ..EngineConfig::default()
        };
        let mut a = LoroStore::from_config(&config);
        assert_eq!(a.merge_interval_ms(), 500);
        a.insert(Collection::Shapes, shape("s")).unwrap();
        let bytes = a.export_snapshot().unwrap();
        let b = LoroStore::from_snapshot_with_config(&bytes, &config).unwrap();
        assert_eq!(b.merge_interval_ms(), 500);
        assert_eq!(b.records(Collection::Shapes).len(), 1);
        assert_eq!(LoroStore::from_snapshot(&bytes).unwrap().merge_interval_ms(), 0);
    }

    #[test]
    fn test_snapshot_sync_between_peers() {
        let mut a = LoroStore::new();
        a.insert(Collection::Shapes, shape("s")).unwrap();
        let mut b = LoroStore::from_snapshot(&a.export_snapshot().unwrap()).unwrap();
        assert_eq!(b.records(Collection::Shapes).len(), 1);

        let since = b.version_vector();
        a.patch(Collection::Shapes, "s", rec(json!({"x": 42.0}))).unwrap();
        b.import(&a.export_updates(&since).unwrap()).unwrap();
        assert_eq!(b.get(Collection::Shapes, "s").unwrap()["x"], json!(42.0));
        assert_eq!(b.version(), 1);
    }
}
