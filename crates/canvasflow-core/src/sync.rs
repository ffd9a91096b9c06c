//! Bridge between the editor's working document and the shared store.
//!
//! Local state changes first; the bridge then writes narrow per-field patches
//! to the store. Writes are fire-and-forget: a failed write is logged and
//! dropped, and the next store echo brings the working copy back in line.

use crate::document::Document;
use crate::shapes::{Comment, Connection, Shape};
use crate::store::{
    Collection, DocumentStore, Record, StoreResult, Write, diff_collections, diff_records,
    from_record, record_id, to_record,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Raw records of every collection, for exporting and seeding a room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    #[serde(default)]
    pub shapes: Vec<Record>,
    #[serde(default)]
    pub connections: Vec<Record>,
    #[serde(default)]
    pub comments: Vec<Record>,
}

impl RecordSnapshot {
    fn collection(&self, collection: Collection) -> &[Record] {
        match collection {
            Collection::Shapes => &self.shapes,
            Collection::Connections => &self.connections,
            Collection::Comments => &self.comments,
        }
    }
}

/// Connects a [`Document`] to a [`DocumentStore`].
pub struct SyncBridge<S> {
    store: S,
    min_shape_size: f64,
    gesture_depth: u32,
}

impl<S: DocumentStore> SyncBridge<S> {
    pub fn new(store: S, min_shape_size: f64) -> Self {
        Self {
            store,
            min_shape_size,
            gesture_depth: 0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Version of the underlying store.
    pub fn version(&self) -> u64 {
        self.store.version()
    }

    /// Whether a gesture currently holds history paused.
    pub fn in_gesture(&self) -> bool {
        self.gesture_depth > 0
    }

    /// Build a working document from the store. Records that fail to decode
    /// are skipped.
    pub fn load_document(&self) -> Document {
        let shapes: Vec<Shape> = decode_all(Collection::Shapes, self.store.records(Collection::Shapes));
        let connections: Vec<Connection> =
            decode_all(Collection::Connections, self.store.records(Collection::Connections));
        let comments: Vec<Comment> = decode_all(Collection::Comments, self.store.records(Collection::Comments));
        Document::from_parts(self.min_shape_size, shapes, connections, comments)
    }

    /// Copy every record out of the store.
    pub fn export_snapshot(&self) -> RecordSnapshot {
        RecordSnapshot {
            shapes: self.store.records(Collection::Shapes),
            connections: self.store.records(Collection::Connections),
            comments: self.store.records(Collection::Comments),
        }
    }

    /// Replace the store contents with a snapshot as one undoable batch.
    ///
    /// Unlike gesture writes, failures are returned to the caller.
    pub fn import_snapshot(&mut self, snapshot: &RecordSnapshot) -> StoreResult<()> {
        let mut writes = Vec::new();
        for collection in Collection::ALL {
            writes.extend(diff_collections(
                collection,
                &self.store.records(collection),
                snapshot.collection(collection),
            ));
        }
        log::debug!("Importing snapshot ({} writes)", writes.len());
        self.store.mutate(writes)
    }

    /// Write the fields of `after` that differ from `before`.
    pub fn patch_shape(&mut self, before: &Shape, after: &Shape) {
        let (Some(old), Some(new)) = (encode(before), encode(after)) else {
            return;
        };
        let patch = diff_records(&old, &new);
        if patch.is_empty() {
            return;
        }
        log::trace!("Patching shape {} ({} fields)", after.id, patch.len());
        self.send(vec![Write::Patch {
            collection: Collection::Shapes,
            id: after.id.clone(),
            patch,
        }]);
    }

    /// Write everything that changed between two versions of the document
    /// as one batch.
    pub fn commit(&mut self, before: &Document, after: &Document) {
        let mut writes = Vec::new();
        for collection in Collection::ALL {
            writes.extend(diff_collections(
                collection,
                &encode_collection(before, collection),
                &encode_collection(after, collection),
            ));
        }
        if writes.is_empty() {
            return;
        }
        log::debug!("Committing {} writes", writes.len());
        self.send(writes);
    }

    /// Pause history so writes until [`end_gesture`](Self::end_gesture)
    /// form one undo step.
    pub fn begin_gesture(&mut self) {
        self.gesture_depth += 1;
        self.store.pause_history();
    }

    pub fn end_gesture(&mut self) {
        if self.gesture_depth == 0 {
            return;
        }
        self.gesture_depth -= 1;
        self.store.resume_history();
    }

    pub fn undo(&mut self) -> bool {
        match self.store.undo() {
            Ok(undone) => undone,
            Err(e) => {
                log::warn!("Undo failed: {e}");
                false
            }
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.store.redo() {
            Ok(redone) => redone,
            Err(e) => {
                log::warn!("Redo failed: {e}");
                false
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.store.can_redo()
    }

    fn send(&mut self, writes: Vec<Write>) {
        if let Err(e) = self.store.mutate(writes) {
            log::warn!("Dropping store write: {e}");
        }
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for SyncBridge<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncBridge")
            .field("store", &self.store)
            .field("gesture_depth", &self.gesture_depth)
            .finish()
    }
}

fn decode_all<T: DeserializeOwned>(collection: Collection, records: Vec<Record>) -> Vec<T> {
    records
        .into_iter()
        .filter_map(|record| {
            let id = record_id(&record).unwrap_or("<no id>").to_string();
            match from_record(record) {
                Ok(value) => Some(value),
                Err(e) => {
                    log::warn!("Skipping malformed {collection} record {id}: {e}");
                    None
                }
            }
        })
        .collect()
}

fn encode<T: Serialize>(value: &T) -> Option<Record> {
    match to_record(value) {
        Ok(record) => Some(record),
        Err(e) => {
            log::warn!("Failed to encode record: {e}");
            None
        }
    }
}

fn encode_collection(doc: &Document, collection: Collection) -> Vec<Record> {
    match collection {
        Collection::Shapes => doc.shapes().filter_map(encode).collect(),
        Collection::Connections => doc.connections().iter().filter_map(encode).collect(),
        Collection::Comments => doc.comments().iter().filter_map(encode).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_SHAPE_SIZE;
    use crate::geometry::Anchor;
    use crate::shapes::ShapeKind;
    use crate::store::{Change, MemoryStore};
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn rec(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn rect_shape(id: &str, x: f64) -> Shape {
        Shape::with_id(id, ShapeKind::Rectangle, x, 0.0, 100.0, 100.0)
    }

    fn bridge_with(shapes: &[Shape]) -> SyncBridge<MemoryStore> {
        let mut store = MemoryStore::with_peer(1);
        for shape in shapes {
            store
                .insert(Collection::Shapes, to_record(shape).unwrap())
                .unwrap();
        }
        SyncBridge::new(store, MIN_SHAPE_SIZE)
    }

    #[test]
    fn test_load_skips_malformed_records() {
        let mut bridge = bridge_with(&[rect_shape("a", 0.0)]);
        bridge
            .store_mut()
            .insert(Collection::Shapes, rec(json!({"id": "bad", "type": "hexagon"})))
            .unwrap();
        let doc = bridge.load_document();
        assert_eq!(doc.len(), 1);
        assert!(doc.shape("a").is_some());
    }

    #[test]
    fn test_load_enforces_size_floor() {
        let mut bridge = bridge_with(&[]);
        bridge
            .store_mut()
            .insert(
                Collection::Shapes,
                rec(json!({"id": "tiny", "type": "rectangle", "x": 0, "y": 0, "width": 3, "height": 1})),
            )
            .unwrap();
        let doc = bridge.load_document();
        let tiny = doc.shape("tiny").unwrap();
        assert_eq!((tiny.width, tiny.height), (MIN_SHAPE_SIZE, MIN_SHAPE_SIZE));
    }

    #[test]
    fn test_patch_shape_sends_changed_fields_only() {
        let before = rect_shape("a", 0.0);
        let mut bridge = bridge_with(std::slice::from_ref(&before));
        let seen: Rc<RefCell<Vec<Change>>> = Rc::default();
        let sink = Rc::clone(&seen);
        bridge
            .store_mut()
            .subscribe(Box::new(move |change: &Change| {
                sink.borrow_mut().push(change.clone())
            }));

        let mut after = before.clone();
        after.x = 42.0;
        bridge.patch_shape(&before, &after);
        bridge.patch_shape(&after, &after);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        match &seen[0].writes[0] {
            Write::Patch { patch, .. } => {
                assert_eq!(patch.keys().collect::<Vec<_>>(), vec!["x"]);
                assert_eq!(patch["x"], json!(42.0));
            }
            other => panic!("unexpected write {other:?}"),
        }
    }

    #[test]
    fn test_commit_cascading_delete() {
        let mut bridge = bridge_with(&[rect_shape("a", 0.0), rect_shape("b", 300.0)]);
        let conn = Connection::new("a", Anchor::new(1.0, 0.5), "b", Anchor::new(0.0, 0.5));
        bridge
            .store_mut()
            .insert(Collection::Connections, to_record(&conn).unwrap())
            .unwrap();

        let before = bridge.load_document();
        let mut after = before.clone();
        after.delete_shape("a");
        bridge.commit(&before, &after);

        assert!(bridge.store().records(Collection::Connections).is_empty());
        assert_eq!(bridge.store().records(Collection::Shapes).len(), 1);
        assert_eq!(bridge.load_document().len(), 1);
    }

    #[test]
    fn test_gesture_is_one_undo_step() {
        let start = rect_shape("a", 0.0);
        let mut bridge = bridge_with(std::slice::from_ref(&start));
        bridge.begin_gesture();
        let mut prev = start.clone();
        for step in 1..=4 {
            let mut next = prev.clone();
            next.x = step as f64 * 5.0;
            bridge.patch_shape(&prev, &next);
            prev = next;
        }
        bridge.end_gesture();
        assert!(!bridge.in_gesture());

        assert!(bridge.undo());
        assert_eq!(bridge.load_document().shape("a").unwrap().x, 0.0);
        assert!(bridge.undo());
        assert!(bridge.load_document().is_empty());
    }

    #[test]
    fn test_snapshot_import_replaces_contents() {
        let mut source = bridge_with(&[rect_shape("a", 0.0), rect_shape("b", 10.0)]);
        let snapshot = source.export_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();

        let mut target = bridge_with(&[rect_shape("old", 0.0)]);
        let parsed: RecordSnapshot = serde_json::from_str(&json).unwrap();
        target.import_snapshot(&parsed).unwrap();
        let doc = target.load_document();
        let ids: Vec<&str> = doc.shapes().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        assert!(target.undo());
        assert!(target.load_document().shape("old").is_some());
        source.import_snapshot(&RecordSnapshot::default()).unwrap();
        assert!(source.load_document().is_empty());
    }

    #[test]
    fn test_failed_write_is_dropped() {
        let mut bridge = bridge_with(&[]);
        let ghost = rect_shape("ghost", 0.0);
        let mut moved = ghost.clone();
        moved.x = 10.0;
        bridge.patch_shape(&ghost, &moved);
        assert_eq!(bridge.version(), 0);
    }
}
