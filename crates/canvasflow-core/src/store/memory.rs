//! In-memory document store.

use super::{
    Change, ChangeOrigin, Collection, DocumentStore, Listener, Record, StoreResult, Subscribers,
    SubscriptionId, Write, apply_patch, diff_collections, record_id, validate_writes,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Maximum number of undo states to keep.
const MAX_UNDO_HISTORY: usize = 50;

/// Lamport stamp ordering concurrent writes to the same field.
///
/// Compared by counter first and peer id second, so every replica picks the
/// same winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldStamp {
    pub counter: u64,
    pub peer: u64,
}

/// A write together with the stamp it was made under, for replication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedWrite {
    pub write: Write,
    pub stamp: FieldStamp,
}

#[derive(Debug, Default, Clone)]
struct Table {
    order: Vec<String>,
    records: HashMap<String, Record>,
    stamps: HashMap<String, HashMap<String, FieldStamp>>,
    tombstones: HashMap<String, FieldStamp>,
}

impl Table {
    fn ordered(&self) -> Vec<Record> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    fn upsert_fields(&mut self, id: &str, fields: &Record, stamp: FieldStamp) {
        if !self.records.contains_key(id) {
            let mut record = Record::new();
            record.insert("id".into(), id.into());
            self.records.insert(id.to_string(), record);
            self.order.push(id.to_string());
        }
        self.tombstones.remove(id);
        if let Some(record) = self.records.get_mut(id) {
            apply_patch(record, fields);
        }
        let stamps = self.stamps.entry(id.to_string()).or_default();
        for key in fields.keys().filter(|k| *k != "id") {
            stamps.insert(key.clone(), stamp);
        }
    }

    fn remove(&mut self, id: &str, stamp: FieldStamp) {
        self.records.remove(id);
        self.stamps.remove(id);
        self.order.retain(|o| o != id);
        let tomb = self.tombstones.entry(id.to_string()).or_insert(stamp);
        *tomb = (*tomb).max(stamp);
    }

    fn newest_stamp(&self, id: &str) -> Option<FieldStamp> {
        self.stamps.get(id).and_then(|s| s.values().max().copied())
    }
}

type Snapshot = [Vec<Record>; 3];

/// In-memory store for tests, offline use and hosts that replicate writes
/// themselves.
///
/// Undo keeps whole-document snapshots. Remote writes go through
/// [`apply_remote`](MemoryStore::apply_remote) and resolve per field by
/// [`FieldStamp`]. A store built with [`replicating`](MemoryStore::replicating)
/// also queues its local writes in an outbox for the host to drain.
#[derive(Debug)]
pub struct MemoryStore {
    tables: [Table; 3],
    peer: u64,
    clock: u64,
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    pause_depth: u32,
    paused_entry_recorded: bool,
    version: u64,
    subscribers: Subscribers,
    /// Pending local writes, only kept when replicating.
    outbox: Option<Vec<StampedWrite>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with a random peer id.
    pub fn new() -> Self {
        Self::with_peer(Uuid::new_v4().as_u64_pair().0)
    }

    /// Create an empty store with a fixed peer id.
    pub fn with_peer(peer: u64) -> Self {
        Self {
            tables: Default::default(),
            peer,
            clock: 0,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            pause_depth: 0,
            paused_entry_recorded: false,
            version: 0,
            subscribers: Subscribers::default(),
            outbox: None,
        }
    }

    /// Create an empty store with a fixed peer id whose local writes are
    /// queued for [`take_outbox`](Self::take_outbox).
    pub fn replicating(peer: u64) -> Self {
        Self {
            outbox: Some(Vec::new()),
            ..Self::with_peer(peer)
        }
    }

    pub fn is_replicating(&self) -> bool {
        self.outbox.is_some()
    }

    pub fn peer_id(&self) -> u64 {
        self.peer
    }

    /// Number of available undo steps.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Stamp of a field, if it was ever written.
    pub fn field_stamp(&self, collection: Collection, id: &str, field: &str) -> Option<FieldStamp> {
        self.tables[collection.index()]
            .stamps
            .get(id)
            .and_then(|s| s.get(field))
            .copied()
    }

    /// Drain local writes made since the last call, for sending to peers.
    /// Always empty unless the store is replicating.
    pub fn take_outbox(&mut self) -> Vec<StampedWrite> {
        self.outbox.as_mut().map(std::mem::take).unwrap_or_default()
    }

    fn tick(&mut self) -> FieldStamp {
        self.clock += 1;
        FieldStamp {
            counter: self.clock,
            peer: self.peer,
        }
    }

    fn snapshot(&self) -> Snapshot {
        [
            self.tables[0].ordered(),
            self.tables[1].ordered(),
            self.tables[2].ordered(),
        ]
    }

    fn record_history(&mut self) {
        if self.pause_depth > 0 {
            if self.paused_entry_recorded {
                return;
            }
            self.paused_entry_recorded = true;
        }
        let snapshot = self.snapshot();
        self.undo_stack.push(snapshot);
        self.redo_stack.clear();
        if self.undo_stack.len() > MAX_UNDO_HISTORY {
            self.undo_stack.remove(0);
        }
    }

    fn apply_local(&mut self, writes: &[Write]) {
        for write in writes {
            let stamp = self.tick();
            let table = &mut self.tables[write.collection().index()];
            match write {
                Write::Insert { record, .. } => {
                    if let Some(id) = record_id(record) {
                        table.upsert_fields(id, record, stamp);
                    }
                }
                Write::Patch { id, patch, .. } => table.upsert_fields(id, patch, stamp),
                Write::Delete { id, .. } => table.remove(id, stamp),
            }
            if let Some(outbox) = self.outbox.as_mut() {
                outbox.push(StampedWrite {
                    write: write.clone(),
                    stamp,
                });
            }
        }
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

    fn restore(&mut self, target: &Snapshot) -> Vec<Write> {
        let mut writes = Vec::new();
        for collection in Collection::ALL {
            let current = self.tables[collection.index()].ordered();
            writes.extend(diff_collections(collection, &current, &target[collection.index()]));
        }
        self.apply_local(&writes);
        for collection in Collection::ALL {
            let table = &mut self.tables[collection.index()];
            table.order = target[collection.index()]
                .iter()
                .filter_map(|r| record_id(r).map(str::to_string))
                .collect();
        }
        writes
    }

    /// Apply writes replicated from another peer.
    ///
    /// Each field keeps the value with the highest stamp; a delete wins only
    /// over fields stamped before it. Returns the writes that took effect.
    pub fn apply_remote(&mut self, incoming: Vec<StampedWrite>) -> Vec<Write> {
        let mut applied = Vec::new();
        for StampedWrite { write, stamp } in incoming {
            self.clock = self.clock.max(stamp.counter);
            let collection = write.collection();
            let table = &mut self.tables[collection.index()];
            match write {
                Write::Insert { record, .. } => {
                    let Some(id) = record_id(&record).map(str::to_string) else {
                        continue;
                    };
                    if let Some(effective) = merge_fields(table, &id, &record, stamp) {
                        applied.push(Write::Patch {
                            collection,
                            id,
                            patch: effective,
                        });
                    }
                }
                Write::Patch { id, patch, .. } => {
                    if let Some(effective) = merge_fields(table, &id, &patch, stamp) {
                        applied.push(Write::Patch {
                            collection,
                            id,
                            patch: effective,
                        });
                    }
                }
                Write::Delete { id, .. } => {
                    let newer_fields = table.newest_stamp(&id).is_some_and(|s| s > stamp);
                    if newer_fields {
                        log::debug!("Ignoring stale delete of {collection}/{id}");
                        continue;
                    }
                    let existed = table.records.contains_key(&id);
                    table.remove(&id, stamp);
                    if existed {
                        applied.push(Write::Delete { collection, id });
                    }
                }
            }
        }
        if !applied.is_empty() {
            self.emit(ChangeOrigin::Remote, applied.clone());
        }
        applied
    }
}

/// Merge stamped fields into a record, creating it if needed. Returns the
/// fields that won, or None if nothing changed.
fn merge_fields(table: &mut Table, id: &str, fields: &Record, stamp: FieldStamp) -> Option<Record> {
    if table.tombstones.get(id).is_some_and(|t| *t >= stamp) {
        return None;
    }
    let existing = table.stamps.get(id);
    let winners: Record = fields
        .iter()
        .filter(|(k, _)| k.as_str() != "id")
        .filter(|(k, _)| {
            existing
                .and_then(|s| s.get(k.as_str()))
                .is_none_or(|current| stamp > *current)
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let is_new = !table.records.contains_key(id);
    if winners.is_empty() && !is_new {
        return None;
    }
    table.upsert_fields(id, &winners, stamp);
    Some(winners)
}

impl DocumentStore for MemoryStore {
    fn records(&self, collection: Collection) -> Vec<Record> {
        self.tables[collection.index()].ordered()
    }

    fn get(&self, collection: Collection, id: &str) -> Option<Record> {
        self.tables[collection.index()].records.get(id).cloned()
    }

    fn mutate(&mut self, writes: Vec<Write>) -> StoreResult<()> {
        validate_writes(&writes, |c, id| {
            self.tables[c.index()].records.contains_key(id)
        })?;
        if writes.is_empty() {
            return Ok(());
        }
        self.record_history();
        self.apply_local(&writes);
        self.emit(ChangeOrigin::Local, writes);
        Ok(())
    }

    fn pause_history(&mut self) {
        if self.pause_depth == 0 {
            self.paused_entry_recorded = false;
        }
        self.pause_depth += 1;
    }

    fn resume_history(&mut self) {
        self.pause_depth = self.pause_depth.saturating_sub(1);
        if self.pause_depth == 0 {
            self.paused_entry_recorded = false;
        }
    }

    fn undo(&mut self) -> StoreResult<bool> {
        let Some(target) = self.undo_stack.pop() else {
            return Ok(false);
        };
        let current = self.snapshot();
        self.redo_stack.push(current);
        let writes = self.restore(&target);
        self.emit(ChangeOrigin::Undo, writes);
        Ok(true)
    }

    fn redo(&mut self) -> StoreResult<bool> {
        let Some(target) = self.redo_stack.pop() else {
            return Ok(false);
        };
        let current = self.snapshot();
        self.undo_stack.push(current);
        let writes = self.restore(&target);
        self.emit(ChangeOrigin::Redo, writes);
        Ok(true)
    }

    fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
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
    use crate::store::StoreError;
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn rec(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn shape(id: &str, x: f64) -> Record {
        rec(json!({"id": id, "type": "rectangle", "x": x, "y": 0.0, "width": 50.0, "height": 50.0}))
    }

    #[test]
    fn test_insert_patch_delete() {
        let mut store = MemoryStore::with_peer(1);
        store.insert(Collection::Shapes, shape("a", 0.0)).unwrap();
        store.insert(Collection::Shapes, shape("b", 0.0)).unwrap();
        store
            .patch(Collection::Shapes, "a", rec(json!({"x": 10.0, "type": null})))
            .unwrap();
        let a = store.get(Collection::Shapes, "a").unwrap();
        assert_eq!(a["x"], json!(10.0));
        assert!(!a.contains_key("type"));

        store.delete(Collection::Shapes, "a").unwrap();
        let ids: Vec<_> = store
            .records(Collection::Shapes)
            .iter()
            .map(|r| record_id(r).unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["b"]);
        assert_eq!(store.version(), 4);
    }

    #[test]
    fn test_failed_batch_changes_nothing() {
        let mut store = MemoryStore::with_peer(1);
        let result = store.mutate(vec![
            Write::Insert {
                collection: Collection::Shapes,
                record: shape("a", 0.0),
            },
            Write::Patch {
                collection: Collection::Shapes,
                id: "missing".into(),
                patch: rec(json!({"x": 1})),
            },
        ]);
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert!(store.records(Collection::Shapes).is_empty());
        assert!(!store.can_undo());
    }

    #[test]
    fn test_paused_writes_form_one_undo_step() {
        let mut store = MemoryStore::with_peer(1);
        store.insert(Collection::Shapes, shape("a", 0.0)).unwrap();
        store.pause_history();
        for step in 1..=5 {
            store
                .patch(Collection::Shapes, "a", rec(json!({"x": step as f64 * 10.0})))
                .unwrap();
        }
        store.resume_history();
        assert_eq!(store.undo_count(), 2);

        assert!(store.undo().unwrap());
        assert_eq!(store.get(Collection::Shapes, "a").unwrap()["x"], json!(0.0));
        assert!(store.redo().unwrap());
        assert_eq!(store.get(Collection::Shapes, "a").unwrap()["x"], json!(50.0));
    }

    #[test]
    fn test_undo_delete_restores_order() {
        let mut store = MemoryStore::with_peer(1);
        for id in ["a", "b", "c"] {
            store.insert(Collection::Shapes, shape(id, 0.0)).unwrap();
        }
        store.delete(Collection::Shapes, "a").unwrap();
        assert!(store.undo().unwrap());
        let ids: Vec<_> = store
            .records(Collection::Shapes)
            .iter()
            .map(|r| record_id(r).unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_history_is_capped() {
        let mut store = MemoryStore::with_peer(1);
        store.insert(Collection::Shapes, shape("a", 0.0)).unwrap();
        for i in 0..80 {
            store
                .patch(Collection::Shapes, "a", rec(json!({"x": i})))
                .unwrap();
        }
        assert_eq!(store.undo_count(), MAX_UNDO_HISTORY);
    }

    #[test]
    fn test_subscribers_notified() {
        let mut store = MemoryStore::with_peer(1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let sub = store.subscribe(Box::new(move |change: &Change| {
            sink.borrow_mut().push((change.version, change.origin));
        }));
        store.insert(Collection::Comments, rec(json!({"id": "c", "x": 0, "y": 0}))).unwrap();
        store.undo().unwrap();
        assert!(store.unsubscribe(sub));
        store.insert(Collection::Comments, rec(json!({"id": "d", "x": 0, "y": 0}))).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![(1, ChangeOrigin::Local), (2, ChangeOrigin::Undo)]
        );
    }

    #[test]
    fn test_concurrent_field_writes_converge() {
        let mut a = MemoryStore::replicating(1);
        let mut b = MemoryStore::replicating(2);
        a.insert(Collection::Shapes, shape("s", 0.0)).unwrap();
        b.apply_remote(a.take_outbox());

        a.patch(Collection::Shapes, "s", rec(json!({"x": 10.0}))).unwrap();
        b.patch(Collection::Shapes, "s", rec(json!({"x": 20.0}))).unwrap();
        let from_a = a.take_outbox();
        let from_b = b.take_outbox();
        a.apply_remote(from_b);
        b.apply_remote(from_a);

        let xa = a.get(Collection::Shapes, "s").unwrap()["x"].clone();
        let xb = b.get(Collection::Shapes, "s").unwrap()["x"].clone();
        assert_eq!(xa, xb);
        assert_eq!(xa, json!(20.0));
        assert_eq!(
            a.field_stamp(Collection::Shapes, "s", "x"),
            Some(FieldStamp { counter: 2, peer: 2 })
        );
    }

    #[test]
    fn test_outbox_only_fills_when_replicating() {
        let mut local = MemoryStore::with_peer(1);
        local.insert(Collection::Shapes, shape("a", 0.0)).unwrap();
        for i in 0..1000 {
            local
                .patch(Collection::Shapes, "a", rec(json!({"x": i})))
                .unwrap();
        }
        assert!(!local.is_replicating());
        assert!(local.take_outbox().is_empty());

        let mut shared = MemoryStore::replicating(2);
        shared.insert(Collection::Shapes, shape("a", 0.0)).unwrap();
        shared
            .patch(Collection::Shapes, "a", rec(json!({"x": 1.0})))
            .unwrap();
        assert_eq!(shared.take_outbox().len(), 2);
        assert!(shared.take_outbox().is_empty());
    }

    #[test]
    fn test_stale_remote_delete_ignored() {
        let mut a = MemoryStore::with_peer(1);
        a.insert(Collection::Shapes, shape("s", 0.0)).unwrap();
        a.patch(Collection::Shapes, "s", rec(json!({"x": 5.0}))).unwrap();
        let applied = a.apply_remote(vec![StampedWrite {
            write: Write::Delete {
                collection: Collection::Shapes,
                id: "s".into(),
            },
            stamp: FieldStamp { counter: 1, peer: 9 },
        }]);
        assert!(applied.is_empty());
        assert!(a.get(Collection::Shapes, "s").is_some());
    }

    #[test]
    fn test_remote_insert_after_delete_is_dropped() {
        let mut a = MemoryStore::with_peer(1);
        a.apply_remote(vec![StampedWrite {
            write: Write::Delete {
                collection: Collection::Shapes,
                id: "s".into(),
            },
            stamp: FieldStamp { counter: 5, peer: 2 },
        }]);
        let applied = a.apply_remote(vec![StampedWrite {
            write: Write::Insert {
                collection: Collection::Shapes,
                record: shape("s", 0.0),
            },
            stamp: FieldStamp { counter: 3, peer: 3 },
        }]);
        assert!(applied.is_empty());
        assert!(a.get(Collection::Shapes, "s").is_none());
    }
}
