//! Atomic multi-entry updates.
//!
//! A batch models "apply a block": spent entries are removed and new ones are
//! added in a single write-locked section, so no reader ever observes half a
//! block. Unlike [`IndexedStore::insert`], an upsert silently replaces an
//! existing entry with the same id.

use std::collections::HashSet;
use std::sync::Arc;

use coinpool_types::Digest;
use tracing::{debug, warn};

use crate::entry::Entry;
use crate::error::BatchError;
use crate::store::IndexedStore;

/// A single staged operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOp {
    /// Remove the entry if present.
    Remove(Digest),
    /// Insert the entry, replacing any entry with the same id.
    Upsert(Entry),
}

/// Ordered list of operations, built fluently.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove(mut self, id: Digest) -> Self {
        self.ops.push(BatchOp::Remove(id));
        self
    }

    pub fn upsert(mut self, entry: Entry) -> Self {
        self.ops.push(BatchOp::Upsert(entry));
        self
    }

    pub fn push(&mut self, op: BatchOp) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

impl From<Batch> for Vec<BatchOp> {
    fn from(batch: Batch) -> Self {
        batch.ops
    }
}

impl FromIterator<BatchOp> for Batch {
    fn from_iter<I: IntoIterator<Item = BatchOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

/// Outcome of a committed batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Entries taken out by `Remove` ops, in op order.
    pub removed: Vec<Entry>,
    /// Previous entries displaced by `Upsert` ops.
    pub replaced: Vec<Entry>,
    /// Ids upserted by the batch and still present after it.
    pub inserted: Vec<Digest>,
    /// Ids evicted after the batch to restore capacity.
    pub evicted: Vec<Digest>,
    /// `Remove` ops whose key was absent.
    pub missing: usize,
    /// Store size once the batch and its eviction finished.
    pub total_bytes_after: u64,
}

/// Applies batches against a shared [`IndexedStore`].
#[derive(Clone, Debug)]
pub struct BatchCoordinator {
    store: Arc<IndexedStore>,
}

impl BatchCoordinator {
    pub fn new(store: Arc<IndexedStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<IndexedStore> {
        &self.store
    }

    /// Apply every operation as one atomic unit.
    ///
    /// All upserts are validated first; if any fails, the batch is rejected
    /// with [`BatchError::Rejected`] and the store is untouched. Otherwise the
    /// ops are applied in order under the write lock, then eviction runs once
    /// for the net growth, never evicting entries this batch upserted. If
    /// eviction cannot reach capacity the batch stays applied and the report
    /// comes back inside [`BatchError::CapacityExhausted`].
    pub fn commit(&self, ops: impl Into<Vec<BatchOp>>) -> Result<BatchReport, BatchError> {
        let ops = ops.into();
        let counters = self.store.counters();

        for (index, op) in ops.iter().enumerate() {
            if let BatchOp::Upsert(entry) = op {
                if let Err(e) = self.store.validate(entry) {
                    counters.record_batch(false);
                    warn!(index, id = %entry.id().short_hex(), error = %e, "batch rejected");
                    return Err(BatchError::Rejected {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let op_count = ops.len();
        let mut report = BatchReport::default();
        let mut upserted: HashSet<Digest> = HashSet::new();
        let mut state = self.store.write_state();

        for op in ops {
            match op {
                BatchOp::Remove(id) => match state.take(&id) {
                    Some(entry) => {
                        counters.record_removal();
                        if upserted.remove(&id) {
                            report.inserted.retain(|x| *x != id);
                        }
                        report.removed.push(entry);
                    }
                    None => report.missing += 1,
                },
                BatchOp::Upsert(entry) => {
                    let id = entry.id();
                    if let Some(previous) = state.take(&id) {
                        counters.record_removal();
                        report.replaced.push(previous);
                    }
                    state.admit(entry);
                    counters.record_insert();
                    if upserted.insert(id) {
                        report.inserted.push(id);
                    }
                }
            }
        }

        let mut exhausted = None;
        if let Some(capacity) = self.store.capacity() {
            if state.total_bytes() > capacity {
                let (evicted, satisfied) =
                    state.evict_to(capacity, self.store.policy(), &upserted);
                self.store.record_evictions(&evicted);
                report.evicted = evicted.iter().map(Entry::id).collect();
                if !satisfied {
                    exhausted = Some(capacity);
                }
            }
        }
        report.total_bytes_after = state.total_bytes();
        drop(state);

        counters.record_batch(true);
        debug!(
            ops = op_count,
            removed = report.removed.len(),
            replaced = report.replaced.len(),
            inserted = report.inserted.len(),
            evicted = report.evicted.len(),
            missing = report.missing,
            total = report.total_bytes_after,
            "batch committed"
        );

        match exhausted {
            Some(capacity) => {
                warn!(
                    total_bytes = report.total_bytes_after,
                    capacity, "capacity exhausted after batch"
                );
                Err(BatchError::CapacityExhausted {
                    report: Box::new(report),
                    capacity,
                })
            }
            None => Ok(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::eviction::EvictionPolicyKind;
    use coinpool_types::Priority;
    use std::thread;

    fn entry(payload: &[u8]) -> Entry {
        Entry::new(payload.to_vec()).unwrap()
    }

    fn sized(tag: u8, size: usize) -> Entry {
        let mut payload = vec![0u8; size];
        payload[0] = tag;
        Entry::new(payload).unwrap()
    }

    fn coordinator(config: StoreConfig) -> BatchCoordinator {
        BatchCoordinator::new(Arc::new(IndexedStore::new(config)))
    }

    // -----------------------------------------------------------------------
    // Apply semantics
    // -----------------------------------------------------------------------

    #[test]
    fn apply_block_removes_spent_and_adds_new() {
        let coord = coordinator(StoreConfig::default());
        let spent = entry(b"utxo:spent");
        let spent_id = spent.id();
        coord.store().insert(spent).unwrap();

        let created = entry(b"utxo:created");
        let created_id = created.id();
        let report = coord
            .commit(Batch::new().remove(spent_id).upsert(created))
            .unwrap();

        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.removed[0].payload(), b"utxo:spent");
        assert_eq!(report.inserted, vec![created_id]);
        assert_eq!(report.missing, 0);
        assert!(!coord.store().contains(&spent_id));
        assert!(coord.store().contains(&created_id));
        assert_eq!(report.total_bytes_after, 12);
    }

    #[test]
    fn upsert_replaces_existing_and_missing_remove_is_counted() {
        let coord = coordinator(StoreConfig::default());
        let original = Entry::with_priority(b"shared".to_vec(), Priority::new(1)).unwrap();
        let id = original.id();
        coord.store().insert(original).unwrap();

        let replacement = Entry::with_priority(b"shared".to_vec(), Priority::new(9)).unwrap();
        let absent = entry(b"never there").id();
        let report = coord
            .commit(vec![BatchOp::Remove(absent), BatchOp::Upsert(replacement)])
            .unwrap();

        assert_eq!(report.missing, 1);
        assert_eq!(report.replaced.len(), 1);
        assert_eq!(report.replaced[0].priority(), Priority::new(1));
        let current = coord.store().get(&id).unwrap();
        assert_eq!(current.priority(), Priority::new(9));
        assert_eq!(current.sequence(), Some(2));
        assert_eq!(coord.store().count(), 1);
    }

    #[test]
    fn upsert_then_remove_in_same_batch() {
        let coord = coordinator(StoreConfig::default());
        let e = entry(b"transient");
        let id = e.id();
        let report = coord.commit(Batch::new().upsert(e).remove(id)).unwrap();
        assert!(report.inserted.is_empty());
        assert_eq!(report.removed.len(), 1);
        assert!(coord.store().is_empty());
    }

    #[test]
    fn empty_batch_is_noop() {
        let coord = coordinator(StoreConfig::default());
        coord.store().insert(entry(b"keep")).unwrap();
        let report = coord.commit(Batch::new()).unwrap();
        assert!(report.removed.is_empty());
        assert!(report.inserted.is_empty());
        assert_eq!(report.total_bytes_after, 4);
    }

    // -----------------------------------------------------------------------
    // Atomicity
    // -----------------------------------------------------------------------

    #[test]
    fn invalid_op_rejects_whole_batch() {
        let coord = coordinator(StoreConfig::default().with_max_entry_bytes(16));
        let keep = entry(b"keep me");
        let keep_id = keep.id();
        coord.store().insert(keep).unwrap();
        let before = coord.store().snapshot();

        let empty = Entry::builder(Vec::new()).allow_empty(true).build().unwrap();
        let batch = Batch::new()
            .remove(keep_id)
            .upsert(entry(b"valid"))
            .upsert(empty)
            .upsert(entry(b"also valid"));

        match coord.commit(batch) {
            Err(BatchError::Rejected { index, reason }) => {
                assert_eq!(index, 2);
                assert!(reason.contains("empty"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(coord.store().snapshot(), before);
        assert!(coord.store().contains(&keep_id));
        assert_eq!(coord.store().stats().rejected_batches, 1);
    }

    #[test]
    fn oversized_upsert_rejects_batch() {
        let coord = coordinator(StoreConfig::default().with_max_entry_bytes(4));
        let err = coord
            .commit(Batch::new().upsert(entry(b"ok")).upsert(entry(b"too large")))
            .unwrap_err();
        assert!(matches!(err, BatchError::Rejected { index: 1, .. }));
        assert!(coord.store().is_empty());
    }

    #[test]
    fn readers_never_see_partial_batches() {
        let coord = coordinator(StoreConfig::default());
        let side_a: Vec<Entry> = (0..10u8).map(|i| entry(&[b'a', i])).collect();
        let side_b: Vec<Entry> = (0..10u8).map(|i| entry(&[b'b', i])).collect();
        let ids_a: HashSet<Digest> = side_a.iter().map(Entry::id).collect();
        let ids_b: HashSet<Digest> = side_b.iter().map(Entry::id).collect();
        for e in side_a.iter().cloned() {
            coord.store().insert(e).unwrap();
        }

        let store = Arc::clone(coord.store());
        let (check_a, check_b) = (ids_a.clone(), ids_b.clone());
        let reader = thread::spawn(move || {
            for _ in 0..500 {
                let seen: HashSet<Digest> = store.iter().map(|(id, _)| id).collect();
                assert!(seen == check_a || seen == check_b, "observed a partial batch");
            }
        });

        for round in 0..50 {
            let (from, to) = if round % 2 == 0 {
                (&ids_a, &side_b)
            } else {
                (&ids_b, &side_a)
            };
            let mut batch: Batch = from.iter().map(|id| BatchOp::Remove(*id)).collect();
            for e in to {
                batch.push(BatchOp::Upsert(e.clone()));
            }
            coord.commit(batch).unwrap();
        }
        reader.join().expect("reader should not panic");
    }

    // -----------------------------------------------------------------------
    // Eviction after batch
    // -----------------------------------------------------------------------

    #[test]
    fn eviction_runs_once_after_batch() {
        let coord = coordinator(StoreConfig::bounded(250));
        let old_a = sized(1, 100);
        let old_b = sized(2, 100);
        let (a, b) = (old_a.id(), old_b.id());
        coord.store().insert(old_a).unwrap();
        coord.store().insert(old_b).unwrap();

        // Intermediate state reaches 400 bytes; only the net result matters.
        let report = coord
            .commit(
                Batch::new()
                    .upsert(sized(3, 100))
                    .upsert(sized(4, 100))
                    .remove(b),
            )
            .unwrap();

        assert_eq!(report.evicted, vec![a]);
        assert_eq!(report.total_bytes_after, 200);
        assert_eq!(coord.store().total_size_bytes(), 200);
    }

    #[test]
    fn batch_entries_are_protected_from_eviction() {
        let coord = coordinator(StoreConfig::bounded(100));
        coord.store().insert(sized(1, 60)).unwrap();
        let fresh = sized(2, 80);
        let fresh_id = fresh.id();
        let report = coord.commit(Batch::new().upsert(fresh)).unwrap();
        assert_eq!(report.evicted.len(), 1);
        assert!(coord.store().contains(&fresh_id));
    }

    #[test]
    fn batch_capacity_exhausted_keeps_batch_applied() {
        let coord = coordinator(
            StoreConfig::bounded(100).with_policy(EvictionPolicyKind::PriorityOrder),
        );
        let big_a = sized(1, 70);
        let big_b = sized(2, 70);
        let (a, b) = (big_a.id(), big_b.id());
        match coord.commit(Batch::new().upsert(big_a).upsert(big_b)) {
            Err(BatchError::CapacityExhausted { report, capacity }) => {
                assert_eq!(capacity, 100);
                assert_eq!(report.total_bytes_after, 140);
                assert!(report.evicted.is_empty());
            }
            other => panic!("expected capacity exhaustion, got {other:?}"),
        }
        assert!(coord.store().contains(&a));
        assert!(coord.store().contains(&b));
        assert_eq!(coord.store().stats().batches, 1);
    }
}
