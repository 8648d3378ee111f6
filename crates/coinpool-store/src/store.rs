use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::ops::Deref;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use coinpool_types::{Digest, Priority};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::entry::{Entry, EntryBuilder, EntrySummary};
use crate::error::{StoreError, StoreResult};
use crate::eviction::{EvictionPolicy, EvictionView};
use crate::stats::{StatsCounters, StoreStats};

/// Mutable state behind the store lock.
///
/// `entries` is the source of truth; `by_sequence` and `by_priority` mirror it
/// as ordered eviction indexes, and `total_bytes` is the sum of entry sizes.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) entries: HashMap<Digest, Entry>,
    pub(crate) by_sequence: BTreeMap<u64, Digest>,
    pub(crate) by_priority: BTreeSet<(Priority, u64, Digest)>,
    total_bytes: u64,
    last_sequence: u64,
}

impl StoreState {
    /// Add an entry whose id is known to be absent, assigning it the next
    /// sequence number.
    pub(crate) fn admit(&mut self, mut entry: Entry) -> Digest {
        debug_assert!(!self.entries.contains_key(&entry.id()));
        self.last_sequence += 1;
        let seq = self.last_sequence;
        entry.assign_sequence(seq);

        let id = entry.id();
        self.by_sequence.insert(seq, id);
        self.by_priority.insert((entry.priority(), seq, id));
        self.total_bytes += entry.size();
        self.entries.insert(id, entry);
        id
    }

    /// Remove an entry and unlink it from every index.
    pub(crate) fn take(&mut self, id: &Digest) -> Option<Entry> {
        let entry = self.entries.remove(id)?;
        if let Some(seq) = entry.sequence() {
            self.by_sequence.remove(&seq);
            self.by_priority.remove(&(entry.priority(), seq, *id));
        }
        self.total_bytes -= entry.size();
        Some(entry)
    }

    /// Evict victims chosen by `policy` until `total_bytes <= capacity`.
    ///
    /// Keys in `protected` are never evicted. Returns the evicted entries and
    /// whether capacity was reached.
    pub(crate) fn evict_to(
        &mut self,
        capacity: u64,
        policy: &dyn EvictionPolicy,
        protected: &HashSet<Digest>,
    ) -> (Vec<Entry>, bool) {
        let mut evicted = Vec::new();
        while self.total_bytes > capacity {
            let victims = {
                let view = EvictionView::new(self, protected);
                policy.select_victims(&view, self.total_bytes - capacity)
            };

            let mut progressed = false;
            for id in victims {
                if self.total_bytes <= capacity {
                    break;
                }
                if protected.contains(&id) {
                    continue;
                }
                if let Some(entry) = self.take(&id) {
                    debug!(
                        id = %id.short_hex(),
                        size = entry.size(),
                        policy = policy.name(),
                        "evicted entry"
                    );
                    evicted.push(entry);
                    progressed = true;
                }
            }
            if !progressed {
                return (evicted, false);
            }
        }
        (evicted, true)
    }

    pub(crate) fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.by_sequence.clear();
        self.by_priority.clear();
        self.total_bytes = 0;
        count
    }
}

/// Concurrent, size-bounded entry store keyed by [`Digest`].
///
/// All state sits behind one `RwLock`: lookups, snapshots and counters take
/// the read side, while insert, remove, eviction and batch commits take the
/// write side for a short, non-blocking section. Operations on the same key
/// are therefore totally ordered, and a batch briefly excludes every other
/// writer.
///
/// The store exclusively owns an [`Entry`] while it is present. [`remove`]
/// hands ownership back to the caller; eviction drops it.
///
/// [`remove`]: IndexedStore::remove
pub struct IndexedStore {
    state: RwLock<StoreState>,
    policy: Box<dyn EvictionPolicy>,
    config: StoreConfig,
    stats: StatsCounters,
}

impl IndexedStore {
    /// Create a store using the eviction policy named in `config`.
    pub fn new(config: StoreConfig) -> Self {
        let policy = config.eviction_policy.build();
        Self::with_policy(config, policy)
    }

    /// Create a store with a custom eviction policy.
    ///
    /// `config.eviction_policy` is ignored.
    pub fn with_policy(config: StoreConfig, policy: Box<dyn EvictionPolicy>) -> Self {
        info!(
            policy = policy.name(),
            capacity = ?config.effective_capacity(),
            "entry store created"
        );
        Self {
            state: RwLock::new(StoreState::default()),
            policy,
            config,
            stats: StatsCounters::default(),
        }
    }

    /// Start building an entry under this store's empty-payload rule.
    pub fn entry_builder(&self, payload: Vec<u8>) -> EntryBuilder {
        Entry::builder(payload).allow_empty(!self.config.reject_empty_payload)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Insert a new entry.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if the id is already present;
    /// nothing is overwritten. If the insert pushes the store over capacity,
    /// older entries are evicted according to the policy. When eviction
    /// cannot get back under capacity the result is
    /// [`StoreError::CapacityExhausted`], and the new entry stays in place.
    pub fn insert(&self, entry: Entry) -> StoreResult<()> {
        self.validate(&entry)?;

        let mut state = self.write_state();
        let id = entry.id();
        if state.entries.contains_key(&id) {
            return Err(StoreError::DuplicateKey(id));
        }

        let size = entry.size();
        state.admit(entry);
        self.stats.record_insert();
        debug!(id = %id.short_hex(), size, total = state.total_bytes(), "inserted entry");

        if let Some(capacity) = self.config.effective_capacity() {
            if state.total_bytes() > capacity {
                let protected = HashSet::from([id]);
                let (evicted, satisfied) =
                    state.evict_to(capacity, self.policy.as_ref(), &protected);
                self.record_evictions(&evicted);
                if !satisfied {
                    let total_bytes = state.total_bytes();
                    warn!(id = %id.short_hex(), total_bytes, capacity, "capacity exhausted");
                    return Err(StoreError::CapacityExhausted {
                        id,
                        total_bytes,
                        capacity,
                    });
                }
            }
        }
        Ok(())
    }

    /// Remove an entry, transferring ownership to the caller.
    ///
    /// Returns `None` if the id is not present; that is not an error.
    pub fn remove(&self, id: &Digest) -> Option<Entry> {
        let entry = self.write_state().take(id)?;
        self.stats.record_removal();
        debug!(id = %id.short_hex(), size = entry.size(), "removed entry");
        Some(entry)
    }

    /// Drop every entry. Sequence numbers keep counting from where they were.
    pub fn clear(&self) -> usize {
        let count = self.write_state().clear();
        debug!(count, "cleared store");
        count
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Borrow an entry in place.
    ///
    /// The returned guard holds the read lock: writers wait until it is
    /// dropped, so keep it short-lived and never mutate the store from the
    /// same thread while holding it.
    pub fn lookup(&self, id: &Digest) -> Option<EntryRef<'_>> {
        let guard = self.read_state();
        let hit = guard.entries.contains_key(id);
        self.stats.record_lookup(hit);
        hit.then_some(EntryRef { guard, id: *id })
    }

    /// Run `f` against an entry while the read lock is held.
    pub fn with_entry<R>(&self, id: &Digest, f: impl FnOnce(&Entry) -> R) -> Option<R> {
        let state = self.read_state();
        let entry = state.entries.get(id);
        self.stats.record_lookup(entry.is_some());
        entry.map(f)
    }

    /// Cloned copy of an entry.
    pub fn get(&self, id: &Digest) -> Option<Entry> {
        self.with_entry(id, Entry::clone)
    }

    pub fn contains(&self, id: &Digest) -> bool {
        self.read_state().entries.contains_key(id)
    }

    /// Sum of payload sizes of all present entries.
    pub fn total_size_bytes(&self) -> u64 {
        self.read_state().total_bytes()
    }

    /// Number of present entries.
    pub fn count(&self) -> usize {
        self.read_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Point-in-time listing of the store in insertion order.
    ///
    /// The snapshot is detached from the store: entries inserted or removed
    /// afterwards are not reflected in it.
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.read_state();
        let items = state
            .by_sequence
            .values()
            .filter_map(|id| state.entries.get(id))
            .map(|entry| (entry.id(), entry.summary()))
            .collect();
        StoreSnapshot {
            items,
            total_bytes: state.total_bytes(),
        }
    }

    /// Iterate over a fresh snapshot. See [`IndexedStore::snapshot`].
    pub fn iter(&self) -> std::vec::IntoIter<(Digest, EntrySummary)> {
        self.snapshot().into_iter()
    }

    /// Sorted list of all present ids.
    pub fn ids(&self) -> Vec<Digest> {
        let mut ids: Vec<Digest> = self.read_state().entries.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn stats(&self) -> StoreStats {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Enforced capacity in bytes, `None` when unbounded.
    pub fn capacity(&self) -> Option<u64> {
        self.config.effective_capacity()
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    // -----------------------------------------------------------------------
    // Crate internals shared with the batch coordinator
    // -----------------------------------------------------------------------

    /// Check an entry against the configured payload rules.
    pub(crate) fn validate(&self, entry: &Entry) -> StoreResult<()> {
        if self.config.reject_empty_payload && entry.size() == 0 {
            return Err(StoreError::invalid_payload("payload is empty"));
        }
        if let Some(max) = self.config.max_entry_bytes {
            if entry.size() > max {
                return Err(StoreError::invalid_payload(format!(
                    "payload of {} bytes exceeds limit of {max}",
                    entry.size()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().expect("store lock poisoned")
    }

    pub(crate) fn policy(&self) -> &dyn EvictionPolicy {
        self.policy.as_ref()
    }

    pub(crate) fn counters(&self) -> &StatsCounters {
        &self.stats
    }

    pub(crate) fn record_evictions(&self, evicted: &[Entry]) {
        for entry in evicted {
            self.stats.record_eviction(entry.size());
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().expect("store lock poisoned")
    }
}

impl Default for IndexedStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl fmt::Debug for IndexedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read_state();
        f.debug_struct("IndexedStore")
            .field("entry_count", &state.entries.len())
            .field("total_bytes", &state.total_bytes())
            .field("capacity", &self.config.effective_capacity())
            .field("policy", &self.policy.name())
            .finish()
    }
}

/// Read-only borrow of a stored entry, holding the store's read lock.
pub struct EntryRef<'a> {
    guard: RwLockReadGuard<'a, StoreState>,
    id: Digest,
}

impl Deref for EntryRef<'_> {
    type Target = Entry;

    fn deref(&self) -> &Entry {
        // Presence was checked under this same guard.
        &self.guard.entries[&self.id]
    }
}

impl fmt::Debug for EntryRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntryRef").field(&self.summary()).finish()
    }
}

/// Detached, restartable listing of the store's entries in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    items: Vec<(Digest, EntrySummary)>,
    total_bytes: u64,
}

impl StoreSnapshot {
    pub fn iter(&self) -> std::slice::Iter<'_, (Digest, EntrySummary)> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Store size at the moment the snapshot was taken.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

impl IntoIterator for StoreSnapshot {
    type Item = (Digest, EntrySummary);
    type IntoIter = std::vec::IntoIter<(Digest, EntrySummary)>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a StoreSnapshot {
    type Item = &'a (Digest, EntrySummary);
    type IntoIter = std::slice::Iter<'a, (Digest, EntrySummary)>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
