use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lock-free operation counters kept alongside the store.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    inserts: AtomicU64,
    removals: AtomicU64,
    evictions: AtomicU64,
    evicted_bytes: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    batches: AtomicU64,
    rejected_batches: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self, bytes: u64) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.evicted_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_lookup(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self, accepted: bool) {
        let counter = if accepted {
            &self.batches
        } else {
            &self.rejected_batches
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StoreStats {
        StoreStats {
            inserts: self.inserts.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            evicted_bytes: self.evicted_bytes.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            rejected_batches: self.rejected_batches.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the store's counters.
///
/// `inserts` and `removals` include those performed by batches; evictions
/// are counted separately and never as removals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub inserts: u64,
    pub removals: u64,
    pub evictions: u64,
    pub evicted_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub batches: u64,
    pub rejected_batches: u64,
}

impl StoreStats {
    /// Fraction of lookups that found their key, or `0.0` with no lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let c = StatsCounters::default();
        c.record_insert();
        c.record_insert();
        c.record_removal();
        c.record_eviction(40);
        c.record_eviction(60);
        c.record_batch(true);
        c.record_batch(false);
        let s = c.snapshot();
        assert_eq!(s.inserts, 2);
        assert_eq!(s.removals, 1);
        assert_eq!(s.evictions, 2);
        assert_eq!(s.evicted_bytes, 100);
        assert_eq!(s.batches, 1);
        assert_eq!(s.rejected_batches, 1);
    }

    #[test]
    fn hit_rate() {
        let c = StatsCounters::default();
        assert_eq!(c.snapshot().hit_rate(), 0.0);
        c.record_lookup(true);
        c.record_lookup(true);
        c.record_lookup(true);
        c.record_lookup(false);
        assert!((c.snapshot().hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn stats_serialize() {
        let json = serde_json::to_value(StoreStats::default()).unwrap();
        assert_eq!(json["evictions"], 0);
    }
}
