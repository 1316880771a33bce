//! Per-cache counters.
//!
//! Read paths record lookups while holding only a shared guard, so the
//! counters are atomics rather than fields behind the cache lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of one cache's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub adds: u64,
    pub rejected_adds: u64,
    pub removes: u64,
    pub resorts: u64,
    pub lookup_hits: u64,
    pub lookup_misses: u64,

    // gauge captured at snapshot time
    pub len: usize,
}

#[derive(Debug, Default)]
pub struct CacheCounters {
    adds: AtomicU64,
    rejected_adds: AtomicU64,
    removes: AtomicU64,
    resorts: AtomicU64,
    lookup_hits: AtomicU64,
    lookup_misses: AtomicU64,
}

impl CacheCounters {
    /// Snapshot current counters with the given length gauge.
    pub fn snapshot(&self, len: usize) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            adds: self.adds.load(Ordering::Relaxed),
            rejected_adds: self.rejected_adds.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            resorts: self.resorts.load(Ordering::Relaxed),
            lookup_hits: self.lookup_hits.load(Ordering::Relaxed),
            lookup_misses: self.lookup_misses.load(Ordering::Relaxed),
            len,
        }
    }

    /// Records an `add` call by outcome.
    pub fn record_add(&self, admitted: bool) {
        if admitted {
            self.adds.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected_adds.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resort(&self) {
        self.resorts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an id lookup by outcome.
    pub fn record_lookup(&self, hit: bool) {
        if hit {
            self.lookup_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.lookup_misses.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_snapshot() {
        let counters = CacheCounters::default();
        assert_eq!(counters.snapshot(0), CacheMetricsSnapshot::default());

        counters.record_add(true);
        counters.record_add(false);
        counters.record_remove();
        counters.record_resort();
        counters.record_lookup(true);
        counters.record_lookup(false);
        counters.record_lookup(false);

        let snap = counters.snapshot(3);
        assert_eq!(snap.adds, 1);
        assert_eq!(snap.rejected_adds, 1);
        assert_eq!(snap.removes, 1);
        assert_eq!(snap.resorts, 1);
        assert_eq!(snap.lookup_hits, 1);
        assert_eq!(snap.lookup_misses, 2);
        assert_eq!(snap.len, 3);
    }
}
