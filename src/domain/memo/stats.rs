use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time counters for a memoizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoStats {
    /// Calls answered from the cache
    pub hits: u64,
    /// Keyed calls that ran their computation
    pub misses: u64,
    /// Calls without a key, which are never cached
    pub bypasses: u64,
    /// Values currently stored
    pub entries: u64,
    /// Distinct (cache name, key type, value type) tables
    pub sites: u64,
}

impl MemoStats {
    /// Fraction of keyed calls served from cache
    pub fn hit_ratio(&self) -> f64 {
        let keyed = self.hits + self.misses;

        if keyed == 0 {
            0.0
        } else {
            self.hits as f64 / keyed as f64
        }
    }
}

/// Lock-free counters backing [`MemoStats`]
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
    entries: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bypass(&self) {
        self.bypasses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_entry(&self) {
        self.entries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, sites: u64) -> MemoStats {
        MemoStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
            entries: self.entries.load(Ordering::Relaxed),
            sites,
        }
    }
}
