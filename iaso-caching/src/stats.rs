//! Query cache statistics

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Query cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryCacheStats {
    /// Fetches started against a query function
    pub fetches: u64,

    /// Requests that joined a fetch already in flight
    pub deduplicated: u64,

    /// Requests served from fresh cached data
    pub hits: u64,

    /// Entries marked stale by invalidation
    pub invalidations: u64,

    /// Fetches aborted through their cancellation token
    pub cancellations: u64,

    /// Entries removed after `cache_time` without observers
    pub evictions: u64,

    /// Current number of entries
    pub entry_count: usize,
}

impl QueryCacheStats {
    /// Share of requests answered without a new fetch (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.fetches + self.deduplicated + self.hits;
        if total > 0 {
            (self.deduplicated + self.hits) as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Thread-safe statistics collector
#[derive(Debug, Default)]
pub struct StatsCollector {
    fetches: AtomicU64,
    deduplicated: AtomicU64,
    hits: AtomicU64,
    invalidations: AtomicU64,
    cancellations: AtomicU64,
    evictions: AtomicU64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dedup(&self) {
        self.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current stats
    pub fn get_stats(&self, entry_count: usize) -> QueryCacheStats {
        QueryCacheStats {
            fetches: self.fetches.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count,
        }
    }
}
