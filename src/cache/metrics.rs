/// Cache counters and the read-only snapshot exposed to diagnostics
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    pub hits: AtomicU64,
    pub stale_served: AtomicU64,
    pub misses: AtomicU64,
    pub errors: AtomicU64,
    pub negative_hits: AtomicU64,
    pub evicted: AtomicU64,
}

impl CacheCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self, size: usize, inflight: usize) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            negative_hits: self.negative_hits.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            size,
            inflight,
        }
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetrics {
    /// Fresh values served, including callers coalesced onto an in-flight fetch
    pub hits: u64,
    pub stale_served: u64,
    pub misses: u64,
    pub errors: u64,
    pub negative_hits: u64,
    pub evicted: u64,
    pub size: usize,
    pub inflight: usize,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.stale_served + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits + self.stale_served) as f64 / total as f64
        }
    }
}
