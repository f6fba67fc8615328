/// Cache entry: a value slot with its write time and jittered TTL, plus a negative slot
use crate::errors::FeedError;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: Option<V>,
    pub written_at: Option<Instant>,
    /// Jittered at write time
    pub ttl: Duration,
    pub error: Option<FeedError>,
    pub error_at: Option<Instant>,
    pub tag: Option<String>,
}

impl<V> CacheEntry<V> {
    pub fn with_value(value: V, now: Instant, ttl: Duration, tag: Option<String>) -> Self {
        Self {
            value: Some(value),
            written_at: Some(now),
            ttl,
            error: None,
            error_at: None,
            tag,
        }
    }

    pub fn with_error(error: FeedError, now: Instant) -> Self {
        Self {
            value: None,
            written_at: None,
            ttl: Duration::ZERO,
            error: Some(error),
            error_at: Some(now),
            tag: None,
        }
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        match (&self.value, self.written_at) {
            (Some(_), Some(at)) => now.saturating_duration_since(at) <= self.ttl,
            _ => false,
        }
    }

    /// Stored error while it is still inside the negative-cache window
    pub fn live_error(&self, now: Instant, error_ttl: Duration) -> Option<&FeedError> {
        match (&self.error, self.error_at) {
            (Some(err), Some(at)) if now.saturating_duration_since(at) < error_ttl => Some(err),
            _ => None,
        }
    }

    /// Ordering key for eviction; entries that never held a value sort first
    pub fn age_key(&self) -> Option<Instant> {
        self.written_at
    }
}

/// Spread `ttl` uniformly over `[ttl * (1 - pct), ttl * (1 + pct)]`
pub fn jitter_ttl(ttl: Duration, pct: f64) -> Duration {
    if ttl.is_zero() || pct <= 0.0 {
        return ttl;
    }
    let factor = rand::thread_rng().gen_range((1.0 - pct)..=(1.0 + pct));
    ttl.mul_f64(factor)
}
