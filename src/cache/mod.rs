/// Stale-while-revalidate cache with request coalescing and negative caching
///
/// One `SwrCache<V>` instance holds one value type. Keys carry their own namespace
/// (`"v1|ds:search:bonk"`); `clear` works on key prefixes and `clear_tag` on the optional
/// tag recorded at write time.
///
/// Lookup order for `get`:
/// 1. fresh value: served (hit)
/// 2. stale value and the caller accepts stale: served, background revalidation started
///    unless the last refresh failed within the negative window
/// 3. live negative entry and the caller accepts negative hits: stored error returned
/// 4. fetch already in flight for the key: caller joins it (counted as a hit)
/// 5. otherwise: new fetch under timeout and cancellation (miss)
///
/// A fetch runs in its own task, so a caller dropping its future does not abort the
/// shared fetch for the others. Cancellation through the token does.
pub mod entry;
pub mod metrics;

pub use entry::{jitter_ttl, CacheEntry};
pub use metrics::CacheMetrics;

use crate::config::CacheConfig;
use crate::errors::{FeedError, FeedResult};
use crate::logger::{self, LogTag};
use crate::utils::with_timeout;
use futures::future::{BoxFuture, FutureExt, Shared};
use metrics::CacheCounters;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

type SharedFetch<V> = Shared<BoxFuture<'static, FeedResult<V>>>;

/// Per-call options for `SwrCache::get`
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Freshness window; the cache default applies when unset
    pub ttl: Option<Duration>,
    /// Never serve a stale value
    pub must_fresh: bool,
    /// Fetch timeout; the cache default applies when unset
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
    pub tag: Option<String>,
    /// Return a recently stored error instead of fetching again
    pub allow_negative: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            must_fresh: false,
            timeout: None,
            cancel: None,
            tag: None,
            allow_negative: true,
        }
    }
}

impl FetchOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn fresh_only(mut self) -> Self {
        self.must_fresh = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn without_negative(mut self) -> Self {
        self.allow_negative = false;
        self
    }
}

enum Lookup<V> {
    Fresh(V),
    Stale(V),
    /// Stale value while the last refresh failed recently: serve it, do not refetch
    StaleNegative(V),
    Negative(FeedError),
    Miss,
}

struct CacheInner<V> {
    name: String,
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    inflight: Mutex<HashMap<String, SharedFetch<V>>>,
    /// tag -> keys; always locked after `entries`, never while holding it
    tags: Mutex<HashMap<String, HashSet<String>>>,
    counters: CacheCounters,
}

/// Keyed SWR cache; cloning shares the underlying store
pub struct SwrCache<V> {
    inner: Arc<CacheInner<V>>,
}

impl<V> Clone for SwrCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> SwrCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &str, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                name: name.to_string(),
                config,
                entries: Mutex::new(HashMap::new()),
                inflight: Mutex::new(HashMap::new()),
                tags: Mutex::new(HashMap::new()),
                counters: CacheCounters::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Read `key` through the cache, calling `fetch` only when needed
    pub async fn get<F, Fut>(&self, key: &str, fetch: F, opts: FetchOptions) -> FeedResult<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = FeedResult<V>> + Send + 'static,
    {
        match self.inner.lookup(key, Instant::now(), &opts) {
            Lookup::Fresh(value) => {
                CacheCounters::bump(&self.inner.counters.hits);
                return Ok(value);
            }
            Lookup::Stale(value) => {
                CacheCounters::bump(&self.inner.counters.stale_served);
                self.revalidate(key, fetch, &opts);
                return Ok(value);
            }
            Lookup::StaleNegative(value) => {
                CacheCounters::bump(&self.inner.counters.stale_served);
                CacheCounters::bump(&self.inner.counters.negative_hits);
                return Ok(value);
            }
            Lookup::Negative(err) => {
                CacheCounters::bump(&self.inner.counters.negative_hits);
                return Err(err);
            }
            Lookup::Miss => {}
        }

        let shared = {
            let mut inflight = self.inner.inflight.lock();
            if let Some(existing) = inflight.get(key).cloned() {
                CacheCounters::bump(&self.inner.counters.hits);
                existing
            } else {
                CacheCounters::bump(&self.inner.counters.misses);
                let started = self.spawn_fetch(key, fetch, &opts);
                inflight.insert(key.to_string(), started.clone());
                started
            }
        };

        shared.await
    }

    /// Fetch `key` bypassing both the stale value and the negative slot.
    /// Still joins a fetch already in flight.
    pub async fn force_revalidate<F, Fut>(
        &self,
        key: &str,
        fetch: F,
        opts: FetchOptions,
    ) -> FeedResult<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = FeedResult<V>> + Send + 'static,
    {
        self.inner.invalidate_value(key);
        self.get(key, fetch, opts.fresh_only().without_negative()).await
    }

    /// Write `value` directly, as if a fetch had just returned it
    pub fn prime(&self, key: &str, value: V, ttl: Option<Duration>, tag: Option<&str>) {
        let ttl = ttl.unwrap_or_else(|| self.inner.config.default_ttl());
        self.inner
            .store_value(key, value, ttl, tag.map(str::to_string));
    }

    /// Current value for `key`, fresh or not, without touching metrics
    pub fn peek(&self, key: &str) -> Option<V> {
        self.inner
            .entries
            .lock()
            .get(key)
            .and_then(|entry| entry.value.clone())
    }

    /// Remove every entry whose key starts with `prefix` (empty prefix clears all)
    pub fn clear(&self, prefix: &str) -> usize {
        let removed: Vec<(String, Option<String>)> = {
            let mut entries = self.inner.entries.lock();
            let keys: Vec<String> = entries
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|k| entries.remove(&k).map(|e| (k, e.tag)))
                .collect()
        };
        let count = removed.len();
        self.inner.unindex(removed);
        if count > 0 {
            logger::debug(
                LogTag::Cache,
                &format!(
                    "[{}] cleared {} entries with prefix '{}'",
                    self.inner.name, count, prefix
                ),
            );
        }
        count
    }

    /// Remove every entry written with `tag`
    pub fn clear_tag(&self, tag: &str) -> usize {
        let keys = match self.inner.tags.lock().remove(tag) {
            Some(keys) => keys,
            None => return 0,
        };
        let mut entries = self.inner.entries.lock();
        keys.iter().filter(|k| entries.remove(*k).is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> CacheMetrics {
        let size = self.inner.entries.lock().len();
        let inflight = self.inner.inflight.lock().len();
        self.inner.counters.snapshot(size, inflight)
    }

    /// Start a background refresh unless one is already running for `key`
    fn revalidate<F, Fut>(&self, key: &str, fetch: F, opts: &FetchOptions)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = FeedResult<V>> + Send + 'static,
    {
        let mut inflight = self.inner.inflight.lock();
        if inflight.contains_key(key) {
            return;
        }
        logger::debug(
            LogTag::Cache,
            &format!("[{}] revalidating stale entry {}", self.inner.name, key),
        );
        let started = self.spawn_fetch(key, fetch, opts);
        inflight.insert(key.to_string(), started);
    }

    /// Spawn the fetch task. Must be called with the in-flight table locked so the
    /// task's own removal cannot run before its insertion.
    fn spawn_fetch<F, Fut>(&self, key: &str, fetch: F, opts: &FetchOptions) -> SharedFetch<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = FeedResult<V>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let key = key.to_string();
        let ttl = opts.ttl.unwrap_or_else(|| inner.config.default_ttl());
        let timeout = opts.timeout.unwrap_or_else(|| inner.config.fetch_timeout());
        let cancel = opts.cancel.clone();
        let tag = opts.tag.clone();

        let handle = tokio::spawn(async move {
            let result = with_timeout(fetch(), timeout, cancel.as_ref()).await;
            match &result {
                Ok(value) => inner.store_value(&key, value.clone(), ttl, tag),
                Err(err) => inner.store_error(&key, err),
            }
            inner.inflight.lock().remove(&key);
            result
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(FeedError::Network(format!(
                    "cache fetch task failed: {}",
                    join_err
                ))),
            }
        }
        .boxed()
        .shared()
    }
}

impl<V: Clone> CacheInner<V> {
    fn lookup(&self, key: &str, now: Instant, opts: &FetchOptions) -> Lookup<V> {
        let entries = self.entries.lock();
        let entry = match entries.get(key) {
            Some(entry) => entry,
            None => return Lookup::Miss,
        };

        if let Some(value) = &entry.value {
            if entry.is_fresh(now) {
                return Lookup::Fresh(value.clone());
            }
        }

        let live_error = if opts.allow_negative {
            entry.live_error(now, self.config.error_ttl())
        } else {
            None
        };

        if let Some(value) = entry.value.as_ref().filter(|_| !opts.must_fresh) {
            return match live_error {
                Some(_) => Lookup::StaleNegative(value.clone()),
                None => Lookup::Stale(value.clone()),
            };
        }

        if let Some(err) = live_error {
            return Lookup::Negative(err.clone());
        }

        Lookup::Miss
    }

    fn store_value(&self, key: &str, value: V, ttl: Duration, tag: Option<String>) {
        let now = Instant::now();
        let ttl = jitter_ttl(ttl, self.config.jitter_pct);
        let (tag, previous_tag) = {
            let mut entries = self.entries.lock();
            let previous_tag = entries.get(key).and_then(|e| e.tag.clone());
            let tag = tag.or_else(|| previous_tag.clone());
            entries.insert(
                key.to_string(),
                CacheEntry::with_value(value, now, ttl, tag.clone()),
            );
            (tag, previous_tag)
        };

        if tag != previous_tag {
            let mut tags = self.tags.lock();
            if let Some(old) = &previous_tag {
                if let Some(keys) = tags.get_mut(old) {
                    keys.remove(key);
                }
            }
            if let Some(new) = &tag {
                tags.entry(new.clone()).or_default().insert(key.to_string());
            }
        }

        self.evict_if_needed();
    }

    fn store_error(&self, key: &str, err: &FeedError) {
        CacheCounters::bump(&self.counters.errors);
        logger::debug(
            LogTag::Cache,
            &format!("[{}] fetch failed for {}: {}", self.name, key, err),
        );

        // A cancelled fetch says nothing about the upstream
        if err.is_cancelled() {
            return;
        }

        let now = Instant::now();
        {
            let mut entries = self.entries.lock();
            match entries.get_mut(key) {
                Some(entry) => {
                    entry.error = Some(err.clone());
                    entry.error_at = Some(now);
                }
                None => {
                    entries.insert(key.to_string(), CacheEntry::with_error(err.clone(), now));
                }
            }
        }
        self.evict_if_needed();
    }

    fn invalidate_value(&self, key: &str) {
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.written_at = None;
            entry.ttl = Duration::ZERO;
        }
    }

    /// Drop the oldest `ceil(len * evict_fraction)` entries once over the ceiling
    fn evict_if_needed(&self) {
        let victims: Vec<(String, Option<String>)> = {
            let mut entries = self.entries.lock();
            if entries.len() <= self.config.max_entries {
                return;
            }
            let drop_count = ((entries.len() as f64) * self.config.evict_fraction)
                .ceil()
                .max(1.0) as usize;

            let mut by_age: Vec<(Option<Instant>, String)> = entries
                .iter()
                .map(|(k, e)| (e.age_key(), k.clone()))
                .collect();
            by_age.sort();

            by_age
                .into_iter()
                .take(drop_count)
                .filter_map(|(_, key)| entries.remove(&key).map(|e| (key, e.tag)))
                .collect()
        };

        CacheCounters::add(&self.counters.evicted, victims.len() as u64);
        logger::debug(
            LogTag::Cache,
            &format!("[{}] evicted {} oldest entries", self.name, victims.len()),
        );
        self.unindex(victims);
    }

    fn unindex(&self, removed: Vec<(String, Option<String>)>) {
        let mut tags = self.tags.lock();
        for (key, tag) in removed {
            if let Some(tag) = tag {
                if let Some(keys) = tags.get_mut(&tag) {
                    keys.remove(&key);
                    if keys.is_empty() {
                        tags.remove(&tag);
                    }
                }
            }
        }
    }
}
