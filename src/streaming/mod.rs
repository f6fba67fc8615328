//! Multi-term incremental search
//!
//! A `SearchStream` walks a window of query terms, running one aggregation per term
//! with at most `max_concurrent` outstanding, launches spaced by `spacing`, and a total
//! request budget. Each completed term yields a `SearchBatch` holding only records the
//! session has not produced before. An optional seed phase yields one batch per seed
//! provider before any term runs.
//!
//! The stream ends cleanly when the terms are used up, when the budget is spent and the
//! terms already dispatched have been drained, or when the cancel token fires.

use crate::aggregator::{collect, CollectOptions};
use crate::config::StreamConfig;
use crate::errors::{FeedError, FeedResult};
use crate::health::HealthRegistry;
use crate::logger::{self, LogTag};
use crate::providers::{Provider, SearchOptions, SeedProvider};
use crate::tokens::{SearchBatch, TokenRecord};
use crate::utils::sleep_or_cancel;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, Stream, StreamExt};
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Source label of term batches
pub const TERM_SOURCE: &str = "multi";
/// Term label of seed batches
pub const SEED_TERM: &str = "(seed)";

#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Full term list; the session uses a window of it
    pub terms: Vec<String>,
    pub window_size: usize,
    pub window_offset: usize,
    /// Term dispatches allowed for the session (at least one is always made)
    pub budget: usize,
    pub max_concurrent: usize,
    /// Minimum gap between two successive term launches
    pub spacing: Duration,
    pub limit_per_query: usize,
    pub deadline: Duration,
    pub include_seeds: bool,
    pub seed_limit: usize,
    pub cancel: CancellationToken,
    pub stagger_overrides: HashMap<String, Duration>,
}

impl StreamOptions {
    /// Terms are `prefix + keyword` for every configured keyword
    pub fn from_config(cfg: &StreamConfig, seed_limit: usize, cancel: CancellationToken) -> Self {
        Self {
            terms: cfg
                .keywords
                .iter()
                .map(|k| format!("{}{}", cfg.prefix, k))
                .collect(),
            window_size: cfg.window_size,
            window_offset: cfg.window_offset,
            budget: cfg.request_budget,
            max_concurrent: cfg.max_concurrent,
            spacing: Duration::from_millis(cfg.spacing_ms),
            limit_per_query: cfg.limit_per_query,
            deadline: Duration::from_millis(cfg.deadline_ms),
            include_seeds: cfg.include_seeds,
            seed_limit,
            cancel,
            stagger_overrides: HashMap::new(),
        }
    }

    fn validate(&self) -> FeedResult<()> {
        if self.max_concurrent == 0 {
            return Err(FeedError::InvalidArgument(
                "max_concurrent must be greater than zero".to_string(),
            ));
        }
        if self.limit_per_query == 0 {
            return Err(FeedError::InvalidArgument(
                "limit_per_query must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// `size` terms starting at `offset % len`, wrapping around, never repeating a term
pub fn window_terms(terms: &[String], size: usize, offset: usize) -> Vec<String> {
    if terms.is_empty() {
        return Vec::new();
    }
    let start = offset % terms.len();
    terms
        .iter()
        .cycle()
        .skip(start)
        .take(size.min(terms.len()))
        .cloned()
        .collect()
}

type TermTask = BoxFuture<'static, (String, Vec<TokenRecord>)>;

/// Lazy, finite, non-restartable sequence of `SearchBatch`es
pub struct SearchStream {
    providers: Arc<Vec<Arc<dyn Provider>>>,
    seeds: Vec<Arc<dyn SeedProvider>>,
    health: Arc<HealthRegistry>,
    opts: StreamOptions,
    terms: Vec<String>,
    cursor: usize,
    budget_left: usize,
    seed_cursor: usize,
    last_launch: Option<Instant>,
    seen: HashSet<String>,
    running: FuturesUnordered<TermTask>,
    yielded: usize,
    finished: bool,
}

impl SearchStream {
    pub fn new(
        providers: Vec<Arc<dyn Provider>>,
        seeds: Vec<Arc<dyn SeedProvider>>,
        health: Arc<HealthRegistry>,
        opts: StreamOptions,
    ) -> FeedResult<Self> {
        opts.validate()?;
        let terms = window_terms(&opts.terms, opts.window_size, opts.window_offset);
        let seeds = if opts.include_seeds { seeds } else { Vec::new() };

        logger::debug(
            LogTag::Stream,
            &format!(
                "Stream start: {} terms, budget {}, concurrency {}, seeds {}",
                terms.len(),
                opts.budget.max(1),
                opts.max_concurrent,
                seeds.len()
            ),
        );

        Ok(Self {
            providers: Arc::new(providers),
            seeds,
            health,
            budget_left: opts.budget.max(1),
            opts,
            terms,
            cursor: 0,
            seed_cursor: 0,
            last_launch: None,
            seen: HashSet::new(),
            running: FuturesUnordered::new(),
            yielded: 0,
            finished: false,
        })
    }

    /// Terms this session will walk (after windowing)
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn budget_left(&self) -> usize {
        self.budget_left
    }

    /// Next batch, or `None` once the session is over
    pub async fn next(&mut self) -> Option<SearchBatch> {
        if self.finished {
            return None;
        }
        if self.opts.cancel.is_cancelled() {
            self.finish("cancelled");
            return None;
        }

        if let Some(seed) = self.seeds.get(self.seed_cursor).cloned() {
            self.seed_cursor += 1;
            let opts = SearchOptions::new(self.opts.cancel.clone(), self.opts.seed_limit);
            let records = seed.seeds(&opts).await;
            if self.opts.cancel.is_cancelled() {
                self.finish("cancelled");
                return None;
            }
            return Some(self.batch(seed.name(), SEED_TERM, records));
        }

        loop {
            self.dispatch();
            if self.running.is_empty() {
                self.finish("exhausted");
                return None;
            }

            let cancel = self.opts.cancel.clone();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.finish("cancelled");
                    return None;
                }
                done = self.running.next() => {
                    if let Some((term, records)) = done {
                        return Some(self.batch(TERM_SOURCE, &term, records));
                    }
                }
            }
        }
    }

    /// Consume into a `futures::Stream`
    pub fn into_stream(self) -> impl Stream<Item = SearchBatch> + Send {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next().await.map(|batch| (batch, stream))
        })
    }

    /// Launch terms while there is room under the concurrency cap and budget left
    fn dispatch(&mut self) {
        while self.running.len() < self.opts.max_concurrent
            && self.cursor < self.terms.len()
            && self.budget_left > 0
        {
            let term = self.terms[self.cursor].clone();
            self.cursor += 1;
            self.budget_left -= 1;

            let now = Instant::now();
            let launch_at = match self.last_launch {
                Some(last) => (last + self.opts.spacing).max(now),
                None => now,
            };
            self.last_launch = Some(launch_at);

            self.running.push(self.term_task(term, launch_at));
        }
    }

    fn term_task(&self, term: String, launch_at: Instant) -> TermTask {
        let providers = Arc::clone(&self.providers);
        let health = Arc::clone(&self.health);
        let mut collect_opts = CollectOptions::new(
            self.opts.limit_per_query,
            self.opts.deadline,
            self.opts.cancel.clone(),
        );
        collect_opts.stagger_overrides = self.opts.stagger_overrides.clone();

        async move {
            let wait = launch_at.saturating_duration_since(Instant::now());
            if !sleep_or_cancel(wait, &collect_opts.cancel).await {
                return (term, Vec::new());
            }
            let records = match collect(&providers, &health, &term, &collect_opts).await {
                Ok(records) => records,
                Err(err) => {
                    logger::warning(LogTag::Stream, &format!("term '{}' failed: {}", term, err));
                    Vec::new()
                }
            };
            (term, records)
        }
        .boxed()
    }

    fn batch(&mut self, source: &str, term: &str, records: Vec<TokenRecord>) -> SearchBatch {
        let new_items: Vec<TokenRecord> = records
            .into_iter()
            .filter(|r| !r.mint.is_empty() && self.seen.insert(r.mint.clone()))
            .collect();
        self.yielded += 1;

        logger::debug(
            LogTag::Stream,
            &format!(
                "Batch {} from {} for '{}': {} new (seen {})",
                self.yielded,
                source,
                term,
                new_items.len(),
                self.seen.len()
            ),
        );

        SearchBatch {
            source: source.to_string(),
            term: term.to_string(),
            new_items,
        }
    }

    fn finish(&mut self, reason: &str) {
        if self.finished {
            return;
        }
        self.finished = true;
        // Dropping the futures aborts their requests and timers
        self.running = FuturesUnordered::new();
        logger::debug(
            LogTag::Stream,
            &format!(
                "Stream finished ({}): {} batches, {} unique records, budget left {}",
                reason,
                self.yielded,
                self.seen.len(),
                self.budget_left
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealthConfig;
    use crate::providers::testing::{record, FakeProvider, FakeSeed};

    fn options(terms: &[&str], budget: usize, max_concurrent: usize) -> StreamOptions {
        StreamOptions {
            terms: terms.iter().map(|t| t.to_string()).collect(),
            window_size: 40,
            window_offset: 0,
            budget,
            max_concurrent,
            spacing: Duration::from_millis(150),
            limit_per_query: 8,
            deadline: Duration::from_millis(850),
            include_seeds: false,
            seed_limit: 120,
            cancel: CancellationToken::new(),
            stagger_overrides: HashMap::new(),
        }
    }

    fn health() -> Arc<HealthRegistry> {
        Arc::new(HealthRegistry::new(HealthConfig::default()))
    }

    #[test]
    fn test_window_terms_wraps_without_repeats() {
        let terms: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(window_terms(&terms, 3, 2), vec!["c", "d", "a"]);
        assert_eq!(window_terms(&terms, 10, 5), vec!["b", "c", "d", "a"]);
        assert!(window_terms(&[], 3, 0).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_caps_batches_and_concurrency() {
        let provider = FakeProvider::new(
            "fake",
            Duration::from_millis(400),
            vec![record("A", "AAA", None)],
        );
        let providers: Vec<Arc<dyn Provider>> = vec![provider.clone()];
        let opts = options(&["t1", "t2", "t3", "t4", "t5"], 3, 2);

        let stream = SearchStream::new(providers, Vec::new(), health(), opts).unwrap();
        let batches: Vec<SearchBatch> = stream.into_stream().collect().await;

        assert_eq!(batches.len(), 3);
        assert_eq!(provider.calls(), 3);
        assert!(provider.max_active() <= 2);
        assert!(batches.iter().all(|b| b.source == TERM_SOURCE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_never_repeat_across_terms() {
        let provider = FakeProvider::new(
            "fake",
            Duration::from_millis(10),
            vec![record("A", "AAA", None), record("B", "BBB", None)],
        );
        let providers: Vec<Arc<dyn Provider>> = vec![provider];
        let opts = options(&["t1", "t2", "t3"], 60, 1);

        let mut stream = SearchStream::new(providers, Vec::new(), health(), opts).unwrap();
        let mut total = 0;
        let mut batches = 0;
        while let Some(batch) = stream.next().await {
            batches += 1;
            total += batch.new_items.len();
        }
        assert_eq!(batches, 3);
        assert_eq!(total, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_launches_are_spaced() {
        let provider = FakeProvider::new("fake", Duration::ZERO, Vec::new());
        let providers: Vec<Arc<dyn Provider>> = vec![provider];
        let opts = options(&["t1", "t2", "t3"], 60, 3);

        let started = Instant::now();
        let stream = SearchStream::new(providers, Vec::new(), health(), opts).unwrap();
        let batches: Vec<SearchBatch> = stream.into_stream().collect().await;

        assert_eq!(batches.len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seed_batch_comes_first() {
        let provider = FakeProvider::new(
            "fake",
            Duration::from_millis(10),
            vec![record("S1", "SEED", None), record("N", "NEW", None)],
        );
        let providers: Vec<Arc<dyn Provider>> = vec![provider];
        let seeds: Vec<Arc<dyn SeedProvider>> = vec![Arc::new(FakeSeed {
            records: vec![record("S1", "SEED", None)],
        })];
        let mut opts = options(&["t1"], 60, 2);
        opts.include_seeds = true;

        let mut stream = SearchStream::new(providers, seeds, health(), opts).unwrap();
        let seed = stream.next().await.unwrap();
        assert_eq!(seed.term, SEED_TERM);
        assert_eq!(seed.source, "fake-seed");
        assert_eq!(seed.new_items.len(), 1);

        let term = stream.next().await.unwrap();
        assert_eq!(term.term, "t1");
        assert_eq!(
            term.new_items.iter().map(|r| r.mint.as_str()).collect::<Vec<_>>(),
            vec!["N"]
        );
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_ends_stream() {
        let provider = FakeProvider::new("fake", Duration::from_secs(5), vec![record("A", "A", None)]);
        let providers: Vec<Arc<dyn Provider>> = vec![provider];
        let opts = options(&["t1", "t2"], 60, 2);
        let cancel = opts.cancel.clone();

        let mut stream = SearchStream::new(providers, Vec::new(), health(), opts).unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });

        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let opts = options(&["t1"], 1, 0);
        let err = SearchStream::new(Vec::new(), Vec::new(), health(), opts).err();
        assert!(err.map_or(false, |e| e.is_programming_error()));
    }
}
