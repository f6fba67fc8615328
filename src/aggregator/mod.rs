//! Single-query fan-out over every search provider
//!
//! Providers are started together, each after its own stagger (base delay plus the
//! health penalty of a degraded provider). Results are merged by mint as they land.
//! Collection stops at the deadline, once `limit` unique records are in, when every
//! provider is done, or on cancellation, whichever comes first. Provider calls run as
//! detached tasks, so a call still running at that point is abandoned rather than
//! dropped: it ends under its own timeout and still reports its outcome to health.

use crate::config::AggregatorConfig;
use crate::errors::{FeedError, FeedResult};
use crate::health::HealthRegistry;
use crate::logger::{self, LogTag};
use crate::providers::{Provider, SearchOptions};
use crate::tokens::{rank, TokenRecord};
use crate::utils::sleep_or_cancel;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Options of one `collect` call
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub limit: usize,
    pub deadline: Duration,
    pub cancel: CancellationToken,
    /// Replaces a provider's configured base delay (the health penalty still applies)
    pub stagger_overrides: HashMap<String, Duration>,
}

impl CollectOptions {
    pub fn new(limit: usize, deadline: Duration, cancel: CancellationToken) -> Self {
        Self {
            limit,
            deadline,
            cancel,
            stagger_overrides: HashMap::new(),
        }
    }

    pub fn from_config(cfg: &AggregatorConfig, cancel: CancellationToken) -> Self {
        Self::new(cfg.limit, cfg.deadline(), cancel)
    }

    pub fn with_stagger(mut self, provider: &str, delay: Duration) -> Self {
        self.stagger_overrides.insert(provider.to_string(), delay);
        self
    }

    fn stagger_for(&self, provider: &dyn Provider, health: &HealthRegistry) -> Duration {
        let base = self
            .stagger_overrides
            .get(provider.name())
            .copied()
            .unwrap_or_else(|| provider.base_delay());
        base + health.extra_delay(provider.name())
    }
}

/// Fan `query` out to `providers` and return the ranked, deduplicated union.
///
/// Never fails for upstream reasons; an empty result is a valid outcome. Only a zero
/// `limit` is rejected.
pub async fn collect(
    providers: &[Arc<dyn Provider>],
    health: &HealthRegistry,
    query: &str,
    opts: &CollectOptions,
) -> FeedResult<Vec<TokenRecord>> {
    if opts.limit == 0 {
        return Err(FeedError::InvalidArgument(
            "collect limit must be greater than zero".to_string(),
        ));
    }

    let started = Instant::now();
    let search_opts = SearchOptions::new(opts.cancel.clone(), opts.limit);

    // Detached: a call cut off by the deadline still settles its health report
    let mut pending: FuturesUnordered<JoinHandle<(String, Vec<TokenRecord>)>> = providers
        .iter()
        .map(|provider| {
            let provider = Arc::clone(provider);
            let delay = opts.stagger_for(provider.as_ref(), health);
            let query = query.to_string();
            let search_opts = search_opts.clone();
            tokio::spawn(async move {
                let name = provider.name().to_string();
                if !sleep_or_cancel(delay, &search_opts.cancel).await {
                    return (name, Vec::new());
                }
                let records = provider.search(&query, &search_opts).await;
                (name, records)
            })
        })
        .collect();

    let mut seen: HashMap<String, TokenRecord> = HashMap::new();
    let deadline = tokio::time::sleep_until(started + opts.deadline);
    tokio::pin!(deadline);

    let mut completed = 0usize;
    let mut stop_reason = "all providers done";
    while seen.len() < opts.limit {
        tokio::select! {
            biased;
            _ = opts.cancel.cancelled() => {
                stop_reason = "cancelled";
                break;
            }
            _ = &mut deadline => {
                stop_reason = "deadline";
                break;
            }
            next = pending.next() => match next {
                Some(Ok((name, records))) => {
                    completed += 1;
                    absorb_all(&mut seen, &name, records);
                }
                Some(Err(join_err)) => {
                    completed += 1;
                    logger::warning(
                        LogTag::Aggregator,
                        &format!("provider task failed for '{}': {}", query, join_err),
                    );
                }
                None => break,
            }
        }
    }
    if seen.len() >= opts.limit {
        stop_reason = "limit reached";
    }

    logger::debug(
        LogTag::Aggregator,
        &format!(
            "query='{}' providers={}/{} unique={} stop={} elapsed={}ms",
            query,
            completed,
            providers.len(),
            seen.len(),
            stop_reason,
            started.elapsed().as_millis()
        ),
    );

    Ok(rank(seen.into_values(), query, opts.limit))
}

fn absorb_all(seen: &mut HashMap<String, TokenRecord>, provider: &str, records: Vec<TokenRecord>) {
    for record in records {
        if record.mint.trim().is_empty() {
            continue;
        }
        let record = record.with_source(provider);
        match seen.get_mut(&record.mint) {
            Some(existing) => existing.absorb(record),
            None => {
                seen.insert(record.mint.clone(), record);
            }
        }
    }
}
