//! Scripted providers for aggregator and stream tests

use super::{Provider, SearchOptions, SeedProvider};
use crate::tokens::TokenRecord;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Returns fixed records after a fixed latency, tracking concurrency
pub struct FakeProvider {
    pub name: String,
    pub base_delay: Duration,
    pub latency: Duration,
    pub records: Vec<TokenRecord>,
    pub calls: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub queries: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new(name: &str, latency: Duration, records: Vec<TokenRecord>) -> Arc<Self> {
        Self::delayed(name, Duration::ZERO, latency, records)
    }

    pub fn delayed(
        name: &str,
        base_delay: Duration,
        latency: Duration,
        records: Vec<TokenRecord>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            base_delay,
            latency,
            records,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_delay(&self) -> Duration {
        self.base_delay
    }

    async fn search(&self, query: &str, opts: &SearchOptions) -> Vec<TokenRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(query.to_string());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let finished = crate::utils::sleep_or_cancel(self.latency, &opts.cancel).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        if !finished {
            return Vec::new();
        }

        self.records
            .iter()
            .take(opts.limit)
            .cloned()
            .map(|r| r.with_source(&self.name))
            .collect()
    }
}

/// Seeds a fixed list
pub struct FakeSeed {
    pub records: Vec<TokenRecord>,
}

#[async_trait]
impl SeedProvider for FakeSeed {
    fn name(&self) -> &str {
        "fake-seed"
    }

    async fn seeds(&self, opts: &SearchOptions) -> Vec<TokenRecord> {
        self.records.iter().take(opts.limit).cloned().collect()
    }
}

pub fn record(mint: &str, symbol: &str, liquidity: Option<f64>) -> TokenRecord {
    let mut r = TokenRecord::new(mint);
    r.symbol = Some(symbol.to_string());
    r.liquidity = liquidity;
    r
}
