/// Search providers - one adapter per upstream, all producing `TokenRecord`s
///
/// Adapters never fail: upstream errors are reported to the shared `HealthRegistry` and
/// turned into an empty result, so one broken upstream never sinks a whole search.
pub mod birdeye;
pub mod dexscreener;
pub mod gecko_seed;
pub mod jupiter;
pub mod solana_rpc;

#[cfg(test)]
pub(crate) mod testing;

pub use birdeye::BirdeyeProvider;
pub use dexscreener::DexScreenerProvider;
pub use gecko_seed::GeckoSeedProvider;
pub use jupiter::JupiterProvider;
pub use solana_rpc::SolanaRpcProvider;

use crate::apis::jupiter::JupiterToken;
use crate::apis::ApiManager;
use crate::cache::SwrCache;
use crate::config::ProvidersConfig;
use crate::errors::{FeedError, FeedResult};
use crate::health::HealthRegistry;
use crate::logger::{self, LogTag};
use crate::tokens::TokenRecord;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-call options handed to a provider
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub cancel: CancellationToken,
    /// Maximum records the provider should return
    pub limit: usize,
}

impl SearchOptions {
    pub fn new(cancel: CancellationToken, limit: usize) -> Self {
        Self { cancel, limit }
    }
}

/// A free-text token search source
#[async_trait]
pub trait Provider: Send + Sync {
    /// Health registry key and `sources` label
    fn name(&self) -> &str;

    /// Launch delay applied by the aggregator before calling `search`
    fn base_delay(&self) -> Duration;

    /// Search `query`; never fails, an unusable upstream yields an empty list
    async fn search(&self, query: &str, opts: &SearchOptions) -> Vec<TokenRecord>;
}

/// A query-less source of currently interesting tokens (trending, new listings)
#[async_trait]
pub trait SeedProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn seeds(&self, opts: &SearchOptions) -> Vec<TokenRecord>;
}

/// Caches the adapters read through
#[derive(Clone)]
pub struct ProviderCaches {
    /// Birdeye search results, keyed `v1|be:search:{query}`
    pub records: SwrCache<Vec<TokenRecord>>,
    /// Full Jupiter token list, single key `v1|jup:list`
    pub jupiter_list: SwrCache<Arc<Vec<JupiterToken>>>,
}

/// Report an adapter outcome to the health registry and unwrap it.
///
/// Cancellation is the caller's choice and an unavailable provider (missing API key) is
/// configuration, so neither counts against the provider.
pub(crate) fn settle(
    health: &HealthRegistry,
    provider: &str,
    result: FeedResult<Vec<TokenRecord>>,
) -> Vec<TokenRecord> {
    match result {
        Ok(records) => {
            health.on_success(provider);
            records
        }
        Err(FeedError::Cancelled) => Vec::new(),
        Err(FeedError::ProviderUnavailable { reason, .. }) => {
            logger::debug(
                LogTag::Provider,
                &format!("{} skipped: {}", provider, reason),
            );
            Vec::new()
        }
        Err(err) => {
            health.on_failure(provider);
            logger::warning(
                LogTag::Provider,
                &format!("{} search failed: {}", provider, err),
            );
            Vec::new()
        }
    }
}

/// Build the enabled search providers in launch order
pub fn build_search_providers(
    api: &Arc<ApiManager>,
    health: &Arc<HealthRegistry>,
    caches: &ProviderCaches,
    cfg: &ProvidersConfig,
) -> Vec<Arc<dyn Provider>> {
    let mut providers: Vec<Arc<dyn Provider>> = Vec::new();

    if api.birdeye.has_api_key() {
        providers.push(Arc::new(BirdeyeProvider::new(
            Arc::clone(api),
            Arc::clone(health),
            caches.records.clone(),
            cfg,
        )));
    }
    if cfg.dexscreener_enabled {
        providers.push(Arc::new(DexScreenerProvider::new(
            Arc::clone(api),
            Arc::clone(health),
            cfg,
        )));
    }
    if cfg.jupiter_enabled {
        providers.push(Arc::new(JupiterProvider::new(
            Arc::clone(api),
            Arc::clone(health),
            caches.jupiter_list.clone(),
            cfg,
        )));
    }
    if cfg.solana_rpc_enabled {
        providers.push(Arc::new(SolanaRpcProvider::new(
            Arc::clone(api),
            Arc::clone(health),
            cfg,
        )));
    }

    logger::debug(
        LogTag::Provider,
        &format!(
            "Search providers: {}",
            providers
                .iter()
                .map(|p| p.name().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    );

    providers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealthConfig;

    #[test]
    fn test_settle_reports_health() {
        let health = HealthRegistry::new(HealthConfig::default());

        let ok = settle(&health, "a", Ok(vec![TokenRecord::new("M")]));
        assert_eq!(ok.len(), 1);
        assert_eq!(health.state("a").unwrap().ok_count, 1);

        let failed = settle(&health, "a", Err(FeedError::Network("reset".into())));
        assert!(failed.is_empty());
        assert_eq!(health.state("a").unwrap().fail_count, 1);
    }

    #[test]
    fn test_settle_ignores_cancel_and_unavailable() {
        let health = HealthRegistry::new(HealthConfig::default());
        settle(&health, "b", Err(FeedError::Cancelled));
        settle(&health, "b", Err(FeedError::unavailable("b", "no api key")));
        assert!(health
            .state("b")
            .map_or(true, |s| s.fail_count == 0 && s.ok_count == 0));
    }
}
