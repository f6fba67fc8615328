/// Feed context - the one object an application builds at startup
///
/// Owns the health registry, the caches, the API clients and the provider set, and
/// hands them by reference to the aggregator, the streaming controller and the
/// collectors. Separate contexts share nothing, which keeps tests isolated.
use crate::aggregator::{collect, CollectOptions};
use crate::apis::{ApiManager, ApiStatsReport};
use crate::cache::{CacheMetrics, SwrCache};
use crate::config::Config;
use crate::errors::{FeedError, FeedResult};
use crate::feeds::{self, FeedsOptions, InstantOptions};
use crate::health::{HealthRegistry, HealthSnapshot};
use crate::logger::{self, LogTag};
use crate::lookup;
use crate::providers::{
    build_search_providers, GeckoSeedProvider, Provider, ProviderCaches, SeedProvider,
};
use crate::streaming::{SearchStream, StreamOptions};
use crate::tokens::{TokenDetails, TokenRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct FeedContext {
    config: Config,
    health: Arc<HealthRegistry>,
    api: Arc<ApiManager>,
    caches: ProviderCaches,
    providers: Vec<Arc<dyn Provider>>,
    seeds: Vec<Arc<dyn SeedProvider>>,
}

impl FeedContext {
    pub fn new(config: Config) -> FeedResult<Self> {
        config.validate().map_err(FeedError::Config)?;

        let health = Arc::new(HealthRegistry::new(config.health.clone()));
        let api = Arc::new(ApiManager::new(&config.providers)?);
        let caches = ProviderCaches {
            records: SwrCache::new("records", config.cache.clone()),
            jupiter_list: SwrCache::new("jupiter-list", config.cache.clone()),
        };
        let providers = build_search_providers(&api, &health, &caches, &config.providers);

        let mut seeds: Vec<Arc<dyn SeedProvider>> = Vec::new();
        if config.providers.geckoterminal_enabled {
            seeds.push(Arc::new(GeckoSeedProvider::new(
                Arc::clone(&api),
                Arc::clone(&health),
                &config.providers,
            )));
        }

        logger::info(
            LogTag::System,
            &format!(
                "Feed context ready: {} search providers, {} seed providers",
                providers.len(),
                seeds.len()
            ),
        );

        Ok(Self {
            config,
            health,
            api,
            caches,
            providers,
            seeds,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn health(&self) -> &Arc<HealthRegistry> {
        &self.health
    }

    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    /// One-shot search with the configured limit and deadline
    pub async fn search_tokens(
        &self,
        query: &str,
        cancel: CancellationToken,
    ) -> FeedResult<Vec<TokenRecord>> {
        let opts = CollectOptions::from_config(&self.config.aggregator, cancel);
        self.search_tokens_with(query, &opts).await
    }

    pub async fn search_tokens_with(
        &self,
        query: &str,
        opts: &CollectOptions,
    ) -> FeedResult<Vec<TokenRecord>> {
        collect(&self.providers, &self.health, query, opts).await
    }

    /// Stream options filled from the configuration
    pub fn stream_options(&self, cancel: CancellationToken) -> StreamOptions {
        StreamOptions::from_config(
            &self.config.stream,
            self.config.providers.gecko_seed_limit,
            cancel,
        )
    }

    pub fn stream_feeds(&self, opts: StreamOptions) -> FeedResult<SearchStream> {
        SearchStream::new(
            self.providers.clone(),
            self.seeds.clone(),
            Arc::clone(&self.health),
            opts,
        )
    }

    pub fn feeds_options(&self, cancel: CancellationToken) -> FeedsOptions {
        FeedsOptions::from_config(
            &self.config.stream,
            self.config.providers.gecko_seed_limit,
            cancel,
        )
    }

    pub async fn fetch_feeds(&self, opts: &FeedsOptions) -> Vec<TokenRecord> {
        feeds::fetch_feeds(&self.providers, &self.seeds, &self.health, opts).await
    }

    pub async fn collect_instant(&self, opts: &InstantOptions) -> Vec<TokenRecord> {
        feeds::collect_instant(&self.api, opts).await
    }

    pub async fn fetch_token_info(
        &self,
        mint: &str,
        cancel: &CancellationToken,
    ) -> FeedResult<TokenDetails> {
        lookup::fetch_token_info(&self.api, &self.health, mint, cancel).await
    }

    pub fn feed_health(&self) -> BTreeMap<String, HealthSnapshot> {
        self.health.snapshot()
    }

    pub fn cache_metrics(&self) -> BTreeMap<String, CacheMetrics> {
        let mut out = BTreeMap::new();
        out.insert(
            self.caches.records.name().to_string(),
            self.caches.records.metrics(),
        );
        out.insert(
            self.caches.jupiter_list.name().to_string(),
            self.caches.jupiter_list.metrics(),
        );
        out
    }

    pub fn api_stats(&self) -> ApiStatsReport {
        self.api.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_providers_without_birdeye_key() {
        let ctx = FeedContext::new(Config::default()).unwrap();
        let names: Vec<&str> = ctx.providers().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["dexscreener", "jupiter", "solana-rpc"]);
        assert!(ctx.feed_health().is_empty());
        assert_eq!(ctx.cache_metrics().len(), 2);
    }

    #[test]
    fn test_birdeye_joins_with_key_and_disabled_providers_drop() {
        let mut config = Config::default();
        config.providers.birdeye_api_key = Some("key".to_string());
        config.providers.solana_rpc_enabled = false;

        let ctx = FeedContext::new(config).unwrap();
        let names: Vec<&str> = ctx.providers().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["birdeye", "dexscreener", "jupiter"]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.cache.max_entries = 0;
        let err = FeedContext::new(config).err().unwrap();
        assert!(err.is_programming_error());
    }
}
