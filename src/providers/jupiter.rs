/// Jupiter adapter - matches queries against the cached strict token list
use super::{settle, Provider, SearchOptions};
use crate::apis::jupiter::JupiterToken;
use crate::apis::ApiManager;
use crate::cache::{FetchOptions, SwrCache};
use crate::config::ProvidersConfig;
use crate::health::HealthRegistry;
use crate::tokens::normalize::non_empty;
use crate::tokens::TokenRecord;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const NAME: &str = "jupiter";

/// The list is large and changes slowly: one key, long TTL
pub const LIST_KEY: &str = "v1|jup:list";

pub struct JupiterProvider {
    api: Arc<ApiManager>,
    health: Arc<HealthRegistry>,
    cache: SwrCache<Arc<Vec<JupiterToken>>>,
    base_delay: Duration,
    ttl: Duration,
    timeout: Duration,
}

impl JupiterProvider {
    pub fn new(
        api: Arc<ApiManager>,
        health: Arc<HealthRegistry>,
        cache: SwrCache<Arc<Vec<JupiterToken>>>,
        cfg: &ProvidersConfig,
    ) -> Self {
        Self {
            api,
            health,
            cache,
            base_delay: Duration::from_millis(cfg.jupiter_stagger_ms),
            ttl: Duration::from_millis(cfg.jupiter_list_ttl_ms),
            timeout: Duration::from_millis(cfg.jupiter_list_timeout_ms),
        }
    }
}

#[async_trait]
impl Provider for JupiterProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn base_delay(&self) -> Duration {
        self.base_delay
    }

    async fn search(&self, query: &str, opts: &SearchOptions) -> Vec<TokenRecord> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let api = Arc::clone(&self.api);
        let result = self
            .cache
            .get(
                LIST_KEY,
                move || async move { Ok(Arc::new(api.jupiter.token_list(None).await?)) },
                FetchOptions::default()
                    .with_ttl(self.ttl)
                    .with_timeout(self.timeout)
                    .with_cancel(opts.cancel.clone())
                    .with_tag(NAME),
            )
            .await
            .map(|list| match_list(&list, query, opts.limit));

        settle(&self.health, NAME, result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchTier {
    Exact,
    Prefix,
    Contains,
}

fn tier(token: &JupiterToken, needle: &str) -> Option<MatchTier> {
    let mint = token.address.as_deref().unwrap_or_default().to_lowercase();
    let sym = token.symbol.as_deref().unwrap_or_default().to_lowercase();
    let name = token.name.as_deref().unwrap_or_default().to_lowercase();

    if mint == needle || sym == needle || name == needle {
        Some(MatchTier::Exact)
    } else if sym.starts_with(needle) || name.starts_with(needle) {
        Some(MatchTier::Prefix)
    } else if mint.contains(needle) || sym.contains(needle) || name.contains(needle) {
        Some(MatchTier::Contains)
    } else {
        None
    }
}

/// Case-insensitive match on mint, symbol and name. Exact matches come first, then
/// prefixes, then substrings; list order is kept within a tier.
pub fn match_list(list: &[JupiterToken], query: &str, limit: usize) -> Vec<TokenRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut hits: Vec<(MatchTier, &JupiterToken)> = list
        .iter()
        .filter_map(|t| tier(t, &needle).map(|tier| (tier, t)))
        .collect();
    hits.sort_by_key(|(tier, _)| *tier);

    hits.into_iter()
        .filter_map(|(_, t)| {
            let mint = non_empty(t.address.as_deref())?;
            let mut record = TokenRecord::new(mint).with_source(NAME);
            record.symbol = non_empty(t.symbol.as_deref());
            record.name = non_empty(t.name.as_deref());
            record.image_url = non_empty(t.logo_uri.as_deref());
            record.dex_id = Some("jup".to_string());
            Some(record)
        })
        .take(limit)
        .collect()
}
