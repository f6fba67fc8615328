/// Birdeye search adapter, cached for a short window per query
use super::{settle, Provider, SearchOptions};
use crate::apis::birdeye::BirdeyeToken;
use crate::apis::ApiManager;
use crate::cache::{FetchOptions, SwrCache};
use crate::config::ProvidersConfig;
use crate::errors::FeedError;
use crate::health::HealthRegistry;
use crate::tokens::normalize::{finite_opt, non_empty};
use crate::tokens::TokenRecord;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const NAME: &str = "birdeye";

pub struct BirdeyeProvider {
    api: Arc<ApiManager>,
    health: Arc<HealthRegistry>,
    cache: SwrCache<Vec<TokenRecord>>,
    base_delay: Duration,
    ttl: Duration,
    timeout: Duration,
}

impl BirdeyeProvider {
    pub fn new(
        api: Arc<ApiManager>,
        health: Arc<HealthRegistry>,
        cache: SwrCache<Vec<TokenRecord>>,
        cfg: &ProvidersConfig,
    ) -> Self {
        Self {
            api,
            health,
            cache,
            base_delay: Duration::from_millis(cfg.birdeye_stagger_ms),
            ttl: Duration::from_millis(cfg.birdeye_search_ttl_ms),
            timeout: cfg.search_timeout(),
        }
    }
}

pub fn cache_key(query: &str) -> String {
    format!("v1|be:search:{}", query.trim().to_lowercase())
}

#[async_trait]
impl Provider for BirdeyeProvider {
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
        if !self.api.birdeye.has_api_key() {
            return settle(
                &self.health,
                NAME,
                Err(FeedError::unavailable(NAME, "no api key configured")),
            );
        }

        let api = Arc::clone(&self.api);
        let keyword = query.to_string();
        let result = self
            .cache
            .get(
                &cache_key(query),
                move || async move {
                    let hits = api.birdeye.search(&keyword, None).await?;
                    Ok(hits_to_records(&hits))
                },
                FetchOptions::default()
                    .with_ttl(self.ttl)
                    .with_timeout(self.timeout)
                    .with_cancel(opts.cancel.clone())
                    .with_tag(NAME),
            )
            .await
            .map(|mut records| {
                records.truncate(opts.limit);
                records
            });

        settle(&self.health, NAME, result)
    }
}

/// One record per address, first hit wins
pub fn hits_to_records(hits: &[BirdeyeToken]) -> Vec<TokenRecord> {
    let mut records: Vec<TokenRecord> = Vec::with_capacity(hits.len());
    for hit in hits {
        let Some(mint) = non_empty(hit.address.as_deref()) else {
            continue;
        };
        if records.iter().any(|r| r.mint == mint) {
            continue;
        }
        let mut record = TokenRecord::new(mint).with_source(NAME);
        record.symbol = non_empty(hit.symbol.as_deref());
        record.name = non_empty(hit.name.as_deref());
        record.image_url = non_empty(hit.logo_uri.as_deref());
        record.price_usd = finite_opt(hit.price);
        record.liquidity = finite_opt(hit.liquidity);
        record.dex_id = Some(NAME.to_string());
        records.push(record);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::birdeye::search_hits;
    use serde_json::json;

    #[test]
    fn test_grouped_search_payload_maps_to_records() {
        let raw = json!({
            "success": true,
            "data": {
                "items": [
                    {
                        "type": "token",
                        "result": [
                            {
                                "address": "MintWif",
                                "symbol": "WIF",
                                "name": "dogwifhat",
                                "price": 2.31,
                                "liquidity": "15000000",
                                "logo_uri": "https://img/wif.png"
                            },
                            {"address": "MintWif", "symbol": "WIF"},
                            {"symbol": "NOADDR"}
                        ]
                    }
                ]
            }
        });

        let records = hits_to_records(&search_hits(&raw));
        assert_eq!(records.len(), 1);
        let wif = &records[0];
        assert_eq!(wif.mint, "MintWif");
        assert_eq!(wif.price_usd, Some(2.31));
        assert_eq!(wif.liquidity, Some(15_000_000.0));
        assert_eq!(wif.image_url.as_deref(), Some("https://img/wif.png"));
        assert_eq!(wif.dex_id.as_deref(), Some("birdeye"));
        assert!(wif.sources.contains(NAME));
    }

    #[test]
    fn test_cache_key_normalizes_query() {
        assert_eq!(cache_key("  BONK "), "v1|be:search:bonk");
    }
}
