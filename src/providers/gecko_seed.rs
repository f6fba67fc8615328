/// GeckoTerminal seed adapter - trending and newly listed Solana tokens
use super::{settle, SearchOptions, SeedProvider};
use crate::apis::geckoterminal::{GeckoPool, GeckoToken, MAX_TOKENS_PER_REQUEST};
use crate::apis::ApiManager;
use crate::config::ProvidersConfig;
use crate::errors::{FeedError, FeedResult};
use crate::health::HealthRegistry;
use crate::logger::{self, LogTag};
use crate::tokens::normalize::{finite_opt, non_empty};
use crate::tokens::TokenRecord;
use crate::utils::with_timeout;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const NAME: &str = "gecko-seed";
pub const TAG_TRENDING: &str = "gecko-trending";
pub const TAG_NEW: &str = "gecko-new";

/// Upper bound on metadata lookups per seed round
const MAX_SEED_TOKENS: usize = 100;

pub struct GeckoSeedProvider {
    api: Arc<ApiManager>,
    health: Arc<HealthRegistry>,
    timeout: Duration,
}

impl GeckoSeedProvider {
    pub fn new(api: Arc<ApiManager>, health: Arc<HealthRegistry>, cfg: &ProvidersConfig) -> Self {
        Self {
            api,
            health,
            timeout: cfg.search_timeout(),
        }
    }

    async fn collect(&self, opts: &SearchOptions) -> FeedResult<Vec<TokenRecord>> {
        let cancel = Some(&opts.cancel);
        let gecko = &self.api.geckoterminal;

        let (trending, fresh) = futures::join!(
            with_timeout(gecko.trending_pools(cancel), self.timeout, cancel),
            with_timeout(gecko.new_pools(cancel), self.timeout, cancel),
        );
        if opts.cancel.is_cancelled() {
            return Err(FeedError::Cancelled);
        }

        let trending = log_partial("trending_pools", trending);
        let fresh = log_partial("new_pools", fresh);
        let tagged = tag_seed_mints(&trending, &fresh, opts.limit.min(MAX_SEED_TOKENS));
        if tagged.is_empty() {
            return Err(FeedError::Parse(
                "trending and new pools yielded no tokens".to_string(),
            ));
        }

        let mints: Vec<String> = tagged.iter().map(|(mint, _)| mint.clone()).collect();
        let mut tokens: Vec<GeckoToken> = Vec::with_capacity(mints.len());
        for chunk in mints.chunks(MAX_TOKENS_PER_REQUEST) {
            let batch = with_timeout(gecko.tokens_multi(chunk, cancel), self.timeout, cancel).await?;
            tokens.extend(batch);
        }

        Ok(seed_records(&tagged, &tokens))
    }
}

fn log_partial(endpoint: &str, result: FeedResult<Vec<GeckoPool>>) -> Vec<GeckoPool> {
    result.unwrap_or_else(|err| {
        logger::debug(
            LogTag::Provider,
            &format!("[GECKO-SEED] {} failed: {}", endpoint, err),
        );
        Vec::new()
    })
}

#[async_trait]
impl SeedProvider for GeckoSeedProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn seeds(&self, opts: &SearchOptions) -> Vec<TokenRecord> {
        if opts.limit == 0 {
            return Vec::new();
        }
        let result = self.collect(opts).await;
        settle(&self.health, NAME, result)
    }
}

/// Base mints of trending pools then new pools, deduplicated, each tagged with the
/// list it first appeared in
pub fn tag_seed_mints(
    trending: &[GeckoPool],
    fresh: &[GeckoPool],
    limit: usize,
) -> Vec<(String, &'static str)> {
    let mut out: Vec<(String, &'static str)> = Vec::new();
    let pools = trending
        .iter()
        .map(|p| (p, TAG_TRENDING))
        .chain(fresh.iter().map(|p| (p, TAG_NEW)));

    for (pool, tag) in pools {
        if out.len() >= limit {
            break;
        }
        if let Some(mint) = pool.base_token_mint() {
            if !out.iter().any(|(m, _)| *m == mint) {
                out.push((mint, tag));
            }
        }
    }
    out
}

/// Join tagged mints with their metadata; mints GeckoTerminal returned nothing for are
/// kept as identity-only records
pub fn seed_records(tagged: &[(String, &'static str)], tokens: &[GeckoToken]) -> Vec<TokenRecord> {
    let by_mint: HashMap<&str, &GeckoToken> = tokens
        .iter()
        .filter_map(|t| t.attributes.address.as_deref().map(|a| (a, t)))
        .collect();

    tagged
        .iter()
        .map(|(mint, tag)| {
            let mut record = TokenRecord::new(mint.clone()).with_source(tag);
            record.dex_id = Some("gecko".to_string());
            if let Some(token) = by_mint.get(mint.as_str()) {
                let a = &token.attributes;
                record.symbol = non_empty(a.symbol.as_deref());
                record.name = non_empty(a.name.as_deref());
                record.image_url = non_empty(a.image_url.as_deref()).filter(|u| u != "missing.png");
                record.price_usd = finite_opt(a.price_usd);
                record.liquidity = finite_opt(a.total_reserve_in_usd);
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::geckoterminal::{PoolsResponse, TokensResponse};
    use serde_json::json;

    fn pools(ids: &[&str]) -> Vec<GeckoPool> {
        let data: Vec<_> = ids
            .iter()
            .map(|mint| {
                json!({
                    "id": format!("solana_pool_{}", mint),
                    "attributes": {"name": format!("{} / SOL", mint)},
                    "relationships": {"base_token": {"data": {"id": format!("solana_{}", mint)}}}
                })
            })
            .collect();
        let resp: PoolsResponse = serde_json::from_value(json!({ "data": data })).unwrap();
        resp.data.unwrap()
    }

    #[test]
    fn test_trending_first_then_new_without_duplicates() {
        let tagged = tag_seed_mints(&pools(&["A", "B"]), &pools(&["B", "C"]), 10);
        assert_eq!(
            tagged,
            vec![
                ("A".to_string(), TAG_TRENDING),
                ("B".to_string(), TAG_TRENDING),
                ("C".to_string(), TAG_NEW),
            ]
        );

        assert_eq!(tag_seed_mints(&pools(&["A", "B"]), &pools(&["C"]), 2).len(), 2);
    }

    #[test]
    fn test_seed_records_join_metadata() {
        let tagged = vec![("A".to_string(), TAG_TRENDING), ("C".to_string(), TAG_NEW)];
        let tokens: TokensResponse = serde_json::from_value(json!({
            "data": [{
                "id": "solana_A",
                "attributes": {
                    "address": "A",
                    "symbol": "AAA",
                    "name": "Alpha",
                    "image_url": "https://img/a.png",
                    "price_usd": "0.5",
                    "total_reserve_in_usd": "12000.5"
                }
            }]
        }))
        .unwrap();

        let records = seed_records(&tagged, &tokens.data.unwrap());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].symbol.as_deref(), Some("AAA"));
        assert_eq!(records[0].price_usd, Some(0.5));
        assert!(records[0].sources.contains(TAG_TRENDING));
        assert_eq!(records[1].mint, "C");
        assert!(records[1].symbol.is_none());
        assert!(records[1].sources.contains(TAG_NEW));
    }
}
