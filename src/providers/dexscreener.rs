/// DexScreener search adapter
use super::{settle, Provider, SearchOptions};
use crate::apis::dexscreener::{DexPair, DEFAULT_CHAIN_ID};
use crate::apis::ApiManager;
use crate::config::ProvidersConfig;
use crate::health::HealthRegistry;
use crate::tokens::normalize::{finite_opt, non_empty};
use crate::tokens::TokenRecord;
use crate::utils::with_timeout;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const NAME: &str = "dexscreener";

pub struct DexScreenerProvider {
    api: Arc<ApiManager>,
    health: Arc<HealthRegistry>,
    base_delay: Duration,
    timeout: Duration,
}

impl DexScreenerProvider {
    pub fn new(api: Arc<ApiManager>, health: Arc<HealthRegistry>, cfg: &ProvidersConfig) -> Self {
        Self {
            api,
            health,
            base_delay: Duration::from_millis(cfg.dexscreener_stagger_ms),
            timeout: cfg.search_timeout(),
        }
    }
}

#[async_trait]
impl Provider for DexScreenerProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn base_delay(&self) -> Duration {
        self.base_delay
    }

    async fn search(&self, query: &str, opts: &SearchOptions) -> Vec<TokenRecord> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let result = with_timeout(
            async {
                let pairs = self.api.dexscreener.search(query, Some(&opts.cancel)).await?;
                Ok(pairs_to_records(&pairs, opts.limit))
            },
            self.timeout,
            Some(&opts.cancel),
        )
        .await;

        settle(&self.health, NAME, result)
    }
}

/// Record for the pair's base token; `None` when the pair carries no base address
pub fn pair_to_record(pair: &DexPair, source: &str) -> Option<TokenRecord> {
    let mint = non_empty(pair.base_token.address.as_deref())?;
    let mut record = TokenRecord::new(mint).with_source(source);
    record.symbol = non_empty(pair.base_token.symbol.as_deref());
    record.name = non_empty(pair.base_token.name.as_deref());
    record.image_url = non_empty(pair.image_url());
    record.price_usd = finite_opt(pair.price_usd);
    record.liquidity = finite_opt(pair.liquidity_usd());
    record.change24h = finite_opt(pair.price_change.h24);
    record.dex_id = non_empty(pair.dex_id.as_deref());
    record.url = non_empty(pair.url.as_deref());
    Some(record)
}

/// Solana pairs only, one record per base mint (the deepest pool wins), in the order
/// mints first appear in the response
pub fn pairs_to_records(pairs: &[DexPair], limit: usize) -> Vec<TokenRecord> {
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, TokenRecord> = HashMap::new();

    for pair in pairs.iter().filter(|p| p.is_chain(DEFAULT_CHAIN_ID)) {
        let Some(record) = pair_to_record(pair, NAME) else {
            continue;
        };
        match best.get(&record.mint) {
            Some(current) if current.liquidity.unwrap_or(0.0) >= record.liquidity.unwrap_or(0.0) => {}
            Some(_) => {
                best.insert(record.mint.clone(), record);
            }
            None => {
                order.push(record.mint.clone());
                best.insert(record.mint.clone(), record);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|mint| best.remove(&mint))
        .take(limit)
        .collect()
}
