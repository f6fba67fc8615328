/// Solana RPC adapter - confirms that a mint-shaped query is a real token mint
use super::{settle, Provider, SearchOptions};
use crate::apis::ApiManager;
use crate::config::ProvidersConfig;
use crate::health::HealthRegistry;
use crate::tokens::normalize::looks_like_mint;
use crate::tokens::TokenRecord;
use crate::utils::with_timeout;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const NAME: &str = "solana-rpc";

pub struct SolanaRpcProvider {
    api: Arc<ApiManager>,
    health: Arc<HealthRegistry>,
    base_delay: Duration,
    timeout: Duration,
}

impl SolanaRpcProvider {
    pub fn new(api: Arc<ApiManager>, health: Arc<HealthRegistry>, cfg: &ProvidersConfig) -> Self {
        Self {
            api,
            health,
            base_delay: Duration::from_millis(cfg.solana_rpc_stagger_ms),
            timeout: cfg.search_timeout(),
        }
    }
}

#[async_trait]
impl Provider for SolanaRpcProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn base_delay(&self) -> Duration {
        self.base_delay
    }

    async fn search(&self, query: &str, opts: &SearchOptions) -> Vec<TokenRecord> {
        let query = query.trim();
        // Free text is not an error, just nothing this provider can answer
        if !looks_like_mint(query) || opts.limit == 0 {
            return Vec::new();
        }

        let result = with_timeout(
            async {
                let is_mint = self
                    .api
                    .solana_rpc
                    .is_mint_account(query, Some(&opts.cancel))
                    .await?;
                Ok(mint_record(query, is_mint).into_iter().collect())
            },
            self.timeout,
            Some(&opts.cancel),
        )
        .await;

        settle(&self.health, NAME, result)
    }
}

/// Identity-only record for a confirmed mint account
pub fn mint_record(address: &str, is_mint: bool) -> Option<TokenRecord> {
    if !is_mint {
        return None;
    }
    let mut record = TokenRecord::new(address).with_source(NAME);
    record.dex_id = Some("solana".to_string());
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_record() {
        let record = mint_record("So11111111111111111111111111111111111111112", true).unwrap();
        assert_eq!(record.dex_id.as_deref(), Some("solana"));
        assert!(record.sources.contains(NAME));
        assert!(record.symbol.is_none());

        assert!(mint_record("So11111111111111111111111111111111111111112", false).is_none());
    }
}
