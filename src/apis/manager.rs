/// API manager - one instance of every upstream client, sharing one connection pool
///
/// Each client keeps its own rate limiter and stats. Built once by `FeedContext` from the
/// provider configuration and shared by reference.
use crate::config::ProvidersConfig;
use crate::errors::FeedResult;
use crate::logger::{self, LogTag};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use super::birdeye::BirdeyeClient;
use super::client::{ApiStats, HttpClient};
use super::dexscreener::DexScreenerClient;
use super::geckoterminal::GeckoTerminalClient;
use super::jupiter::JupiterClient;
use super::solana_rpc::SolanaRpcClient;

pub struct ApiManager {
    pub dexscreener: DexScreenerClient,
    pub geckoterminal: GeckoTerminalClient,
    pub birdeye: BirdeyeClient,
    pub jupiter: JupiterClient,
    pub solana_rpc: SolanaRpcClient,
}

/// Per-client request stats keyed by upstream name
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiStatsReport(pub BTreeMap<&'static str, ApiStats>);

impl ApiManager {
    pub fn new(cfg: &ProvidersConfig) -> FeedResult<Self> {
        let client = HttpClient::build_reqwest()?;
        let rate = cfg.rate_limit_per_minute;

        logger::info(
            LogTag::Api,
            &format!(
                "Initializing API clients (rate limit {}/min per upstream, birdeye {})",
                rate,
                if cfg.birdeye_api_key.is_some() {
                    "enabled"
                } else {
                    "disabled"
                }
            ),
        );

        Ok(Self {
            dexscreener: DexScreenerClient::new(client.clone(), rate),
            geckoterminal: GeckoTerminalClient::new(client.clone(), rate),
            birdeye: BirdeyeClient::new(client.clone(), cfg.birdeye_api_key.clone(), rate),
            jupiter: JupiterClient::new(
                client.clone(),
                &cfg.jupiter_list_url,
                Duration::from_millis(cfg.jupiter_list_timeout_ms),
                rate,
            ),
            solana_rpc: SolanaRpcClient::new(client, &cfg.solana_rpc_url, rate),
        })
    }

    pub fn stats(&self) -> ApiStatsReport {
        let mut report = BTreeMap::new();
        report.insert("dexscreener", self.dexscreener.stats());
        report.insert("geckoterminal", self.geckoterminal.stats());
        report.insert("birdeye", self.birdeye.stats());
        report.insert("jupiter", self.jupiter.stats());
        report.insert("solana-rpc", self.solana_rpc.stats());
        ApiStatsReport(report)
    }
}
