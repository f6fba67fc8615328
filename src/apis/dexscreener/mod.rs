/// DexScreener API client
///
/// API Documentation: https://docs.dexscreener.com/api/reference
///
/// Endpoints used:
/// 1. /latest/dex/search?q={query} - search pairs (retried with backoff)
/// 2. /latest/dex/tokens/{tokenAddress} - all pairs of a token (detail lookup)
/// 3. /token-pairs/v1/{chainId}/{tokenAddress} - pools of a token (quote pools)
/// 4. /tokens/v1/{chainId}/{tokenAddresses} - best pair for up to 30 tokens
/// 5. /token-boosts/latest/v1 and /token-boosts/top/v1 - boosted tokens
pub mod types;

pub use self::types::{DexPair, PairToken, PairsResponse, TokenBoost};

use crate::apis::client::{ApiStats, HttpClient, RetryPolicy};
use crate::errors::{FeedError, FeedResult};
use crate::logger::{self, LogTag};
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEXSCREENER_BASE_URL: &str = "https://api.dexscreener.com";

/// Default chain for Solana operations
pub const DEFAULT_CHAIN_ID: &str = "solana";

/// Maximum tokens per batch request
pub const MAX_TOKENS_PER_REQUEST: usize = 30;

/// Request timeout - DexScreener is fast, 10s is sufficient
pub const TIMEOUT: Duration = Duration::from_secs(10);

const MAX_RETRIES: u32 = 4;
const BASE_BACKOFF: Duration = Duration::from_millis(600);

pub struct DexScreenerClient {
    http: HttpClient,
    base_url: String,
    retry: RetryPolicy,
}

impl DexScreenerClient {
    pub fn new(client: Client, max_per_minute: usize) -> Self {
        Self::with_base_url(client, max_per_minute, DEXSCREENER_BASE_URL)
    }

    pub fn with_base_url(client: Client, max_per_minute: usize, base_url: &str) -> Self {
        Self {
            http: HttpClient::new(client, "dexscreener", TIMEOUT, max_per_minute),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::new(MAX_RETRIES, BASE_BACKOFF),
        }
    }

    pub fn stats(&self) -> ApiStats {
        self.http.stats()
    }

    /// Search pairs by free text (token name, symbol, address)
    pub async fn search(
        &self,
        query: &str,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<Vec<DexPair>> {
        if query.trim().is_empty() {
            return Err(FeedError::InvalidArgument(
                "Query cannot be empty".to_string(),
            ));
        }

        let endpoint = "latest/dex/search";
        let url = format!("{}/{}", self.base_url, endpoint);

        logger::debug(
            LogTag::Api,
            &format!("[DEXSCREENER] Searching pairs: query={}", query),
        );

        let data: PairsResponse = self
            .http
            .get_json_retrying(
                endpoint,
                || self.http.client().get(&url).query(&[("q", query)]),
                self.retry,
                cancel,
            )
            .await?;

        Ok(data.pairs.unwrap_or_default())
    }

    /// All pairs of one token across chains, for the detail view
    pub async fn token_lookup(
        &self,
        mint: &str,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<Vec<DexPair>> {
        let endpoint = format!("latest/dex/tokens/{}", mint);
        let url = format!("{}/{}", self.base_url, endpoint);

        logger::debug(
            LogTag::Api,
            &format!("[DEXSCREENER] Fetching token lookup: token={}", mint),
        );

        let data: PairsResponse = self
            .http
            .get_json_retrying(
                &endpoint,
                || self.http.client().get(&url),
                self.retry,
                cancel,
            )
            .await?;

        Ok(data.pairs.unwrap_or_default())
    }

    /// Pools of a single token on `chain_id` (defaults to solana)
    pub async fn token_pairs(
        &self,
        token_address: &str,
        chain_id: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<Vec<DexPair>> {
        let chain = chain_id.unwrap_or(DEFAULT_CHAIN_ID);
        let endpoint = format!("token-pairs/v1/{}/{}", chain, token_address);
        let url = format!("{}/{}", self.base_url, endpoint);

        logger::debug(
            LogTag::Api,
            &format!(
                "[DEXSCREENER] Fetching token pools: token={}, chain={}",
                token_address, chain
            ),
        );

        self.http
            .get_json(&endpoint, self.http.client().get(&url), cancel)
            .await
    }

    /// Best pair for each of up to 30 tokens in one call
    pub async fn tokens_batch(
        &self,
        addresses: &[String],
        chain_id: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<Vec<DexPair>> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        if addresses.len() > MAX_TOKENS_PER_REQUEST {
            return Err(FeedError::InvalidArgument(format!(
                "Too many addresses: {} (max {})",
                addresses.len(),
                MAX_TOKENS_PER_REQUEST
            )));
        }

        let chain = chain_id.unwrap_or(DEFAULT_CHAIN_ID);
        let endpoint = format!("tokens/v1/{}/{}", chain, addresses.join(","));
        let url = format!("{}/{}", self.base_url, endpoint);

        logger::debug(
            LogTag::Api,
            &format!(
                "[DEXSCREENER] Fetching batch tokens: {} addresses, chain={}",
                addresses.len(),
                chain
            ),
        );

        self.http
            .get_json(&endpoint, self.http.client().get(&url), cancel)
            .await
    }

    /// Latest boosted tokens (newest promotions)
    pub async fn latest_boosts(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<Vec<TokenBoost>> {
        let endpoint = "token-boosts/latest/v1";
        let url = format!("{}/{}", self.base_url, endpoint);

        logger::debug(LogTag::Api, "[DEXSCREENER] Fetching latest boosted tokens");

        self.http
            .get_json(endpoint, self.http.client().get(&url), cancel)
            .await
    }

    /// Top boosted tokens (most promoted)
    pub async fn top_boosts(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<Vec<TokenBoost>> {
        let endpoint = "token-boosts/top/v1";
        let url = format!("{}/{}", self.base_url, endpoint);

        logger::debug(LogTag::Api, "[DEXSCREENER] Fetching top boosted tokens");

        self.http
            .get_json(endpoint, self.http.client().get(&url), cancel)
            .await
    }
}
