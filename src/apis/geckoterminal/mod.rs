/// GeckoTerminal API client
///
/// API Documentation: https://www.geckoterminal.com/dex-api
///
/// Endpoints used:
/// 1. /networks/{network}/trending_pools - trending pools (seed feed)
/// 2. /networks/{network}/new_pools - newly listed pools (seed feed)
/// 3. /networks/{network}/tokens/multi/{addresses} - token metadata in bulk
/// 4. /networks/{network}/tokens/{address} - single token (detail fallback)
pub mod types;

pub use self::types::{GeckoPool, GeckoToken, PoolsResponse, TokenResponse, TokensResponse};

use crate::apis::client::{ApiStats, HttpClient};
use crate::errors::{FeedError, FeedResult};
use crate::logger::{self, LogTag};
use reqwest::header::ACCEPT;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const GECKOTERMINAL_BASE_URL: &str = "https://api.geckoterminal.com/api/v2";

/// Pinned API version
const ACCEPT_HEADER: &str = "application/json;version=20230302";

/// Default network for Solana operations
pub const DEFAULT_NETWORK: &str = "solana";

/// Maximum addresses per tokens/multi request
pub const MAX_TOKENS_PER_REQUEST: usize = 30;

/// GeckoTerminal can have latency spikes
pub const TIMEOUT: Duration = Duration::from_secs(8);

pub struct GeckoTerminalClient {
    http: HttpClient,
    base_url: String,
}

impl GeckoTerminalClient {
    pub fn new(client: Client, max_per_minute: usize) -> Self {
        Self::with_base_url(client, max_per_minute, GECKOTERMINAL_BASE_URL)
    }

    pub fn with_base_url(client: Client, max_per_minute: usize, base_url: &str) -> Self {
        Self {
            http: HttpClient::new(client, "geckoterminal", TIMEOUT, max_per_minute),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn stats(&self) -> ApiStats {
        self.http.stats()
    }

    fn get(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, endpoint);
        self.http.client().get(url).header(ACCEPT, ACCEPT_HEADER)
    }

    pub async fn trending_pools(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<Vec<GeckoPool>> {
        let endpoint = format!("networks/{}/trending_pools", DEFAULT_NETWORK);
        logger::debug(LogTag::Api, "[GECKOTERMINAL] Fetching trending pools");

        let resp: PoolsResponse = self
            .http
            .get_json(&endpoint, self.get(&endpoint), cancel)
            .await?;
        Ok(resp.data.unwrap_or_default())
    }

    pub async fn new_pools(&self, cancel: Option<&CancellationToken>) -> FeedResult<Vec<GeckoPool>> {
        let endpoint = format!("networks/{}/new_pools", DEFAULT_NETWORK);
        logger::debug(LogTag::Api, "[GECKOTERMINAL] Fetching new pools");

        let resp: PoolsResponse = self
            .http
            .get_json(&endpoint, self.get(&endpoint), cancel)
            .await?;
        Ok(resp.data.unwrap_or_default())
    }

    /// Token metadata for up to 30 addresses
    pub async fn tokens_multi(
        &self,
        addresses: &[String],
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<Vec<GeckoToken>> {
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

        let endpoint = format!(
            "networks/{}/tokens/multi/{}",
            DEFAULT_NETWORK,
            addresses.join(",")
        );
        logger::debug(
            LogTag::Api,
            &format!(
                "[GECKOTERMINAL] Fetching tokens multi: {} addresses",
                addresses.len()
            ),
        );

        let resp: TokensResponse = self
            .http
            .get_json(&endpoint, self.get(&endpoint), cancel)
            .await?;
        Ok(resp.data.unwrap_or_default())
    }

    /// Single token; `None` when the upstream has no data for it
    pub async fn token(
        &self,
        address: &str,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<Option<GeckoToken>> {
        let endpoint = format!("networks/{}/tokens/{}", DEFAULT_NETWORK, address);
        logger::debug(
            LogTag::Api,
            &format!("[GECKOTERMINAL] Fetching token: {}", address),
        );

        match self
            .http
            .get_json::<TokenResponse>(&endpoint, self.get(&endpoint), cancel)
            .await
        {
            Ok(resp) => Ok(resp.data),
            Err(FeedError::Upstream { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
