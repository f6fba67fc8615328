/// Birdeye public API client
///
/// API Documentation: https://docs.birdeye.so
///
/// Endpoints used (both require an API key):
/// 1. /defi/v3/search?keyword={query}&chain=solana - token search
/// 2. /defi/token_overview?address={mint} - token overview (detail fallback)
use crate::apis::client::{ApiStats, HttpClient};
use crate::errors::{FeedError, FeedResult};
use crate::logger::{self, LogTag};
use crate::tokens::normalize::lenient_num;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const BIRDEYE_BASE_URL: &str = "https://public-api.birdeye.so";

pub const TIMEOUT: Duration = Duration::from_secs(8);

/// Search hit; field names vary between API revisions, hence the aliases
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BirdeyeToken {
    #[serde(default, alias = "mint", alias = "tokenAddress")]
    pub address: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "usd_price", deserialize_with = "lenient_num")]
    pub price: Option<f64>,
    #[serde(default, alias = "liquidity_usd", deserialize_with = "lenient_num")]
    pub liquidity: Option<f64>,
    #[serde(default, rename = "logoURI", alias = "logo_uri", alias = "logo")]
    pub logo_uri: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BirdeyeOverview {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "logoURI")]
    pub logo: Option<String>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub price: Option<f64>,
    #[serde(
        default,
        alias = "priceChange24hPercent",
        deserialize_with = "lenient_num"
    )]
    pub price_change_24h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub liquidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub fdv: Option<f64>,
    #[serde(default, alias = "marketCap", alias = "mc", deserialize_with = "lenient_num")]
    pub market_cap: Option<f64>,
    #[serde(default, alias = "v24hUSD", deserialize_with = "lenient_num")]
    pub v24h: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OverviewResponse {
    #[serde(default)]
    data: Option<BirdeyeOverview>,
}

pub struct BirdeyeClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl BirdeyeClient {
    pub fn new(client: Client, api_key: Option<String>, max_per_minute: usize) -> Self {
        Self::with_base_url(client, api_key, max_per_minute, BIRDEYE_BASE_URL)
    }

    pub fn with_base_url(
        client: Client,
        api_key: Option<String>,
        max_per_minute: usize,
        base_url: &str,
    ) -> Self {
        Self {
            http: HttpClient::new(client, "birdeye", TIMEOUT, max_per_minute),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn stats(&self) -> ApiStats {
        self.http.stats()
    }

    fn get(&self, endpoint: &str) -> FeedResult<reqwest::RequestBuilder> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| FeedError::unavailable("birdeye", "missing API key"))?;
        let url = format!("{}/{}", self.base_url, endpoint);
        Ok(self
            .http
            .client()
            .get(url)
            .header(ACCEPT, "application/json")
            .header("X-API-KEY", key))
    }

    pub async fn search(
        &self,
        keyword: &str,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<Vec<BirdeyeToken>> {
        let endpoint = "defi/v3/search";
        let builder = self
            .get(endpoint)?
            .query(&[("keyword", keyword), ("chain", "solana")]);

        logger::debug(
            LogTag::Api,
            &format!("[BIRDEYE] Searching tokens: keyword={}", keyword),
        );

        let raw: Value = self.http.get_json(endpoint, builder, cancel).await?;
        Ok(search_hits(&raw))
    }

    pub async fn token_overview(
        &self,
        mint: &str,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<Option<BirdeyeOverview>> {
        let endpoint = "defi/token_overview";
        let builder = self
            .get(endpoint)?
            .query(&[("address", mint), ("chain", "solana")]);

        logger::debug(
            LogTag::Api,
            &format!("[BIRDEYE] Fetching token overview: {}", mint),
        );

        let resp: OverviewResponse = self.http.get_json(endpoint, builder, cancel).await?;
        Ok(resp.data)
    }
}

/// Flatten the search payload: `data.items` (or `data`) holds either token rows or
/// groups with a `result` array of token rows
pub fn search_hits(raw: &Value) -> Vec<BirdeyeToken> {
    let data = raw.get("data").unwrap_or(&Value::Null);
    let items = data
        .get("items")
        .and_then(Value::as_array)
        .or_else(|| data.as_array());

    let mut out = Vec::new();
    for item in items.into_iter().flatten() {
        match item.get("result").and_then(Value::as_array) {
            Some(group) => out.extend(group.iter().filter_map(decode_hit)),
            None => out.extend(decode_hit(item)),
        }
    }
    out
}

fn decode_hit(value: &Value) -> Option<BirdeyeToken> {
    serde_json::from_value::<BirdeyeToken>(value.clone())
        .ok()
        .filter(|t| t.address.as_deref().map_or(false, |a| !a.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_hits_grouped_and_flat() {
        let grouped = json!({
            "data": {"items": [
                {"type": "token", "result": [
                    {"address": "MintA", "symbol": "AAA", "name": "Alpha", "price": 1.5, "liquidity": "2000", "logo_uri": "https://a.png"},
                    {"symbol": "NOADDR"}
                ]},
                {"type": "market", "result": []}
            ]}
        });
        let hits = search_hits(&grouped);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].address.as_deref(), Some("MintA"));
        assert_eq!(hits[0].liquidity, Some(2000.0));
        assert_eq!(hits[0].logo_uri.as_deref(), Some("https://a.png"));

        let flat = json!({"data": [{"mint": "MintB", "usd_price": "0.5"}]});
        let hits = search_hits(&flat);
        assert_eq!(hits[0].address.as_deref(), Some("MintB"));
        assert_eq!(hits[0].price, Some(0.5));

        assert!(search_hits(&json!({"success": false})).is_empty());
    }

    #[test]
    fn test_missing_key_is_provider_unavailable() {
        let client = BirdeyeClient::new(Client::new(), Some("  ".to_string()), 60);
        assert!(!client.has_api_key());
        let err = client.get("defi/v3/search").unwrap_err();
        assert!(matches!(err, FeedError::ProviderUnavailable { .. }));
    }
}
