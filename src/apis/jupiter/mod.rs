/// Jupiter token list client
///
/// The full list (tens of thousands of tokens) is fetched rarely and searched in memory;
/// caching it is the caller's job.
use crate::apis::client::{ApiStats, HttpClient};
use crate::errors::FeedResult;
use crate::logger::{self, LogTag};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_LIST_URL: &str = "https://token.jup.ag/all";

/// Trimmed list entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JupiterToken {
    #[serde(default, alias = "mint", alias = "id")]
    pub address: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "logoURI", alias = "logo")]
    pub logo_uri: Option<String>,
}

pub struct JupiterClient {
    http: HttpClient,
    list_url: String,
}

impl JupiterClient {
    pub fn new(client: Client, list_url: &str, timeout: Duration, max_per_minute: usize) -> Self {
        Self {
            http: HttpClient::new(client, "jupiter", timeout, max_per_minute),
            list_url: list_url.to_string(),
        }
    }

    pub fn stats(&self) -> ApiStats {
        self.http.stats()
    }

    /// Download the whole token list; entries without a mint are dropped
    pub async fn token_list(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<Vec<JupiterToken>> {
        logger::debug(
            LogTag::Api,
            &format!("[JUPITER] Downloading token list from {}", self.list_url),
        );
        let raw: Value = self
            .http
            .get_json("token-list", self.http.client().get(&self.list_url), cancel)
            .await?;
        let list = parse_token_list(raw);
        logger::debug(
            LogTag::Api,
            &format!("[JUPITER] Token list loaded: {} tokens", list.len()),
        );
        Ok(list)
    }
}

/// Accepts either an array of tokens or an object keyed by mint
pub fn parse_token_list(raw: Value) -> Vec<JupiterToken> {
    let rows: Vec<Value> = match raw {
        Value::Array(rows) => rows,
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        _ => Vec::new(),
    };
    rows.into_iter()
        .filter_map(|row| serde_json::from_value::<JupiterToken>(row).ok())
        .filter(|t| t.address.as_deref().map_or(false, |a| !a.trim().is_empty()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_array_and_object_lists() {
        let array = json!([
            {"address": "MintA", "symbol": "AAA", "name": "Alpha", "logoURI": "https://a.png", "decimals": 6},
            {"symbol": "NOMINT"}
        ]);
        let list = parse_token_list(array);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].logo_uri.as_deref(), Some("https://a.png"));

        let object = json!({"MintB": {"mint": "MintB", "symbol": "BBB"}});
        let list = parse_token_list(object);
        assert_eq!(list[0].address.as_deref(), Some("MintB"));

        assert!(parse_token_list(json!("oops")).is_empty());
    }
}
