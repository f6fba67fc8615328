/// Minimal Solana JSON-RPC client
///
/// Only the two calls the mint lookup needs: `getAccountInfo` (jsonParsed) and
/// `getTokenSupply`.
use crate::apis::client::{ApiStats, HttpClient};
use crate::errors::{FeedError, FeedResult};
use crate::logger::{self, LogTag};
use crate::tokens::normalize::lenient_num;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

pub const TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// `getTokenSupply` value
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenSupply {
    /// Raw amount (string on the wire)
    #[serde(default, deserialize_with = "lenient_num")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub decimals: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct ValueWrapper<T> {
    value: Option<T>,
}

pub struct SolanaRpcClient {
    http: HttpClient,
    url: String,
}

impl SolanaRpcClient {
    pub fn new(client: Client, url: &str, max_per_minute: usize) -> Self {
        Self {
            http: HttpClient::new(client, "solana-rpc", TIMEOUT, max_per_minute),
            url: url.to_string(),
        }
    }

    pub fn stats(&self) -> ApiStats {
        self.http.stats()
    }

    async fn call<T>(
        &self,
        method: &str,
        params: Value,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        logger::debug(LogTag::Api, &format!("[SOLANA-RPC] {}", method));

        let resp: RpcResponse<T> = self.http.post_json(method, &self.url, &body, cancel).await?;
        if let Some(err) = resp.error {
            return Err(FeedError::Network(format!(
                "rpc error {}: {}",
                err.code, err.message
            )));
        }
        Ok(resp.result)
    }

    /// Whether `address` is an SPL token mint account
    pub async fn is_mint_account(
        &self,
        address: &str,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<bool> {
        let result: Option<Value> = self
            .call(
                "getAccountInfo",
                json!([address, {"encoding": "jsonParsed", "commitment": "processed"}]),
                cancel,
            )
            .await?;
        Ok(result.as_ref().map_or(false, account_is_mint))
    }

    pub async fn token_supply(
        &self,
        mint: &str,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<Option<TokenSupply>> {
        let result: Option<ValueWrapper<TokenSupply>> = self
            .call(
                "getTokenSupply",
                json!([mint, {"commitment": "processed"}]),
                cancel,
            )
            .await?;
        Ok(result.and_then(|w| w.value))
    }
}

/// `result.value.data.parsed.type == "mint"`
pub fn account_is_mint(result: &Value) -> bool {
    result
        .pointer("/value/data/parsed/type")
        .and_then(Value::as_str)
        == Some("mint")
}
