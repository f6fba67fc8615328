/// DexScreener response shapes
///
/// Numeric fields go through `lenient_num`: DexScreener sends prices as strings and
/// occasionally nulls or garbage in place of numbers.
use crate::tokens::normalize::lenient_num;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PairToken {
    pub address: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PairTxnCount {
    #[serde(default, deserialize_with = "lenient_num")]
    pub buys: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub sells: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct PairTxns {
    pub m5: Option<PairTxnCount>,
    pub h1: Option<PairTxnCount>,
    pub h6: Option<PairTxnCount>,
    pub h24: Option<PairTxnCount>,
}

/// Per-window numbers (volume, price change)
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PairWindows {
    #[serde(default, deserialize_with = "lenient_num")]
    pub m5: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub h1: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub h6: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PairLiquidity {
    #[serde(default, deserialize_with = "lenient_num")]
    pub usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub base: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub quote: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PairWebsite {
    pub label: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PairInfo {
    pub image_url: Option<String>,
    pub header: Option<String>,
    pub websites: Vec<PairWebsite>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PairBoosts {
    #[serde(default, deserialize_with = "lenient_num")]
    pub active: Option<f64>,
}

/// One DEX pair as returned by search, token-pairs and tokens endpoints
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    #[serde(default)]
    pub chain_id: Option<String>,
    #[serde(default)]
    pub dex_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pair_address: Option<String>,
    #[serde(default)]
    pub base_token: PairToken,
    #[serde(default)]
    pub quote_token: PairToken,
    #[serde(default, deserialize_with = "lenient_num")]
    pub price_native: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub price_usd: Option<f64>,
    #[serde(default)]
    pub txns: PairTxns,
    #[serde(default)]
    pub volume: PairWindows,
    #[serde(default)]
    pub price_change: PairWindows,
    #[serde(default)]
    pub liquidity: Option<PairLiquidity>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub fdv: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub market_cap: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub pair_created_at: Option<f64>,
    #[serde(default)]
    pub info: Option<PairInfo>,
    #[serde(default)]
    pub boosts: Option<PairBoosts>,
}

impl DexPair {
    pub fn is_chain(&self, chain: &str) -> bool {
        self.chain_id
            .as_deref()
            .map_or(false, |c| c.eq_ignore_ascii_case(chain))
    }

    pub fn liquidity_usd(&self) -> Option<f64> {
        self.liquidity.and_then(|l| l.usd)
    }

    pub fn image_url(&self) -> Option<&str> {
        self.info.as_ref().and_then(|i| i.image_url.as_deref())
    }
}

/// `{ "pairs": [...] }` wrapper used by search and token lookup; `pairs` may be null
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PairsResponse {
    #[serde(default)]
    pub pairs: Option<Vec<DexPair>>,
}

/// Entry of the token-boosts latest/top lists
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenBoost {
    pub chain_id: Option<String>,
    pub token_address: Option<String>,
    #[serde(deserialize_with = "lenient_num")]
    pub amount: Option<f64>,
    #[serde(deserialize_with = "lenient_num")]
    pub total_amount: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pair_decodes_string_numbers() {
        let pair: DexPair = serde_json::from_value(json!({
            "chainId": "solana",
            "dexId": "raydium",
            "url": "https://dexscreener.com/solana/abc",
            "pairAddress": "abc",
            "baseToken": {"address": "MintA", "name": "Bonk", "symbol": "BONK"},
            "quoteToken": {"address": "So11111111111111111111111111111111111111112", "symbol": "SOL"},
            "priceUsd": "0.0000213",
            "priceChange": {"h24": -3.5, "m5": "0.1"},
            "txns": {"h24": {"buys": 120, "sells": 80}},
            "liquidity": {"usd": 1500000.5},
            "fdv": 1000,
            "pairCreatedAt": 1700000000000u64,
            "info": {"imageUrl": "https://img/bonk.png", "websites": [{"label": "site", "url": "https://bonk"}]}
        }))
        .unwrap();

        assert!(pair.is_chain("solana"));
        assert_eq!(pair.price_usd, Some(0.0000213));
        assert_eq!(pair.price_change.h24, Some(-3.5));
        assert_eq!(pair.price_change.m5, Some(0.1));
        assert_eq!(pair.txns.h24.unwrap().buys, Some(120.0));
        assert_eq!(pair.liquidity_usd(), Some(1500000.5));
        assert_eq!(pair.image_url(), Some("https://img/bonk.png"));
        assert_eq!(pair.info.unwrap().websites.len(), 1);
    }

    #[test]
    fn test_null_pairs() {
        let resp: PairsResponse = serde_json::from_value(json!({"pairs": null})).unwrap();
        assert!(resp.pairs.is_none());
        let resp: PairsResponse = serde_json::from_value(json!({"schemaVersion": "1.0.0"})).unwrap();
        assert!(resp.pairs.is_none());
    }
}
