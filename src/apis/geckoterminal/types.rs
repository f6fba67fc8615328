/// GeckoTerminal JSON:API response shapes
use crate::tokens::normalize::lenient_num;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelationshipData {
    /// `"{network}_{address}"`
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Relationship {
    pub data: Option<RelationshipData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PoolRelationships {
    pub base_token: Option<Relationship>,
    pub quote_token: Option<Relationship>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PoolBaseToken {
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolAttributes {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub base_token_address: Option<String>,
    #[serde(default)]
    pub base_token: Option<PoolBaseToken>,
    #[serde(default)]
    pub token0_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub base_token_price_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub reserve_in_usd: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GeckoPool {
    pub id: Option<String>,
    pub attributes: PoolAttributes,
    pub relationships: Option<PoolRelationships>,
}

impl GeckoPool {
    /// Base token mint, from the attributes or the relationship id
    pub fn base_token_mint(&self) -> Option<String> {
        let a = &self.attributes;
        a.base_token_address
            .clone()
            .or_else(|| a.base_token.as_ref().and_then(|t| t.address.clone()))
            .or_else(|| a.token0_address.clone())
            .or_else(|| {
                let id = self
                    .relationships
                    .as_ref()?
                    .base_token
                    .as_ref()?
                    .data
                    .as_ref()?
                    .id
                    .as_deref()?;
                // "solana_<mint>"
                id.split_once('_').map(|(_, mint)| mint.to_string())
            })
            .filter(|m| !m.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenVolume {
    #[serde(default, deserialize_with = "lenient_num")]
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenAttributes {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub decimals: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub price_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub fdv_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub market_cap_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_num")]
    pub total_reserve_in_usd: Option<f64>,
    #[serde(default)]
    pub volume_usd: Option<TokenVolume>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GeckoToken {
    pub id: Option<String>,
    pub attributes: TokenAttributes,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PoolsResponse {
    pub data: Option<Vec<GeckoPool>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokensResponse {
    pub data: Option<Vec<GeckoToken>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenResponse {
    pub data: Option<GeckoToken>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_token_from_relationship() {
        let resp: PoolsResponse = serde_json::from_value(json!({
            "data": [
                {
                    "id": "solana_pool1",
                    "attributes": {"name": "BONK / SOL", "reserve_in_usd": "12345.6"},
                    "relationships": {
                        "base_token": {"data": {"id": "solana_MintBonk", "type": "token"}},
                        "quote_token": {"data": {"id": "solana_So11111111111111111111111111111111111111112"}}
                    }
                },
                {
                    "id": "solana_pool2",
                    "attributes": {"base_token_address": "MintWif"}
                },
                {"id": "solana_pool3", "attributes": {}}
            ]
        }))
        .unwrap();

        let pools = resp.data.unwrap();
        assert_eq!(pools[0].base_token_mint().as_deref(), Some("MintBonk"));
        assert_eq!(pools[0].attributes.reserve_in_usd, Some(12345.6));
        assert_eq!(pools[1].base_token_mint().as_deref(), Some("MintWif"));
        assert_eq!(pools[2].base_token_mint(), None);
    }
}
