/// Common token record shape produced by every provider adapter
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Stable identity key (token mint address)
    pub mint: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub price_usd: Option<f64>,
    /// Best known pool liquidity in USD
    pub liquidity: Option<f64>,
    pub change24h: Option<f64>,
    pub dex_id: Option<String>,
    pub url: Option<String>,
    /// Providers that reported this record
    pub sources: BTreeSet<String>,
    /// Derived ranking score, not authoritative
    #[serde(default)]
    pub score: f64,
}

impl TokenRecord {
    pub fn new(mint: impl Into<String>) -> Self {
        Self {
            mint: mint.into(),
            symbol: None,
            name: None,
            image_url: None,
            price_usd: None,
            liquidity: None,
            change24h: None,
            dex_id: None,
            url: None,
            sources: BTreeSet::new(),
            score: 0.0,
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.sources.insert(source.to_string());
        self
    }

    /// Fold `incoming` into `self` in place, see [`merge`]
    pub fn absorb(&mut self, incoming: TokenRecord) {
        fill(&mut self.symbol, incoming.symbol);
        fill(&mut self.name, incoming.name);
        fill(&mut self.image_url, incoming.image_url);
        fill(&mut self.price_usd, incoming.price_usd);
        fill(&mut self.liquidity, incoming.liquidity);
        fill(&mut self.change24h, incoming.change24h);
        fill(&mut self.dex_id, incoming.dex_id);
        fill(&mut self.url, incoming.url);
        self.sources.extend(incoming.sources);
    }
}

fn fill<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if slot.is_none() {
        *slot = incoming;
    }
}

/// Merge two partial descriptions of the same token.
///
/// Every scalar field keeps `existing`'s value when present and falls back to
/// `incoming`'s; `sources` is the set union. The union makes `sources` independent of
/// argument order, and merging a record with itself returns it unchanged. `mint` and
/// `score` are taken from `existing`.
pub fn merge(existing: TokenRecord, incoming: TokenRecord) -> TokenRecord {
    let mut merged = existing;
    merged.absorb(incoming);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(mint: &str, source: &str) -> TokenRecord {
        TokenRecord::new(mint).with_source(source)
    }

    #[test]
    fn test_merge_prefers_existing_non_null() {
        let mut a = record("X", "A");
        a.liquidity = Some(10.0);
        a.symbol = Some("WIF".to_string());

        let mut b = record("X", "B");
        b.price_usd = Some(5.0);
        b.symbol = Some("DOGWIF".to_string());

        let merged = merge(a, b);
        assert_eq!(merged.liquidity, Some(10.0));
        assert_eq!(merged.price_usd, Some(5.0));
        assert_eq!(merged.symbol.as_deref(), Some("WIF"));
        assert_eq!(
            merged.sources.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["A", "B"]
        );
    }

    #[test]
    fn test_merge_sources_commutative() {
        let mut a = record("X", "dexscreener");
        a.price_usd = Some(1.0);
        let mut b = record("X", "jupiter");
        b.name = Some("Bonk".to_string());

        let ab = merge(a.clone(), b.clone());
        let ba = merge(b, a);
        assert_eq!(ab.sources, ba.sources);
        // Disjoint scalar fields end up identical either way
        assert_eq!(ab.price_usd, ba.price_usd);
        assert_eq!(ab.name, ba.name);
    }

    #[test]
    fn test_merge_idempotent() {
        let mut a = record("X", "birdeye");
        a.price_usd = Some(0.25);
        a.url = Some("https://dexscreener.com/solana/x".to_string());
        assert_eq!(merge(a.clone(), a.clone()), a);
    }
}
