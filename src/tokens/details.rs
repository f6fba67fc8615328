/// Detailed single-token model returned by the lookup chain
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TxnCounts {
    pub buys: u64,
    pub sells: u64,
}

impl TxnCounts {
    pub fn total(&self) -> u64 {
        self.buys + self.sells
    }
}

/// One pool row of a token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairSummary {
    pub dex_id: String,
    pub url: Option<String>,
    pub price_usd: Option<f64>,
    pub price_native: Option<f64>,
    pub change5m: Option<f64>,
    pub change1h: Option<f64>,
    pub change6h: Option<f64>,
    pub change24h: Option<f64>,
    pub volume24h: Option<f64>,
    pub liquidity_usd: Option<f64>,
    pub pair_created_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenDetails {
    pub mint: String,
    pub symbol: String,
    pub name: String,
    pub image_url: Option<String>,
    pub header_url: Option<String>,

    pub price_usd: Option<f64>,
    pub price_native: Option<f64>,
    pub change5m: Option<f64>,
    pub change1h: Option<f64>,
    pub change6h: Option<f64>,
    pub change24h: Option<f64>,

    pub liquidity_usd: Option<f64>,
    pub liquidity_base: Option<f64>,
    pub liquidity_quote: Option<f64>,
    pub fdv: Option<f64>,
    pub market_cap: Option<f64>,
    pub boosts_active: u64,

    pub volume5m: Option<f64>,
    pub volume1h: Option<f64>,
    pub volume6h: Option<f64>,
    pub volume24h: Option<f64>,
    pub txns5m: TxnCounts,
    pub txns1h: TxnCounts,
    pub txns6h: TxnCounts,
    pub txns24h: TxnCounts,

    /// Age of the oldest known pool
    pub age_ms: Option<i64>,

    pub headline_dex: String,
    pub headline_url: Option<String>,
    pub websites: Vec<String>,
    pub pairs: Vec<PairSummary>,

    /// Only populated by the RPC fallback
    pub supply: Option<f64>,
    pub decimals: Option<u8>,

    pub liq_to_fdv_pct: Option<f64>,
    pub vol_to_liq_24h: Option<f64>,
    pub buy_sell_24h: Option<f64>,

    /// Provider that produced this model
    pub source: String,
}

impl TokenDetails {
    /// Empty model for `mint`; fields stay unset until a provider fills them
    pub fn skeleton(mint: &str, source: &str) -> Self {
        Self {
            mint: mint.to_string(),
            source: source.to_string(),
            ..Default::default()
        }
    }

    /// Compute the derived ratios; each is `None` unless its denominator is positive
    pub fn finalize(mut self) -> Self {
        self.liq_to_fdv_pct = match (self.liquidity_usd, self.fdv) {
            (Some(liq), Some(fdv)) if fdv > 0.0 => Some(liq / fdv * 100.0),
            _ => None,
        };
        self.vol_to_liq_24h = match (self.volume24h, self.liquidity_usd) {
            (Some(vol), Some(liq)) if liq > 0.0 => Some(vol / liq),
            _ => None,
        };
        let total = self.txns24h.total();
        self.buy_sell_24h = (total > 0).then(|| self.txns24h.buys as f64 / total as f64);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_ratios() {
        let mut d = TokenDetails::skeleton("mint", "dexscreener");
        d.liquidity_usd = Some(50_000.0);
        d.fdv = Some(1_000_000.0);
        d.volume24h = Some(100_000.0);
        d.txns24h = TxnCounts { buys: 30, sells: 10 };
        let d = d.finalize();
        assert_eq!(d.liq_to_fdv_pct, Some(5.0));
        assert_eq!(d.vol_to_liq_24h, Some(2.0));
        assert_eq!(d.buy_sell_24h, Some(0.75));
    }

    #[test]
    fn test_finalize_guards_denominators() {
        let mut d = TokenDetails::skeleton("mint", "geckoterminal");
        d.liquidity_usd = Some(0.0);
        d.fdv = Some(0.0);
        d.volume24h = Some(10.0);
        let d = d.finalize();
        assert_eq!(d.liq_to_fdv_pct, None);
        assert_eq!(d.vol_to_liq_24h, None);
        assert_eq!(d.buy_sell_24h, None);
    }
}
