/// Match-quality scoring and ranking of merged records
use super::record::TokenRecord;
use std::cmp::Ordering;

const EXACT_SYMBOL: f64 = 100.0;
const EXACT_MINT: f64 = 95.0;
const EXACT_NAME: f64 = 90.0;
const PREFIX_SYMBOL: f64 = 70.0;
const PREFIX_NAME: f64 = 60.0;
const CONTAINS_SYMBOL: f64 = 30.0;
const CONTAINS_NAME: f64 = 25.0;
const CONTAINS_MINT: f64 = 20.0;
const EMPTY_QUERY: f64 = 1.0;
const MAX_LIQUIDITY_BONUS: f64 = 12.0;
const PRICE_BONUS: f64 = 2.0;

/// Score a record against a query: exact > prefix > substring over symbol/name/mint,
/// plus a capped log-liquidity bonus and a small bonus for having a non-zero price.
///
/// Tiers stack (an exact symbol match is also a prefix and a substring match).
pub fn score_record(record: &TokenRecord, query: &str) -> f64 {
    let q = query.trim().to_lowercase();
    let mut score = 0.0;

    if q.is_empty() {
        score += EMPTY_QUERY;
    } else {
        let sym = record.symbol.as_deref().unwrap_or("").to_lowercase();
        let name = record.name.as_deref().unwrap_or("").to_lowercase();
        let mint = record.mint.to_lowercase();

        if sym == q {
            score += EXACT_SYMBOL;
        }
        if name == q {
            score += EXACT_NAME;
        }
        if mint == q {
            score += EXACT_MINT;
        }
        if sym.starts_with(&q) {
            score += PREFIX_SYMBOL;
        }
        if name.starts_with(&q) {
            score += PREFIX_NAME;
        }
        if sym.contains(&q) {
            score += CONTAINS_SYMBOL;
        }
        if name.contains(&q) {
            score += CONTAINS_NAME;
        }
        if mint.contains(&q) {
            score += CONTAINS_MINT;
        }
    }

    if let Some(liq) = record.liquidity.filter(|l| *l > 0.0) {
        score += ((liq + 10.0).log10() * 4.0).min(MAX_LIQUIDITY_BONUS);
    }
    if record.price_usd.map_or(false, |p| p != 0.0) {
        score += PRICE_BONUS;
    }

    score
}

/// Score every record, sort descending by score (ties by mint), truncate to `limit`
pub fn rank(records: impl IntoIterator<Item = TokenRecord>, query: &str, limit: usize) -> Vec<TokenRecord> {
    let mut ranked: Vec<TokenRecord> = records
        .into_iter()
        .map(|mut r| {
            r.score = score_record(&r, query);
            r
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.mint.cmp(&b.mint))
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(mint: &str, symbol: &str, name: &str) -> TokenRecord {
        let mut r = TokenRecord::new(mint);
        r.symbol = Some(symbol.to_string());
        r.name = Some(name.to_string());
        r
    }

    #[test]
    fn test_exact_beats_prefix_beats_substring() {
        let exact = token("m1", "WIF", "dogwifhat");
        let prefix = token("m2", "WIFE", "Wife Coin");
        let substring = token("m3", "SWIFT", "Swift");

        let q = "wif";
        let s_exact = score_record(&exact, q);
        let s_prefix = score_record(&prefix, q);
        let s_sub = score_record(&substring, q);
        assert!(s_exact > s_prefix, "{} vs {}", s_exact, s_prefix);
        assert!(s_prefix > s_sub, "{} vs {}", s_prefix, s_sub);
    }

    #[test]
    fn test_liquidity_bonus_is_capped() {
        let mut whale = token("m1", "AAA", "aaa");
        whale.liquidity = Some(1e12);
        let mut none = token("m2", "AAA", "aaa");
        none.liquidity = None;
        let diff = score_record(&whale, "zzz") - score_record(&none, "zzz");
        assert!((diff - MAX_LIQUIDITY_BONUS).abs() < 1e-9);
    }

    #[test]
    fn test_zero_price_earns_no_bonus() {
        let unpriced = token("m1", "AAA", "aaa");
        let mut zero = token("m2", "AAA", "aaa");
        zero.price_usd = Some(0.0);
        let mut priced = token("m3", "AAA", "aaa");
        priced.price_usd = Some(0.002);

        assert_eq!(score_record(&zero, "aaa"), score_record(&unpriced, "aaa"));
        assert_eq!(
            score_record(&priced, "aaa") - score_record(&unpriced, "aaa"),
            PRICE_BONUS
        );
    }

    #[test]
    fn test_rank_is_deterministic_on_ties() {
        let a = token("b-mint", "CAT", "cat");
        let b = token("a-mint", "CAT", "cat");
        let ranked = rank(vec![a.clone(), b.clone()], "cat", 10);
        let again = rank(vec![b, a], "cat", 10);
        assert_eq!(ranked[0].mint, "a-mint");
        assert_eq!(
            ranked.iter().map(|r| &r.mint).collect::<Vec<_>>(),
            again.iter().map(|r| &r.mint).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_rank_truncates() {
        let records = (0..5).map(|i| token(&format!("m{}", i), "X", "x"));
        assert_eq!(rank(records, "x", 3).len(), 3);
    }
}
