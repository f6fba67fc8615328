/// Defensive coercion helpers for heterogeneous upstream payloads
///
/// Upstreams send numbers as JSON numbers, numeric strings, nulls or garbage. Nothing
/// non-finite may leave an adapter: everything unusable becomes `None`.
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Coerce a JSON value into a finite number
pub fn as_num(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => finite(n.as_f64()?),
        Value::String(s) => finite(s.trim().parse::<f64>().ok()?),
        _ => None,
    }
}

/// Serde adapter for numeric fields that arrive as numbers, numeric strings or garbage.
/// Use with `#[serde(default, deserialize_with = "lenient_num")]`.
pub fn lenient_num<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(as_num))
}

/// Look up `key` in an object and coerce it, see [`as_num`]
pub fn num_field(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(as_num)
}

pub fn finite(n: f64) -> Option<f64> {
    n.is_finite().then_some(n)
}

/// Coerce an optional float that may carry NaN/inf
pub fn finite_opt(n: Option<f64>) -> Option<f64> {
    n.and_then(finite)
}

/// Parse an optional numeric string (DexScreener sends prices as strings)
pub fn parse_num(s: Option<&str>) -> Option<f64> {
    s.and_then(|s| s.trim().parse::<f64>().ok()).and_then(finite)
}

/// Empty or whitespace-only strings carry no information
pub fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// First non-empty string field among `keys`
pub fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| non_empty(value.get(*key).and_then(Value::as_str)))
}

/// Whether `s` can be a Solana mint address: base58 decoding to 32 bytes
pub fn looks_like_mint(s: &str) -> bool {
    let s = s.trim();
    if s.len() < 32 || s.len() > 44 {
        return false;
    }
    matches!(bs58::decode(s).into_vec(), Ok(bytes) if bytes.len() == 32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_num_coercion() {
        assert_eq!(as_num(&json!(1.5)), Some(1.5));
        assert_eq!(as_num(&json!("0.00042")), Some(0.00042));
        assert_eq!(as_num(&json!("NaN")), None);
        assert_eq!(as_num(&json!("inf")), None);
        assert_eq!(as_num(&json!("abc")), None);
        assert_eq!(as_num(&json!(null)), None);
        assert_eq!(as_num(&json!({"usd": 1})), None);
    }

    #[test]
    fn test_lenient_num_field() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(default, deserialize_with = "lenient_num")]
            price: Option<f64>,
        }
        let row: Row = serde_json::from_value(json!({"price": "1.25"})).unwrap();
        assert_eq!(row.price, Some(1.25));
        let row: Row = serde_json::from_value(json!({"price": "n/a"})).unwrap();
        assert_eq!(row.price, None);
        let row: Row = serde_json::from_value(json!({})).unwrap();
        assert_eq!(row.price, None);
    }

    #[test]
    fn test_finite_opt_drops_nan() {
        assert_eq!(finite_opt(Some(f64::NAN)), None);
        assert_eq!(finite_opt(Some(f64::INFINITY)), None);
        assert_eq!(finite_opt(Some(2.0)), Some(2.0));
    }

    #[test]
    fn test_str_field_skips_blank() {
        let v = json!({"address": "  ", "mint": "So11111111111111111111111111111111111111112"});
        assert_eq!(
            str_field(&v, &["address", "mint"]).as_deref(),
            Some("So11111111111111111111111111111111111111112")
        );
    }

    #[test]
    fn test_looks_like_mint() {
        assert!(looks_like_mint("So11111111111111111111111111111111111111112"));
        assert!(looks_like_mint("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"));
        assert!(!looks_like_mint("solana pepe"));
        // 0, O, I and l are not in the base58 alphabet
        assert!(!looks_like_mint("0OIl1111111111111111111111111111111111111111"));
    }
}
