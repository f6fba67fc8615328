/// Token detail lookup with provider fallback
///
/// DexScreener has the richest model (all pools, volumes, txns), so it goes first.
/// GeckoTerminal and Birdeye fill the basics when it has nothing, and the RPC fallback
/// can at least confirm the mint with its supply. Every attempt is reported to the
/// health registry under the upstream's name.
use crate::apis::birdeye::BirdeyeOverview;
use crate::apis::dexscreener::types::PairTxnCount;
use crate::apis::dexscreener::DexPair;
use crate::apis::geckoterminal::GeckoToken;
use crate::apis::solana_rpc::TokenSupply;
use crate::apis::ApiManager;
use crate::errors::{FeedError, FeedResult};
use crate::health::HealthRegistry;
use crate::logger::{self, LogTag};
use crate::tokens::normalize::{finite_opt, non_empty};
use crate::tokens::{PairSummary, TokenDetails, TxnCounts};
use crate::utils::with_timeout;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEXSCREENER_TIMEOUT: Duration = Duration::from_secs(9);
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(8);

/// Fetch the detail model of `mint`, trying each upstream until one answers
pub async fn fetch_token_info(
    api: &ApiManager,
    health: &HealthRegistry,
    mint: &str,
    cancel: &CancellationToken,
) -> FeedResult<TokenDetails> {
    let mint = mint.trim();
    if mint.is_empty() {
        return Err(FeedError::InvalidArgument("mint cannot be empty".to_string()));
    }
    let token = Some(cancel);

    let ds = with_timeout(
        async {
            let pairs = api.dexscreener.token_lookup(mint, token).await?;
            details_from_pairs(mint, &pairs, chrono::Utc::now().timestamp_millis())
                .ok_or_else(|| FeedError::Parse("no pairs for token".to_string()))
        },
        DEXSCREENER_TIMEOUT,
        token,
    )
    .await;
    if let Some(details) = attempt(health, "dexscreener", mint, ds)? {
        return Ok(details);
    }

    let gecko = with_timeout(
        async {
            api.geckoterminal
                .token(mint, token)
                .await?
                .map(|t| details_from_gecko(mint, &t))
                .ok_or_else(|| FeedError::Parse("token not found".to_string()))
        },
        FALLBACK_TIMEOUT,
        token,
    )
    .await;
    if let Some(details) = attempt(health, "geckoterminal", mint, gecko)? {
        return Ok(details);
    }

    if api.birdeye.has_api_key() {
        let birdeye = with_timeout(
            async {
                api.birdeye
                    .token_overview(mint, token)
                    .await?
                    .map(|o| details_from_birdeye(mint, &o))
                    .ok_or_else(|| FeedError::Parse("empty overview".to_string()))
            },
            FALLBACK_TIMEOUT,
            token,
        )
        .await;
        if let Some(details) = attempt(health, "birdeye", mint, birdeye)? {
            return Ok(details);
        }
    }

    let rpc = with_timeout(
        async {
            if !api.solana_rpc.is_mint_account(mint, token).await? {
                return Err(FeedError::Parse("account is not a token mint".to_string()));
            }
            // Supply is a nice-to-have once the mint is confirmed
            let supply = api.solana_rpc.token_supply(mint, token).await.ok().flatten();
            Ok(details_from_rpc(mint, supply))
        },
        FALLBACK_TIMEOUT,
        token,
    )
    .await;
    if let Some(details) = attempt(health, "solana-rpc", mint, rpc)? {
        return Ok(details);
    }

    Err(FeedError::unavailable(
        "lookup",
        format!("no token info available for {}", mint),
    ))
}

/// Report one attempt; cancellation aborts the whole chain
fn attempt(
    health: &HealthRegistry,
    provider: &str,
    mint: &str,
    result: FeedResult<TokenDetails>,
) -> FeedResult<Option<TokenDetails>> {
    match result {
        Ok(details) => {
            health.on_success(provider);
            logger::debug(
                LogTag::Provider,
                &format!("Token info for {} from {}", mint, provider),
            );
            Ok(Some(details))
        }
        Err(FeedError::Cancelled) => Err(FeedError::Cancelled),
        Err(err) => {
            health.on_failure(provider);
            logger::debug(
                LogTag::Provider,
                &format!("Token info for {} from {} failed: {}", mint, provider, err),
            );
            Ok(None)
        }
    }
}

fn txn_sum(pairs: &[&DexPair], window: impl Fn(&DexPair) -> Option<PairTxnCount>) -> TxnCounts {
    let mut counts = TxnCounts::default();
    for pair in pairs {
        if let Some(c) = window(pair) {
            counts.buys += c.buys.filter(|n| n.is_finite() && *n > 0.0).unwrap_or(0.0) as u64;
            counts.sells += c.sells.filter(|n| n.is_finite() && *n > 0.0).unwrap_or(0.0) as u64;
        }
    }
    counts
}

fn volume_sum(pairs: &[&DexPair], window: impl Fn(&DexPair) -> Option<f64>) -> Option<f64> {
    let values: Vec<f64> = pairs.iter().filter_map(|p| finite_opt(window(p))).collect();
    (!values.is_empty()).then(|| values.iter().sum())
}

/// Build the detail model from every pool of the token. Pools where the token is the
/// base side are preferred; the deepest one is the headline. `now_ms` dates the age.
pub fn details_from_pairs(mint: &str, pairs: &[DexPair], now_ms: i64) -> Option<TokenDetails> {
    let as_base: Vec<&DexPair> = pairs
        .iter()
        .filter(|p| p.base_token.address.as_deref() == Some(mint))
        .collect();
    let list: Vec<&DexPair> = if as_base.is_empty() {
        pairs.iter().collect()
    } else {
        as_base
    };

    let best = list.iter().copied().max_by(|a, b| {
        let la = a.liquidity_usd().unwrap_or(0.0);
        let lb = b.liquidity_usd().unwrap_or(0.0);
        la.partial_cmp(&lb).unwrap_or(std::cmp::Ordering::Equal)
    })?;

    let mut d = TokenDetails::skeleton(
        best.base_token.address.as_deref().unwrap_or(mint),
        "dexscreener",
    );
    d.symbol = non_empty(best.base_token.symbol.as_deref()).unwrap_or_default();
    d.name = non_empty(best.base_token.name.as_deref()).unwrap_or_default();
    d.image_url = non_empty(best.image_url());
    d.header_url = best
        .info
        .as_ref()
        .and_then(|i| non_empty(i.header.as_deref()));

    d.price_usd = finite_opt(best.price_usd);
    d.price_native = finite_opt(best.price_native);
    d.change5m = finite_opt(best.price_change.m5);
    d.change1h = finite_opt(best.price_change.h1);
    d.change6h = finite_opt(best.price_change.h6);
    d.change24h = finite_opt(best.price_change.h24);

    let liquidity = best.liquidity.unwrap_or_default();
    d.liquidity_usd = finite_opt(liquidity.usd);
    d.liquidity_base = finite_opt(liquidity.base);
    d.liquidity_quote = finite_opt(liquidity.quote);
    d.fdv = finite_opt(best.fdv.or(best.market_cap));
    d.market_cap = finite_opt(best.market_cap.or(best.fdv));
    d.boosts_active = best
        .boosts
        .and_then(|b| finite_opt(b.active))
        .filter(|n| *n > 0.0)
        .unwrap_or(0.0) as u64;

    d.volume5m = volume_sum(&list, |p| p.volume.m5);
    d.volume1h = volume_sum(&list, |p| p.volume.h1);
    d.volume6h = volume_sum(&list, |p| p.volume.h6);
    d.volume24h = volume_sum(&list, |p| p.volume.h24);
    d.txns5m = txn_sum(&list, |p| p.txns.m5);
    d.txns1h = txn_sum(&list, |p| p.txns.h1);
    d.txns6h = txn_sum(&list, |p| p.txns.h6);
    d.txns24h = txn_sum(&list, |p| p.txns.h24);

    let earliest = list
        .iter()
        .filter_map(|p| finite_opt(p.pair_created_at))
        .filter(|t| *t > 0.0)
        .fold(None, |min: Option<f64>, t| Some(min.map_or(t, |m| m.min(t))));
    d.age_ms = earliest.map(|t| now_ms - t as i64);

    d.headline_dex = best.dex_id.clone().unwrap_or_default();
    d.headline_url = non_empty(best.url.as_deref());
    d.websites = best
        .info
        .as_ref()
        .map(|i| {
            i.websites
                .iter()
                .filter_map(|w| non_empty(w.url.as_deref()))
                .collect()
        })
        .unwrap_or_default();

    d.pairs = list
        .iter()
        .map(|p| PairSummary {
            dex_id: p.dex_id.clone().unwrap_or_default(),
            url: non_empty(p.url.as_deref()),
            price_usd: finite_opt(p.price_usd),
            price_native: finite_opt(p.price_native),
            change5m: finite_opt(p.price_change.m5),
            change1h: finite_opt(p.price_change.h1),
            change6h: finite_opt(p.price_change.h6),
            change24h: finite_opt(p.price_change.h24),
            volume24h: finite_opt(p.volume.h24),
            liquidity_usd: finite_opt(p.liquidity_usd()),
            pair_created_at: finite_opt(p.pair_created_at).map(|t| t as i64),
        })
        .collect();

    Some(d.finalize())
}

pub fn details_from_gecko(mint: &str, token: &GeckoToken) -> TokenDetails {
    let a = &token.attributes;
    let mut d = TokenDetails::skeleton(mint, "geckoterminal");
    d.symbol = non_empty(a.symbol.as_deref()).unwrap_or_default();
    d.name = non_empty(a.name.as_deref()).unwrap_or_default();
    d.image_url = non_empty(a.image_url.as_deref()).filter(|u| u != "missing.png");
    d.price_usd = finite_opt(a.price_usd);
    d.fdv = finite_opt(a.fdv_usd);
    d.market_cap = finite_opt(a.market_cap_usd);
    d.liquidity_usd = finite_opt(a.total_reserve_in_usd);
    d.volume24h = finite_opt(a.volume_usd.as_ref().and_then(|v| v.h24));
    d.decimals = finite_opt(a.decimals)
        .filter(|n| (0.0..=255.0).contains(n))
        .map(|n| n as u8);
    d.headline_dex = "gecko".to_string();
    d.finalize()
}

pub fn details_from_birdeye(mint: &str, o: &BirdeyeOverview) -> TokenDetails {
    let mut d = TokenDetails::skeleton(mint, "birdeye");
    d.symbol = non_empty(o.symbol.as_deref()).unwrap_or_default();
    d.name = non_empty(o.name.as_deref()).unwrap_or_default();
    d.image_url = non_empty(o.logo.as_deref());
    d.price_usd = finite_opt(o.price);
    d.change24h = finite_opt(o.price_change_24h);
    d.liquidity_usd = finite_opt(o.liquidity);
    d.fdv = finite_opt(o.fdv);
    d.market_cap = finite_opt(o.market_cap);
    d.volume24h = finite_opt(o.v24h);
    d.headline_dex = "birdeye".to_string();
    d.finalize()
}

pub fn details_from_rpc(mint: &str, supply: Option<TokenSupply>) -> TokenDetails {
    let mut d = TokenDetails::skeleton(mint, "solana-rpc");
    if let Some(s) = supply {
        d.supply = finite_opt(s.amount);
        d.decimals = s.decimals;
    }
    d.headline_dex = "solana".to_string();
    d.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::dexscreener::PairsResponse;
    use serde_json::json;

    const NOW_MS: i64 = 1_700_000_600_000;

    fn pairs() -> Vec<DexPair> {
        let resp: PairsResponse = serde_json::from_value(json!({
            "pairs": [
                {
                    "chainId": "solana",
                    "dexId": "orca",
                    "url": "https://dexscreener.com/solana/small",
                    "baseToken": {"address": "MintBonk", "symbol": "BONK", "name": "Bonk"},
                    "priceUsd": "0.00002",
                    "volume": {"h24": 1000, "m5": 10},
                    "txns": {"h24": {"buys": 10, "sells": 5}},
                    "liquidity": {"usd": 5000},
                    "pairCreatedAt": 1_700_000_000_000u64
                },
                {
                    "chainId": "solana",
                    "dexId": "raydium",
                    "url": "https://dexscreener.com/solana/deep",
                    "baseToken": {"address": "MintBonk", "symbol": "BONK", "name": "Bonk"},
                    "priceUsd": "0.000021",
                    "priceNative": "0.0000001",
                    "priceChange": {"h24": 3.0},
                    "volume": {"h24": 9000},
                    "txns": {"h24": {"buys": 20, "sells": 5}},
                    "liquidity": {"usd": 45000, "base": 100, "quote": 200},
                    "marketCap": 900000,
                    "pairCreatedAt": 1_700_000_300_000u64,
                    "boosts": {"active": 2},
                    "info": {
                        "imageUrl": "https://img/bonk.png",
                        "header": "https://img/header.png",
                        "websites": [{"label": "Website", "url": "https://bonk.example"}]
                    }
                },
                {
                    "chainId": "solana",
                    "dexId": "meteora",
                    "baseToken": {"address": "OtherMint", "symbol": "OTHER"},
                    "quoteToken": {"address": "MintBonk", "symbol": "BONK"},
                    "liquidity": {"usd": 999999}
                }
            ]
        }))
        .unwrap();
        resp.pairs.unwrap()
    }

    #[test]
    fn test_details_from_dexscreener_pairs() {
        let d = details_from_pairs("MintBonk", &pairs(), NOW_MS).unwrap();

        // The pool where BONK is quoted is ignored, so the deepest base pool leads
        assert_eq!(d.headline_dex, "raydium");
        assert_eq!(d.headline_url.as_deref(), Some("https://dexscreener.com/solana/deep"));
        assert_eq!(d.pairs.len(), 2);
        assert_eq!(d.symbol, "BONK");
        assert_eq!(d.price_usd, Some(0.000021));
        assert_eq!(d.liquidity_usd, Some(45_000.0));
        assert_eq!(d.liquidity_base, Some(100.0));
        assert_eq!(d.fdv, Some(900_000.0));
        assert_eq!(d.market_cap, Some(900_000.0));
        assert_eq!(d.boosts_active, 2);

        assert_eq!(d.volume24h, Some(10_000.0));
        assert_eq!(d.volume5m, Some(10.0));
        assert_eq!(d.volume1h, None);
        assert_eq!(d.txns24h, TxnCounts { buys: 30, sells: 10 });
        assert_eq!(d.age_ms, Some(600_000));

        assert_eq!(d.websites, vec!["https://bonk.example".to_string()]);
        assert_eq!(d.header_url.as_deref(), Some("https://img/header.png"));
        assert_eq!(d.liq_to_fdv_pct, Some(5.0));
        assert_eq!(d.buy_sell_24h, Some(0.75));
        assert_eq!(d.source, "dexscreener");
    }

    #[test]
    fn test_details_use_all_pairs_when_none_is_base() {
        let d = details_from_pairs("Unlisted", &pairs(), NOW_MS).unwrap();
        assert_eq!(d.headline_dex, "meteora");
        assert_eq!(d.pairs.len(), 3);
        assert!(details_from_pairs("MintBonk", &[], NOW_MS).is_none());
    }

    #[test]
    fn test_fallback_models() {
        let gecko: GeckoToken = serde_json::from_value(json!({
            "id": "solana_MintBonk",
            "attributes": {
                "address": "MintBonk",
                "symbol": "BONK",
                "name": "Bonk",
                "image_url": "missing.png",
                "decimals": 5,
                "price_usd": "0.00002",
                "fdv_usd": "1000000"
            }
        }))
        .unwrap();
        let d = details_from_gecko("MintBonk", &gecko);
        assert_eq!(d.headline_dex, "gecko");
        assert_eq!(d.image_url, None);
        assert_eq!(d.decimals, Some(5));
        assert_eq!(d.fdv, Some(1_000_000.0));

        let d = details_from_rpc(
            "MintBonk",
            Some(TokenSupply {
                amount: Some(1e15),
                decimals: Some(5),
            }),
        );
        assert_eq!(d.headline_dex, "solana");
        assert_eq!(d.supply, Some(1e15));
        assert_eq!(d.source, "solana-rpc");
    }
}
