/// One-shot feed collectors
///
/// - `fetch_feeds`: walks the keyword terms one at a time under a budget and returns
///   everything found as one ranked bag
/// - `collect_instant`: DexScreener pools quoted in USDC/SOL plus boosted tokens, no
///   free-text search involved
use crate::aggregator::{collect, CollectOptions};
use crate::apis::dexscreener::{DexPair, MAX_TOKENS_PER_REQUEST};
use crate::apis::ApiManager;
use crate::config::StreamConfig;
use crate::health::HealthRegistry;
use crate::logger::{self, LogTag};
use crate::providers::{Provider, SearchOptions, SeedProvider};
use crate::tokens::normalize::{finite_opt, non_empty};
use crate::tokens::{rank, score_record, TokenRecord};
use crate::utils::with_timeout;
use futures::future::join_all;
use rand::seq::SliceRandom;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const MINT_USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const MINT_SOL: &str = "So11111111111111111111111111111111111111112";

pub const TAG_QUOTE: &str = "ds-quote";
pub const TAG_BOOSTED: &str = "ds-boosted";

// =============================================================================
// FETCH FEEDS
// =============================================================================

#[derive(Debug, Clone)]
pub struct FeedsOptions {
    pub terms: Vec<String>,
    /// Maximum number of terms searched
    pub budget: usize,
    pub limit_per_query: usize,
    pub deadline: Duration,
    pub include_seeds: bool,
    pub seed_limit: usize,
    /// Visit terms in random order so repeated runs cover different terms first
    pub shuffle: bool,
    pub cancel: CancellationToken,
    pub stagger_overrides: HashMap<String, Duration>,
}

impl FeedsOptions {
    pub fn from_config(cfg: &StreamConfig, seed_limit: usize, cancel: CancellationToken) -> Self {
        Self {
            terms: cfg
                .keywords
                .iter()
                .map(|k| format!("{}{}", cfg.prefix, k))
                .collect(),
            budget: cfg.feeds_budget,
            limit_per_query: cfg.limit_per_query,
            deadline: Duration::from_millis(cfg.deadline_ms),
            include_seeds: false,
            seed_limit,
            shuffle: true,
            cancel,
            stagger_overrides: HashMap::new(),
        }
    }
}

/// Search every term in sequence (up to `budget` terms) and merge all results by mint.
/// The bag is ranked with the empty-query score, so liquidity and price decide.
pub async fn fetch_feeds(
    providers: &[Arc<dyn Provider>],
    seeds: &[Arc<dyn SeedProvider>],
    health: &HealthRegistry,
    opts: &FeedsOptions,
) -> Vec<TokenRecord> {
    let mut bag: HashMap<String, TokenRecord> = HashMap::new();

    if opts.include_seeds {
        let seed_opts = SearchOptions::new(opts.cancel.clone(), opts.seed_limit);
        for seed in seeds {
            add_to_bag(&mut bag, seed.seeds(&seed_opts).await);
        }
    }

    let mut terms = opts.terms.clone();
    if opts.shuffle {
        terms.shuffle(&mut rand::thread_rng());
    }

    let mut collect_opts =
        CollectOptions::new(opts.limit_per_query, opts.deadline, opts.cancel.clone());
    collect_opts.stagger_overrides = opts.stagger_overrides.clone();

    let mut spent = 0usize;
    for term in terms.iter().take(opts.budget) {
        if opts.cancel.is_cancelled() {
            break;
        }
        spent += 1;
        match collect(providers, health, term, &collect_opts).await {
            Ok(records) => add_to_bag(&mut bag, records),
            Err(err) => {
                logger::warning(LogTag::Aggregator, &format!("term '{}' failed: {}", term, err));
            }
        }
    }

    logger::info(
        LogTag::Aggregator,
        &format!("Feeds collected: {} tokens from {} terms", bag.len(), spent),
    );

    let total = bag.len();
    rank(bag.into_values(), "", total)
}

fn add_to_bag(bag: &mut HashMap<String, TokenRecord>, records: Vec<TokenRecord>) {
    for record in records {
        match bag.get_mut(&record.mint) {
            Some(existing) => existing.absorb(record),
            None => {
                bag.insert(record.mint.clone(), record);
            }
        }
    }
}

// =============================================================================
// INSTANT COLLECTOR
// =============================================================================

#[derive(Debug, Clone)]
pub struct InstantOptions {
    pub quote_mints: Vec<String>,
    /// Boosted tokens resolved per run
    pub max_boosted: usize,
    pub limit: usize,
    /// Per-request timeout
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

impl InstantOptions {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            quote_mints: vec![MINT_USDC.to_string(), MINT_SOL.to_string()],
            max_boosted: 60,
            limit: 220,
            timeout: Duration::from_secs(8),
            cancel,
        }
    }
}

/// Record for the non-quote side of a pair. `None` when that side has no address.
pub fn quote_side_record(pair: &DexPair, tag: &str, quote_mints: &[String]) -> Option<TokenRecord> {
    let is_quote = |addr: &Option<String>| {
        addr.as_deref()
            .map_or(false, |a| quote_mints.iter().any(|q| q == a))
    };
    let token = if is_quote(&pair.base_token.address) {
        &pair.quote_token
    } else {
        &pair.base_token
    };

    let mint = non_empty(token.address.as_deref())?;
    let mut record = TokenRecord::new(mint).with_source(tag);
    record.symbol = non_empty(token.symbol.as_deref());
    record.name = non_empty(token.name.as_deref());
    record.image_url = non_empty(pair.image_url());
    record.price_usd = finite_opt(pair.price_usd);
    record.liquidity = finite_opt(pair.liquidity_usd());
    record.change24h = finite_opt(pair.price_change.h24);
    record.dex_id = non_empty(pair.dex_id.as_deref());
    record.url = non_empty(pair.url.as_deref());
    Some(record)
}

/// Deepest liquidity first, then empty-query score, then mint
pub fn rank_instant(records: impl IntoIterator<Item = TokenRecord>, limit: usize) -> Vec<TokenRecord> {
    let mut out: Vec<TokenRecord> = records
        .into_iter()
        .map(|mut r| {
            r.score = score_record(&r, "");
            r
        })
        .collect();
    out.sort_by(|a, b| {
        let liq_a = a.liquidity.unwrap_or(0.0);
        let liq_b = b.liquidity.unwrap_or(0.0);
        liq_b
            .partial_cmp(&liq_a)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
            .then_with(|| a.mint.cmp(&b.mint))
    });
    out.truncate(limit);
    out
}

/// Collect the instant feed. Failed upstream calls only shrink the result.
pub async fn collect_instant(api: &ApiManager, opts: &InstantOptions) -> Vec<TokenRecord> {
    let cancel = Some(&opts.cancel);
    let ds = &api.dexscreener;
    let mut bag: HashMap<String, TokenRecord> = HashMap::new();

    // 1. pools quoted in each quote mint
    let quote_calls = opts
        .quote_mints
        .iter()
        .map(|quote| with_timeout(ds.token_pairs(quote, None, cancel), opts.timeout, cancel));
    for (quote, result) in opts.quote_mints.iter().zip(join_all(quote_calls).await) {
        match result {
            Ok(pairs) => add_to_bag(
                &mut bag,
                pairs
                    .iter()
                    .filter_map(|p| quote_side_record(p, TAG_QUOTE, &opts.quote_mints))
                    .collect(),
            ),
            Err(err) => logger::debug(
                LogTag::Aggregator,
                &format!("[INSTANT] quote pools for {} failed: {}", quote, err),
            ),
        }
    }

    // 2. boosted tokens, resolved to their best pair in chunks
    let (latest, top) = futures::join!(
        with_timeout(ds.latest_boosts(cancel), opts.timeout, cancel),
        with_timeout(ds.top_boosts(cancel), opts.timeout, cancel),
    );
    let boosts: Vec<_> = latest
        .unwrap_or_default()
        .into_iter()
        .chain(top.unwrap_or_default())
        .collect();

    let mut unique = HashSet::new();
    let boosted: Vec<String> = boosts
        .into_iter()
        .filter(|b| {
            b.chain_id
                .as_deref()
                .map_or(false, |c| c.eq_ignore_ascii_case("solana"))
        })
        .filter_map(|b| non_empty(b.token_address.as_deref()))
        .filter(|mint| unique.insert(mint.clone()))
        .take(opts.max_boosted)
        .collect();

    for chunk in boosted.chunks(MAX_TOKENS_PER_REQUEST) {
        if opts.cancel.is_cancelled() {
            break;
        }
        match with_timeout(ds.tokens_batch(chunk, None, cancel), opts.timeout, cancel).await {
            Ok(pairs) => add_to_bag(
                &mut bag,
                pairs
                    .iter()
                    .filter_map(|p| quote_side_record(p, TAG_BOOSTED, &opts.quote_mints))
                    .collect(),
            ),
            Err(err) => logger::debug(
                LogTag::Aggregator,
                &format!("[INSTANT] boosted chunk of {} failed: {}", chunk.len(), err),
            ),
        }
    }

    logger::info(
        LogTag::Aggregator,
        &format!(
            "Instant feed: {} tokens ({} boosted candidates)",
            bag.len(),
            boosted.len()
        ),
    );

    rank_instant(bag.into_values(), opts.limit)
}
