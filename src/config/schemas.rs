/// Configuration schemas - all config structures defined once with defaults
///
/// The defaults are the values the discovery feed has been running with; none of them is
/// an invariant, every one can be overridden from `config.toml`.
use crate::config_struct;
use std::time::Duration;

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

config_struct! {
    /// Stale-while-revalidate cache tuning
    pub struct CacheConfig {
        /// Freshness window when the caller does not pass one
        default_ttl_ms: u64 = 15_000,
        /// Negative-cache window after a failed fetch
        error_ttl_ms: u64 = 3_000,
        /// Soft entry ceiling before eviction kicks in
        max_entries: usize = 800,
        /// Symmetric TTL jitter as a fraction of the TTL
        jitter_pct: f64 = 0.15,
        /// Share of entries (oldest first) dropped when over the ceiling
        evict_fraction: f64 = 0.10,
        /// Timeout applied to every fetch when the caller does not pass one
        fetch_timeout_ms: u64 = 15_000,
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn error_ttl(&self) -> Duration {
        Duration::from_millis(self.error_ttl_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

// ============================================================================
// HEALTH CONFIGURATION
// ============================================================================

config_struct! {
    /// Soft circuit breaker tuning
    pub struct HealthConfig {
        /// Failures (since the last reset) before a provider is degraded
        degrade_after: u32 = 2,
        /// How long a degraded mark lasts
        cool_off_ms: u64 = 120_000,
        /// Cap on the extra stagger delay of a degraded provider
        max_backoff_ms: u64 = 2_400,
        /// Extra delay per failure past the threshold
        backoff_step_ms: u64 = 300,
        /// Idle time after which both counters are halved (0 disables decay)
        decay_ms: u64 = 180_000,
        /// Successes that clear degradation before the cool-off ends
        recovery_successes: u32 = 2,
    }
}

impl HealthConfig {
    pub fn cool_off(&self) -> Duration {
        Duration::from_millis(self.cool_off_ms)
    }

    pub fn decay(&self) -> Option<Duration> {
        (self.decay_ms > 0).then(|| Duration::from_millis(self.decay_ms))
    }
}

// ============================================================================
// AGGREGATOR CONFIGURATION
// ============================================================================

config_struct! {
    /// Single-query fan-out defaults
    pub struct AggregatorConfig {
        limit: usize = 12,
        deadline_ms: u64 = 850,
    }
}

impl AggregatorConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

// ============================================================================
// STREAM CONFIGURATION
// ============================================================================

config_struct! {
    /// Multi-term streaming defaults
    pub struct StreamConfig {
        prefix: String = "solana ".to_string(),
        keywords: Vec<String> = default_keywords(),
        window_size: usize = 40,
        window_offset: usize = 0,
        request_budget: usize = 60,
        spacing_ms: u64 = 150,
        max_concurrent: usize = 2,
        limit_per_query: usize = 8,
        deadline_ms: u64 = 850,
        include_seeds: bool = true,
        /// Budget for the one-shot `fetch_feeds` collector
        feeds_budget: usize = 120,
    }
}

fn default_keywords() -> Vec<String> {
    [
        "pepe", "dog", "wif", "bonk", "reno", "frog", "shib", "meme", "snek", "bob", "new",
        "trending", "pump", "dump", "inu", "elon", "floki", "corgi", "monke", "ape", "dino",
        "purr", "purry", "kitty", "paws", "toad", "hamster", "doge", "shiba", "giga", "sigma",
        "baby", "wife", "husband",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

// ============================================================================
// PROVIDERS CONFIGURATION
// ============================================================================

config_struct! {
    /// Upstream provider settings
    pub struct ProvidersConfig {
        dexscreener_enabled: bool = true,
        dexscreener_stagger_ms: u64 = 0,

        /// Birdeye is skipped entirely without a key
        birdeye_api_key: Option<String> = None,
        birdeye_stagger_ms: u64 = 150,
        birdeye_search_ttl_ms: u64 = 120_000,

        jupiter_enabled: bool = true,
        jupiter_stagger_ms: u64 = 280,
        jupiter_list_url: String = "https://token.jup.ag/all".to_string(),
        jupiter_list_ttl_ms: u64 = 600_000,
        jupiter_list_timeout_ms: u64 = 15_000,

        solana_rpc_enabled: bool = true,
        solana_rpc_url: String = "https://api.mainnet-beta.solana.com".to_string(),
        solana_rpc_stagger_ms: u64 = 0,

        geckoterminal_enabled: bool = true,
        gecko_seed_limit: usize = 120,

        /// Per-call timeout for search endpoints
        search_timeout_ms: u64 = 8_000,
        /// Minimum spacing between calls to one upstream (0 = unlimited)
        rate_limit_per_minute: usize = 300,
    }
}

impl ProvidersConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }
}

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration
    pub struct Config {
        cache: CacheConfig = CacheConfig::default(),
        health: HealthConfig = HealthConfig::default(),
        aggregator: AggregatorConfig = AggregatorConfig::default(),
        stream: StreamConfig = StreamConfig::default(),
        providers: ProvidersConfig = ProvidersConfig::default(),
    }
}

impl Config {
    /// Reject values that can only come from a configuration mistake
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.max_entries == 0 {
            return Err("cache.max_entries must be greater than zero".to_string());
        }
        if !(0.0..1.0).contains(&self.cache.jitter_pct) {
            return Err(format!(
                "cache.jitter_pct must be in [0, 1), got {}",
                self.cache.jitter_pct
            ));
        }
        if !(self.cache.evict_fraction > 0.0 && self.cache.evict_fraction <= 1.0) {
            return Err(format!(
                "cache.evict_fraction must be in (0, 1], got {}",
                self.cache.evict_fraction
            ));
        }
        if self.health.degrade_after == 0 {
            return Err("health.degrade_after must be greater than zero".to_string());
        }
        if self.aggregator.limit == 0 || self.stream.limit_per_query == 0 {
            return Err("result limits must be greater than zero".to_string());
        }
        if self.stream.max_concurrent == 0 {
            return Err("stream.max_concurrent must be greater than zero".to_string());
        }
        if self.stream.keywords.is_empty() {
            return Err("stream.keywords must not be empty".to_string());
        }
        Ok(())
    }
}
