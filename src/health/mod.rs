//! Per-provider health tracking (soft circuit breaker)
//!
//! Unlike a hard breaker there is no open state: a degraded provider is still queried,
//! the aggregator just starts it later (`extra_delay`). Counters decay when a provider
//! has been idle for the decay window so an old incident does not penalize it forever.

use crate::config::HealthConfig;
use crate::logger::{self, LogTag};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;

/// Health counters of one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderHealthState {
    pub ok_count: u32,
    pub fail_count: u32,
    /// Degraded while `now < degraded_until`
    pub degraded_until: Option<Instant>,
    /// Last success/failure report; `None` until the first one
    pub last_change_at: Option<Instant>,
}

impl Default for ProviderHealthState {
    fn default() -> Self {
        Self {
            ok_count: 0,
            fail_count: 0,
            degraded_until: None,
            last_change_at: None,
        }
    }
}

impl ProviderHealthState {
    fn is_degraded_at(&self, now: Instant) -> bool {
        self.degraded_until.map_or(false, |until| now < until)
    }
}

/// Read-only view of one provider for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub ok: u32,
    pub fail: u32,
    pub degraded: bool,
    pub degraded_until: Option<DateTime<Utc>>,
    pub extra_delay_ms: u64,
    pub last_change: Option<DateTime<Utc>>,
}

/// Registry of provider health, shared by the aggregator and the adapters
pub struct HealthRegistry {
    config: HealthConfig,
    states: Mutex<HashMap<String, ProviderHealthState>>,
}

impl HealthRegistry {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Record a successful call
    pub fn on_success(&self, name: &str) {
        let now = Instant::now();
        let mut states = self.states.lock();
        let state = states.entry(name.to_string()).or_default();
        self.decay(state, now);

        state.ok_count = state.ok_count.saturating_add(1);
        state.fail_count = state.fail_count.saturating_sub(1);
        state.last_change_at = Some(now);

        if state.ok_count >= self.config.recovery_successes && state.degraded_until.is_some() {
            let was_degraded = state.is_degraded_at(now);
            state.degraded_until = None;
            if was_degraded {
                logger::info(
                    LogTag::Health,
                    &format!("{} recovered after {} successes", name, state.ok_count),
                );
            }
        }
    }

    /// Record a failed call (timeout, HTTP error, bad payload)
    pub fn on_failure(&self, name: &str) {
        let now = Instant::now();
        let mut states = self.states.lock();
        let state = states.entry(name.to_string()).or_default();
        self.decay(state, now);

        state.fail_count = state.fail_count.saturating_add(1);
        state.ok_count = state.ok_count.saturating_sub(1);
        state.last_change_at = Some(now);

        if state.fail_count >= self.config.degrade_after {
            if !state.is_degraded_at(now) {
                // Recovery has to be earned by successes after this point
                state.ok_count = 0;
                logger::warning(
                    LogTag::Health,
                    &format!(
                        "{} degraded after {} failures (cool-off {}ms)",
                        name, state.fail_count, self.config.cool_off_ms
                    ),
                );
            }
            state.degraded_until = Some(now + self.config.cool_off());
        }
    }

    pub fn is_degraded(&self, name: &str) -> bool {
        let now = Instant::now();
        let mut states = self.states.lock();
        match states.get_mut(name) {
            Some(state) => {
                self.decay(state, now);
                state.is_degraded_at(now)
            }
            None => false,
        }
    }

    /// Additional stagger for a degraded provider, zero otherwise
    pub fn extra_delay(&self, name: &str) -> Duration {
        let now = Instant::now();
        let mut states = self.states.lock();
        match states.get_mut(name) {
            Some(state) => {
                self.decay(state, now);
                self.extra_delay_for(state, now)
            }
            None => Duration::ZERO,
        }
    }

    /// Copy of the raw counters, mostly for tests and debugging
    pub fn state(&self, name: &str) -> Option<ProviderHealthState> {
        self.states.lock().get(name).cloned()
    }

    /// Diagnostics view keyed by provider name
    pub fn snapshot(&self) -> BTreeMap<String, HealthSnapshot> {
        let now = Instant::now();
        let wall_now = Utc::now();
        let states = self.states.lock();
        states
            .iter()
            .map(|(name, state)| {
                let snapshot = HealthSnapshot {
                    ok: state.ok_count,
                    fail: state.fail_count,
                    degraded: state.is_degraded_at(now),
                    degraded_until: state
                        .degraded_until
                        .filter(|until| now < *until)
                        .map(|until| wall_now + to_chrono(until - now)),
                    extra_delay_ms: self.extra_delay_for(state, now).as_millis() as u64,
                    last_change: state
                        .last_change_at
                        .map(|at| wall_now - to_chrono(now.saturating_duration_since(at))),
                };
                (name.clone(), snapshot)
            })
            .collect()
    }

    fn extra_delay_for(&self, state: &ProviderHealthState, now: Instant) -> Duration {
        if !state.is_degraded_at(now) {
            return Duration::ZERO;
        }
        let over = (state.fail_count + 1).saturating_sub(self.config.degrade_after) as u64;
        let delay_ms = (self.config.backoff_step_ms * over).min(self.config.max_backoff_ms);
        Duration::from_millis(delay_ms)
    }

    /// Halve both counters when the provider has been idle past the decay window
    fn decay(&self, state: &mut ProviderHealthState, now: Instant) {
        let window = match self.config.decay() {
            Some(window) => window,
            None => return,
        };
        if let Some(last) = state.last_change_at {
            if now.saturating_duration_since(last) > window {
                state.ok_count /= 2;
                state.fail_count /= 2;
                state.last_change_at = Some(now);
            }
        }
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn registry(degrade_after: u32, cool_off_ms: u64) -> HealthRegistry {
        HealthRegistry::new(HealthConfig {
            degrade_after,
            cool_off_ms,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_degrades_after_threshold_and_cools_off() {
        let health = registry(2, 60_000);

        health.on_failure("birdeye");
        assert!(!health.is_degraded("birdeye"));
        assert_eq!(health.extra_delay("birdeye"), Duration::ZERO);

        health.on_failure("birdeye");
        assert!(health.is_degraded("birdeye"));
        assert_eq!(health.extra_delay("birdeye"), Duration::from_millis(300));

        advance(Duration::from_millis(60_001)).await;
        assert!(!health.is_degraded("birdeye"));
        assert_eq!(health.extra_delay("birdeye"), Duration::ZERO);

        health.on_success("birdeye");
        assert!(!health.is_degraded("birdeye"));
        let state = health.state("birdeye").unwrap();
        assert_eq!(state.fail_count, 1);
        assert_eq!(state.ok_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successes_clear_degradation_early() {
        let health = registry(2, 120_000);
        for _ in 0..5 {
            health.on_success("jupiter");
        }
        health.on_failure("jupiter");
        health.on_failure("jupiter");
        assert!(health.is_degraded("jupiter"));

        // A long success history does not count toward recovery
        health.on_success("jupiter");
        assert!(health.is_degraded("jupiter"));
        health.on_success("jupiter");
        assert!(!health.is_degraded("jupiter"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_extra_delay_grows_and_caps() {
        let health = registry(2, 120_000);
        for _ in 0..4 {
            health.on_failure("dexscreener");
        }
        // fail=4 -> over=3
        assert_eq!(health.extra_delay("dexscreener"), Duration::from_millis(900));

        for _ in 0..20 {
            health.on_failure("dexscreener");
        }
        assert_eq!(health.extra_delay("dexscreener"), Duration::from_millis(2_400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_counters_decay() {
        let health = registry(3, 1_000);
        health.on_failure("solana-rpc");
        health.on_failure("solana-rpc");
        health.on_success("solana-rpc");
        health.on_success("solana-rpc");
        health.on_success("solana-rpc");
        health.on_success("solana-rpc");
        assert_eq!(health.state("solana-rpc").unwrap().ok_count, 4);

        advance(Duration::from_millis(180_001)).await;
        assert!(!health.is_degraded("solana-rpc"));
        let state = health.state("solana-rpc").unwrap();
        assert_eq!(state.ok_count, 2);
        assert_eq!(state.fail_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_provider_is_healthy() {
        let health = registry(2, 60_000);
        assert!(!health.is_degraded("nobody"));
        assert_eq!(health.extra_delay("nobody"), Duration::ZERO);
        assert!(health.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_reports_degradation() {
        let health = registry(2, 60_000);
        health.on_failure("birdeye");
        health.on_failure("birdeye");
        health.on_success("dexscreener");

        let snapshot = health.snapshot();
        let birdeye = &snapshot["birdeye"];
        assert!(birdeye.degraded);
        assert_eq!(birdeye.fail, 2);
        assert_eq!(birdeye.extra_delay_ms, 300);
        assert!(birdeye.degraded_until.is_some());

        let ds = &snapshot["dexscreener"];
        assert!(!ds.degraded);
        assert_eq!(ds.ok, 1);
        assert!(ds.last_change.is_some());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["birdeye"]["extraDelayMs"], 300);
    }
}
