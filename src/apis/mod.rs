/// Upstream API clients
///
/// Raw HTTP access only: typed responses, rate limits, retries and error mapping.
/// Mapping into `TokenRecord` / `TokenDetails` happens in the providers and lookup.
pub mod birdeye;
pub mod client;
pub mod dexscreener;
pub mod geckoterminal;
pub mod jupiter;
pub mod manager;
pub mod solana_rpc;

pub use client::{ApiStats, HttpClient, RateLimiter, RetryPolicy};
pub use manager::{ApiManager, ApiStatsReport};
