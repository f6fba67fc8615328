pub mod aggregator;
pub mod apis;
pub mod arguments;
pub mod cache;
pub mod config;
pub mod context;
pub mod errors; // Structured error handling
pub mod feeds;
pub mod health;
pub mod logger;
pub mod lookup;
pub mod providers;
pub mod streaming;
pub mod tokens;
pub mod utils;

pub use context::FeedContext;
pub use errors::{FeedError, FeedResult};
pub use tokens::{SearchBatch, TokenDetails, TokenRecord};
