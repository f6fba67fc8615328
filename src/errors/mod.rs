/// Error taxonomy for the discovery core
///
/// Upstream unreliability (timeouts, HTTP failures, bad payloads) is represented here so
/// the cache and the adapters can reason about it, but provider adapters never let these
/// escape: they log, report to the health registry, and return an empty result.
///
/// `FeedError` is `Clone` because a single failed fetch is shared by every coalesced
/// waiter and is also stored in the negative-cache slot.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("Operation timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Upstream returned HTTP {status} ({endpoint})")]
    Upstream { status: u16, endpoint: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FeedError {
    pub fn timeout(after: std::time::Duration) -> Self {
        FeedError::Timeout {
            after_ms: after.as_millis() as u64,
        }
    }

    pub fn unavailable(provider: &str, reason: impl Into<String>) -> Self {
        FeedError::ProviderUnavailable {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FeedError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FeedError::Cancelled)
    }

    /// HTTP status carried by an upstream failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            FeedError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Failures worth another attempt: timeouts, rate limiting and server errors.
    /// Cancellation is never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            FeedError::Timeout { .. } => true,
            FeedError::Upstream { status, .. } => *status == 429 || (500..600).contains(status),
            FeedError::Network(_) => true,
            _ => false,
        }
    }

    /// Errors that indicate a caller bug rather than upstream trouble
    pub fn is_programming_error(&self) -> bool {
        matches!(self, FeedError::InvalidArgument(_) | FeedError::Config(_))
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Parse(err.to_string())
    }
}

pub type FeedResult<T> = Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timeout_and_cancel_are_distinct() {
        let timeout = FeedError::timeout(Duration::from_millis(8_000));
        assert!(timeout.is_timeout());
        assert!(!timeout.is_cancelled());
        assert!(FeedError::Cancelled.is_cancelled());
        assert_ne!(timeout, FeedError::Cancelled);
        assert_eq!(timeout.to_string(), "Operation timed out after 8000ms");
    }

    #[test]
    fn test_retryable_classification() {
        let rate_limited = FeedError::Upstream {
            status: 429,
            endpoint: "latest/dex/search".to_string(),
        };
        let not_found = FeedError::Upstream {
            status: 404,
            endpoint: "latest/dex/search".to_string(),
        };
        assert!(rate_limited.is_retryable());
        assert_eq!(rate_limited.status(), Some(429));
        assert!(!not_found.is_retryable());
        assert!(!FeedError::Cancelled.is_retryable());
        assert!(!FeedError::Parse("bad json".to_string()).is_retryable());
    }
}
