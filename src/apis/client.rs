/// Base HTTP client with rate limiting, retries and error mapping
///
/// Every upstream client owns one `HttpClient`. Requests go through `attempt_json`, which
/// maps transport errors to `Network`/`Timeout`, non-2xx responses to `Upstream` and
/// decode failures to `Parse`, while racing the caller's cancellation token.
use crate::errors::{FeedError, FeedResult};
use crate::logger::{self, LogTag};
use crate::utils::{sleep_or_cancel, with_timeout};
use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Rate limiter for API clients
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
    max_per_minute: usize,
}

impl RateLimiter {
    pub fn new(max_per_minute: usize) -> Self {
        let min_interval = if max_per_minute > 0 {
            Duration::from_secs_f64(60.0 / max_per_minute as f64)
        } else {
            Duration::ZERO
        };

        Self {
            semaphore: Arc::new(Semaphore::new(1)), // Only 1 request in the send phase
            last_request: Mutex::new(None),
            min_interval,
            max_per_minute,
        }
    }

    /// Wait until we can make a request (respects rate limits)
    pub async fn acquire(&self) -> FeedResult<RateLimitGuard> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| FeedError::Network(format!("rate limiter closed: {}", e)))?;

        if !self.min_interval.is_zero() {
            let mut last = self.last_request.lock().await;
            if let Some(last_time) = *last {
                let elapsed = last_time.elapsed();
                if elapsed < self.min_interval {
                    tokio::time::sleep(self.min_interval - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        Ok(RateLimitGuard { _permit: permit })
    }

    pub fn max_per_minute(&self) -> usize {
        self.max_per_minute
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// RAII guard returned by [`RateLimiter::acquire`]
pub struct RateLimitGuard {
    _permit: OwnedSemaphorePermit,
}

/// Exponential backoff for retryable failures (timeouts, 429, 5xx)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        max_retries: 0,
        base_backoff: Duration::ZERO,
    };

    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
        }
    }

    /// `base * 2^(attempt-1)`, scaled by a random factor in [0.5, 1.5)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1));
        exp.mul_f64(rand::thread_rng().gen_range(0.5..1.5))
    }
}

/// Request counters for diagnostics
#[derive(Debug, Default)]
pub struct ApiStatsTracker {
    total: AtomicU64,
    failed: AtomicU64,
    total_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStats {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub average_response_ms: f64,
}

impl ApiStatsTracker {
    pub fn record_request(&self, success: bool, elapsed: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.total_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
        if !success {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_stats(&self) -> ApiStats {
        let total = self.total.load(Ordering::Relaxed);
        let total_ms = self.total_ms.load(Ordering::Relaxed);
        ApiStats {
            total_requests: total,
            failed_requests: self.failed.load(Ordering::Relaxed),
            average_response_ms: if total == 0 {
                0.0
            } else {
                total_ms as f64 / total as f64
            },
        }
    }
}

/// One failed attempt; `retry_after` comes from the response headers when present
struct Failure {
    error: FeedError,
    retry_after: Option<Duration>,
}

impl From<FeedError> for Failure {
    fn from(error: FeedError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// HTTP client wrapper with timeout, rate limit and retry logic
pub struct HttpClient {
    client: Client,
    name: &'static str,
    timeout: Duration,
    limiter: RateLimiter,
    stats: ApiStatsTracker,
}

impl HttpClient {
    pub fn new(
        client: Client,
        name: &'static str,
        timeout: Duration,
        max_per_minute: usize,
    ) -> Self {
        Self {
            client,
            name,
            timeout,
            limiter: RateLimiter::new(max_per_minute),
            stats: ApiStatsTracker::default(),
        }
    }

    /// Shared `reqwest` client with rustls and a crate user agent
    pub fn build_reqwest() -> FeedResult<Client> {
        Client::builder()
            .user_agent(concat!("tokenfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FeedError::Config(format!("Failed to create HTTP client: {}", e)))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn stats(&self) -> ApiStats {
        self.stats.get_stats()
    }

    /// Single GET attempt decoded as JSON
    pub async fn get_json<T>(
        &self,
        endpoint: &str,
        builder: RequestBuilder,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<T>
    where
        T: DeserializeOwned,
    {
        self.attempt_json(endpoint, builder, cancel)
            .await
            .map_err(|f| f.error)
    }

    /// JSON POST (used by JSON-RPC); never retried
    pub async fn post_json<B, T>(
        &self,
        endpoint: &str,
        url: &str,
        body: &B,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.client.post(url).json(body);
        self.attempt_json(endpoint, builder, cancel)
            .await
            .map_err(|f| f.error)
    }

    /// GET with retries for retryable failures, honoring `Retry-After`
    pub async fn get_json_retrying<T, B>(
        &self,
        endpoint: &str,
        build: B,
        policy: RetryPolicy,
        cancel: Option<&CancellationToken>,
    ) -> FeedResult<T>
    where
        T: DeserializeOwned,
        B: Fn() -> RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let failure = match self.attempt_json(endpoint, build(), cancel).await {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            if !failure.error.is_retryable() || attempt > policy.max_retries {
                return Err(failure.error);
            }

            let wait = failure
                .retry_after
                .unwrap_or_else(|| policy.backoff(attempt));
            logger::debug(
                LogTag::Api,
                &format!(
                    "[{}] {} failed ({}), retry {}/{} in {}ms",
                    self.name,
                    endpoint,
                    failure.error,
                    attempt,
                    policy.max_retries,
                    wait.as_millis()
                ),
            );

            match cancel {
                Some(token) => {
                    if !sleep_or_cancel(wait, token).await {
                        return Err(FeedError::Cancelled);
                    }
                }
                None => tokio::time::sleep(wait).await,
            }
        }
    }

    async fn attempt_json<T>(
        &self,
        endpoint: &str,
        builder: RequestBuilder,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, Failure>
    where
        T: DeserializeOwned,
    {
        let guard = with_timeout(self.limiter.acquire(), Duration::ZERO, cancel).await?;

        let start = Instant::now();
        let sent = with_timeout(
            async { builder.send().await.map_err(|e| self.map_transport(e)) },
            self.timeout,
            cancel,
        )
        .await;
        drop(guard);

        let response = match sent {
            Ok(response) => response,
            Err(err) => {
                self.stats.record_request(false, start.elapsed());
                return Err(err.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.stats.record_request(false, start.elapsed());
            let retry_after = parse_retry_after(response.headers());
            logger::debug(
                LogTag::Api,
                &format!("[{}] {} returned HTTP {}", self.name, endpoint, status),
            );
            return Err(Failure {
                error: FeedError::Upstream {
                    status: status.as_u16(),
                    endpoint: endpoint.to_string(),
                },
                retry_after,
            });
        }

        let remaining = self
            .timeout
            .saturating_sub(start.elapsed())
            .max(Duration::from_millis(1));
        let body = with_timeout(
            async { response.bytes().await.map_err(|e| self.map_transport(e)) },
            remaining,
            cancel,
        )
        .await;

        let result = body.and_then(|bytes| {
            serde_json::from_slice::<T>(&bytes)
                .map_err(|e| FeedError::Parse(format!("{}: {}", endpoint, e)))
        });
        self.stats.record_request(result.is_ok(), start.elapsed());
        result.map_err(Failure::from)
    }

    fn map_transport(&self, err: reqwest::Error) -> FeedError {
        if err.is_timeout() {
            FeedError::timeout(self.timeout)
        } else if let Some(status) = err.status() {
            FeedError::Upstream {
                status: status.as_u16(),
                endpoint: self.name.to_string(),
            }
        } else {
            FeedError::Network(err.to_string())
        }
    }
}

/// `Retry-After` in delta-seconds form; HTTP-date values are ignored
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_backoff_grows_with_jitter() {
        let policy = RetryPolicy::new(4, Duration::from_millis(600));
        for _ in 0..200 {
            let first = policy.backoff(1);
            assert!(first >= Duration::from_millis(300) && first < Duration::from_millis(900));
            let third = policy.backoff(3);
            assert!(third >= Duration::from_millis(1_200) && third < Duration::from_millis(3_600));
        }
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(2)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(60);
        assert_eq!(limiter.min_interval(), Duration::from_secs(1));

        let start = Instant::now();
        drop(limiter.acquire().await.unwrap());
        drop(limiter.acquire().await.unwrap());
        drop(limiter.acquire().await.unwrap());
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[test]
    fn test_stats_average() {
        let stats = ApiStatsTracker::default();
        stats.record_request(true, Duration::from_millis(100));
        stats.record_request(false, Duration::from_millis(300));
        let snapshot = stats.get_stats();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.average_response_ms, 200.0);
    }
}
