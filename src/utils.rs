/// Timing helpers shared by the cache, the adapters and the schedulers
///
/// Every suspension point races the caller's cancellation token. A timeout expiring
/// yields `FeedError::Timeout`, the token firing yields `FeedError::Cancelled`.
use crate::errors::{FeedError, FeedResult};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run `fut` under its own timeout, aborting early when `cancel` fires.
///
/// A zero timeout disables the timer. Dropping the future on either branch aborts any
/// in-flight request it owns.
pub async fn with_timeout<T, F>(
    fut: F,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
) -> FeedResult<T>
where
    F: Future<Output = FeedResult<T>>,
{
    if cancel.map_or(false, |c| c.is_cancelled()) {
        return Err(FeedError::Cancelled);
    }

    let timed = async {
        if timeout.is_zero() {
            fut.await
        } else {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => Err(FeedError::timeout(timeout)),
            }
        }
    };

    match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(FeedError::Cancelled),
                result = timed => result,
            }
        }
        None => timed.await,
    }
}

/// Sleep for `duration` unless cancelled first. Returns `false` when cancelled.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires() {
        let result: FeedResult<()> = with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(20)).await;
                Ok(())
            },
            Duration::from_secs(8),
            None,
        )
        .await;
        assert_eq!(result, Err(FeedError::Timeout { after_ms: 8_000 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_distinct_from_timeout() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result: FeedResult<u32> = with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            },
            Duration::from_secs(8),
            Some(&token),
        )
        .await;
        assert_eq!(result, Err(FeedError::Cancelled));
    }

    #[tokio::test]
    async fn test_already_cancelled_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let result = with_timeout(async { Ok(7) }, Duration::ZERO, Some(&token)).await;
        assert_eq!(result, Err(FeedError::Cancelled));
        assert!(!sleep_or_cancel(Duration::from_secs(1), &token).await);
    }
}
