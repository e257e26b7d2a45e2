//! Bounded retry with linear backoff.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::FetchError;

/// How often, and how patiently, a failing reload is repeated.
///
/// ```rust
/// # use imagepool::retry::RetryPolicy;
/// # use std::time::Duration;
/// let policy = RetryPolicy::new()
///     .max_attempts(3)
///     .interval(Duration::from_secs(1));
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts including the first one. Default: 3.
    pub max_attempts: u32,
    /// Backoff unit; the wait after the n-th failure is `n * interval`.
    /// Default: 1s.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Delay after the `failed`-th failed attempt (1-indexed).
    pub fn delay_for_attempt(&self, failed: u32) -> Duration {
        self.interval.saturating_mul(failed)
    }
}

/// Run `f` until it succeeds, fails permanently, or the attempts run out.
///
/// Only errors classified by [`FetchError::is_transient`] are retried; the
/// last of them is wrapped in [`FetchError::ExhaustedRetries`].
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: &str, mut f: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut failed = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                failed += 1;
                if failed >= attempts {
                    warn!(operation, attempts, error = %err, "giving up");
                    return Err(FetchError::ExhaustedRetries {
                        attempts,
                        source: Box::new(err),
                    });
                }

                let delay = policy.delay_for_attempt(failed);
                warn!(
                    operation,
                    attempt = failed,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn unavailable() -> FetchError {
        FetchError::StoreUnavailable(StoreError::Query("down".into()))
    }

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::new().interval(Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let started = Instant::now();

        let result = with_retry(&RetryPolicy::default(), "test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(unavailable())
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s after the first failure, 2s after the second.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_wraps_last_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = with_retry(&RetryPolicy::default(), "test", || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::EmptySample { collection: format!("attempt-{n}") })
        })
        .await;

        match result {
            Err(FetchError::ExhaustedRetries { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert!(
                    matches!(*source, FetchError::EmptySample { ref collection } if collection == "attempt-2")
                );
            }
            other => panic!("expected ExhaustedRetries, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = with_retry(&RetryPolicy::default(), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::UnknownCategory { key: "zzz".into() })
        })
        .await;

        assert!(matches!(result, Err(FetchError::UnknownCategory { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
