//! Retry-with-backoff for transport calls.
//!
//! ```text
//! Attempt(0) ─fail, retryable, n < max─▶ wait ─▶ Attempt(1) ─▶ … ─▶ Success | Exhausted
//!      └─fail, not retryable─▶ error returned as-is
//! ```
//!
//! The wait before retry `n` (0-based) is `interval × 2ⁿ`, capped at
//! `interval × 32`. Total attempts are `max_retries + 1`.

use std::future::Future;
use std::time::Duration;

use courier_config::ClientConfig;

use crate::error::{Error, Result};

/// Multiplier bounding the longest wait relative to the first one.
pub const BACKOFF_CEILING_FACTOR: u32 = 32;

/// How often, and how patiently, a failed call is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub interval: Duration,
    /// Upper bound for any single wait.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// Create a policy with exponential backoff from `interval`.
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
            max_backoff: interval.saturating_mul(BACKOFF_CEILING_FACTOR),
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// The client-level policy described by a config.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.max_retries, config.retry_interval)
    }

    /// Total attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.interval.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Names the call being retried, for logs and the exhausted-retry error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    /// Service id.
    pub service: String,
    /// Remote method name.
    pub method: String,
}

impl CallTarget {
    /// Create a call target.
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
        }
    }
}

impl std::fmt::Display for CallTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.service, self.method)
    }
}

/// Run `op` under `policy`.
///
/// `op` receives the 0-based attempt number. Non-retryable errors return
/// immediately; once the budget is spent the last error is wrapped in
/// [`Error::RetriesExhausted`].
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, target: &CallTarget, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => e,
        };

        if attempt >= policy.max_retries {
            return Err(Error::RetriesExhausted {
                service: target.service.clone(),
                method: target.method.clone(),
                attempts: attempt + 1,
                source: Box::new(err),
            });
        }

        let backoff = policy.backoff(attempt);
        tracing::warn!(
            service = %target.service,
            method = %target.method,
            attempt = attempt + 1,
            max_retries = policy.max_retries,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "call failed, retrying"
        );
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn target() -> CallTarget {
        CallTarget::new("svc", "m")
    }

    #[test]
    fn test_backoff_is_monotonic_and_bounded() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100));
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));

        let mut previous = Duration::ZERO;
        for retry in 0..64 {
            let wait = policy.backoff(retry);
            assert!(wait >= previous);
            assert!(wait <= Duration::from_millis(3200));
            previous = wait;
        }
    }

    #[test]
    fn test_from_config() {
        let config = ClientConfig::default()
            .with_max_retries(2)
            .with_retry_interval(Duration::from_millis(50));
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.interval, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&RetryPolicy::new(3, Duration::from_millis(1)), &target(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Error>(5) }
        })
        .await;
        assert_eq!(result.unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> =
            with_retry(&RetryPolicy::new(2, Duration::from_millis(1)), &target(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::transport("connection refused")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(Error::RetriesExhausted {
                attempts, source, ..
            }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, Error::Transport(_)));
            }
            other => panic!("expected exhausted error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_retries_still_wraps() {
        let result: Result<()> = with_retry(&RetryPolicy::none(), &target(), |_| async {
            Err(Error::transport("reset"))
        })
        .await;
        assert!(matches!(
            result,
            Err(Error::RetriesExhausted { attempts: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_non_retryable_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<()> =
            with_retry(&RetryPolicy::new(5, Duration::from_millis(1)), &target(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::remote("ERROR", "rejected", None)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(Error::Remote { .. })));
    }

    #[tokio::test]
    async fn test_recovers_and_waits_between_attempts() {
        let start = Instant::now();
        let result = with_retry(
            &RetryPolicy::new(2, Duration::from_millis(20)),
            &target(),
            |attempt| async move {
                if attempt < 2 {
                    Err(Error::transport("flaky"))
                } else {
                    Ok(attempt)
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        // 20ms + 40ms of backoff
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
