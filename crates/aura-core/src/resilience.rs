//! Retry with exponential backoff and full jitter.
//!
//! [`invoke`] wraps any zero-argument fallible async operation. Failures are
//! classified by the policy; non-retryable errors propagate unmodified after a
//! single attempt, retryable ones are retried after a backoff sleep until the
//! attempt cap is reached, at which point [`Error::RetryExhausted`] wraps the
//! last cause.
//!
//! ```rust,no_run
//! use aura_core::resilience::{invoke, RetryPolicy};
//!
//! # async fn demo() -> aura_core::Result<()> {
//! let policy = RetryPolicy::default();
//! let value: u32 = invoke(&policy, || async { Ok(42) }).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Error classifier deciding whether a failure may be retried
pub type RetryClassifier = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Backoff policy for [`invoke`].
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter: bool,
    classifier: RetryClassifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
            backoff_factor: 2.0,
            jitter: true,
            classifier: Arc::new(Error::is_retryable),
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replace the default classifier
    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Whether the policy allows retrying this error
    pub fn is_retryable(&self, error: &Error) -> bool {
        (self.classifier)(error)
    }

    /// Pre-jitter delay before retry number `attempt` (1-based):
    /// `min(max_delay, initial_delay * backoff_factor^(attempt-1))`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        // 0 * inf would be NaN at high attempts
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Actual sleep before retry number `attempt`, with full jitter applied.
    pub fn sleep_duration(&self, attempt: u32) -> Duration {
        let delay = self.backoff_delay(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let secs = rand::thread_rng().gen_range(0.0..=delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Run `operation` under `policy`.
pub async fn invoke<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !policy.is_retryable(&err) {
            debug!(attempt, error = %err, "non-retryable failure");
            return Err(err);
        }

        if attempt >= max_attempts {
            warn!(attempts = attempt, error = %err, "retries exhausted");
            return Err(Error::RetryExhausted {
                attempts: attempt,
                source: Box::new(err),
            });
        }

        let delay = policy.sleep_duration(attempt);
        warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying after failure"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_delays(Duration::from_millis(1), Duration::from_millis(4))
            .with_max_attempts(3)
    }

    #[test]
    fn test_backoff_bounds() {
        let policy = RetryPolicy::default();
        for k in 1..=10u32 {
            let expected = Duration::from_millis(1000 * 2u64.pow(k - 1)).min(Duration::from_millis(32_000));
            assert_eq!(policy.backoff_delay(k), expected, "attempt {k}");
            for _ in 0..20 {
                assert!(policy.sleep_duration(k) <= expected);
            }
        }
    }

    #[test]
    fn test_backoff_without_jitter_is_exact() {
        let policy = RetryPolicy::default().with_jitter(false);
        assert_eq!(policy.sleep_duration(3), Duration::from_secs(4));
        assert_eq!(policy.sleep_duration(50), Duration::from_secs(32));
    }

    #[test]
    fn test_zero_initial_delay_never_waits() {
        let policy = RetryPolicy::default()
            .with_delays(Duration::ZERO, Duration::from_secs(32))
            .with_jitter(false);
        for attempt in [1, 2, 100, 2_000, u32::MAX] {
            assert_eq!(policy.backoff_delay(attempt), Duration::ZERO, "attempt {attempt}");
        }
    }

    #[test]
    fn test_first_success_returns_immediately() {
        let policy = RetryPolicy::default();
        let value = tokio_test::assert_ok!(tokio_test::block_on(invoke(&policy, || async { Ok::<_, Error>(7) })));
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = invoke(&fast_policy(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::backend(503, "unavailable"))
            } else {
                Ok("done")
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fail_fast_on_non_retryable() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default().with_delays(Duration::from_secs(10), Duration::from_secs(10));
        let start = Instant::now();

        let err = invoke(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::backend(401, "unauthorized"))
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.status_code(), Some(401));
        assert!(!err.is_retry_exhausted());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_exhaustion_wraps_last_cause() {
        let calls = AtomicU32::new(0);
        let err = invoke(&fast_policy(), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::network(format!("reset {n}")))
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempts(), Some(3));
        assert!(err.to_string().contains("reset 2"));
    }

    #[tokio::test]
    async fn test_custom_classifier() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy().with_classifier(|_| false);
        let err = invoke(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::backend(503, "unavailable"))
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.status_code(), Some(503));
    }
}
