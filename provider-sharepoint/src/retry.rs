//! Rate-limit aware retry around Graph calls
//!
//! Every remote call made by the connector goes through
//! [`RetryingExecutor::execute`]. Only throttling (429) and service
//! unavailable (503) responses are retried; anything else is returned to the
//! caller on the first failure.

use bridge_traits::time::{Sleeper, TokioSleeper};
use core_runtime::config::ConnectorConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::Result;

/// Retry ceiling and backoff shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base: Duration::from_secs(5),
            cap: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ConnectorConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base: config.backoff_base,
            cap: config.backoff_cap,
        }
    }

    /// Delay before retrying after the 0-indexed `attempt` failed, when the
    /// server did not say how long to wait: `min(cap, 2^attempt * base)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.cap)
    }
}

/// Executes remote calls under a [`RetryPolicy`].
pub struct RetryingExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryingExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or the
    /// retry ceiling is reached.
    ///
    /// `operation` names the call in logs.
    ///
    /// ```ignore
    /// let page = retry
    ///     .execute("list_drives", || graph.list_drives_page(&site.id, None))
    ///     .await?;
    /// ```
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            if attempt >= self.policy.max_retries {
                if err.status() == Some(429) {
                    error!(
                        operation = operation,
                        attempts = attempt + 1,
                        "Rate limit retry exhausted"
                    );
                }
                return Err(err);
            }

            warn!(
                operation = operation,
                status = err.status().unwrap_or_default(),
                attempt = attempt + 1,
                max_attempts = self.policy.max_retries + 1,
                "Throttled, sleeping and retrying"
            );

            let delay = err
                .retry_after()
                .unwrap_or_else(|| self.policy.backoff(attempt));
            info!(operation = operation, delay_secs = delay.as_secs(), "Sleeping before retry");
            self.sleeper.sleep(delay).await;

            attempt += 1;
        }
    }
}

impl Default for RetryingExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SharePointError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn throttled(status: u16, retry_after: Option<u64>) -> SharePointError {
        SharePointError::Api {
            status,
            message: "throttled".to_string(),
            retry_after: retry_after.map(Duration::from_secs),
        }
    }

    fn executor() -> (RetryingExecutor, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let executor = RetryingExecutor::with_sleeper(RetryPolicy::default(), sleeper.clone());
        (executor, sleeper)
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff(0), Duration::from_secs(5));
        assert_eq!(policy.backoff(1), Duration::from_secs(10));
        assert_eq!(policy.backoff(2), Duration::from_secs(20));
        assert_eq!(policy.backoff(3), Duration::from_secs(30));
        assert_eq!(policy.backoff(40), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_success_needs_no_sleep() {
        let (executor, sleeper) = executor();

        let value = executor.execute("op", || async { Ok(42) }).await.unwrap();

        assert_eq!(value, 42);
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_after_is_honoured_exactly() {
        let (executor, sleeper) = executor();
        let calls = AtomicU32::new(0);

        let value = executor
            .execute("get_content", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(throttled(429, Some(7)))
                    } else {
                        Ok("payload")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "payload");
        assert_eq!(*sleeper.sleeps.lock().unwrap(), vec![Duration::from_secs(7)]);
    }

    #[tokio::test]
    async fn test_service_unavailable_uses_exponential_backoff() {
        let (executor, sleeper) = executor();
        let calls = AtomicU32::new(0);

        executor
            .execute("list_drives", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(throttled(503, None))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        // attempt index 1 sleeps min(30, 2^1 * 5) = 10s
        assert_eq!(
            *sleeper.sleeps.lock().unwrap(),
            vec![Duration::from_secs(5), Duration::from_secs(10)]
        );
    }

    #[tokio::test]
    async fn test_persistent_throttling_propagates_after_three_retries() {
        let (executor, sleeper) = executor();
        let calls = AtomicU32::new(0);

        let err = executor
            .execute("list_children", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(throttled(429, None)) }
            })
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(429));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(sleeper.sleeps.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let (executor, sleeper) = executor();
        let calls = AtomicU32::new(0);

        let err = executor
            .execute("resolve_site", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(throttled(404, None)) }
            })
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_retries_fails_fast() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        let executor = RetryingExecutor::with_sleeper(policy, sleeper.clone());

        let result = executor
            .execute("op", || async { Err::<(), _>(throttled(503, None)) })
            .await;

        assert!(result.is_err());
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_sleeper_waits_on_tokio_clock() {
        let executor = RetryingExecutor::default();
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        executor
            .execute("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(throttled(429, Some(2)))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
