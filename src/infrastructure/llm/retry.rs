//! Exponential backoff around single model call attempts

use super::errors::ModelApiError;
use crate::domain::errors::ModelCallError;
use crate::domain::models::RetryConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Delay before retry number `attempt` (0-based): `initial * 2^attempt`, capped at `max`.
pub fn backoff_delay(attempt: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Duration {
    let multiplier = 2_u64.checked_pow(attempt).unwrap_or(u64::MAX);
    let backoff_ms = initial_backoff_ms.saturating_mul(multiplier);
    Duration::from_millis(backoff_ms.min(max_backoff_ms))
}

/// Retry policy configuration for handling transient errors
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    max_retries: u32,
    /// Initial backoff duration in milliseconds
    initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    max_backoff_ms: u64,
    /// Retry errors that are neither transient nor permanent
    retry_unclassified: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Example
    /// ```
    /// use cover_agent::infrastructure::llm::retry::RetryPolicy;
    ///
    /// let policy = RetryPolicy::new(3, 1_000, 10_000);
    /// assert_eq!(policy.max_attempts(), 4);
    /// ```
    pub const fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms,
            retry_unclassified: true,
        }
    }

    /// Policy from the `retry` config section
    pub const fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
            retry_unclassified: config.retry_unclassified,
        }
    }

    /// Whether unclassified failures are retried (default true)
    #[must_use]
    pub const fn with_retry_unclassified(mut self, retry_unclassified: bool) -> Self {
        self.retry_unclassified = retry_unclassified;
        self
    }

    /// Total attempts including the first
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Execute an operation with exponential backoff retry logic
    ///
    /// The last error is wrapped in a [`ModelCallError`] once the operation
    /// fails permanently or the retry budget is spent.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, ModelCallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ModelApiError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if self.should_retry(&err, attempt) {
                        let backoff = self.calculate_backoff(attempt);
                        warn!(
                            "Attempt {} failed: {}. Retrying in {:?}...",
                            attempt + 1,
                            err,
                            backoff
                        );

                        sleep(backoff).await;
                        attempt += 1;
                    } else {
                        if attempt >= self.max_retries {
                            warn!("Operation failed after {} attempts: {}", attempt + 1, err);
                        } else {
                            debug!("Permanent error, not retrying: {}", err);
                        }
                        return Err(ModelCallError::new(attempt + 1, err));
                    }
                }
            }
        }
    }

    fn should_retry(&self, err: &ModelApiError, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        err.is_transient() || (self.retry_unclassified && !err.is_permanent())
    }

    /// Calculate backoff duration for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        backoff_delay(attempt, self.initial_backoff_ms, self.max_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn http(status: StatusCode) -> ModelApiError {
        ModelApiError::Http {
            status,
            body: String::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Backoff
    // ---------------------------------------------------------------------

    #[test]
    fn test_backoff_doubles_until_cap() {
        let delays: Vec<u64> = (0..6)
            .map(|attempt| backoff_delay(attempt, 1_000, 10_000).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 10_000, 10_000]);
    }

    #[test]
    fn test_backoff_saturates_on_huge_attempts() {
        assert_eq!(
            backoff_delay(200, 1_000, 10_000),
            Duration::from_millis(10_000)
        );
    }

    // ---------------------------------------------------------------------
    // Retry loop
    // ---------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_three_server_errors_then_success() {
        let policy = RetryPolicy::new(3, 1_000, 10_000);
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();

        let result = policy
            .execute(|| {
                let attempts = Arc::clone(&attempts);
                async move {
                    let mut seen = attempts.lock().unwrap();
                    seen.push(start.elapsed());
                    if seen.len() <= 3 {
                        Err(http(StatusCode::SERVICE_UNAVAILABLE))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        let seen = attempts.lock().unwrap();
        let gaps: Vec<u128> = seen.windows(2).map(|w| (w[1] - w[0]).as_millis()).collect();
        assert_eq!(gaps, vec![1_000, 2_000, 4_000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let policy = RetryPolicy::new(2, 10, 100);
        let calls = AtomicU32::new(0);

        let err = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(http(StatusCode::TOO_MANY_REQUESTS)) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempts, 3);
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let policy = RetryPolicy::new(3, 10, 100);
        let calls = AtomicU32::new(0);

        let err = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(http(StatusCode::UNAUTHORIZED)) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclassified_errors_follow_policy() {
        let calls = AtomicU32::new(0);
        let permissive = RetryPolicy::new(2, 10, 100);
        let _ = permissive
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ModelApiError::Protocol("no choices".to_string())) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        calls.store(0, Ordering::SeqCst);
        let strict = RetryPolicy::new(2, 10, 100).with_retry_unclassified(false);
        let _ = strict
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ModelApiError::Protocol("no choices".to_string())) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
