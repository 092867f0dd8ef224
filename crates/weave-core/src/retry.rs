//! Retry policy
//!
//! A `RetryPolicy` is captured once from the channel configuration and copied
//! into every request built afterwards. Changing the channel configuration
//! later does not affect requests built from an existing snapshot.

use std::future::Future;
use std::time::Duration;

use crate::config::ChannelConfig;
use crate::error::Result;

/// Retry budget for a single operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    num_retries: u32,
    retry_sleep: Duration,
}

impl RetryPolicy {
    pub fn new(num_retries: u32, retry_sleep: Duration) -> Self {
        Self {
            num_retries,
            retry_sleep,
        }
    }

    /// Single attempt, no sleep
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn num_retries(&self) -> u32 {
        self.num_retries
    }

    pub fn retry_sleep(&self) -> Duration {
        self.retry_sleep
    }

    /// Total number of attempts made by `run`; zero is treated as one
    pub fn attempts(&self) -> u32 {
        self.num_retries.max(1)
    }

    /// Copy with a different attempt budget
    pub fn with_num_retries(mut self, num_retries: u32) -> Self {
        self.num_retries = num_retries;
        self
    }

    /// Copy with a different sleep interval
    pub fn with_retry_sleep(mut self, retry_sleep: Duration) -> Self {
        self.retry_sleep = retry_sleep;
        self
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// Sleeps `retry_sleep` between attempts. On exhaustion the error of the
    /// last attempt is returned as-is.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(operation, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < attempts => {
                    tracing::warn!(
                        operation,
                        attempt,
                        attempts,
                        recoverable = err.is_recoverable(),
                        "attempt failed: {}, retrying in {:?}",
                        err,
                        self.retry_sleep
                    );
                    tokio::time::sleep(self.retry_sleep).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(operation, attempts, "giving up: {}", err);
                    return Err(err);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ChannelConfig::default())
    }
}

impl From<&ChannelConfig> for RetryPolicy {
    fn from(config: &ChannelConfig) -> Self {
        Self::new(config.num_retries, config.retry_sleep())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WeaveError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_zero_retries_means_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts(), 1);
        assert_eq!(RetryPolicy::new(4, Duration::ZERO).attempts(), 4);
    }

    #[test]
    fn test_from_channel_config() {
        let config = ChannelConfig {
            num_retries: 7,
            retry_sleep_ms: 250,
            ..ChannelConfig::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.num_retries(), 7);
        assert_eq!(policy.retry_sleep(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_then_succeeds() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let start = tokio::time::Instant::now();

        let result = policy
            .run("test", move |_| async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(WeaveError::Discovery("flaky".into()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_last_error() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10));

        let result: Result<()> = policy
            .run("test", |attempt| async move {
                Err(WeaveError::Discovery(format!("attempt {}", attempt)))
            })
            .await;

        assert_eq!(result, Err(WeaveError::Discovery("attempt 2".into())));
    }
}
