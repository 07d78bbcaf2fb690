//! Bounded retry for store write primitives
//!
//! A fixed number of attempts with a fixed sleep in between. Only transient
//! store errors (lock contention, pool timeout) are retried; anything else
//! is returned at once. On exhaustion the last error is surfaced.

use minkv_common::config::RetryConfig;
use minkv_common::Result;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            interval,
        }
    }

    /// Single attempt, no sleep
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.attempts, Duration::from_millis(config.interval_ms))
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
pub async fn retry_bounded<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(
                operation = operation_name,
                attempt,
                "Retrying store operation"
            );
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Store operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) if attempt >= policy.attempts => {
                tracing::error!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Store operation failed: retry attempts exhausted"
                );
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    interval_ms = policy.interval.as_millis() as u64,
                    error = %err,
                    "Store busy, will retry"
                );
                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}
