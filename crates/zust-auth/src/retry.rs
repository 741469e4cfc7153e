//! Retry with exponential backoff.
//!
//! Used for background work that talks to external services, such as
//! downloading a federated account's avatar. Request-path calls (code
//! exchange, profile fetch) are never retried.
//!
//! # Example
//!
//! ```rust,no_run
//! use zust_auth::retry::{with_retry, RetryConfig};
//!
//! async fn example() -> Result<Vec<u8>, String> {
//!     with_retry(&RetryConfig::with_attempts(3), || async {
//!         // Download something
//!         Ok(vec![0u8; 16])
//!     })
//!     .await
//! }
//! ```

use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Base for exponential backoff (typically 2.0)
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            exponential_base: 2.0,
        }
    }
}

impl RetryConfig {
    /// Default backoff with a given number of attempts (at least one).
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// A configuration that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            exponential_base: 1.0,
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(
            (delay.as_secs_f64() * self.exponential_base).min(self.max_delay.as_secs_f64()),
        )
    }
}

/// Execute an operation, retrying every failure.
///
/// # Returns
///
/// The first success, or the last error once attempts are exhausted
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
{
    with_retry_if(config, f, |_| true).await
}

/// Execute an operation, retrying only failures the predicate accepts.
///
/// Errors rejected by `is_retryable` are returned immediately.
pub async fn with_retry_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    mut f: F,
    mut is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
    P: FnMut(&E) -> bool,
{
    let mut delay = config.initial_delay;
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);
        let err = match f().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Retried operation succeeded");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !is_retryable(&err) || attempt >= config.max_attempts {
            tracing::debug!(attempt, error = ?err, "Giving up");
            return Err(err);
        }

        tracing::warn!(
            attempt,
            max_attempts = config.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = ?err,
            "Retrying failed operation"
        );
        sleep(delay).await;
        delay = config.next_delay(delay);
    }
}
