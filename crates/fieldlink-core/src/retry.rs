//! Retry logic for HTTP requests.
//!
//! Transient transport failures (see [`Error::is_retryable`]) are retried
//! with exponential backoff. GraphQL error lists are not failures at this
//! level and are never retried.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use fieldlink_core::{RetryConfig, with_retry, Error};
//!
//! # async fn example() -> Result<(), Error> {
//! // Two retries, 600 ms first backoff, doubling each time
//! let config = RetryConfig::default();
//!
//! let patient = RetryConfig::new(5).initial_delay(Duration::from_secs(1));
//!
//! let result = with_retry(&config, "devices", || async {
//!     Ok::<_, Error>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 means no retries).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay; unbounded by default.
    pub max_delay: Duration,
    /// Backoff multiplier (1.0 = constant delay, 2.0 = double each time).
    pub backoff_multiplier: f64,
    /// Whether to add up to 25% jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(600),
            max_delay: Duration::MAX,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// No retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    // ==================== Builder Methods ====================

    /// Set maximum number of retries.
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set initial delay.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier.
    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Total number of attempts, including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after the given (zero-based) failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        // Nanosecond arithmetic keeps 600 ms * 2 exact.
        let base_nanos = self.initial_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);
        let capped_nanos = base_nanos.min(self.max_delay.as_nanos() as f64);

        let final_nanos = if self.jitter {
            capped_nanos * (1.0 + rand::rng().random::<f64>() * 0.25)
        } else {
            capped_nanos
        };

        Duration::from_nanos(final_nanos.round() as u64)
    }
}

/// Execute an async operation with retry logic.
///
/// Only errors for which [`Error::is_retryable`] holds are retried; any
/// other error is returned immediately. Backoff sleeps use
/// [`tokio::time::sleep`] and never block other tasks.
///
/// # Returns
///
/// The result of the operation, or the last error if all retries failed.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{} succeeded after {} retries", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    operation_name,
                    attempt + 1,
                    config.attempts(),
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!(
                        "{} failed after {} attempts: {}",
                        operation_name,
                        attempt + 1,
                        e
                    );
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use reqwest::StatusCode;
    use tokio::time::Instant;

    fn transient() -> Error {
        Error::HttpStatus {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "try later".to_string(),
        }
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.attempts(), 3);
        assert_eq!(config.initial_delay, Duration::from_millis(600));
        assert!(!config.jitter);
    }

    #[test]
    fn test_retry_config_none() {
        let config = RetryConfig::none();
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.attempts(), 1);
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(600));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2400));

        // Doubling continues for long retry chains.
        let patient = RetryConfig::new(8);
        assert_eq!(patient.delay_for_attempt(6), Duration::from_millis(38_400));
        assert_eq!(patient.delay_for_attempt(7), Duration::from_millis(76_800));

        let capped = RetryConfig::default().max_delay(Duration::from_secs(1));
        assert_eq!(capped.delay_for_attempt(3), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let config = RetryConfig::default().jitter(true);
        for attempt in 0..4 {
            let delay = config.delay_for_attempt(attempt);
            let base = RetryConfig::default().delay_for_attempt(attempt);
            assert!(delay >= base);
            assert!(delay <= base.mul_f64(1.25));
        }
    }

    #[tokio::test]
    async fn test_with_retry_immediate_success() {
        let config = RetryConfig::new(3);
        let result = with_retry(&config, "test", || async { Ok::<_, Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_doubles_backoff() {
        let config = RetryConfig::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let result: Result<i32> = with_retry(&config, "test", || {
            let seen = Arc::clone(&seen_clone);
            async move {
                let mut seen = seen.lock().unwrap();
                seen.push(Instant::now());
                if seen.len() < 3 { Err(transient()) } else { Ok(42) }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1] - seen[0], Duration::from_millis(600));
        assert_eq!(seen[2] - seen[1], Duration::from_millis(1200));
    }

    #[tokio::test]
    async fn test_with_retry_all_fail() {
        let config = RetryConfig::new(2).initial_delay(Duration::from_millis(1));

        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result: Result<i32> = with_retry(&config, "test", || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(transient())
            }
        })
        .await;

        assert!(matches!(result, Err(Error::HttpStatus { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 3); // 1 initial + 2 retries
    }

    #[tokio::test]
    async fn test_with_retry_non_retryable_error() {
        let config = RetryConfig::new(3);
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result: Result<i32> = with_retry(&config, "test", || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(Error::InvalidConfig("not retryable".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1); // No retries
    }
}
