//! Retry logic for package database lock contention.
//!
//! On a freshly booted server `unattended-upgrades` often holds the dpkg
//! lock for a while. Only [`ErrorCategory::Locked`](crate::ErrorCategory)
//! failures are retried; everything else is returned immediately.

use crate::error::{Error, Result};
use std::thread;
use std::time::Duration;

/// Configuration for lock-wait retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            ..Default::default()
        }
    }

    /// Delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Execute an operation, retrying while it fails with a retryable error.
///
/// Each wait is logged at warn level with the attempt count.
pub fn with_retry<T, F>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempt + 1 >= attempts => return Err(e),
            Err(e) => {
                let delay = config.delay_for_attempt(attempt);
                log::warn!(
                    "Attempt {}/{} failed: {e}. Retrying in {}s...",
                    attempt + 1,
                    attempts,
                    delay.as_secs()
                );
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(5),
        }
    }

    fn locked() -> Error {
        Error::Locked {
            message: "Could not get lock /var/lib/dpkg/lock-frontend".into(),
        }
    }

    #[test]
    fn test_success_first_try() {
        let result = with_retry(&RetryConfig::no_retry(), || Ok::<_, Error>(7));
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_non_retryable_returns_immediately() {
        let attempts = Cell::new(0);
        let result: Result<()> = with_retry(&fast(3), || {
            attempts.set(attempts.get() + 1);
            Err(Error::Held {
                message: "docker-ce is held".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_lock_released_eventually() {
        let attempts = Cell::new(0);
        let result = with_retry(&fast(3), || {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 3 { Err(locked()) } else { Ok("done") }
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let attempts = Cell::new(0);
        let result: Result<()> = with_retry(&fast(3), || {
            attempts.set(attempts.get() + 1);
            Err(locked())
        });
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_delay_backoff_capped() {
        let config = RetryConfig::new(5, Duration::from_secs(5), 2.0);
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(20));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(60));
    }
}
