//! Exponential backoff for pharmacy platform calls.
//!
//! Which errors are worth another attempt is a named predicate
//! (`is_retryable`) that callers can swap out.

use std::sync::Arc;
use std::time::Duration;

use super::error::PharmacyError;
use crate::config::PharmacyConfig;

pub type RetryPredicate = fn(&PharmacyError) -> bool;
pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Default classification: transport failures and non-401 HTTP errors are
/// transient; credentials, validation and parsing failures are not.
pub fn is_retryable(error: &PharmacyError) -> bool {
    matches!(
        error,
        PharmacyError::Http { .. }
            | PharmacyError::Connection(_)
            | PharmacyError::Timeout(_)
            | PharmacyError::HttpClient(_)
    )
}

#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    is_retryable: RetryPredicate,
    sleeper: Sleeper,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; zero is treated as one.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            is_retryable,
            sleeper: Arc::new(std::thread::sleep),
        }
    }

    pub fn from_config(config: &PharmacyConfig) -> Self {
        Self::new(
            config.retry_attempts,
            Duration::from_millis(config.retry_base_ms),
        )
    }

    pub fn with_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.is_retryable = predicate;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before the retry that follows failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or
    /// the attempt cap is reached. The last error is returned unchanged.
    pub fn run<T, F>(&self, operation: &str, mut call: F) -> Result<T, PharmacyError>
    where
        F: FnMut() -> Result<T, PharmacyError>,
    {
        let mut attempt = 0;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(e) if (self.is_retryable)(&e) && attempt + 1 < self.max_attempts => {
                    let wait = self.delay_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Pharmacy request failed, retrying"
                    );
                    (self.sleeper)(wait);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_RETRY_ATTEMPTS,
            Duration::from_millis(crate::config::DEFAULT_RETRY_BASE_MS),
        )
    }
}
