//! Retry logic with exponential backoff for upstream calls.
//!
//! The orchestrator never retries a callback: a retried Create could leak a
//! second upstream object. Callbacks that know an upstream call is safe to
//! repeat wrap it in [`with_retry`] themselves.

use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Error from a single attempt, classified by the caller
#[derive(Debug, Error)]
pub enum RetryError {
    /// Transient failure; the attempt may be repeated
    #[error(transparent)]
    Retryable(anyhow::Error),
    /// Permanent failure; give up immediately
    #[error(transparent)]
    Fatal(anyhow::Error),
}

impl RetryError {
    pub fn retryable(error: impl Into<anyhow::Error>) -> Self {
        Self::Retryable(error.into())
    }

    pub fn fatal(error: impl Into<anyhow::Error>) -> Self {
        Self::Fatal(error.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    fn into_inner(self) -> anyhow::Error {
        match self {
            Self::Retryable(e) | Self::Fatal(e) => e,
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone)]
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
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
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

/// Callback trait for retry progress notifications.
pub trait RetryCallback {
    /// Called before sleeping ahead of the next attempt.
    ///
    /// `attempt` is the 1-indexed attempt that just failed.
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &anyhow::Error, delay: Duration);
}

/// Callback that logs each retry at warn level.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &anyhow::Error, delay: Duration) {
        log::warn!(
            "Attempt {attempt}/{max_attempts} failed: {error:#}. Retrying in {:.1}s",
            delay.as_secs_f64()
        );
    }
}

/// Execute an operation with retry logic.
///
/// Retries while the operation returns [`RetryError::Retryable`], sleeping
/// with exponential backoff between attempts. Returns the last error once
/// attempts are exhausted, or the first fatal one.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Result<T, RetryError>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let error = match operation() {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() => return Err(e.into_inner()),
            Err(e) => e.into_inner(),
        };

        if attempt + 1 >= max_attempts {
            return Err(error);
        }

        let delay = config.delay_for_attempt(attempt);
        if let Some(cb) = callback {
            cb.on_retry(attempt + 1, max_attempts, &error, delay);
        }
        thread::sleep(delay);
        attempt += 1;
    }
}
