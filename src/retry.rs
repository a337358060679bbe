//! Retry with exponential backoff
//!
//! A small combinator decoupled from HTTP so it can be exercised with any
//! fallible async operation.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::duration_string;

/// Attempt ceiling and backoff schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt
    #[serde(with = "duration_string")]
    pub base_delay: Duration,
    #[serde(with = "duration_string")]
    pub max_delay: Duration,
    /// Upper bound of random jitter added to each delay
    #[serde(with = "duration_string")]
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Policy without delays, for tests and local fakes
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Backoff before attempt `attempt + 1`, without jitter
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::random::<u64>() % jitter_ms)
    }

    /// Run `operation` until it succeeds, the error is not retryable, or the
    /// attempt ceiling is reached. The last error is returned on failure.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &str,
        mut operation: F,
        is_retryable: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded after {} attempts", label, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= max_attempts || !is_retryable(&e) => {
                    warn!("{} failed after {} attempt(s): {}", label, attempt, e);
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.jittered(self.delay_after(attempt));
                    debug!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        label, attempt, max_attempts, delay, e
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}
