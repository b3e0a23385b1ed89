//! Retry with exponential backoff
//!
//! Each attempt races a per-attempt deadline. A timed-out attempt is
//! dropped (nothing it produced is used) and counts as a failure.

use std::future::Future;
use std::time::Duration;

use smol::Timer;
use tracing::{debug, warn};

use crate::config::RetrySettings;
use crate::{FontError, Result};

/// Backoff and deadline configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    timeout: Duration,
}

impl RetryPolicy {
    /// Create a policy, keeping `base_delay <= max_delay` and at least one attempt
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: base_delay.min(max_delay),
            max_delay,
            timeout,
        }
    }

    pub fn from_millis(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64, timeout_ms: u64) -> Self {
        Self::new(
            max_attempts,
            Duration::from_millis(base_delay_ms),
            Duration::from_millis(max_delay_ms),
            Duration::from_millis(timeout_ms),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait after failed attempt `attempt` (1-based): `min(base * 2^(attempt-1), max)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `family` is the font being fetched and ends up in the final error.
    /// Errors that are not retryable are returned at once.
    pub async fn execute<T, F, Fut>(&self, family: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            let outcome = smol::future::or(async { Some(operation().await) }, async {
                Timer::after(self.timeout).await;
                None
            })
            .await;

            let error = match outcome {
                Some(Ok(value)) => {
                    if attempt > 1 {
                        debug!(family, attempt, "font fetch succeeded after retry");
                    }
                    return Ok(value);
                }
                Some(Err(err)) if !err.is_retryable() => return Err(err),
                Some(Err(err)) => err,
                None => FontError::NetworkTimeout {
                    family: family.to_string(),
                    attempts: attempt,
                },
            };

            warn!(
                family,
                attempt,
                max_attempts = self.max_attempts,
                "font fetch attempt failed: {}",
                error
            );

            if attempt < self.max_attempts {
                Timer::after(self.backoff_delay(attempt)).await;
            }
            last_error = Some(error);
        }

        Err(match last_error {
            Some(FontError::NetworkTimeout { .. }) | None => FontError::NetworkTimeout {
                family: family.to_string(),
                attempts: self.max_attempts,
            },
            Some(err) => err,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::from_millis(
            settings.max_attempts,
            settings.base_delay_ms,
            settings.max_delay_ms,
            settings.timeout_ms,
        )
    }
}
