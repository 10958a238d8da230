//! Bounded retry with exponential backoff

use crate::config::PortalConfig;
use crate::{FetchError, HarvestError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Upper bound on a single backoff sleep
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How often, and how patiently, a failing fetch is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: MAX_BACKOFF,
        }
    }

    pub fn from_portal(portal: &PortalConfig) -> Self {
        Self::new(portal.max_retries, portal.retry_base_delay())
    }

    /// Sleep after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Decides what happens after attempt number `attempt` failed with `err`
    ///
    /// Returns `Ok(())` once the backoff has elapsed and another attempt
    /// should be made. Non-retryable errors come back as `HarvestError::Fetch`,
    /// the last allowed attempt as `RetryExhausted`, and a cancellation during
    /// the sleep as `Cancelled`.
    pub async fn backoff(
        &self,
        operation: &str,
        attempt: u32,
        err: FetchError,
        cancel: &CancellationToken,
    ) -> Result<(), HarvestError> {
        if !err.is_retryable() {
            return Err(HarvestError::Fetch(err));
        }
        if attempt >= self.max_attempts {
            return Err(HarvestError::RetryExhausted {
                operation: operation.to_string(),
                attempts: attempt,
                source: err,
            });
        }

        let delay = self.delay_for(attempt);
        warn!(
            "{} failed (attempt {}/{}): {}; retrying in {:?}",
            operation, attempt, self.max_attempts, err, delay
        );

        tokio::select! {
            _ = cancel.cancelled() => Err(HarvestError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
