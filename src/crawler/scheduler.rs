//! Request pacing for list page traversal
//!
//! The orchestrator fetches list pages strictly one after another; the pacer
//! makes sure the starts of two successive fetches are at least
//! `delay-between-requests` apart, whether the previous fetch succeeded or not.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Enforces a minimum interval between request starts
#[derive(Debug, Clone)]
pub struct Pacer {
    min_interval: Duration,
    last_start: Option<Instant>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: None,
        }
    }

    /// Time left before the next request may start; `None` if it may start now
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        let last = self.last_start?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.min_interval {
            Some(self.min_interval - elapsed)
        } else {
            None
        }
    }

    /// Waits for the interval to pass, then marks a new request start
    ///
    /// Returns false without marking if `cancel` fires while waiting.
    pub async fn wait_turn(&mut self, cancel: &CancellationToken) -> bool {
        if let Some(wait) = self.time_until_next(Instant::now()) {
            trace!("Pacing next request by {:?}", wait);
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(wait) => {}
            }
        }
        self.last_start = Some(Instant::now());
        true
    }
}
