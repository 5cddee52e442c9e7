//! Retry options for worker tasks: decides the backoff between passes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff the dispatch scheduler applies before re-running a worker task.
///
/// Workers are re-triggered after every pass, so this is effectively the
/// polling interval of an idle pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryOptions {
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryOptions {
    pub fn new(min_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            min_backoff,
            max_backoff,
        }
    }

    /// Delay before the next run after `consecutive_failures` failed passes.
    ///
    /// delay = min_backoff * 2^(consecutive_failures - 1), capped at max_backoff.
    /// Zero failures (a successful pass) waits `min_backoff`.
    ///
    /// Example with min=0.5s, max=4s:
    /// - 0 or 1 failure: 0.5s
    /// - 2 failures: 1s
    /// - 3 failures: 2s
    /// - 5 failures: 4s (capped)
    pub fn next_delay(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(1).min(31) as i32;
        let secs = self.min_backoff.as_secs_f64() * 2f64.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            min_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(500),
        }
    }
}
