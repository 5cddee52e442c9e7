//! Decision model: what happens to a leased item at the end of a pass.
//!
//! This module defines the Disposition type (delete or release) and the
//! Decider trait (how to choose). Deciders are pure apart from the random
//! draw, which comes from an injected `RandomSource`.

use serde::{Deserialize, Serialize};

use super::item::WorkItem;
use crate::ports::RandomSource;

/// Backlog size above which every leased item is deleted.
pub const DEFAULT_BACKLOG_PRESSURE_THRESHOLD: u64 = 1000;

/// Why an item was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteReason {
    /// The queue reported more than the threshold; shed load.
    BacklogPressure,

    /// The retry draw came in under the item's retry count.
    RetryCount,

    /// The transport reported no retry count and the decider is told to delete.
    NoRetrySignal,
}

/// The fate of one leased item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Delete(DeleteReason),

    /// Leave it leased; it becomes available again after the lease expires.
    Release,
}

impl Disposition {
    pub fn is_delete(self) -> bool {
        matches!(self, Disposition::Delete(_))
    }
}

/// What to do with an item whose transport carries no retry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingRetrySignal {
    /// Treat processing as completion and delete.
    Delete,

    /// Leave it for the lease to expire.
    #[default]
    Release,
}

/// Trait for deciding the disposition of a leased item.
pub trait Decider: Send + Sync {
    /// # Arguments
    /// * `item` - The leased item
    /// * `backlog` - Total queue size if known; `None` when stats were unavailable
    /// * `max_leases_per_item` - Upper bound of the retry draw
    /// * `rng` - Random source for the retry draw
    fn decide(
        &self,
        item: &WorkItem,
        backlog: Option<u64>,
        max_leases_per_item: u32,
        rng: &dyn RandomSource,
    ) -> Disposition;
}

/// Default decider.
///
/// Precedence:
/// 1. backlog > threshold: delete regardless of retry count
/// 2. draw r uniformly from [0, max_leases_per_item]; delete if r < retry_count
/// 3. otherwise release
///
/// With retry_count == 0, rule 2 never deletes. At retry_count == max the
/// delete probability is max / (max + 1); only rule 1 gives certainty.
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    backlog_pressure_threshold: u64,
    missing_retry_signal: MissingRetrySignal,
}

impl DefaultDecider {
    pub fn new(backlog_pressure_threshold: u64, missing_retry_signal: MissingRetrySignal) -> Self {
        Self {
            backlog_pressure_threshold,
            missing_retry_signal,
        }
    }

    pub fn with_missing_retry_signal(mut self, signal: MissingRetrySignal) -> Self {
        self.missing_retry_signal = signal;
        self
    }

    pub fn backlog_pressure_threshold(&self) -> u64 {
        self.backlog_pressure_threshold
    }

    pub fn missing_retry_signal(&self) -> MissingRetrySignal {
        self.missing_retry_signal
    }
}

impl Default for DefaultDecider {
    fn default() -> Self {
        Self::new(DEFAULT_BACKLOG_PRESSURE_THRESHOLD, MissingRetrySignal::default())
    }
}

impl Decider for DefaultDecider {
    fn decide(
        &self,
        item: &WorkItem,
        backlog: Option<u64>,
        max_leases_per_item: u32,
        rng: &dyn RandomSource,
    ) -> Disposition {
        if backlog.is_some_and(|total| total > self.backlog_pressure_threshold) {
            return Disposition::Delete(DeleteReason::BacklogPressure);
        }

        let Some(retry_count) = item.retry_count else {
            return match self.missing_retry_signal {
                MissingRetrySignal::Delete => Disposition::Delete(DeleteReason::NoRetrySignal),
                MissingRetrySignal::Release => Disposition::Release,
            };
        };

        let r = rng.next_in_range(0, max_leases_per_item);
        if r < retry_count {
            Disposition::Delete(DeleteReason::RetryCount)
        } else {
            Disposition::Release
        }
    }
}
