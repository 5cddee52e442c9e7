//! Item state machine for the in-memory queue.

use serde::{Deserialize, Serialize};

/// Item state as seen by the queue at a given instant.
///
/// State transitions:
/// - Available -> Leased (lease_by_tag)
/// - Leased -> Available (lease expired; retry count goes up on the next lease)
/// - Available | Leased -> gone (delete, purge)
///
/// Deleted items are dropped from the queue, so there is no terminal variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemState {
    /// Eligible for lease.
    Available,

    /// Claimed by a worker until the lease expires.
    Leased,
}

impl ItemState {
    pub fn is_leaseable(self) -> bool {
        matches!(self, ItemState::Available)
    }
}
