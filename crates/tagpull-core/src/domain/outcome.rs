//! Outcome model: the result of one worker pass.
//!
//! A pass either completes (possibly with nothing leased) or fails at the
//! lease boundary. Whether the host re-runs the worker afterwards is decided
//! by the host, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::QueueError;
use super::tag::TagId;

/// A completed pass.
///
/// `processed == deleted + released` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassOutcome {
    pub tag: TagId,

    /// Items leased in this pass.
    pub processed: usize,

    /// Items deleted from the queue.
    pub deleted: usize,

    /// Items left leased; they come back once the lease expires.
    pub released: usize,
}

impl PassOutcome {
    pub fn empty(tag: TagId) -> Self {
        Self {
            tag,
            processed: 0,
            deleted: 0,
            released: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.processed == 0
    }
}

/// A pass that could not lease (transport, auth).
#[derive(Debug, thiserror::Error)]
#[error("lease pass for tag={tag} started at {started_at} failed: {error}")]
pub struct PassFailure {
    pub tag: TagId,
    pub started_at: DateTime<Utc>,
    #[source]
    pub error: QueueError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_outcome_has_no_counts() {
        let o = PassOutcome::empty(TagId::new("tag_0"));
        assert!(o.is_empty());
        assert_eq!(o.deleted + o.released, o.processed);
    }

    #[test]
    fn failure_message_carries_tag_and_start() {
        let started_at = DateTime::parse_from_rfc3339("2024-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let f = PassFailure {
            tag: TagId::new("tag_1"),
            started_at,
            error: QueueError::Transport("connection reset".into()),
        };
        let msg = f.to_string();
        assert!(msg.contains("tag=tag_1"));
        assert!(msg.contains("2024-01-01"));
    }
}
