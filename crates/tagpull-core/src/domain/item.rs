//! Work items and lease batches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ItemRef;
use super::tag::TagId;

/// An item the producer hands to the queue service.
///
/// The queue assigns the id and owns lease bookkeeping from here on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWorkItem {
    pub payload: Vec<u8>,
    pub tag: TagId,
}

impl NewWorkItem {
    pub fn new(payload: impl Into<Vec<u8>>, tag: TagId) -> Self {
        Self {
            payload: payload.into(),
            tag,
        }
    }
}

/// A leased unit of work as observed by one worker pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: ItemRef,

    /// Opaque payload bytes.
    pub payload: Vec<u8>,

    pub tag: TagId,

    /// How many times this item was leased before without being deleted.
    ///
    /// `None` when the transport does not report it (remote queues).
    pub retry_count: Option<u32>,

    /// After this instant any worker may lease the item again.
    pub lease_expiry: Option<DateTime<Utc>>,
}

impl WorkItem {
    /// Payload as UTF-8 text for logging; lossy on purpose.
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Items leased in one call against a single tag.
#[derive(Debug, Clone)]
pub struct LeaseBatch {
    pub tag: TagId,
    pub items: Vec<WorkItem>,
    pub lease_duration: std::time::Duration,
}

impl LeaseBatch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
