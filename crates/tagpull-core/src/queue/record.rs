//! Item record: payload + lease bookkeeping.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::ItemState;
use crate::domain::{ItemId, TagId, WorkItem};

/// Everything the queue knows about one item.
///
/// This is the single source of truth for lease state; `WorkItem` values
/// handed to workers are snapshots of it.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub id: ItemId,
    pub payload: Vec<u8>,
    pub tag: TagId,

    /// Number of leases handed out so far.
    pub lease_count: u32,

    pub leased_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl ItemRecord {
    pub fn new(id: ItemId, payload: Vec<u8>, tag: TagId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            payload,
            tag,
            lease_count: 0,
            leased_until: None,
            created_at,
        }
    }

    pub fn state(&self, now: DateTime<Utc>) -> ItemState {
        match self.leased_until {
            Some(until) if until > now => ItemState::Leased,
            _ => ItemState::Available,
        }
    }

    /// Hand out a lease. The retry count reported is the number of earlier
    /// leases that expired without a delete.
    pub fn lease(&mut self, now: DateTime<Utc>, duration: Duration) -> WorkItem {
        let retry_count = self.lease_count;
        self.lease_count = self.lease_count.saturating_add(1);
        let window = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        self.leased_until = Some(now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC));
        self.snapshot(Some(retry_count))
    }

    pub fn snapshot(&self, retry_count: Option<u32>) -> WorkItem {
        WorkItem {
            id: self.id.into(),
            payload: self.payload.clone(),
            tag: self.tag.clone(),
            retry_count,
            lease_expiry: self.leased_until,
        }
    }
}
