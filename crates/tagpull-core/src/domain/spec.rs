//! Worker specs: what a worker task is told to do when it is spawned.
//!
//! A spec is bound to one worker task at spawn time and never changes for
//! the lifetime of that task.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::WorkerTaskId;
use super::retry::RetryOptions;
use super::tag::TagId;

/// Lease parameters shared by every worker of one pool restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseSettings {
    /// Requested lease window; every item in a batch shares it.
    pub lease_duration: Duration,

    /// Upper bound on items per lease call.
    pub batch_size: u32,

    /// Upper bound of the retry draw. With 0 every previously leased item is deleted.
    pub max_leases_per_item: u32,
}

impl LeaseSettings {
    pub fn new(lease_duration: Duration, batch_size: u32, max_leases_per_item: u32) -> Self {
        Self {
            lease_duration,
            batch_size,
            max_leases_per_item,
        }
    }
}

impl Default for LeaseSettings {
    fn default() -> Self {
        Self {
            lease_duration: Duration::from_secs(10),
            batch_size: 2,
            max_leases_per_item: 3,
        }
    }
}

/// Configuration bound to a single worker task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub tag: TagId,
    pub settings: LeaseSettings,
}

impl WorkerSpec {
    pub fn new(tag: TagId, settings: LeaseSettings) -> Self {
        Self { tag, settings }
    }
}

/// What a pool restart stamps onto every spawned worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerTemplate {
    pub settings: LeaseSettings,

    /// Credential identity for remote workers (user id or service account).
    pub identity: Option<String>,
}

impl WorkerTemplate {
    pub fn new(settings: LeaseSettings) -> Self {
        Self {
            settings,
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }
}

/// One entry of the worker dispatch queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerTaskRequest {
    pub id: WorkerTaskId,

    /// Host route that runs the pass (e.g. `/work`).
    pub route: String,

    pub spec: WorkerSpec,

    pub identity: Option<String>,

    pub retry: RetryOptions,

    /// When the controller first enqueued this task. Purges compare against it.
    pub enqueued_at: DateTime<Utc>,

    /// Consecutive failed passes, reset on success.
    #[serde(default)]
    pub consecutive_failures: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_settings_default_matches_demo_form() {
        let s = LeaseSettings::default();
        assert_eq!(s.lease_duration, Duration::from_secs(10));
        assert_eq!(s.batch_size, 2);
        assert_eq!(s.max_leases_per_item, 3);
    }

    #[test]
    fn template_carries_identity() {
        let t = WorkerTemplate::new(LeaseSettings::default()).with_identity("user-42");
        assert_eq!(t.identity.as_deref(), Some("user-42"));
    }
}
