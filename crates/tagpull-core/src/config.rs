//! Config - 構成値
//!
//! プロセス全体のシングルトンは持たず、構成は struct として
//! Partitioner / Producer / Controller に明示的に渡します。
//!
//! - PullQueueConfig: デプロイ時に固定される値（tag 数、queue 名など）
//! - ControlParams: control plane から渡される値（worker 数など、clamp あり）
//! - RemoteConfig: remote variant の接続先

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DEFAULT_BACKLOG_PRESSURE_THRESHOLD, DEFAULT_TAG_PREFIX, LeaseSettings, RetryOptions};
use crate::ports::MAX_SPAWN_BATCH;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("num_tags must be at least 1")]
    NoTags,

    #[error("max_batch_adds must be within 1..={max}, got {0}", max = MAX_SPAWN_BATCH)]
    BatchLimit(usize),

    #[error("min_backoff {min:?} exceeds max_backoff {max:?}")]
    Backoff { min: Duration, max: Duration },
}

/// Deployment-wide pull queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullQueueConfig {
    pub pull_queue_name: String,
    pub worker_queue_name: String,

    /// Number of tag partitions. Producers and workers must agree on it.
    pub num_tags: u32,
    pub tag_prefix: String,

    /// Backlog above which leased items are deleted unconditionally.
    pub backlog_pressure_threshold: u64,

    /// Wait between a worker queue purge and the next spawn.
    pub purge_safety_interval: Duration,

    /// Per-call spawn limit of the dispatch scheduler.
    pub max_batch_adds: usize,

    pub worker_retry: RetryOptions,
    pub worker_route: String,
}

impl Default for PullQueueConfig {
    fn default() -> Self {
        Self {
            pull_queue_name: "jobs".to_string(),
            worker_queue_name: "worker".to_string(),
            num_tags: 4,
            tag_prefix: DEFAULT_TAG_PREFIX.to_string(),
            backlog_pressure_threshold: DEFAULT_BACKLOG_PRESSURE_THRESHOLD,
            purge_safety_interval: Duration::from_secs(2),
            max_batch_adds: MAX_SPAWN_BATCH,
            worker_retry: RetryOptions::default(),
            worker_route: "/work".to_string(),
        }
    }
}

impl PullQueueConfig {
    /// Create configuration from `TAGPULL_*` environment variables.
    ///
    /// Unset variables keep their defaults. The result is validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = lookup("TAGPULL_PULL_QUEUE") {
            config.pull_queue_name = v;
        }
        if let Some(v) = lookup("TAGPULL_WORKER_QUEUE") {
            config.worker_queue_name = v;
        }
        if let Some(v) = lookup("TAGPULL_NUM_TAGS") {
            config.num_tags = parse("TAGPULL_NUM_TAGS", &v)?;
        }
        if let Some(v) = lookup("TAGPULL_TAG_PREFIX") {
            config.tag_prefix = v;
        }
        if let Some(v) = lookup("TAGPULL_BACKLOG_THRESHOLD") {
            config.backlog_pressure_threshold = parse("TAGPULL_BACKLOG_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("TAGPULL_PURGE_SAFETY_MS") {
            config.purge_safety_interval =
                Duration::from_millis(parse("TAGPULL_PURGE_SAFETY_MS", &v)?);
        }
        if let Some(v) = lookup("TAGPULL_MAX_BATCH_ADDS") {
            config.max_batch_adds = parse("TAGPULL_MAX_BATCH_ADDS", &v)?;
        }
        if let Some(v) = lookup("TAGPULL_WORKER_MIN_BACKOFF_MS") {
            config.worker_retry.min_backoff =
                Duration::from_millis(parse("TAGPULL_WORKER_MIN_BACKOFF_MS", &v)?);
        }
        if let Some(v) = lookup("TAGPULL_WORKER_MAX_BACKOFF_MS") {
            config.worker_retry.max_backoff =
                Duration::from_millis(parse("TAGPULL_WORKER_MAX_BACKOFF_MS", &v)?);
        }
        if let Some(v) = lookup("TAGPULL_WORKER_ROUTE") {
            config.worker_route = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_num_tags(mut self, num_tags: u32) -> Self {
        self.num_tags = num_tags;
        self
    }

    pub fn with_tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tag_prefix = prefix.into();
        self
    }

    pub fn with_purge_safety_interval(mut self, interval: Duration) -> Self {
        self.purge_safety_interval = interval;
        self
    }

    pub fn with_max_batch_adds(mut self, max: usize) -> Self {
        self.max_batch_adds = max;
        self
    }

    pub fn with_worker_retry(mut self, retry: RetryOptions) -> Self {
        self.worker_retry = retry;
        self
    }

    /// Fail-fast checks run before anything is wired.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_tags == 0 {
            return Err(ConfigError::NoTags);
        }
        if self.max_batch_adds == 0 || self.max_batch_adds > MAX_SPAWN_BATCH {
            return Err(ConfigError::BatchLimit(self.max_batch_adds));
        }
        if self.worker_retry.min_backoff > self.worker_retry.max_backoff {
            return Err(ConfigError::Backoff {
                min: self.worker_retry.min_backoff,
                max: self.worker_retry.max_backoff,
            });
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

/// Control plane parameters (populate / start).
///
/// Out-of-range values are clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlParams {
    pub total_batches: u32,
    pub tasks_per_batch: u32,
    pub workers: u32,
    pub tasks_per_worker: u32,
    pub lease_seconds: u64,
    pub max_leases_per_task: u32,
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            total_batches: 100,
            tasks_per_batch: 10,
            workers: 2,
            tasks_per_worker: 2,
            lease_seconds: 10,
            max_leases_per_task: 3,
        }
    }
}

impl ControlParams {
    pub const TASKS_PER_BATCH_RANGE: (u32, u32) = (1, 100);
    pub const WORKERS_RANGE: (u32, u32) = (0, 1000);

    pub fn clamped(mut self) -> Self {
        let (lo, hi) = Self::TASKS_PER_BATCH_RANGE;
        self.tasks_per_batch = self.tasks_per_batch.clamp(lo, hi);
        let (lo, hi) = Self::WORKERS_RANGE;
        self.workers = self.workers.clamp(lo, hi);
        self
    }

    /// Lease settings stamped onto every spawned worker.
    pub fn lease_settings(&self) -> LeaseSettings {
        LeaseSettings::new(
            Duration::from_secs(self.lease_seconds),
            self.tasks_per_worker,
            self.max_leases_per_task,
        )
    }
}

/// Where the remote variant leases from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// App that owns the pull queue.
    pub provider_app_name: String,
    pub job_queue: String,

    /// Identity used when a worker request carries none (service account).
    pub default_identity: Option<String>,
}

impl RemoteConfig {
    pub fn new(provider_app_name: impl Into<String>, job_queue: impl Into<String>) -> Self {
        Self {
            provider_app_name: provider_app_name.into(),
            job_queue: job_queue.into(),
            default_identity: None,
        }
    }

    pub fn with_default_identity(mut self, identity: impl Into<String>) -> Self {
        self.default_identity = Some(identity.into());
        self
    }

    /// Project id as the remote API expects it.
    pub fn project(&self) -> String {
        format!("s~{}", self.provider_app_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_demo_deployment() {
        let c = PullQueueConfig::default();
        assert_eq!(c.pull_queue_name, "jobs");
        assert_eq!(c.worker_queue_name, "worker");
        assert_eq!(c.num_tags, 4);
        assert_eq!(c.backlog_pressure_threshold, 1000);
        assert_eq!(c.purge_safety_interval, Duration::from_secs(2));
        assert_eq!(c.max_batch_adds, 100);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn env_overrides_defaults() {
        let c = PullQueueConfig::from_lookup(lookup(&[
            ("TAGPULL_NUM_TAGS", "8"),
            ("TAGPULL_TAG_PREFIX", "shard"),
            ("TAGPULL_PURGE_SAFETY_MS", "2500"),
        ]))
        .unwrap();
        assert_eq!(c.num_tags, 8);
        assert_eq!(c.tag_prefix, "shard");
        assert_eq!(c.purge_safety_interval, Duration::from_millis(2500));
        assert_eq!(c.pull_queue_name, "jobs");
    }

    #[test]
    fn env_rejects_garbage() {
        let err = PullQueueConfig::from_lookup(lookup(&[("TAGPULL_NUM_TAGS", "four")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "TAGPULL_NUM_TAGS",
                value: "four".into()
            }
        );
    }

    #[rstest]
    #[case(PullQueueConfig::default().with_num_tags(0), ConfigError::NoTags)]
    #[case(PullQueueConfig::default().with_max_batch_adds(0), ConfigError::BatchLimit(0))]
    #[case(PullQueueConfig::default().with_max_batch_adds(101), ConfigError::BatchLimit(101))]
    #[case(
        PullQueueConfig::default().with_worker_retry(RetryOptions::new(
            Duration::from_secs(2),
            Duration::from_secs(1)
        )),
        ConfigError::Backoff { min: Duration::from_secs(2), max: Duration::from_secs(1) }
    )]
    fn validate_rejects(#[case] config: PullQueueConfig, #[case] expected: ConfigError) {
        assert_eq!(config.validate().unwrap_err(), expected);
    }

    #[rstest]
    #[case(0, 5, 1, 5)]
    #[case(500, 5, 100, 5)]
    #[case(10, 5000, 10, 1000)]
    #[case(10, 0, 10, 0)]
    fn control_params_clamp(
        #[case] tasks_per_batch: u32,
        #[case] workers: u32,
        #[case] want_tasks: u32,
        #[case] want_workers: u32,
    ) {
        let p = ControlParams {
            tasks_per_batch,
            workers,
            ..ControlParams::default()
        }
        .clamped();
        assert_eq!(p.tasks_per_batch, want_tasks);
        assert_eq!(p.workers, want_workers);
    }

    #[test]
    fn control_params_build_lease_settings() {
        let s = ControlParams::default().lease_settings();
        assert_eq!(s, LeaseSettings::default());
    }

    #[test]
    fn remote_project_is_prefixed() {
        assert_eq!(RemoteConfig::new("provider", "jobs").project(), "s~provider");
    }
}
