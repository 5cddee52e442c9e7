#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tagpull_core::domain::{NewWorkItem, QueueError, QueueStats, TagId, WorkItem};
use tagpull_core::ports::{Clock, FixedClock, QueueService};
use tagpull_core::queue::InMemoryQueueService;

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    ))
}

/// Clock on tokio's timer; moves with paused test time.
pub struct TimerClock {
    origin: DateTime<Utc>,
    start: tokio::time::Instant,
}

pub fn timer_clock() -> Arc<TimerClock> {
    Arc::new(TimerClock {
        origin: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        start: tokio::time::Instant::now(),
    })
}

#[async_trait]
impl Clock for TimerClock {
    fn now(&self) -> DateTime<Utc> {
        self.origin + chrono::Duration::from_std(self.start.elapsed()).unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// In-memory queue whose reported backlog is pinned to a chosen value.
pub struct PinnedBacklog {
    pub inner: Arc<InMemoryQueueService>,
    pub total_tasks: u64,
}

impl PinnedBacklog {
    pub async fn seeded(clock: Arc<FixedClock>, tag: &str, n: usize, total_tasks: u64) -> Self {
        let inner = Arc::new(InMemoryQueueService::new(clock));
        let items: Vec<NewWorkItem> = (0..n)
            .map(|i| NewWorkItem::new(format!("task {i}: This is a payload with tag [{tag}]"), TagId::new(tag)))
            .collect();
        inner.enqueue(items).await.unwrap();
        Self { inner, total_tasks }
    }
}

#[async_trait]
impl QueueService for PinnedBacklog {
    async fn enqueue(&self, items: Vec<NewWorkItem>) -> Result<(), QueueError> {
        self.inner.enqueue(items).await
    }

    async fn lease_by_tag(
        &self,
        tag: &TagId,
        max_items: u32,
        lease_duration: Duration,
    ) -> Result<Vec<WorkItem>, QueueError> {
        self.inner.lease_by_tag(tag, max_items, lease_duration).await
    }

    async fn delete_items(&self, items: &[WorkItem]) -> Result<(), QueueError> {
        self.inner.delete_items(items).await
    }

    async fn fetch_stats(&self) -> Result<QueueStats, QueueError> {
        Ok(QueueStats {
            total_tasks: self.total_tasks,
            ..QueueStats::default()
        })
    }

    async fn purge(&self) -> Result<(), QueueError> {
        self.inner.purge().await
    }
}
