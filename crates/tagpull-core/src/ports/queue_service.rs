//! QueueService port - タグ付き pull queue
//!
//! lease が唯一の排他プリミティブです。lease 済みの item は
//! `lease_expiry` を過ぎるまで他の lease 呼び出しから見えません。
//! コア側はロックを一切取りません。

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{NewWorkItem, QueueError, QueueStats, TagId, WorkItem};

/// Durable tagged work queue.
#[async_trait]
pub trait QueueService: Send + Sync {
    async fn enqueue(&self, items: Vec<NewWorkItem>) -> Result<(), QueueError>;

    /// Lease up to `max_items` available items carrying `tag`.
    ///
    /// An empty vector is a normal result, not an error.
    async fn lease_by_tag(
        &self,
        tag: &TagId,
        max_items: u32,
        lease_duration: Duration,
    ) -> Result<Vec<WorkItem>, QueueError>;

    /// Delete items. Deleting an item twice may error; callers must tolerate it.
    async fn delete_items(&self, items: &[WorkItem]) -> Result<(), QueueError>;

    /// May fail independently of leasing.
    async fn fetch_stats(&self) -> Result<QueueStats, QueueError>;

    /// Idempotent.
    async fn purge(&self) -> Result<(), QueueError>;
}
