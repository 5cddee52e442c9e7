//! Producer - tag 付き item を pull queue に投入
//!
//! best-effort の seeding です。Queue Service のエラーはそのまま呼び出し側へ。

use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::tag_partitioner::TagPartitioner;
use crate::domain::{NewWorkItem, QueueError, TagId};
use crate::ports::QueueService;
use crate::queue::MAX_ENQUEUE_BATCH;

pub struct Producer {
    queue: Arc<dyn QueueService>,
    partitioner: Arc<TagPartitioner>,
}

impl Producer {
    pub fn new(queue: Arc<dyn QueueService>, partitioner: Arc<TagPartitioner>) -> Self {
        Self { queue, partitioner }
    }

    /// Enqueue `tag_count` batches of `items_per_batch` items.
    ///
    /// Each batch picks one tag; every item of the batch carries it. Returns
    /// the number of items enqueued. The first queue error aborts seeding and
    /// earlier batches stay enqueued.
    #[instrument(skip(self))]
    pub async fn enqueue_batch(&self, tag_count: u32, items_per_batch: u32) -> Result<usize, QueueError> {
        let mut enqueued = 0;
        for _ in 0..tag_count {
            let tag = self.partitioner.assign_tag();
            let items = batch_items(&tag, items_per_batch);
            let count = items.len();

            // enqueue の上限を超える分は分割して投入
            let mut rest = items;
            while !rest.is_empty() {
                let tail = rest.split_off(rest.len().min(MAX_ENQUEUE_BATCH));
                self.queue.enqueue(rest).await?;
                rest = tail;
            }

            debug!(%tag, count, "enqueued batch");
            enqueued += count;
        }
        info!(enqueued, "seeded pull queue");
        Ok(enqueued)
    }
}

/// Payloads identify their sequence index and tag.
fn batch_items(tag: &TagId, items_per_batch: u32) -> Vec<NewWorkItem> {
    (0..items_per_batch)
        .map(|i| {
            NewWorkItem::new(
                format!("task {i}: This is a payload with tag [{tag}]"),
                tag.clone(),
            )
        })
        .collect()
}
