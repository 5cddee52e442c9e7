//! WorkerTask - 1 回呼ばれるたびに 1 pass だけ実行
//!
//! 内部でループしません。次の実行は host（dispatch queue）が決めます。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::lease_policy::LeasePolicy;
use super::tag_partitioner::TagPartitioner;
use crate::domain::{PassFailure, PassOutcome, WorkerSpec, WorkerTaskRequest};
use crate::ports::QueueService;

/// Something the host can hand a dispatched worker request to.
#[async_trait]
pub trait PassRunner: Send + Sync {
    async fn run_pass(&self, request: &WorkerTaskRequest) -> Result<PassOutcome, PassFailure>;
}

/// Local worker: leases from the deployment's own pull queue.
pub struct WorkerTask {
    queue: Arc<dyn QueueService>,
    policy: Arc<LeasePolicy>,
    partitioner: Option<Arc<TagPartitioner>>,
}

impl WorkerTask {
    pub fn new(queue: Arc<dyn QueueService>, policy: Arc<LeasePolicy>) -> Self {
        Self {
            queue,
            policy,
            partitioner: None,
        }
    }

    /// Warn on every pass whose tag is outside this partition set.
    pub fn with_partitioner(mut self, partitioner: Arc<TagPartitioner>) -> Self {
        self.partitioner = Some(partitioner);
        self
    }

    /// One pass of the lease policy for `spec`.
    pub async fn run(&self, spec: &WorkerSpec) -> Result<PassOutcome, PassFailure> {
        if let Some(partitioner) = &self.partitioner {
            if !partitioner.contains(&spec.tag) {
                warn!(tag = %spec.tag, num_tags = partitioner.num_tags(), "worker tag is outside the partition set; it will never see work");
            }
        }
        self.policy.run_pass(self.queue.as_ref(), spec).await
    }
}

#[async_trait]
impl PassRunner for WorkerTask {
    async fn run_pass(&self, request: &WorkerTaskRequest) -> Result<PassOutcome, PassFailure> {
        self.run(&request.spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LeaseSettings, NewWorkItem, TagId};
    use crate::ports::{ScriptedRandom, SystemClock};
    use crate::queue::InMemoryQueueService;
    use std::time::Duration;

    async fn setup() -> (Arc<InMemoryQueueService>, WorkerTask) {
        let clock = Arc::new(SystemClock);
        let queue = Arc::new(InMemoryQueueService::new(clock.clone()));
        queue
            .enqueue(vec![
                NewWorkItem::new("a", TagId::new("tag_1")),
                NewWorkItem::new("b", TagId::new("tag_1")),
                NewWorkItem::new("c", TagId::new("tag_1")),
            ])
            .await
            .unwrap();
        let rng = Arc::new(ScriptedRandom::repeat(0));
        let policy = Arc::new(LeasePolicy::new(clock, rng.clone()));
        let partitioner = Arc::new(TagPartitioner::new("tag", 4, rng).unwrap());
        let worker = WorkerTask::new(queue.clone(), policy).with_partitioner(partitioner);
        (queue, worker)
    }

    #[tokio::test]
    async fn one_call_is_one_bounded_pass() {
        let (_queue, worker) = setup().await;
        let spec = WorkerSpec::new(
            TagId::new("tag_1"),
            LeaseSettings::new(Duration::from_secs(30), 2, 3),
        );

        let outcome = worker.run(&spec).await.unwrap();
        assert_eq!(outcome.processed, 2);

        let outcome = worker.run(&spec).await.unwrap();
        assert_eq!(outcome.processed, 1);
    }

    #[tokio::test]
    async fn foreign_tag_sees_nothing() {
        let (queue, worker) = setup().await;
        let spec = WorkerSpec::new(TagId::new("tag_9"), LeaseSettings::default());

        let outcome = worker.run(&spec).await.unwrap();
        assert!(outcome.is_empty());
        assert_eq!(queue.len().await, 3);
    }
}
