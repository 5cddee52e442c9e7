//! WorkerPoolController - worker pool の purge / restart
//!
//! # purge 後の待ち時間
//! purge の解像度は約 1 秒、さらにサーバー間の時計のずれが最大 1 秒あります。
//! purge 直後に spawn すると、伝播中の purge に新しい task が巻き込まれるため、
//! `purge_safety_interval`（既定 2 秒）待ってから spawn します。
//!
//! spawn は `max_batch_adds` ごとに分割します。途中で失敗しても
//! それまでに spawn した task は残します（rollback なし）。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::tag_partitioner::TagPartitioner;
use crate::config::PullQueueConfig;
use crate::domain::{DispatchError, RetryOptions, WorkerSpec, WorkerTaskRequest, WorkerTemplate};
use crate::ports::{Clock, DispatchScheduler, IdGenerator};

/// What a restart submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartReport {
    /// Worker queue the tasks went to.
    pub worker_queue: String,

    pub spawned: usize,

    /// Size of each spawn call, in order.
    pub batches: Vec<usize>,
}

pub struct WorkerPoolController {
    dispatcher: Arc<dyn DispatchScheduler>,
    partitioner: Arc<TagPartitioner>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    worker_queue: String,
    purge_safety_interval: Duration,
    max_batch_adds: usize,
    retry: RetryOptions,
    route: String,
}

impl WorkerPoolController {
    pub fn new(
        config: &PullQueueConfig,
        dispatcher: Arc<dyn DispatchScheduler>,
        partitioner: Arc<TagPartitioner>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            dispatcher,
            partitioner,
            clock,
            ids,
            worker_queue: config.worker_queue_name.clone(),
            purge_safety_interval: config.purge_safety_interval,
            max_batch_adds: config.max_batch_adds.max(1),
            retry: config.worker_retry,
            route: config.worker_route.clone(),
        }
    }

    /// Purge the worker queue and wait out the purge window.
    #[instrument(skip(self), fields(queue = %self.worker_queue))]
    pub async fn purge_workers(&self) -> Result<(), DispatchError> {
        self.dispatcher.purge().await?;
        debug!(wait = ?self.purge_safety_interval, "waiting for purge to settle");
        self.clock.sleep(self.purge_safety_interval).await;
        info!("purged worker queue");
        Ok(())
    }

    /// Replace the pool with `desired` fresh worker tasks.
    #[instrument(skip(self, template), fields(queue = %self.worker_queue))]
    pub async fn restart(
        &self,
        desired: usize,
        template: &WorkerTemplate,
    ) -> Result<RestartReport, DispatchError> {
        self.purge_workers().await?;

        let mut report = RestartReport {
            worker_queue: self.worker_queue.clone(),
            ..RestartReport::default()
        };
        let mut remaining = desired;
        while remaining > 0 {
            let count = remaining.min(self.max_batch_adds);
            let tasks = (0..count).map(|_| self.request(template)).collect();
            self.dispatcher.spawn_tasks(tasks).await?;

            debug!(count, "spawned worker batch");
            report.spawned += count;
            report.batches.push(count);
            remaining -= count;
        }

        info!(workers = report.spawned, batches = report.batches.len(), "starting workers");
        Ok(report)
    }

    fn request(&self, template: &WorkerTemplate) -> WorkerTaskRequest {
        WorkerTaskRequest {
            id: self.ids.generate_worker_task_id(),
            route: self.route.clone(),
            spec: WorkerSpec::new(self.partitioner.assign_tag(), template.settings.clone()),
            identity: template.identity.clone(),
            retry: self.retry,
            enqueued_at: self.clock.now(),
            consecutive_failures: 0,
        }
    }
}
