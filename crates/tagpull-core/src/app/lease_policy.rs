//! LeasePolicy - 1 回の lease pass
//!
//! # 流れ
//! 1. spec の tag で最大 batch_size 件を lease（空は正常）
//! 2. QueueStats を取得（失敗したら backlog 不明として続行）
//! 3. item ごとに handler → Decider で delete / release を決める
//! 4. delete は item ごとに発行（失敗は warn して続行）
//!
//! lease 自体の失敗だけが `PassFailure` になります。
//! 再実行するかどうかは host が決めます。

use std::slice;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use super::handler::{ItemHandler, LoggingHandler};
use crate::domain::{
    Decider, DefaultDecider, Disposition, LeaseBatch, PassFailure, PassOutcome, QueueError, TagId,
    WorkerSpec,
};
use crate::ports::{Clock, QueueService, RandomSource};

pub struct LeasePolicy {
    decider: Arc<dyn Decider>,
    rng: Arc<dyn RandomSource>,
    handler: Arc<dyn ItemHandler>,
    clock: Arc<dyn Clock>,
}

impl LeasePolicy {
    pub fn new(clock: Arc<dyn Clock>, rng: Arc<dyn RandomSource>) -> Self {
        Self {
            decider: Arc::new(DefaultDecider::default()),
            rng,
            handler: Arc::new(LoggingHandler),
            clock,
        }
    }

    pub fn with_decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = decider;
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn ItemHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Failure for a pass that could not even start (e.g. no credentials).
    pub fn failure(&self, tag: &TagId, error: QueueError) -> PassFailure {
        fail(tag, self.clock.now(), error)
    }

    /// Run one pass against `queue` for the worker bound to `spec`.
    #[instrument(skip_all, fields(tag = %spec.tag))]
    pub async fn run_pass(
        &self,
        queue: &dyn QueueService,
        spec: &WorkerSpec,
    ) -> Result<PassOutcome, PassFailure> {
        let started_at = self.clock.now();
        let settings = &spec.settings;
        info!(tag = %spec.tag, "leasing for tag");

        let items = match queue
            .lease_by_tag(&spec.tag, settings.batch_size, settings.lease_duration)
            .await
        {
            Ok(items) => items,
            Err(error) => return Err(fail(&spec.tag, started_at, error)),
        };
        let batch = LeaseBatch {
            tag: spec.tag.clone(),
            items,
            lease_duration: settings.lease_duration,
        };

        if batch.is_empty() {
            debug!(tag = %spec.tag, "nothing to lease");
            return Ok(PassOutcome::empty(batch.tag));
        }

        let backlog = match queue.fetch_stats().await {
            Ok(stats) => {
                info!(
                    total_tasks = stats.total_tasks,
                    leased_last_minute = stats.leased_last_minute,
                    "jobs stats"
                );
                Some(stats.total_tasks)
            }
            Err(error) => {
                warn!(%error, "stats fetch failed; backlog unknown");
                None
            }
        };

        let mut outcome = PassOutcome::empty(batch.tag.clone());
        for item in &batch.items {
            outcome.processed += 1;

            if let Err(error) = self.handler.handle(item).await {
                warn!(item = %item.id, %error, "handler failed; leaving item leased");
                outcome.released += 1;
                continue;
            }

            let disposition = self.decider.decide(
                item,
                backlog,
                settings.max_leases_per_item,
                self.rng.as_ref(),
            );
            match disposition {
                Disposition::Delete(reason) => {
                    match queue.delete_items(slice::from_ref(item)).await {
                        Ok(()) => {
                            debug!(item = %item.id, retry_count = ?item.retry_count, ?reason, "deleted");
                            outcome.deleted += 1;
                        }
                        Err(error) => {
                            // 二重 delete など。pass は止めない
                            warn!(item = %item.id, %error, "delete failed");
                            outcome.released += 1;
                        }
                    }
                }
                Disposition::Release => {
                    debug!(item = %item.id, retry_count = ?item.retry_count, "released for retry");
                    outcome.released += 1;
                }
            }
        }

        info!(
            processed = outcome.processed,
            deleted = outcome.deleted,
            released = outcome.released,
            "pass complete"
        );
        Ok(outcome)
    }
}

fn fail(tag: &TagId, started_at: DateTime<Utc>, error: QueueError) -> PassFailure {
    error!(%tag, %started_at, %error, "lease exception");
    PassFailure {
        tag: tag.clone(),
        started_at,
        error,
    }
}
