//! DispatchScheduler port - worker task の配送キュー
//!
//! worker task は 1 pass ごとに終了し、scheduler が再実行します。
//! purge は未実行の worker task を取り除く唯一のキャンセル手段です。

use async_trait::async_trait;

use crate::domain::{DispatchError, WorkerTaskRequest};

/// Hard limit on tasks per spawn call.
pub const MAX_SPAWN_BATCH: usize = 100;

#[async_trait]
pub trait DispatchScheduler: Send + Sync {
    /// Enqueue worker tasks. At most `MAX_SPAWN_BATCH` per call.
    async fn spawn_tasks(&self, tasks: Vec<WorkerTaskRequest>) -> Result<(), DispatchError>;

    /// Remove every pending worker task. Idempotent.
    ///
    /// Purges resolve with ~1s granularity, so a task enqueued right after a
    /// purge may still be swept.
    async fn purge(&self) -> Result<(), DispatchError>;
}
