//! ItemHandler - leased item の処理フック
//!
//! lease pass は deletion decision の前に各 item をここに渡します。
//! エラーになった item は削除せず release（lease 期限後に再 lease される）。

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{HandlerError, WorkItem};

/// Processes one leased item.
///
/// Handlers must tolerate seeing the same item more than once: a lease can
/// expire while a slow pass is still running.
#[async_trait]
pub trait ItemHandler: Send + Sync {
    async fn handle(&self, item: &WorkItem) -> Result<(), HandlerError>;
}

/// Logs the payload and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

#[async_trait]
impl ItemHandler for LoggingHandler {
    async fn handle(&self, item: &WorkItem) -> Result<(), HandlerError> {
        debug!(item = %item.id, tag = %item.tag, payload = %item.payload_lossy(), "task payload");
        Ok(())
    }
}
