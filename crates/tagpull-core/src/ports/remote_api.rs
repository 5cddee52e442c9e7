//! RemoteTaskApi port - 別デプロイメントの pull queue への RPC
//!
//! レスポンスは JSON のまま返します。形の解釈（items が無い等）は
//! adapter 側で行います。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::RemoteError;

/// Parameters of a grouped-by-tag lease call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLeaseRequest {
    pub project: String,
    pub taskqueue: String,
    pub tag: String,
    pub lease_secs: u64,
    pub num_tasks: u32,
}

#[async_trait]
pub trait RemoteTaskApi: Send + Sync {
    async fn lease(&self, request: &RemoteLeaseRequest) -> Result<serde_json::Value, RemoteError>;

    async fn delete(&self, project: &str, taskqueue: &str, task_id: &str) -> Result<(), RemoteError>;

    /// Queue metadata including `stats`.
    async fn get_queue(&self, project: &str, taskqueue: &str) -> Result<serde_json::Value, RemoteError>;
}

impl RemoteLeaseRequest {
    /// Whole seconds for the wire, rounded up so a short lease never becomes zero.
    pub fn lease_secs_for(duration: Duration) -> u64 {
        duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
    }

    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Duration::ZERO, 0)]
    #[case(Duration::from_millis(20), 1)]
    #[case(Duration::from_secs(10), 10)]
    #[case(Duration::from_millis(10_500), 11)]
    fn lease_secs_round_up(#[case] duration: Duration, #[case] expected: u64) {
        assert_eq!(RemoteLeaseRequest::lease_secs_for(duration), expected);
    }
}
