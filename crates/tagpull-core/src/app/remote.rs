//! Remote variant - 別デプロイメントの pull queue を remote RPC で lease
//!
//! lease / delete / stats の前に毎回 credentials を解決して transport を
//! authorize します。decision ロジックは local と同じ `LeasePolicy` です。
//!
//! remote の lease 結果には retry_count が無いことが多いので、
//! remote worker の Decider は `MissingRetrySignal::Delete` で構成します。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::DateTime;
use serde_json::Value;
use tracing::{info, warn};

use super::lease_policy::LeasePolicy;
use super::worker_task::PassRunner;
use crate::config::RemoteConfig;
use crate::domain::{
    ItemRef, NewWorkItem, PassFailure, PassOutcome, QueueError, QueueStats, RemoteError, TagId,
    WorkItem, WorkerTaskRequest,
};
use crate::ports::{CredentialStore, QueueService, RemoteLeaseRequest, RemoteTaskApi};

/// [`QueueService`] over an authorized remote transport.
pub struct RemoteQueueService {
    store: Arc<dyn CredentialStore>,
    identity: String,
    project: String,
    taskqueue: String,
}

impl RemoteQueueService {
    pub fn new(store: Arc<dyn CredentialStore>, identity: impl Into<String>, config: &RemoteConfig) -> Self {
        Self {
            store,
            identity: identity.into(),
            project: config.project(),
            taskqueue: config.job_queue.clone(),
        }
    }

    async fn transport(&self) -> Result<Arc<dyn RemoteTaskApi>, QueueError> {
        let credentials = self
            .store
            .resolve_credentials(&self.identity)
            .await?
            .ok_or_else(|| QueueError::Unauthorized(format!("no credentials for {}", self.identity)))?;
        Ok(self.store.authorize(&credentials).await?)
    }
}

#[async_trait]
impl QueueService for RemoteQueueService {
    async fn enqueue(&self, _items: Vec<NewWorkItem>) -> Result<(), QueueError> {
        Err(QueueError::Unsupported("enqueue on a remote consumer"))
    }

    async fn lease_by_tag(
        &self,
        tag: &TagId,
        max_items: u32,
        lease_duration: Duration,
    ) -> Result<Vec<WorkItem>, QueueError> {
        let api = self.transport().await?;
        let request = RemoteLeaseRequest {
            project: self.project.clone(),
            taskqueue: self.taskqueue.clone(),
            tag: tag.to_string(),
            lease_secs: RemoteLeaseRequest::lease_secs_for(lease_duration),
            num_tasks: max_items,
        };
        let body = api.lease(&request).await?;
        Ok(parse_lease(&body, tag))
    }

    async fn delete_items(&self, items: &[WorkItem]) -> Result<(), QueueError> {
        let api = self.transport().await?;
        for item in items {
            api.delete(&self.project, &self.taskqueue, &item.id.wire_name())
                .await
                .map_err(|e| match e {
                    RemoteError::NotFound(_) => QueueError::ItemNotFound(item.id.clone()),
                    other => other.into(),
                })?;
        }
        Ok(())
    }

    async fn fetch_stats(&self) -> Result<QueueStats, QueueError> {
        let api = self.transport().await?;
        let body = api.get_queue(&self.project, &self.taskqueue).await?;
        let stats = body
            .get("stats")
            .ok_or_else(|| QueueError::MalformedResponse("queue has no stats".into()))?;
        serde_json::from_value(stats.clone()).map_err(|e| QueueError::MalformedResponse(e.to_string()))
    }

    async fn purge(&self) -> Result<(), QueueError> {
        Err(QueueError::Unsupported("purge on a remote consumer"))
    }
}

/// Items of a lease response. A missing `items` key means nothing was leased.
fn parse_lease(body: &Value, requested: &TagId) -> Vec<WorkItem> {
    let Some(items) = body.get("items").and_then(Value::as_array) else {
        info!(tag = %requested, "no task queue items returned");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|task| {
            let Some(name) = task.get("id").and_then(Value::as_str).filter(|n| !n.is_empty()) else {
                warn!(tag = %requested, "skipping task without id");
                return None;
            };
            let id = ItemRef::Remote(name.to_string());
            let payload = match task
                .get("payloadBase64")
                .and_then(Value::as_str)
                .map(|p| STANDARD.decode(p))
            {
                Some(Ok(bytes)) => bytes,
                _ => {
                    warn!(%id, "skipping task with undecodable payload");
                    return None;
                }
            };
            let tag = task
                .get("tag")
                .and_then(Value::as_str)
                .map(TagId::new)
                .unwrap_or_else(|| requested.clone());
            let retry_count = task
                .get("retry_count")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok());
            let lease_expiry = task
                .get("leaseTimestamp")
                .and_then(Value::as_i64)
                .and_then(DateTime::from_timestamp_micros);

            Some(WorkItem {
                id,
                payload,
                tag,
                retry_count,
                lease_expiry,
            })
        })
        .collect()
}

/// Worker that leases from a remote queue on behalf of an identity.
pub struct RemoteWorker {
    store: Arc<dyn CredentialStore>,
    config: RemoteConfig,
    policy: Arc<LeasePolicy>,
}

impl RemoteWorker {
    pub fn new(store: Arc<dyn CredentialStore>, config: RemoteConfig, policy: Arc<LeasePolicy>) -> Self {
        Self {
            store,
            config,
            policy,
        }
    }
}

#[async_trait]
impl PassRunner for RemoteWorker {
    async fn run_pass(&self, request: &WorkerTaskRequest) -> Result<PassOutcome, PassFailure> {
        let identity = request
            .identity
            .as_ref()
            .or(self.config.default_identity.as_ref());
        let Some(identity) = identity else {
            return Err(self.policy.failure(
                &request.spec.tag,
                QueueError::Unauthorized("worker carries no identity".into()),
            ));
        };

        let queue = RemoteQueueService::new(Arc::clone(&self.store), identity.clone(), &self.config);
        self.policy.run_pass(&queue, &request.spec).await
    }
}
