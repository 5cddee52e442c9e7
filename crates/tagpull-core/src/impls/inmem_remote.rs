//! InMemoryRemoteBackend - remote pull queue の JSON ファサード
//!
//! 別デプロイメントが所有する queue を、REST API と同じ形の JSON で
//! 提供します。アクセストークンは呼び出しごとに検証します。
//!
//! - lease: `items` が空のときはキー自体を省略（実 API と同じ）
//! - `retry_count` を返すかどうかは設定で切り替え

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;

use crate::domain::{ItemId, RemoteError, TagId};
use crate::ports::{QueueService, RemoteLeaseRequest, RemoteTaskApi};
use crate::queue::InMemoryQueueService;

/// Server side of the fake remote queue.
pub struct InMemoryRemoteBackend {
    queue: Arc<InMemoryQueueService>,
    project: String,
    taskqueue: String,
    accepted_tokens: RwLock<HashSet<String>>,
    expose_retry_count: bool,
}

impl InMemoryRemoteBackend {
    pub fn new(
        queue: Arc<InMemoryQueueService>,
        project: impl Into<String>,
        taskqueue: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            project: project.into(),
            taskqueue: taskqueue.into(),
            accepted_tokens: RwLock::new(HashSet::new()),
            expose_retry_count: false,
        }
    }

    /// Include `retry_count` in lease responses.
    pub fn with_retry_count(mut self, expose: bool) -> Self {
        self.expose_retry_count = expose;
        self
    }

    pub fn accept_token(&self, token: impl Into<String>) {
        self.accepted_tokens
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token.into());
    }

    pub fn revoke_token(&self, token: &str) {
        self.accepted_tokens
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token);
    }

    /// Client handle presenting `token` on every call.
    pub fn api(self: &Arc<Self>, token: impl Into<String>) -> InMemoryRemoteApi {
        InMemoryRemoteApi {
            backend: Arc::clone(self),
            token: token.into(),
        }
    }

    fn check(&self, token: &str, project: &str, taskqueue: &str) -> Result<(), RemoteError> {
        let accepted = self
            .accepted_tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(token);
        if !accepted {
            return Err(RemoteError::Unauthorized);
        }
        if project != self.project || taskqueue != self.taskqueue {
            return Err(RemoteError::Transport(format!(
                "unknown queue {project}/{taskqueue}"
            )));
        }
        Ok(())
    }
}

/// Authorized client of [`InMemoryRemoteBackend`].
pub struct InMemoryRemoteApi {
    backend: Arc<InMemoryRemoteBackend>,
    token: String,
}

#[async_trait]
impl RemoteTaskApi for InMemoryRemoteApi {
    async fn lease(&self, request: &RemoteLeaseRequest) -> Result<serde_json::Value, RemoteError> {
        let backend = &self.backend;
        backend.check(&self.token, &request.project, &request.taskqueue)?;

        let items = backend
            .queue
            .lease_by_tag(
                &TagId::new(request.tag.as_str()),
                request.num_tasks,
                request.lease_duration(),
            )
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let mut body = json!({ "kind": "taskqueues#tasks" });
        if !items.is_empty() {
            let rendered: Vec<serde_json::Value> = items
                .iter()
                .map(|item| {
                    let mut task = json!({
                        "kind": "taskqueues#task",
                        "id": item.id.wire_name(),
                        "queueName": backend.taskqueue,
                        "payloadBase64": STANDARD.encode(&item.payload),
                        "tag": item.tag.as_str(),
                        "leaseTimestamp": item.lease_expiry.map(|t| t.timestamp_micros()),
                    });
                    if backend.expose_retry_count {
                        task["retry_count"] = json!(item.retry_count);
                    }
                    task
                })
                .collect();
            body["items"] = serde_json::Value::Array(rendered);
        }
        Ok(body)
    }

    async fn delete(&self, project: &str, taskqueue: &str, task_id: &str) -> Result<(), RemoteError> {
        self.backend.check(&self.token, project, taskqueue)?;
        let id = ItemId::parse(task_id).ok_or_else(|| RemoteError::NotFound(task_id.to_string()))?;
        self.backend
            .queue
            .delete_by_id(id)
            .await
            .map_err(|_| RemoteError::NotFound(task_id.to_string()))
    }

    async fn get_queue(&self, project: &str, taskqueue: &str) -> Result<serde_json::Value, RemoteError> {
        self.backend.check(&self.token, project, taskqueue)?;
        let stats = self
            .backend
            .queue
            .fetch_stats()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(json!({
            "kind": "taskqueues#taskqueue",
            "id": taskqueue,
            "stats": stats,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewWorkItem;
    use crate::ports::SystemClock;

    async fn backend_with_items(n: usize) -> Arc<InMemoryRemoteBackend> {
        let queue = Arc::new(InMemoryQueueService::new(Arc::new(SystemClock)));
        let items = (0..n)
            .map(|i| NewWorkItem::new(format!("job {i}"), TagId::new("tag_0")))
            .collect();
        queue.enqueue(items).await.unwrap();
        let backend = Arc::new(InMemoryRemoteBackend::new(queue, "s~provider", "jobs"));
        backend.accept_token("good");
        backend
    }

    fn lease_request(tag: &str) -> RemoteLeaseRequest {
        RemoteLeaseRequest {
            project: "s~provider".into(),
            taskqueue: "jobs".into(),
            tag: tag.into(),
            lease_secs: 20,
            num_tasks: 10,
        }
    }

    #[tokio::test]
    async fn lease_renders_base64_items_without_retry_count() {
        let backend = backend_with_items(2).await;
        let body = backend.api("good").lease(&lease_request("tag_0")).await.unwrap();

        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        let payload = STANDARD
            .decode(items[0]["payloadBase64"].as_str().unwrap())
            .unwrap();
        assert!(String::from_utf8(payload).unwrap().starts_with("job "));
        assert!(items[0].get("retry_count").is_none());
    }

    #[tokio::test]
    async fn empty_lease_omits_items_key() {
        let backend = backend_with_items(0).await;
        let body = backend.api("good").lease(&lease_request("tag_0")).await.unwrap();
        assert!(body.get("items").is_none());
    }

    #[tokio::test]
    async fn bad_token_is_rejected() {
        let backend = backend_with_items(1).await;
        let err = backend.api("stolen").lease(&lease_request("tag_0")).await.unwrap_err();
        assert!(matches!(err, RemoteError::Unauthorized));
    }

    #[tokio::test]
    async fn delete_twice_reports_not_found() {
        let backend = backend_with_items(1).await;
        let api = backend.api("good");
        let body = api.lease(&lease_request("tag_0")).await.unwrap();
        let id = body["items"][0]["id"].as_str().unwrap().to_string();

        api.delete("s~provider", "jobs", &id).await.unwrap();
        let err = api.delete("s~provider", "jobs", &id).await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_queue_reports_stats() {
        let backend = backend_with_items(3).await;
        let body = backend.api("good").get_queue("s~provider", "jobs").await.unwrap();
        assert_eq!(body["stats"]["totalTasks"], 3);
    }
}
