//! InMemoryDispatcher - 開発用の worker dispatch queue
//!
//! # purge の解像度
//! 実際の scheduler では purge は約 1 秒の解像度で伝播し、さらにサーバー間の
//! 時計のずれ（最大 1 秒）があります。ここではそれを「purge 時刻 +
//! resolution + skew より前に enqueue された task はすべて掃除される」として
//! 再現します。purge 直後に spawn した task が消えるのはこのためです。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

use crate::domain::{DispatchError, WorkerTaskRequest};
use crate::ports::{Clock, DispatchScheduler, MAX_SPAWN_BATCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherOptions {
    pub purge_resolution: Duration,
    pub clock_skew: Duration,
    pub max_batch: usize,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            purge_resolution: Duration::from_secs(1),
            clock_skew: Duration::from_secs(1),
            max_batch: MAX_SPAWN_BATCH,
        }
    }
}

fn offset(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|d| at.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[derive(Debug)]
struct Pending {
    request: WorkerTaskRequest,
    ready_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct DispatcherState {
    pending: Vec<Pending>,

    /// Tasks enqueued before this instant belong to a purge.
    purge_horizon: Option<DateTime<Utc>>,

    /// Size of every accepted spawn call, in order.
    spawn_batches: Vec<usize>,
}

impl DispatcherState {
    fn is_swept(&self, request: &WorkerTaskRequest) -> bool {
        self.purge_horizon
            .is_some_and(|horizon| request.enqueued_at < horizon)
    }

    fn sweep(&mut self) {
        let Some(horizon) = self.purge_horizon else {
            return;
        };
        let before = self.pending.len();
        self.pending.retain(|p| p.request.enqueued_at >= horizon);
        let swept = before - self.pending.len();
        if swept > 0 {
            debug!(swept, "swept purged worker tasks");
        }
    }
}

/// InMemoryDispatcher は開発用の dispatch queue
///
/// - `spawn_tasks` / `purge` は controller 側（DispatchScheduler）
/// - `take_ready` / `reschedule` は host 側
pub struct InMemoryDispatcher {
    state: Mutex<DispatcherState>,
    clock: Arc<dyn Clock>,
    options: DispatcherOptions,
    /// spawn / reschedule 時の通知用
    notify: Notify,
}

impl InMemoryDispatcher {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_options(clock, DispatcherOptions::default())
    }

    pub fn with_options(clock: Arc<dyn Clock>, options: DispatcherOptions) -> Self {
        Self {
            state: Mutex::new(DispatcherState::default()),
            clock,
            options,
            notify: Notify::new(),
        }
    }

    /// Pop one task whose backoff has elapsed.
    pub async fn take_ready(&self) -> Option<WorkerTaskRequest> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.sweep();
        let idx = state.pending.iter().position(|p| p.ready_at <= now)?;
        Some(state.pending.remove(idx).request)
    }

    /// Earliest instant at which a pending task becomes ready.
    pub async fn next_ready_at(&self) -> Option<DateTime<Utc>> {
        let mut state = self.state.lock().await;
        state.sweep();
        state.pending.iter().map(|p| p.ready_at).min()
    }

    /// Put a task back after a pass. Returns `false` if a purge swept it.
    pub async fn reschedule(&self, request: WorkerTaskRequest, delay: Duration) -> bool {
        let now = self.clock.now();
        let ready_at = offset(now, delay);
        {
            let mut state = self.state.lock().await;
            if state.is_swept(&request) {
                debug!(task = %request.id, "dropping reschedule of purged worker task");
                return false;
            }
            state.pending.push(Pending { request, ready_at });
        }
        self.notify.notify_waiters();
        true
    }

    /// Resolves on the next spawn or reschedule.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    /// Tasks still waiting to run (purged ones excluded).
    pub async fn pending_len(&self) -> usize {
        let mut state = self.state.lock().await;
        state.sweep();
        state.pending.len()
    }

    /// Snapshot of pending requests.
    pub async fn pending(&self) -> Vec<WorkerTaskRequest> {
        let mut state = self.state.lock().await;
        state.sweep();
        state.pending.iter().map(|p| p.request.clone()).collect()
    }

    pub async fn spawn_batches(&self) -> Vec<usize> {
        self.state.lock().await.spawn_batches.clone()
    }
}

#[async_trait]
impl DispatchScheduler for InMemoryDispatcher {
    async fn spawn_tasks(&self, tasks: Vec<WorkerTaskRequest>) -> Result<(), DispatchError> {
        if tasks.len() > self.options.max_batch {
            return Err(DispatchError::BatchTooLarge {
                size: tasks.len(),
                max: self.options.max_batch,
            });
        }

        let now = self.clock.now();
        {
            let mut state = self.state.lock().await;
            state.spawn_batches.push(tasks.len());
            state.pending.extend(tasks.into_iter().map(|request| Pending {
                request,
                ready_at: now,
            }));
            // purge の伝播範囲内に入った task はここで消える
            state.sweep();
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn purge(&self) -> Result<(), DispatchError> {
        let horizon = offset(
            self.clock.now(),
            self.options.purge_resolution + self.options.clock_skew,
        );

        let mut state = self.state.lock().await;
        state.purge_horizon = Some(state.purge_horizon.map_or(horizon, |h| h.max(horizon)));
        state.sweep();
        info!(horizon = %horizon, "purged worker dispatch queue");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LeaseSettings, RetryOptions, TagId, WorkerSpec, WorkerTaskId};
    use crate::ports::FixedClock;
    use chrono::TimeZone;
    use ulid::Ulid;

    fn setup() -> (Arc<FixedClock>, InMemoryDispatcher) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let dispatcher = InMemoryDispatcher::new(clock.clone());
        (clock, dispatcher)
    }

    fn request(enqueued_at: DateTime<Utc>) -> WorkerTaskRequest {
        WorkerTaskRequest {
            id: WorkerTaskId::from_ulid(Ulid::new()),
            route: "/work".into(),
            spec: WorkerSpec::new(TagId::new("tag_0"), LeaseSettings::default()),
            identity: None,
            retry: RetryOptions::default(),
            enqueued_at,
            consecutive_failures: 0,
        }
    }

    #[tokio::test]
    async fn spawn_then_take() {
        let (clock, dispatcher) = setup();
        dispatcher
            .spawn_tasks(vec![request(clock.now()), request(clock.now())])
            .await
            .unwrap();

        assert_eq!(dispatcher.spawn_batches().await, vec![2]);
        assert!(dispatcher.take_ready().await.is_some());
        assert!(dispatcher.take_ready().await.is_some());
        assert!(dispatcher.take_ready().await.is_none());
    }

    #[tokio::test]
    async fn rejects_batches_over_limit() {
        let (clock, dispatcher) = setup();
        let tasks = (0..101).map(|_| request(clock.now())).collect();
        let err = dispatcher.spawn_tasks(tasks).await.unwrap_err();
        assert!(matches!(err, DispatchError::BatchTooLarge { size: 101, max: 100 }));
        assert!(dispatcher.spawn_batches().await.is_empty());
    }

    #[tokio::test]
    async fn reschedule_respects_backoff() {
        let (clock, dispatcher) = setup();
        assert!(
            dispatcher
                .reschedule(request(clock.now()), Duration::from_millis(500))
                .await
        );
        assert!(dispatcher.take_ready().await.is_none());

        clock.advance(Duration::from_millis(500));
        assert!(dispatcher.take_ready().await.is_some());
    }

    #[tokio::test]
    async fn purge_sweeps_tasks_spawned_inside_resolution_window() {
        let (clock, dispatcher) = setup();
        dispatcher.spawn_tasks(vec![request(clock.now())]).await.unwrap();
        dispatcher.purge().await.unwrap();
        assert_eq!(dispatcher.pending_len().await, 0);

        clock.advance(Duration::from_secs(1));
        dispatcher.spawn_tasks(vec![request(clock.now())]).await.unwrap();
        assert_eq!(dispatcher.pending_len().await, 0);

        clock.advance(Duration::from_secs(1));
        dispatcher.spawn_tasks(vec![request(clock.now())]).await.unwrap();
        assert_eq!(dispatcher.pending_len().await, 1);
    }

    #[tokio::test]
    async fn in_flight_task_cannot_reschedule_after_purge() {
        let (clock, dispatcher) = setup();
        dispatcher.spawn_tasks(vec![request(clock.now())]).await.unwrap();
        let running = dispatcher.take_ready().await.unwrap();

        dispatcher.purge().await.unwrap();
        assert!(!dispatcher.reschedule(running, Duration::ZERO).await);
        assert_eq!(dispatcher.pending_len().await, 0);
    }

    #[tokio::test]
    async fn purge_of_empty_queue_is_noop() {
        let (_clock, dispatcher) = setup();
        dispatcher.purge().await.unwrap();
        dispatcher.purge().await.unwrap();
        assert_eq!(dispatcher.pending_len().await, 0);
    }
}
