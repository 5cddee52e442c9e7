//! WorkerHost - dispatch queue から worker request を取り出して実行
//!
//! - `shutdown_tx` を drop すると slot 全体が止まる
//! - 実行中の pass は中断しない（新しい request を取らなくなるだけ）
//! - pass 後に再実行するかは `ReschedulePolicy` で決める

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::worker_task::PassRunner;
use crate::impls::InMemoryDispatcher;
use crate::ports::Clock;

/// Upper bound on how long an idle slot sleeps before looking again.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// When a finished pass is put back on the dispatch queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReschedulePolicy {
    /// Keep polling: every pass is rescheduled.
    #[default]
    Always,
    /// Only failed passes are retried.
    OnFailure,
}

#[derive(Debug, Default)]
struct HostCounters {
    passes: AtomicU64,
    failures: AtomicU64,
    processed: AtomicU64,
    deleted: AtomicU64,
    dropped: AtomicU64,
}

impl HostCounters {
    fn snapshot(&self) -> HostSnapshot {
        HostSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Totals across all slots since the host started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HostSnapshot {
    pub passes: u64,
    pub failures: u64,
    pub processed: u64,
    pub deleted: u64,
    /// Reschedules refused because a purge swept the task.
    pub dropped: u64,
}

pub struct WorkerHost {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    counters: Arc<HostCounters>,
}

impl WorkerHost {
    /// Spawn `slots` concurrent executors.
    pub fn spawn(
        slots: usize,
        dispatcher: Arc<InMemoryDispatcher>,
        runner: Arc<dyn PassRunner>,
        clock: Arc<dyn Clock>,
        policy: ReschedulePolicy,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(HostCounters::default());

        let mut joins = Vec::with_capacity(slots);
        for slot in 0..slots {
            let slot_ctx = Slot {
                slot,
                dispatcher: Arc::clone(&dispatcher),
                runner: Arc::clone(&runner),
                clock: Arc::clone(&clock),
                counters: Arc::clone(&counters),
                policy,
            };
            let mut rx = shutdown_rx.clone();
            joins.push(tokio::spawn(async move {
                slot_ctx.run(&mut rx).await;
            }));
        }
        info!(slots, ?policy, "worker host started");

        Self {
            shutdown_tx,
            joins,
            counters,
        }
    }

    pub fn snapshot(&self) -> HostSnapshot {
        self.counters.snapshot()
    }

    /// Stop taking new requests. In-flight passes finish.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for every slot.
    pub async fn shutdown_and_join(self) -> HostSnapshot {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
        self.counters.snapshot()
    }
}

struct Slot {
    slot: usize,
    dispatcher: Arc<InMemoryDispatcher>,
    runner: Arc<dyn PassRunner>,
    clock: Arc<dyn Clock>,
    counters: Arc<HostCounters>,
    policy: ReschedulePolicy,
}

impl Slot {
    async fn run(&self, shutdown_rx: &mut watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let Some(mut request) = self.dispatcher.take_ready().await else {
                let wait = self.idle_wait().await;
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        // sender dropped: host is gone
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = self.dispatcher.notified() => {}
                    _ = tokio::time::sleep(wait) => {}
                }
                continue;
            };

            let result = self.runner.run_pass(&request).await;
            self.counters.passes.fetch_add(1, Ordering::Relaxed);

            let failed = match &result {
                Ok(outcome) => {
                    self.counters
                        .processed
                        .fetch_add(outcome.processed as u64, Ordering::Relaxed);
                    self.counters
                        .deleted
                        .fetch_add(outcome.deleted as u64, Ordering::Relaxed);
                    request.consecutive_failures = 0;
                    false
                }
                Err(_) => {
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    request.consecutive_failures = request.consecutive_failures.saturating_add(1);
                    true
                }
            };

            let reschedule = match self.policy {
                ReschedulePolicy::Always => true,
                ReschedulePolicy::OnFailure => failed,
            };
            if !reschedule {
                debug!(slot = self.slot, task = %request.id, "worker task finished");
                continue;
            }

            let delay = request.retry.next_delay(request.consecutive_failures);
            if !self.dispatcher.reschedule(request, delay).await {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        debug!(slot = self.slot, "worker slot stopped");
    }

    /// Time until the next pending request is due, capped at [`IDLE_POLL`].
    async fn idle_wait(&self) -> Duration {
        match self.dispatcher.next_ready_at().await {
            Some(at) => (at - self.clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(IDLE_POLL),
            None => IDLE_POLL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        LeaseSettings, PassFailure, PassOutcome, QueueError, RetryOptions, TagId, WorkerSpec,
        WorkerTaskId, WorkerTaskRequest,
    };
    use crate::ports::DispatchScheduler;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use ulid::Ulid;

    /// Clock driven by tokio's timer, so paused test time moves it too.
    struct TimerClock {
        origin: DateTime<Utc>,
        start: tokio::time::Instant,
    }

    impl TimerClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                origin: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
                start: tokio::time::Instant::now(),
            })
        }
    }

    #[async_trait]
    impl Clock for TimerClock {
        fn now(&self) -> DateTime<Utc> {
            self.origin + chrono::Duration::from_std(self.start.elapsed()).unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }
    }

    /// Succeeds or fails every pass, counting calls.
    struct Counting {
        fail: bool,
        calls: AtomicU64,
    }

    #[async_trait]
    impl PassRunner for Counting {
        async fn run_pass(&self, request: &WorkerTaskRequest) -> Result<PassOutcome, PassFailure> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(PassFailure {
                    tag: request.spec.tag.clone(),
                    started_at: chrono::Utc::now(),
                    error: QueueError::Transport("down".into()),
                });
            }
            Ok(PassOutcome {
                tag: request.spec.tag.clone(),
                processed: 1,
                deleted: 1,
                released: 0,
            })
        }
    }

    fn request(clock: &TimerClock) -> WorkerTaskRequest {
        WorkerTaskRequest {
            id: WorkerTaskId::from_ulid(Ulid::new()),
            route: "/work".into(),
            spec: WorkerSpec::new(TagId::new("tag_0"), LeaseSettings::default()),
            identity: None,
            retry: RetryOptions::new(Duration::from_millis(5), Duration::from_millis(5)),
            enqueued_at: clock.now(),
            consecutive_failures: 0,
        }
    }

    async fn run_for(
        runner: Arc<Counting>,
        policy: ReschedulePolicy,
        tasks: usize,
    ) -> (Arc<InMemoryDispatcher>, HostSnapshot) {
        let clock = TimerClock::new();
        let dispatcher = Arc::new(InMemoryDispatcher::new(clock.clone()));
        let requests = (0..tasks).map(|_| request(&clock)).collect();
        dispatcher.spawn_tasks(requests).await.unwrap();

        let host = WorkerHost::spawn(2, dispatcher.clone(), runner, clock, policy);
        tokio::time::sleep(Duration::from_millis(100)).await;
        let snapshot = host.shutdown_and_join().await;
        (dispatcher, snapshot)
    }

    #[tokio::test(start_paused = true)]
    async fn always_policy_keeps_polling() {
        let runner = Arc::new(Counting {
            fail: false,
            calls: AtomicU64::new(0),
        });
        let (dispatcher, snapshot) = run_for(runner.clone(), ReschedulePolicy::Always, 1).await;

        // 5ms backoff over 100ms of paused time
        assert!(snapshot.passes >= 10, "passes = {}", snapshot.passes);
        assert_eq!(snapshot.failures, 0);
        assert_eq!(snapshot.deleted, snapshot.passes);
        assert_eq!(dispatcher.pending_len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn on_failure_policy_finishes_successful_tasks() {
        let runner = Arc::new(Counting {
            fail: false,
            calls: AtomicU64::new(0),
        });
        let (dispatcher, snapshot) = run_for(runner.clone(), ReschedulePolicy::OnFailure, 3).await;

        assert_eq!(snapshot.passes, 3);
        assert_eq!(runner.calls.load(Ordering::Relaxed), 3);
        assert_eq!(dispatcher.pending_len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn on_failure_policy_retries_failures() {
        let runner = Arc::new(Counting {
            fail: true,
            calls: AtomicU64::new(0),
        });
        let (_dispatcher, snapshot) = run_for(runner, ReschedulePolicy::OnFailure, 1).await;

        assert!(snapshot.failures > 1);
        assert_eq!(snapshot.failures, snapshot.passes);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_stops_rescheduling() {
        let clock = TimerClock::new();
        let dispatcher = Arc::new(InMemoryDispatcher::new(clock.clone()));
        dispatcher.spawn_tasks(vec![request(&clock)]).await.unwrap();
        let runner = Arc::new(Counting {
            fail: false,
            calls: AtomicU64::new(0),
        });

        let host = WorkerHost::spawn(1, dispatcher.clone(), runner, clock, ReschedulePolicy::Always);
        tokio::time::sleep(Duration::from_millis(30)).await;
        dispatcher.purge().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let settled = host.snapshot().passes;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let snapshot = host.shutdown_and_join().await;

        assert!(settled > 0);
        assert_eq!(snapshot.passes, settled);
        assert_eq!(dispatcher.pending_len().await, 0);
    }
}
