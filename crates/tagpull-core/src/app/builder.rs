//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 差し替えたいものだけ指定し、残りは既定のインメモリ実装
//!
//! # Fail-fast 設計
//! - build() 時に PullQueueConfig::validate() を実行
//! - 不正な構成なら BuildError を返し、何もワイヤリングしない

use std::sync::Arc;

use super::handler::{ItemHandler, LoggingHandler};
use super::host::{ReschedulePolicy, WorkerHost};
use super::lease_policy::LeasePolicy;
use super::pool_controller::WorkerPoolController;
use super::producer::Producer;
use super::remote::RemoteWorker;
use super::tag_partitioner::TagPartitioner;
use super::worker_task::WorkerTask;
use crate::config::{ConfigError, PullQueueConfig, RemoteConfig};
use crate::domain::{DefaultDecider, MissingRetrySignal};
use crate::impls::InMemoryDispatcher;
use crate::ports::{
    Clock, CredentialStore, IdGenerator, QueueService, RandomSource, SystemClock, ThreadRandom,
    UlidGenerator,
};
use crate::queue::InMemoryQueueService;

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .config(PullQueueConfig::from_env()?)
///     .clock(Arc::new(SystemClock))
///     .build()?;
/// app.producer.enqueue_batch(100, 10).await?;
/// app.controller.restart(2, &WorkerTemplate::default()).await?;
/// ```
#[derive(Default)]
pub struct AppBuilder {
    config: PullQueueConfig,
    clock: Option<Arc<dyn Clock>>,
    rng: Option<Arc<dyn RandomSource>>,
    handler: Option<Arc<dyn ItemHandler>>,
    queue: Option<Arc<dyn QueueService>>,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: PullQueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Random source shared by tag selection and the retry draw.
    pub fn random(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn handler(mut self, handler: Arc<dyn ItemHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Use an existing pull queue instead of a fresh in-memory one.
    pub fn queue(mut self, queue: Arc<dyn QueueService>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// 構成を検証してから全コンポーネントを組み立てる
    pub fn build(self) -> Result<App, BuildError> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let rng = self.rng.unwrap_or_else(|| Arc::new(ThreadRandom));
        let handler = self.handler.unwrap_or_else(|| Arc::new(LoggingHandler));
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        let queue = self.queue.unwrap_or_else(|| {
            Arc::new(InMemoryQueueService::with_id_generator(
                Arc::clone(&clock),
                Arc::clone(&ids),
            ))
        });

        let partitioner = Arc::new(TagPartitioner::from_config(&self.config, Arc::clone(&rng))?);
        let dispatcher = Arc::new(InMemoryDispatcher::new(Arc::clone(&clock)));
        let policy = Arc::new(
            LeasePolicy::new(Arc::clone(&clock), Arc::clone(&rng))
                .with_decider(Arc::new(DefaultDecider::new(
                    self.config.backlog_pressure_threshold,
                    MissingRetrySignal::Release,
                )))
                .with_handler(Arc::clone(&handler)),
        );

        let producer = Producer::new(Arc::clone(&queue), Arc::clone(&partitioner));
        let controller = WorkerPoolController::new(
            &self.config,
            dispatcher.clone(),
            Arc::clone(&partitioner),
            Arc::clone(&clock),
            ids,
        );
        let worker = Arc::new(
            WorkerTask::new(Arc::clone(&queue), policy).with_partitioner(Arc::clone(&partitioner)),
        );

        Ok(App {
            config: self.config,
            clock,
            rng,
            handler,
            queue,
            dispatcher,
            partitioner,
            producer,
            controller,
            worker,
        })
    }
}

/// Wired application: one pull queue, one worker dispatch queue.
pub struct App {
    pub config: PullQueueConfig,
    pub clock: Arc<dyn Clock>,
    pub rng: Arc<dyn RandomSource>,
    pub handler: Arc<dyn ItemHandler>,
    pub queue: Arc<dyn QueueService>,
    pub dispatcher: Arc<InMemoryDispatcher>,
    pub partitioner: Arc<TagPartitioner>,
    pub producer: Producer,
    pub controller: WorkerPoolController,
    pub worker: Arc<WorkerTask>,
}

impl App {
    /// Run local workers off the dispatch queue.
    pub fn start_host(&self, slots: usize, policy: ReschedulePolicy) -> WorkerHost {
        WorkerHost::spawn(
            slots,
            Arc::clone(&self.dispatcher),
            self.worker.clone(),
            Arc::clone(&self.clock),
            policy,
        )
    }

    /// Worker leasing from another deployment's queue.
    ///
    /// Items from the remote transport carry no retry count, so this worker
    /// deletes every item it leased and processed.
    pub fn remote_worker(&self, store: Arc<dyn CredentialStore>, remote: RemoteConfig) -> RemoteWorker {
        let policy = LeasePolicy::new(Arc::clone(&self.clock), Arc::clone(&self.rng))
            .with_decider(Arc::new(DefaultDecider::new(
                self.config.backlog_pressure_threshold,
                MissingRetrySignal::Delete,
            )))
            .with_handler(Arc::clone(&self.handler));
        RemoteWorker::new(store, remote, Arc::new(policy))
    }
}
