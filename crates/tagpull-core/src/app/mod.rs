//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **TagPartitioner**: tag partition の一様選択
//! - **Producer**: tag 付き item の投入
//! - **LeasePolicy**: 1 回の lease pass（lease → stats → decide → delete）
//! - **WorkerTask / RemoteWorker**: 1 pass だけ実行する worker
//! - **WorkerPoolController**: purge → 待機 → 分割 spawn
//! - **WorkerHost**: dispatch queue から worker を実行し、再スケジュール
//! - **AppBuilder**: アプリケーションの構築とワイヤリング

pub mod builder;
pub mod handler;
pub mod host;
pub mod lease_policy;
pub mod pool_controller;
pub mod producer;
pub mod remote;
pub mod tag_partitioner;
pub mod worker_task;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::handler::{ItemHandler, LoggingHandler};
pub use self::host::{HostSnapshot, ReschedulePolicy, WorkerHost};
pub use self::lease_policy::LeasePolicy;
pub use self::pool_controller::{RestartReport, WorkerPoolController};
pub use self::producer::Producer;
pub use self::remote::{RemoteQueueService, RemoteWorker};
pub use self::tag_partitioner::TagPartitioner;
pub use self::worker_task::{PassRunner, WorkerTask};
