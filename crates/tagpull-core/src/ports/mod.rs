//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! 外部のコラボレーター（Queue Service, Dispatch Scheduler, Credential Store,
//! remote RPC）と、テストで差し替えたい時刻・乱数・ID 生成を trait にします。

pub mod clock;
pub mod credential_store;
pub mod dispatch;
pub mod id_generator;
pub mod queue_service;
pub mod random;
pub mod remote_api;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::credential_store::CredentialStore;
pub use self::dispatch::{DispatchScheduler, MAX_SPAWN_BATCH};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::queue_service::QueueService;
pub use self::random::{RandomSource, ScriptedRandom, ThreadRandom};
pub use self::remote_api::{RemoteLeaseRequest, RemoteTaskApi};
