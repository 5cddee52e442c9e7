//! Impls - port のインメモリ実装（開発用・テスト用・デモ用）
//!
//! # 含まれる実装
//! - **InMemoryDispatcher**: worker dispatch queue
//! - **InMemoryCredentialStore**: identity → credentials blob
//! - **InMemoryRemoteBackend**: remote pull queue の JSON ファサード
//!
//! pull queue 本体の実装は `queue` モジュールにあります。

pub mod inmem_credentials;
pub mod inmem_dispatch;
pub mod inmem_remote;

pub use self::inmem_credentials::{InMemoryCredentialStore, TransportFactory};
pub use self::inmem_dispatch::{DispatcherOptions, InMemoryDispatcher};
pub use self::inmem_remote::{InMemoryRemoteApi, InMemoryRemoteBackend};
