//! tagpull-core
//!
//! Tagged pull queue の lease / retry / tag partitioning エンジン。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, tag, item, spec, retry, decision, outcome, errors, credentials）
//! - **ports**: 抽象化レイヤー（QueueService, DispatchScheduler, CredentialStore, RemoteTaskApi, Clock, RandomSource, IdGenerator）
//! - **queue**: tagged pull queue のインメモリ実装
//! - **impls**: その他 port のインメモリ実装（dispatcher, credential store, remote backend）
//! - **app**: アプリケーションロジック（partitioner, producer, lease policy, worker, controller, host, builder）
//! - **config**: 構成値（環境変数からの読み込みと起動時検証）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;
