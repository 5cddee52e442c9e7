//! Domain identifiers (strongly-typed IDs).
//!
//! ULID ベースの ID を Phantom type パターンで型ごとに分けています。
//! - 時刻でソート可能（生成順）
//! - 分散生成可能（調整不要）
//! - `ItemId` と `WorkerTaskId` は混同できない

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"item-", "worker-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しません。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }

    /// Parse the prefixed form produced by `Display` (e.g. `item-01H...`).
    ///
    /// The bare ULID is accepted too.
    pub fn parse(value: &str) -> Option<Self> {
        let raw = value.strip_prefix(T::prefix()).unwrap_or(value);
        Ulid::from_string(raw).ok().map(Self::from_ulid)
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Pull queue item のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Item {}

impl IdMarker for Item {
    fn prefix() -> &'static str {
        "item-"
    }
}

/// Worker task（dispatch queue のエントリ）のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkerTask {}

impl IdMarker for WorkerTask {
    fn prefix() -> &'static str {
        "worker-"
    }
}

/// Identifier of one unit of work in the pull queue.
pub type ItemId = Id<Item>;

/// Identifier of one worker task in the dispatch queue.
pub type WorkerTaskId = Id<WorkerTask>;

/// Reference to a leased item, local or remote.
///
/// Remote queues name their own tasks; those names are opaque and are only
/// ever handed back to the same remote queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemRef {
    Local(ItemId),
    Remote(String),
}

impl ItemRef {
    pub fn as_local(&self) -> Option<ItemId> {
        match self {
            ItemRef::Local(id) => Some(*id),
            ItemRef::Remote(_) => None,
        }
    }

    /// Name on the wire: the bare ULID for local items, the remote task name otherwise.
    pub fn wire_name(&self) -> String {
        match self {
            ItemRef::Local(id) => id.as_ulid().to_string(),
            ItemRef::Remote(name) => name.clone(),
        }
    }
}

impl From<ItemId> for ItemRef {
    fn from(id: ItemId) -> Self {
        ItemRef::Local(id)
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemRef::Local(id) => write!(f, "{id}"),
            ItemRef::Remote(name) => write!(f, "remote-{name}"),
        }
    }
}
