//! In-memory tagged pull queue.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use super::{ItemRecord, ItemState, MAX_ENQUEUE_BATCH};
use crate::domain::{ItemId, NewWorkItem, QueueError, QueueStats, TagId, WorkItem};
use crate::ports::{Clock, IdGenerator, QueueService, UlidGenerator};

/// In-memory queue state.
struct InMemoryQueueState {
    /// All live items (single source of truth). ULID keys keep insertion order.
    records: BTreeMap<ItemId, ItemRecord>,

    /// Lease timestamps from the last hour, oldest first.
    lease_log: VecDeque<DateTime<Utc>>,
}

impl InMemoryQueueState {
    fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            lease_log: VecDeque::new(),
        }
    }

    fn trim_lease_log(&mut self, now: DateTime<Utc>) {
        let horizon = now - chrono::Duration::hours(1);
        while let Some(front) = self.lease_log.front() {
            if *front > horizon {
                break;
            }
            self.lease_log.pop_front();
        }
    }

    fn stats(&mut self, now: DateTime<Utc>) -> QueueStats {
        self.trim_lease_log(now);
        let minute_ago = now - chrono::Duration::minutes(1);
        QueueStats {
            total_tasks: self.records.len() as u64,
            leased_last_minute: self.lease_log.iter().filter(|t| **t > minute_ago).count() as u64,
            leased_last_hour: self.lease_log.len() as u64,
        }
    }
}

/// In-memory implementation of [`QueueService`].
///
/// Lease expiry is measured against the injected clock, so tests can move
/// time forward to make leased items visible again.
pub struct InMemoryQueueService {
    state: Mutex<InMemoryQueueState>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryQueueService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        Self::with_id_generator(clock, ids)
    }

    pub fn with_id_generator(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Mutex::new(InMemoryQueueState::new()),
            clock,
            ids,
        }
    }

    /// Number of live items.
    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of live items carrying `tag`.
    pub async fn len_for_tag(&self, tag: &TagId) -> usize {
        let state = self.state.lock().await;
        state.records.values().filter(|r| &r.tag == tag).count()
    }

    /// Current state of an item, `None` once deleted.
    pub async fn item_state(&self, id: ItemId) -> Option<ItemState> {
        let now = self.clock.now();
        let state = self.state.lock().await;
        state.records.get(&id).map(|r| r.state(now))
    }

    /// Delete a single item by id.
    pub async fn delete_by_id(&self, id: ItemId) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state
            .records
            .remove(&id)
            .map(|_| ())
            .ok_or(QueueError::ItemNotFound(id.into()))
    }
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    async fn enqueue(&self, items: Vec<NewWorkItem>) -> Result<(), QueueError> {
        if items.len() > MAX_ENQUEUE_BATCH {
            return Err(QueueError::BatchTooLarge {
                size: items.len(),
                max: MAX_ENQUEUE_BATCH,
            });
        }

        let now = self.clock.now();
        let mut state = self.state.lock().await;
        for item in items {
            let id = self.ids.generate_item_id();
            state
                .records
                .insert(id, ItemRecord::new(id, item.payload, item.tag, now));
        }
        Ok(())
    }

    async fn lease_by_tag(
        &self,
        tag: &TagId,
        max_items: u32,
        lease_duration: Duration,
    ) -> Result<Vec<WorkItem>, QueueError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let mut leased = Vec::new();
        for record in state.records.values_mut() {
            if leased.len() >= max_items as usize {
                break;
            }
            if &record.tag != tag || !record.state(now).is_leaseable() {
                continue;
            }
            leased.push(record.lease(now, lease_duration));
        }

        state.lease_log.extend(std::iter::repeat_n(now, leased.len()));
        debug!(%tag, leased = leased.len(), "leased items");
        Ok(leased)
    }

    async fn delete_items(&self, items: &[WorkItem]) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        // 全件存在確認してから削除（部分削除しない）
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            match item.id.as_local() {
                Some(id) if state.records.contains_key(&id) => ids.push(id),
                _ => return Err(QueueError::ItemNotFound(item.id.clone())),
            }
        }
        for id in ids {
            state.records.remove(&id);
        }
        Ok(())
    }

    async fn fetch_stats(&self) -> Result<QueueStats, QueueError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        Ok(state.stats(now))
    }

    async fn purge(&self) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state.records.clear();
        Ok(())
    }
}
