//! Queue module: item state, lease bookkeeping, and the in-memory queue service.

mod memory;
mod record;
mod state;

pub use memory::InMemoryQueueService;
pub use record::ItemRecord;
pub use state::ItemState;

/// Hard limit on items per enqueue call.
pub const MAX_ENQUEUE_BATCH: usize = 100;
