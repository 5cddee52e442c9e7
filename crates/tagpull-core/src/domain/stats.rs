use serde::{Deserialize, Serialize};

/// Point-in-time queue statistics.
///
/// Eventually consistent. Only ever used as a coarse backlog signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total_tasks: u64,
    pub leased_last_minute: u64,
    pub leased_last_hour: u64,
}
