//! In-memory dashboard state shared between the poller and the web layer.

use crate::stats::{is_queue_id, sort_queue_keys, AgentStats, QueueHistory, QueueList, QueueStats};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything fetched from the backend in one poll cycle.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub queues: QueueList,
    pub stats: BTreeMap<String, QueueStats>,
    pub agents: AgentStats,
    pub history: BTreeMap<String, QueueHistory>,
    pub alarms: Value,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Numeric queue keys, sorted by queue id.
    pub fn queue_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .queues
            .keys()
            .filter(|k| is_queue_id(k))
            .cloned()
            .collect();
        sort_queue_keys(&mut keys);
        keys
    }
}

/// Latest applied snapshot plus bookkeeping.
///
/// A failed poll records its error but leaves the previous snapshot in
/// place.
#[derive(Debug, Default)]
pub struct DashboardState {
    pub snapshot: Option<Arc<Snapshot>>,
    pub applied_generation: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Public view of [`DashboardState`] for `/api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub generation: u64,
    pub loading: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub queue_count: usize,
}

impl DashboardState {
    pub fn report(&self, loading: bool) -> StatusReport {
        StatusReport {
            generation: self.applied_generation,
            loading,
            last_success: self.last_success,
            last_error: self.last_error.clone(),
            queue_count: self.snapshot.as_ref().map(|s| s.queue_keys().len()).unwrap_or(0),
        }
    }
}
