use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::filter::FilterTrace;
use crate::model::filter::FilterConfig;

/// Immutable point-in-time capture of one view's filtered task-id set.
///
/// Snapshots are advisory data: they serialize to JSON so hosts can dump
/// them next to mismatch reports when debugging view drift.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub view_name: String,
    /// The config the view was captured with (copied, not referenced)
    pub config: FilterConfig,
    pub captured_at: DateTime<Utc>,
    /// Monotonic capture sequence number, unique per capturer
    pub seq: u64,
    pub task_count: usize,
    /// Filtered task ids in pipeline output order
    pub task_ids: Vec<String>,
    /// Whether the task source was ready when this snapshot was taken
    pub available: bool,
    pub trace: FilterTrace,
}

impl ViewSnapshot {
    pub fn contains(&self, task_id: &str) -> bool {
        self.task_ids.iter().any(|id| id == task_id)
    }
}
