use std::collections::VecDeque;

use chrono::{DateTime, Local, Utc, Weekday};

use crate::filter::{self, FilterTrace};
use crate::model::filter::FilterConfig;
use crate::model::snapshot::ViewSnapshot;
use crate::source::TaskSource;

/// How many snapshots the ring buffer retains before evicting the oldest
pub const SNAPSHOT_RING_LIMIT: usize = 64;

/// Trace warning attached to snapshots taken while the source wasn't ready
const UNAVAILABLE_WARNING: &str = "task source unavailable";

/// Wraps the filter pipeline per named view, producing immutable
/// point-in-time snapshots.
///
/// Capture never fails: this subsystem is advisory, so an unready task
/// source yields a well-formed empty snapshot instead of an error.
#[derive(Debug)]
pub struct SnapshotCapturer {
    retained: VecDeque<ViewSnapshot>,
    limit: usize,
    seq: u64,
}

impl Default for SnapshotCapturer {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCapturer {
    pub fn new() -> Self {
        Self::with_limit(SNAPSHOT_RING_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        SnapshotCapturer {
            retained: VecDeque::new(),
            limit: limit.max(1),
            seq: 0,
        }
    }

    /// Run the pipeline once for the view and record the result
    pub fn capture(
        &mut self,
        source: &dyn TaskSource,
        view_name: &str,
        config: &FilterConfig,
        now: DateTime<Local>,
        week_start: Weekday,
    ) -> ViewSnapshot {
        self.seq += 1;

        let snapshot = if source.is_ready() {
            let tasks = source.all_tasks();
            let outcome = filter::apply_at(&tasks, config, now, week_start);
            ViewSnapshot {
                view_name: view_name.to_string(),
                config: config.clone(),
                captured_at: Utc::now(),
                seq: self.seq,
                task_count: outcome.tasks.len(),
                task_ids: outcome.task_ids(),
                available: true,
                trace: outcome.trace,
            }
        } else {
            tracing::warn!(view = view_name, "capturing against an unready task source");
            let mut trace = FilterTrace::default();
            trace.warnings.push(UNAVAILABLE_WARNING.to_string());
            ViewSnapshot {
                view_name: view_name.to_string(),
                config: config.clone(),
                captured_at: Utc::now(),
                seq: self.seq,
                task_count: 0,
                task_ids: Vec::new(),
                available: false,
                trace,
            }
        };

        self.retained.push_back(snapshot.clone());
        while self.retained.len() > self.limit {
            self.retained.pop_front();
        }
        snapshot
    }

    /// Most recent snapshot captured for the named view, if still retained
    pub fn latest(&self, view_name: &str) -> Option<&ViewSnapshot> {
        self.retained
            .iter()
            .rev()
            .find(|s| s.view_name == view_name)
    }

    pub fn retained(&self) -> impl Iterator<Item = &ViewSnapshot> {
        self.retained.iter()
    }

    pub fn retained_count(&self) -> usize {
        self.retained.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DEFAULT_WEEK_START;
    use crate::model::task::Task;
    use crate::source::TaskRepository;

    struct UnreadySource;

    impl TaskSource for UnreadySource {
        fn all_tasks(&self) -> Vec<Task> {
            Vec::new()
        }

        fn is_ready(&self) -> bool {
            false
        }
    }

    fn repo() -> TaskRepository {
        TaskRepository::with_tasks(vec![Task::new("T-1", "one"), Task::new("T-2", "two")])
    }

    #[test]
    fn capture_records_ordered_ids_and_count() {
        let mut capturer = SnapshotCapturer::new();
        let snapshot = capturer.capture(
            &repo(),
            "All",
            &FilterConfig::default(),
            Local::now(),
            DEFAULT_WEEK_START,
        );
        assert_eq!(snapshot.task_ids, vec!["T-1", "T-2"]);
        assert_eq!(snapshot.task_count, 2);
        assert!(snapshot.available);
    }

    #[test]
    fn seq_is_monotonic() {
        let mut capturer = SnapshotCapturer::new();
        let source = repo();
        let config = FilterConfig::default();
        let a = capturer.capture(&source, "All", &config, Local::now(), DEFAULT_WEEK_START);
        let b = capturer.capture(&source, "All", &config, Local::now(), DEFAULT_WEEK_START);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn unready_source_yields_flagged_empty_snapshot() {
        let mut capturer = SnapshotCapturer::new();
        let snapshot = capturer.capture(
            &UnreadySource,
            "Board",
            &FilterConfig::default(),
            Local::now(),
            DEFAULT_WEEK_START,
        );
        assert!(!snapshot.available);
        assert_eq!(snapshot.task_count, 0);
        assert!(snapshot.trace.warnings.iter().any(|w| w.contains("unavailable")));
    }

    #[test]
    fn ring_buffer_evicts_oldest() {
        let mut capturer = SnapshotCapturer::with_limit(3);
        let source = repo();
        let config = FilterConfig::default();
        for name in ["a", "b", "c", "d"] {
            capturer.capture(&source, name, &config, Local::now(), DEFAULT_WEEK_START);
        }
        assert_eq!(capturer.retained_count(), 3);
        assert!(capturer.latest("a").is_none());
        assert!(capturer.latest("d").is_some());
    }

    #[test]
    fn latest_returns_newest_for_view() {
        let mut capturer = SnapshotCapturer::new();
        let source = repo();
        let config = FilterConfig::default();
        capturer.capture(&source, "All", &config, Local::now(), DEFAULT_WEEK_START);
        let second = capturer.capture(&source, "All", &config, Local::now(), DEFAULT_WEEK_START);
        assert_eq!(capturer.latest("All").unwrap().seq, second.seq);
    }
}
