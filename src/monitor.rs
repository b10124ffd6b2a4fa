//! Cross-view consistency monitoring.
//!
//! The monitor captures snapshots of a caller-declared set of named views and
//! evaluates a fixed rule set against them, on a fixed interval and on
//! debounced task-count changes. It is strictly advisory: rules that fail to
//! evaluate are logged and skipped, mismatches land in a bounded deduplicated
//! log, and nothing in here can take the host down.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Duration, Local, Utc, Weekday};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::capture::SnapshotCapturer;
use crate::filter::{self, DEFAULT_WEEK_START};
use crate::model::filter::FilterConfig;
use crate::model::mismatch::{HealthStatus, Mismatch, MismatchKind, MonitorSummary, Severity};
use crate::model::snapshot::ViewSnapshot;
use crate::model::task::Task;
use crate::source::TaskSource;

/// How often a monitoring check runs while the host keeps polling
pub const DEFAULT_TICK_INTERVAL_MS: i64 = 2000;

/// Quiet period after a task-count change before a triggered check runs
pub const CHANGE_DEBOUNCE_MS: i64 = 250;

/// Width of the dedup time bucket. A persistent condition re-emits at most
/// once per bucket instead of once per tick.
pub const DEDUP_BUCKET_SECS: i64 = 30;

/// Mismatch log bound; newest entries are retained
pub const MISMATCH_LOG_LIMIT: usize = 100;

/// One named view the monitor watches, with its optional subset relation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewDeclaration {
    pub name: String,
    pub config: FilterConfig,
    /// Name of the view this one is declared to be a subset of
    #[serde(default)]
    pub subset_of: Option<String>,
}

impl ViewDeclaration {
    pub fn new(name: impl Into<String>, config: FilterConfig) -> Self {
        ViewDeclaration {
            name: name.into(),
            config,
            subset_of: None,
        }
    }

    pub fn subset_of(mut self, parent: impl Into<String>) -> Self {
        self.subset_of = Some(parent.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
enum RuleError {
    #[error("view '{declared_by}' declares subset of unknown view '{view}'")]
    UnknownView { view: String, declared_by: String },
}

/// A rule finding before it gets an id and timestamp
struct MismatchDraft {
    severity: Severity,
    kind: MismatchKind,
    affected_views: Vec<String>,
    expected: String,
    actual: String,
    resolution_hint: String,
}

/// Periodic cross-view invariant checker.
///
/// Explicitly instantiated and owned by the composition root; the host
/// drives it cooperatively with `poll`, so there is no background thread and
/// a tick can never re-enter a tick (`&mut self` makes that unrepresentable).
pub struct ConsistencyMonitor {
    views: IndexMap<String, ViewDeclaration>,
    capturer: SnapshotCapturer,
    log: VecDeque<Mismatch>,
    /// Dedup key -> last bucket it was emitted in
    dedup: HashMap<String, i64>,
    next_id: u64,
    monitoring: bool,
    last_check_at: Option<DateTime<Local>>,
    change_pending: Option<DateTime<Local>>,
    last_task_count: Option<usize>,
    tick_interval: Duration,
    week_start: Weekday,
}

impl Default for ConsistencyMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsistencyMonitor {
    pub fn new() -> Self {
        ConsistencyMonitor {
            views: IndexMap::new(),
            capturer: SnapshotCapturer::new(),
            log: VecDeque::new(),
            dedup: HashMap::new(),
            next_id: 0,
            monitoring: false,
            last_check_at: None,
            change_pending: None,
            last_task_count: None,
            tick_interval: Duration::milliseconds(DEFAULT_TICK_INTERVAL_MS),
            week_start: DEFAULT_WEEK_START,
        }
    }

    pub fn with_week_start(mut self, week_start: Weekday) -> Self {
        self.week_start = week_start;
        self
    }

    /// Begin monitoring the declared views. Replaces any previous
    /// declaration set and resets tick scheduling.
    pub fn start(&mut self, declarations: Vec<ViewDeclaration>) {
        self.views = declarations
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();
        self.monitoring = true;
        self.last_check_at = None;
        self.change_pending = None;
        self.last_task_count = None;
        tracing::debug!(views = self.views.len(), "consistency monitor started");
    }

    /// Stop monitoring. Synchronously clears all tick scheduling state;
    /// the mismatch log is retained for inspection.
    pub fn stop(&mut self) {
        self.monitoring = false;
        self.last_check_at = None;
        self.change_pending = None;
        self.last_task_count = None;
        tracing::debug!("consistency monitor stopped");
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Tell the monitor the task collection may have changed (the host's
    /// invalidation hook). Restarts the debounce window.
    pub fn notify_change(&mut self, now: DateTime<Local>) {
        if self.monitoring {
            self.change_pending = Some(now);
        }
    }

    /// Cooperative tick. Runs a check when the interval has elapsed or a
    /// debounced change is pending; returns whether a check ran.
    pub fn poll(&mut self, source: &dyn TaskSource, now: DateTime<Local>) -> bool {
        if !self.monitoring {
            return false;
        }

        // Watch the task count ourselves so hosts without change wiring
        // still get change-triggered checks.
        let count = source.task_count();
        if self.last_task_count.is_some_and(|c| c != count) {
            self.change_pending = Some(now);
        }
        self.last_task_count = Some(count);

        let interval_due = self
            .last_check_at
            .is_none_or(|t| now - t >= self.tick_interval);
        let change_due = self
            .change_pending
            .is_some_and(|t| now - t >= Duration::milliseconds(CHANGE_DEBOUNCE_MS));

        if !(interval_due || change_due) {
            return false;
        }

        self.run_check(source, now);
        self.last_check_at = Some(now);
        self.change_pending = None;
        true
    }

    /// Run a check immediately, ignoring the schedule
    pub fn force_check(&mut self, source: &dyn TaskSource, now: DateTime<Local>) {
        if self.monitoring {
            self.run_check(source, now);
            self.last_check_at = Some(now);
            self.change_pending = None;
        }
    }

    /// Mismatches newest-first, optionally restricted to one severity
    pub fn mismatches(&self, severity: Option<Severity>, limit: usize) -> Vec<Mismatch> {
        self.log
            .iter()
            .rev()
            .filter(|m| severity.is_none_or(|s| m.severity == s))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Overall health with strict precedence: error > warning > info >
    /// healthy
    pub fn summary(&self) -> MonitorSummary {
        let errors = self.count_severity(Severity::Error);
        let warnings = self.count_severity(Severity::Warning);
        match self.log.iter().map(|m| m.severity).max() {
            None => MonitorSummary {
                status: HealthStatus::Healthy,
                message: if self.monitoring {
                    format!("{} view(s) consistent", self.views.len())
                } else {
                    "monitor idle, no mismatches recorded".to_string()
                },
            },
            Some(worst) => MonitorSummary {
                status: HealthStatus::from(worst),
                message: format!(
                    "{errors} error(s), {warnings} warning(s) in mismatch log"
                ),
            },
        }
    }

    /// Latest retained snapshot for a view, for host diagnostics
    pub fn latest_snapshot(&self, view_name: &str) -> Option<&ViewSnapshot> {
        self.capturer.latest(view_name)
    }

    pub fn clear_mismatches(&mut self) {
        self.log.clear();
        self.dedup.clear();
    }

    fn count_severity(&self, severity: Severity) -> usize {
        self.log.iter().filter(|m| m.severity == severity).count()
    }

    // -----------------------------------------------------------------------
    // Check cycle
    // -----------------------------------------------------------------------

    fn run_check(&mut self, source: &dyn TaskSource, now: DateTime<Local>) {
        let declarations: Vec<ViewDeclaration> = self.views.values().cloned().collect();

        let mut snapshots: IndexMap<String, ViewSnapshot> = IndexMap::new();
        for decl in &declarations {
            let snapshot =
                self.capturer
                    .capture(source, &decl.name, &decl.config, now, self.week_start);
            snapshots.insert(decl.name.clone(), snapshot);
        }

        // An unready source yields empty snapshots across the board; rules
        // over those would only manufacture noise, so skip them.
        if !source.is_ready() {
            return;
        }

        let tasks = source.all_tasks();

        for decl in &declarations {
            if let Some(parent) = decl.subset_of.clone() {
                match Self::check_subset_pair(decl, &parent, &snapshots) {
                    Ok(drafts) => {
                        for draft in drafts {
                            self.record(draft, now);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "rule evaluation failed, continuing");
                    }
                }
            }

            if let Some(draft) = Self::check_hidden_done(&tasks, decl, now, self.week_start) {
                self.record(draft, now);
            }
        }
    }

    /// Subset rule and count-bound rule for one declared pair
    fn check_subset_pair(
        child: &ViewDeclaration,
        parent_name: &str,
        snapshots: &IndexMap<String, ViewSnapshot>,
    ) -> Result<Vec<MismatchDraft>, RuleError> {
        let missing = |view: &str| RuleError::UnknownView {
            view: view.to_string(),
            declared_by: child.name.clone(),
        };
        let child_snap = snapshots.get(&child.name).ok_or_else(|| missing(&child.name))?;
        let parent_snap = snapshots.get(parent_name).ok_or_else(|| missing(parent_name))?;

        let parent_ids: HashSet<&str> =
            parent_snap.task_ids.iter().map(String::as_str).collect();
        let orphans: Vec<&str> = child_snap
            .task_ids
            .iter()
            .map(String::as_str)
            .filter(|id| !parent_ids.contains(id))
            .collect();

        let mut drafts = Vec::new();

        if !orphans.is_empty() {
            let preview = if orphans.len() > 3 {
                format!("{} (+{} more)", orphans[..3].join(", "), orphans.len() - 3)
            } else {
                orphans.join(", ")
            };
            drafts.push(MismatchDraft {
                severity: Severity::Error,
                kind: MismatchKind::TaskMissing,
                affected_views: vec![parent_name.to_string(), child.name.clone()],
                expected: format!(
                    "every task in '{}' present in '{}'",
                    child.name, parent_name
                ),
                actual: format!("{} orphan task(s): {}", orphans.len(), preview),
                resolution_hint: format!(
                    "check that '{}' only narrows '{}' with intersecting stages",
                    child.name, parent_name
                ),
            });
        }

        if child_snap.task_count > parent_snap.task_count {
            drafts.push(MismatchDraft {
                severity: Severity::Error,
                kind: MismatchKind::CountMismatch,
                affected_views: vec![parent_name.to_string(), child.name.clone()],
                expected: format!(
                    "count('{}') <= count('{}') = {}",
                    child.name, parent_name, parent_snap.task_count
                ),
                actual: format!("count('{}') = {}", child.name, child_snap.task_count),
                resolution_hint: "a subset view cannot outgrow its parent".to_string(),
            });
        }

        Ok(drafts)
    }

    /// Non-negativity rule: the hidden-done count derived for a view can
    /// never be below zero. A violation means the pipeline drifted.
    fn check_hidden_done(
        tasks: &[Task],
        decl: &ViewDeclaration,
        now: DateTime<Local>,
        week_start: Weekday,
    ) -> Option<MismatchDraft> {
        let mut with_done = decl.config.clone();
        with_done.hide_done = false;
        let mut without_done = decl.config.clone();
        without_done.hide_done = true;

        let all = filter::apply_at(tasks, &with_done, now, week_start).tasks.len() as i64;
        let visible = filter::apply_at(tasks, &without_done, now, week_start).tasks.len() as i64;
        let hidden = all - visible;

        (hidden < 0).then(|| MismatchDraft {
            severity: Severity::Warning,
            kind: MismatchKind::LogicViolation,
            affected_views: vec![decl.name.clone()],
            expected: format!("hidden-done count for '{}' >= 0", decl.name),
            actual: format!("hidden-done count = {hidden}"),
            resolution_hint: "hide_done must be a pure narrowing of the same stages".to_string(),
        })
    }

    /// Append a finding unless the same condition was already emitted in the
    /// current dedup bucket
    fn record(&mut self, draft: MismatchDraft, now: DateTime<Local>) {
        let bucket = now.timestamp().div_euclid(DEDUP_BUCKET_SECS);
        let key = format!(
            "{}|{}|{}|{}",
            draft.kind.as_str(),
            draft.expected,
            draft.actual,
            draft.affected_views.join(",")
        );
        if self.dedup.get(&key) == Some(&bucket) {
            return;
        }
        self.dedup.insert(key, bucket);
        self.dedup.retain(|_, b| bucket - *b <= 1);

        self.next_id += 1;
        self.log.push_back(Mismatch {
            id: self.next_id,
            detected_at: Utc::now(),
            severity: draft.severity,
            kind: draft.kind,
            affected_views: draft.affected_views,
            expected: draft.expected,
            actual: draft.actual,
            resolution_hint: draft.resolution_hint,
        });
        while self.log.len() > MISMATCH_LOG_LIMIT {
            self.log.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{Instance, Task};
    use crate::source::TaskRepository;
    use chrono::TimeZone;

    /// A "now" aligned to the start of a dedup bucket so short offsets in
    /// tests never straddle a bucket boundary
    fn aligned_now() -> DateTime<Local> {
        let now = Local::now();
        now - Duration::seconds(now.timestamp().rem_euclid(DEDUP_BUCKET_SECS))
    }

    fn old_task(id: &str) -> Task {
        let mut task = Task::new(id, id);
        task.created_at = chrono::Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap();
        task.updated_at = task.created_at;
        task
    }

    /// Board=[T1..T10] (project alpha), Today=[T1,T2,T11] where T11 carries
    /// another project and so escapes the board
    fn drifted_repo(now: DateTime<Local>) -> TaskRepository {
        let today = now.date_naive().format("%Y-%m-%d").to_string();
        let mut tasks = Vec::new();
        for i in 1..=10 {
            let mut task = old_task(&format!("T{i}"));
            task.project_id = Some("alpha".into());
            if i <= 2 {
                task.instances = vec![Instance::on(today.clone())];
            }
            tasks.push(task);
        }
        let mut stray = old_task("T11");
        stray.project_id = Some("beta".into());
        stray.instances = vec![Instance::on(today)];
        tasks.push(stray);
        TaskRepository::with_tasks(tasks)
    }

    fn board_today_declarations() -> Vec<ViewDeclaration> {
        vec![
            ViewDeclaration::new("Board", FilterConfig::new().for_project("alpha")),
            ViewDeclaration::new("Today", FilterConfig::new().with_smart_view("today"))
                .subset_of("Board"),
        ]
    }

    #[test]
    fn orphan_in_subset_emits_one_task_missing_error() {
        let now = aligned_now();
        let repo = drifted_repo(now);
        let mut monitor = ConsistencyMonitor::new();
        monitor.start(board_today_declarations());

        assert!(monitor.poll(&repo, now));

        let mismatches = monitor.mismatches(None, 10);
        assert_eq!(mismatches.len(), 1);
        let m = &mismatches[0];
        assert_eq!(m.kind, MismatchKind::TaskMissing);
        assert_eq!(m.severity, Severity::Error);
        assert_eq!(m.affected_views, vec!["Board", "Today"]);
        assert!(m.actual.contains("1 orphan task(s)"));
        assert!(m.actual.contains("T11"));
    }

    #[test]
    fn persistent_condition_dedups_within_bucket() {
        let now = aligned_now();
        let repo = drifted_repo(now);
        let mut monitor = ConsistencyMonitor::new();
        monitor.start(board_today_declarations());

        assert!(monitor.poll(&repo, now));
        // Next interval tick lands in the same dedup bucket
        assert!(monitor.poll(&repo, now + Duration::seconds(2)));
        assert_eq!(monitor.mismatches(None, 10).len(), 1);

        // A new bucket re-emits the persistent condition
        assert!(monitor.poll(&repo, now + Duration::seconds(DEDUP_BUCKET_SECS + 1)));
        assert_eq!(monitor.mismatches(None, 10).len(), 2);
    }

    #[test]
    fn consistent_views_stay_healthy() {
        let now = aligned_now();
        let repo = drifted_repo(now);
        let mut monitor = ConsistencyMonitor::new();
        monitor.start(vec![
            ViewDeclaration::new("Board", FilterConfig::new().for_project("alpha")),
            ViewDeclaration::new(
                "Visible",
                FilterConfig::new().for_project("alpha").hiding_done(),
            )
            .subset_of("Board"),
        ]);

        assert!(monitor.poll(&repo, now));
        assert!(monitor.mismatches(None, 10).is_empty());
        let summary = monitor.summary();
        assert_eq!(summary.status, HealthStatus::Healthy);
        assert!(summary.message.contains("2 view(s)"));
    }

    #[test]
    fn summary_precedence_picks_error_over_warning() {
        let now = aligned_now();
        let mut monitor = ConsistencyMonitor::new();
        monitor.record(
            MismatchDraft {
                severity: Severity::Warning,
                kind: MismatchKind::LogicViolation,
                affected_views: vec!["A".into()],
                expected: "x".into(),
                actual: "y".into(),
                resolution_hint: String::new(),
            },
            now,
        );
        monitor.record(
            MismatchDraft {
                severity: Severity::Error,
                kind: MismatchKind::CountMismatch,
                affected_views: vec!["A".into(), "B".into()],
                expected: "x".into(),
                actual: "y".into(),
                resolution_hint: String::new(),
            },
            now,
        );
        let summary = monitor.summary();
        assert_eq!(summary.status, HealthStatus::Error);
        assert!(summary.message.contains("1 error(s)"));
        assert!(summary.message.contains("1 warning(s)"));
    }

    #[test]
    fn severity_filter_and_limit() {
        let now = aligned_now();
        let mut monitor = ConsistencyMonitor::new();
        for i in 0..5 {
            monitor.record(
                MismatchDraft {
                    severity: if i % 2 == 0 {
                        Severity::Error
                    } else {
                        Severity::Warning
                    },
                    kind: MismatchKind::CountMismatch,
                    affected_views: vec![format!("V{i}")],
                    expected: format!("e{i}"),
                    actual: format!("a{i}"),
                    resolution_hint: String::new(),
                },
                now,
            );
        }
        assert_eq!(monitor.mismatches(Some(Severity::Error), 10).len(), 3);
        assert_eq!(monitor.mismatches(Some(Severity::Warning), 10).len(), 2);
        let limited = monitor.mismatches(None, 2);
        assert_eq!(limited.len(), 2);
        // Newest first
        assert!(limited[0].id > limited[1].id);
    }

    #[test]
    fn log_is_bounded_newest_retained() {
        let now = aligned_now();
        let mut monitor = ConsistencyMonitor::new();
        for i in 0..(MISMATCH_LOG_LIMIT + 20) {
            monitor.record(
                MismatchDraft {
                    severity: Severity::Info,
                    kind: MismatchKind::LogicViolation,
                    affected_views: vec![format!("V{i}")],
                    expected: format!("e{i}"),
                    actual: format!("a{i}"),
                    resolution_hint: String::new(),
                },
                now,
            );
        }
        let all = monitor.mismatches(None, MISMATCH_LOG_LIMIT + 50);
        assert_eq!(all.len(), MISMATCH_LOG_LIMIT);
        // The oldest entries were evicted
        assert_eq!(all.last().unwrap().id, 21);
    }

    #[test]
    fn unknown_parent_view_is_absorbed() {
        let now = aligned_now();
        let repo = drifted_repo(now);
        let mut monitor = ConsistencyMonitor::new();
        monitor.start(vec![
            ViewDeclaration::new("Board", FilterConfig::new().for_project("alpha"))
                .subset_of("Ghost"),
        ]);
        assert!(monitor.poll(&repo, now));
        assert!(monitor.mismatches(None, 10).is_empty());
    }

    #[test]
    fn poll_respects_interval_and_debounce() {
        let now = aligned_now();
        let mut repo = drifted_repo(now);
        let mut monitor = ConsistencyMonitor::new();
        monitor.start(vec![ViewDeclaration::new(
            "All",
            FilterConfig::default(),
        )]);

        // First poll always checks
        assert!(monitor.poll(&repo, now));
        // Within the interval, nothing due
        assert!(!monitor.poll(&repo, now + Duration::milliseconds(500)));

        // A task-count change schedules a debounced check
        repo.apply_mutation(crate::source::TaskMutation::Create(Task::new("X", "x")))
            .unwrap();
        assert!(!monitor.poll(&repo, now + Duration::milliseconds(600)));
        assert!(monitor.poll(&repo, now + Duration::milliseconds(1000)));
    }

    #[test]
    fn stop_halts_polling_and_keeps_log() {
        let now = aligned_now();
        let repo = drifted_repo(now);
        let mut monitor = ConsistencyMonitor::new();
        monitor.start(board_today_declarations());
        assert!(monitor.poll(&repo, now));
        assert_eq!(monitor.mismatches(None, 10).len(), 1);

        monitor.stop();
        assert!(!monitor.is_monitoring());
        assert!(!monitor.poll(&repo, now + Duration::seconds(60)));
        assert_eq!(monitor.mismatches(None, 10).len(), 1);
    }

    #[test]
    fn status_transitions_idle_monitoring_idle() {
        let mut monitor = ConsistencyMonitor::new();
        assert!(!monitor.is_monitoring());
        monitor.start(Vec::new());
        assert!(monitor.is_monitoring());
        monitor.stop();
        assert!(!monitor.is_monitoring());
    }

    #[test]
    fn count_bound_violation_emits_count_mismatch() {
        let now = aligned_now();
        // Child strictly bigger than parent: parent has a project filter,
        // child is everything
        let repo = drifted_repo(now);
        let mut monitor = ConsistencyMonitor::new();
        monitor.start(vec![
            ViewDeclaration::new("Board", FilterConfig::new().for_project("alpha")),
            ViewDeclaration::new("Everything", FilterConfig::default()).subset_of("Board"),
        ]);
        assert!(monitor.poll(&repo, now));
        let kinds: Vec<MismatchKind> = monitor
            .mismatches(None, 10)
            .iter()
            .map(|m| m.kind)
            .collect();
        assert!(kinds.contains(&MismatchKind::TaskMissing));
        assert!(kinds.contains(&MismatchKind::CountMismatch));
    }
}
