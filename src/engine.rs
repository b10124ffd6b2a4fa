//! Composition root: wires the repository, history, and monitor together and
//! exposes the host-facing surface.

use chrono::{DateTime, Local, Weekday};

use crate::filter::{self, DEFAULT_WEEK_START, FilterOutcome};
use crate::history::HistoryManager;
use crate::model::filter::FilterConfig;
use crate::model::mismatch::{Mismatch, MonitorSummary, Severity};
use crate::model::task::Task;
use crate::monitor::{ConsistencyMonitor, ViewDeclaration};
use crate::source::{MutationError, TaskMutation, TaskRepository};

/// Notification sent to host subscribers after the task collection changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub task_count: usize,
    pub description: String,
}

type Subscriber = Box<dyn Fn(&ChangeEvent)>;

/// The engine facade owned by the host application.
///
/// All mutation flows through `apply_mutation`, which captures exactly one
/// history entry per call (batch or not), applies the change atomically, and
/// only then notifies observers; no observer can see a half-applied batch.
pub struct ViewEngine {
    repo: TaskRepository,
    history: HistoryManager,
    monitor: ConsistencyMonitor,
    subscribers: Vec<(u64, Subscriber)>,
    next_subscriber_id: u64,
    week_start: Weekday,
}

impl Default for ViewEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewEngine {
    pub fn new() -> Self {
        Self::with_tasks(Vec::new())
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        ViewEngine {
            repo: TaskRepository::with_tasks(tasks),
            history: HistoryManager::new(),
            monitor: ConsistencyMonitor::new(),
            subscribers: Vec::new(),
            next_subscriber_id: 0,
            week_start: DEFAULT_WEEK_START,
        }
    }

    pub fn with_week_start(mut self, week_start: Weekday) -> Self {
        self.week_start = week_start;
        self.monitor = ConsistencyMonitor::new().with_week_start(week_start);
        self
    }

    // -----------------------------------------------------------------------
    // Tasks & filtering
    // -----------------------------------------------------------------------

    pub fn tasks(&self) -> &[Task] {
        self.repo.get_all()
    }

    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.repo.get_by_id(id)
    }

    pub fn task_count(&self) -> usize {
        self.repo.len()
    }

    /// Filter the engine's task collection (wall clock)
    pub fn apply_filter(&self, config: &FilterConfig) -> FilterOutcome {
        filter::apply_at(self.repo.get_all(), config, Local::now(), self.week_start)
    }

    /// Filter with an injected "now" (deterministic hosts and tests)
    pub fn apply_filter_at(&self, config: &FilterConfig, now: DateTime<Local>) -> FilterOutcome {
        filter::apply_at(self.repo.get_all(), config, now, self.week_start)
    }

    /// Validate and apply a mutation. The pre-mutation state is captured as
    /// exactly one undo entry; a rejected mutation leaves no trace.
    pub fn apply_mutation(
        &mut self,
        mutation: TaskMutation,
        description: &str,
    ) -> Result<usize, MutationError> {
        let before = self.repo.get_all().to_vec();
        let changed = self.repo.apply_mutation(mutation)?;
        self.history.commit(description, before);
        tracing::debug!(changed, description, "mutation applied");
        self.after_change(description);
        Ok(changed)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Capture the current state as an undo entry
    pub fn commit(&mut self, description: &str) {
        self.history.commit(description, self.repo.get_all().to_vec());
    }

    pub fn undo(&mut self) -> bool {
        let current = self.repo.get_all().to_vec();
        match self.history.undo(current) {
            Some(state) => {
                self.repo.set_state(state);
                self.after_change("undo");
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        let current = self.repo.get_all().to_vec();
        match self.history.redo(current) {
            Some(state) => {
                self.repo.set_state(state);
                self.after_change("redo");
                true
            }
            None => false,
        }
    }

    pub fn create_checkpoint(&mut self, label: &str) -> u64 {
        self.history
            .create_checkpoint(label, self.repo.get_all().to_vec())
    }

    /// All-or-nothing jump; `false` means the checkpoint id was unknown and
    /// nothing changed
    pub fn restore_checkpoint(&mut self, id: u64) -> bool {
        let current = self.repo.get_all().to_vec();
        match self.history.restore_checkpoint(id, current) {
            Some(state) => {
                self.repo.set_state(state);
                self.after_change("restore checkpoint");
                true
            }
            None => false,
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // -----------------------------------------------------------------------
    // Monitoring
    // -----------------------------------------------------------------------

    pub fn start_monitoring(&mut self, declarations: Vec<ViewDeclaration>) {
        self.monitor.start(declarations);
    }

    pub fn stop_monitoring(&mut self) {
        self.monitor.stop();
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_monitoring()
    }

    /// Cooperative tick; call from the host's timer. Returns whether a
    /// consistency check ran.
    pub fn poll(&mut self) -> bool {
        self.monitor.poll(&self.repo, Local::now())
    }

    /// Tick with an injected "now"
    pub fn poll_at(&mut self, now: DateTime<Local>) -> bool {
        self.monitor.poll(&self.repo, now)
    }

    pub fn get_mismatches(&self, severity: Option<Severity>, limit: usize) -> Vec<Mismatch> {
        self.monitor.mismatches(severity, limit)
    }

    pub fn get_summary(&self) -> MonitorSummary {
        self.monitor.summary()
    }

    // -----------------------------------------------------------------------
    // Change notification
    // -----------------------------------------------------------------------

    /// Register a callback fired after every task-collection change.
    /// Returns a token for `unsubscribe`.
    pub fn subscribe(&mut self, callback: impl Fn(&ChangeEvent) + 'static) -> u64 {
        self.next_subscriber_id += 1;
        self.subscribers
            .push((self.next_subscriber_id, Box::new(callback)));
        self.next_subscriber_id
    }

    pub fn unsubscribe(&mut self, token: u64) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(id, _)| *id != token);
        self.subscribers.len() != before
    }

    /// Host-side hint that tasks may have changed outside a tracked
    /// mutation; schedules a debounced consistency check.
    pub fn invalidate(&mut self) {
        self.monitor.notify_change(Local::now());
    }

    fn after_change(&mut self, description: &str) {
        self.monitor.notify_change(Local::now());
        let event = ChangeEvent {
            task_count: self.repo.len(),
            description: description.to_string(),
        };
        for (_, callback) in &self.subscribers {
            callback(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn apply_mutation_commits_exactly_one_entry() {
        let mut engine = ViewEngine::new();
        engine
            .apply_mutation(
                TaskMutation::Batch(vec![
                    TaskMutation::Create(Task::new("a", "a")),
                    TaskMutation::Create(Task::new("b", "b")),
                ]),
                "add two",
            )
            .unwrap();
        assert_eq!(engine.task_count(), 2);
        assert!(engine.can_undo());
        assert!(engine.undo());
        assert_eq!(engine.task_count(), 0);
        assert!(!engine.can_undo());
    }

    #[test]
    fn rejected_mutation_leaves_no_history() {
        let mut engine = ViewEngine::new();
        let result = engine.apply_mutation(TaskMutation::Delete("ghost".into()), "oops");
        assert!(result.is_err());
        assert!(!engine.can_undo());
        assert_eq!(engine.task_count(), 0);
    }

    #[test]
    fn subscribers_hear_about_changes() {
        let mut engine = ViewEngine::new();
        let seen: Rc<RefCell<Vec<ChangeEvent>>> = Rc::default();
        let sink = Rc::clone(&seen);
        let token = engine.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        engine
            .apply_mutation(TaskMutation::Create(Task::new("a", "a")), "add a")
            .unwrap();
        engine.undo();

        let events = seen.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].task_count, 1);
        assert_eq!(events[0].description, "add a");
        assert_eq!(events[1].task_count, 0);
        assert_eq!(events[1].description, "undo");
        drop(events);

        assert!(engine.unsubscribe(token));
        assert!(!engine.unsubscribe(token));
    }

    #[test]
    fn restore_unknown_checkpoint_reports_false() {
        let mut engine = ViewEngine::new();
        assert!(!engine.restore_checkpoint(42));
    }

    #[test]
    fn checkpoint_jump_is_undoable() {
        let mut engine = ViewEngine::new();
        engine
            .apply_mutation(TaskMutation::Create(Task::new("a", "a")), "add a")
            .unwrap();
        let checkpoint = engine.create_checkpoint("one task");

        engine
            .apply_mutation(TaskMutation::Create(Task::new("b", "b")), "add b")
            .unwrap();
        assert_eq!(engine.task_count(), 2);

        assert!(engine.restore_checkpoint(checkpoint));
        assert_eq!(engine.task_count(), 1);

        assert!(engine.undo());
        assert_eq!(engine.task_count(), 2);
    }
}
