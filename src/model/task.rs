use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    Planned,
    InProgress,
    Done,
    OnHold,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Planned => "planned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::OnHold => "on_hold",
        }
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    /// Lenient parse: host configs spell statuses with dashes, spaces, or
    /// mixed case ("In Progress", "in-progress", "in_progress").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "backlog" => Ok(TaskStatus::Backlog),
            "planned" => Ok(TaskStatus::Planned),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            "on_hold" => Ok(TaskStatus::OnHold),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

/// Task priority (absent means unprioritized)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("unknown task priority: {0}")]
pub struct ParseTaskPriorityError(pub String);

impl FromStr for TaskPriority {
    type Err = ParseTaskPriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => Err(ParseTaskPriorityError(s.to_string())),
        }
    }
}

/// One concrete scheduled occurrence of a task. A task may carry any number
/// of instances and so appear in multiple calendar slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Calendar date string (e.g. `2026-08-05`). Parsed leniently; a
    /// malformed value classifies the occurrence as unscheduled.
    pub scheduled_date: String,
    /// Optional clock time string (e.g. `14:30`)
    #[serde(default)]
    pub scheduled_time: Option<String>,
    /// Optional duration in minutes
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

impl Instance {
    pub fn on(date: impl Into<String>) -> Self {
        Instance {
            scheduled_date: date.into(),
            scheduled_time: None,
            duration_minutes: None,
        }
    }

    pub fn at(date: impl Into<String>, time: impl Into<String>) -> Self {
        Instance {
            scheduled_date: date.into(),
            scheduled_time: Some(time.into()),
            duration_minutes: None,
        }
    }
}

/// A subtask line item with its own completion flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

/// A task as seen by the filtering, monitoring, and history subsystems.
///
/// Repository-owned timestamps (`created_at`, `updated_at`) are typed;
/// host-supplied calendar fields (`due_date`, scheduling) stay strings so
/// malformed values degrade instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub parent_task_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Calendar date string; irrelevant to the "no date" classification
    #[serde(default)]
    pub due_date: Option<String>,
    /// Modern scheduling form: zero or more occurrences
    #[serde(default)]
    pub instances: Vec<Instance>,
    /// Legacy scheduling form: a single date/time pair. Normalized to the
    /// same shape as `instances` before any date predicate runs.
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub scheduled_time: Option<String>,
    /// Opaque to this crate; owned by the canvas renderer
    #[serde(default)]
    pub canvas_position: Option<serde_json::Value>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub completed_pomodoros: u32,
}

impl Task {
    /// Create a new backlog task with fresh timestamps
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Task {
            id: id.into(),
            title: title.into(),
            status: TaskStatus::Backlog,
            priority: None,
            project_id: None,
            parent_task_id: None,
            created_at: now,
            updated_at: now,
            due_date: None,
            instances: Vec::new(),
            scheduled_date: None,
            scheduled_time: None,
            canvas_position: None,
            subtasks: Vec::new(),
            completed_pomodoros: 0,
        }
    }

    /// Whether the task carries any scheduling field at all (either form)
    pub fn has_schedule_fields(&self) -> bool {
        !self.instances.is_empty() || self.scheduled_date.is_some()
    }

    /// Count of (done, total) subtasks
    pub fn subtask_progress(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|s| s.done).count();
        (done, self.subtasks.len())
    }

    /// A task belongs to the inbox when it has no project and no canvas
    /// placement.
    pub fn is_inbox(&self) -> bool {
        self.project_id.is_none() && self.canvas_position.is_none()
    }
}
