//! Staged task filtering with a reproducible debug trace.
//!
//! `apply` is a pure function over (tasks, config): stages run in a fixed
//! canonical order, each one a narrowing predicate, and every date predicate
//! in one invocation shares a single injected "now" so a midnight rollover
//! can never split a computation across two days.

pub mod windows;

use chrono::{DateTime, Local, Weekday};
use serde::Serialize;

use crate::model::filter::{FilterConfig, SmartView, TimeWindow};
use crate::model::task::{Task, TaskStatus};

/// Default week-start day used by the convenience entry points
pub const DEFAULT_WEEK_START: Weekday = Weekday::Mon;

/// Canonical stage order. Stages are simple intersections and would compose
/// in any order; the order is fixed so traces are reproducible.
const STAGE_PROJECT: &str = "project";
const STAGE_SMART_VIEW: &str = "smart_view";
const STAGE_TIME_WINDOW: &str = "time_window";
const STAGE_STATUS: &str = "status";
const STAGE_HIDE_DONE: &str = "hide_done";
const STAGE_LOCATION: &str = "location";

/// Per-stage record: counts before and after, plus a short detail string
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTrace {
    pub stage: &'static str,
    pub before: usize,
    pub after: usize,
    pub detail: String,
}

/// Reproducible account of one pipeline invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterTrace {
    pub stages: Vec<StageTrace>,
    pub warnings: Vec<String>,
}

impl FilterTrace {
    fn record(&mut self, stage: &'static str, before: usize, after: usize, detail: String) {
        self.stages.push(StageTrace {
            stage,
            before,
            after,
            detail,
        });
    }

    fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(warning = %message, "filter configuration degraded");
        self.warnings.push(message);
    }
}

/// Result of one pipeline invocation
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub tasks: Vec<Task>,
    pub trace: FilterTrace,
}

impl FilterOutcome {
    pub fn task_ids(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.id.clone()).collect()
    }
}

/// Filter with the wall clock and the default week start
pub fn apply(tasks: &[Task], config: &FilterConfig) -> FilterOutcome {
    apply_at(tasks, config, Local::now(), DEFAULT_WEEK_START)
}

/// Filter with an injected "now" shared by every date predicate
pub fn apply_at(
    tasks: &[Task],
    config: &FilterConfig,
    now: DateTime<Local>,
    week_start: Weekday,
) -> FilterOutcome {
    let mut trace = FilterTrace::default();
    let mut current: Vec<&Task> = tasks.iter().collect();
    let today = now.date_naive();

    // project
    if let Some(project_id) = config.project_id.as_deref() {
        let before = current.len();
        current.retain(|t| t.project_id.as_deref() == Some(project_id));
        trace.record(
            STAGE_PROJECT,
            before,
            current.len(),
            format!("project = {project_id}"),
        );
    }

    // smart view
    if let Some(raw) = config.smart_view.as_deref() {
        let before = current.len();
        match raw.parse::<SmartView>() {
            Ok(SmartView::Today) => {
                current.retain(|t| windows::is_relevant_today(t, today));
                trace.record(STAGE_SMART_VIEW, before, current.len(), "today".into());
            }
            Ok(SmartView::Week) => {
                current.retain(|t| windows::in_week(t, today, week_start));
                trace.record(STAGE_SMART_VIEW, before, current.len(), "week".into());
            }
            Err(_) => {
                current.clear();
                trace.warn(format!("unknown smart view '{raw}', matching nothing"));
                trace.record(STAGE_SMART_VIEW, before, 0, format!("unknown: {raw}"));
            }
        }
    }

    // time window
    if let Some(raw) = config.time_filter.as_deref() {
        let before = current.len();
        match raw.parse::<TimeWindow>() {
            Ok(TimeWindow::All) => {
                trace.record(STAGE_TIME_WINDOW, before, current.len(), "all".into());
            }
            Ok(TimeWindow::Now) => {
                current.retain(|t| windows::is_now(t, now));
                trace.record(STAGE_TIME_WINDOW, before, current.len(), "now".into());
            }
            Ok(TimeWindow::Today) => {
                current.retain(|t| windows::is_relevant_today(t, today));
                trace.record(STAGE_TIME_WINDOW, before, current.len(), "today".into());
            }
            Ok(TimeWindow::Tomorrow) => {
                let tomorrow = today + chrono::Duration::days(1);
                current.retain(|t| windows::is_scheduled_or_due_on(t, tomorrow));
                trace.record(STAGE_TIME_WINDOW, before, current.len(), "tomorrow".into());
            }
            Ok(TimeWindow::ThisWeek) => {
                current.retain(|t| windows::in_week(t, today, week_start));
                trace.record(STAGE_TIME_WINDOW, before, current.len(), "this week".into());
            }
            Ok(TimeWindow::NoDate) => {
                // Undated AND not already today-relevant: a task created
                // today (or in progress) belongs to "today", not "no date".
                current.retain(|t| {
                    windows::has_no_date(t) && !windows::is_relevant_today(t, today)
                });
                trace.record(STAGE_TIME_WINDOW, before, current.len(), "no date".into());
            }
            Err(_) => {
                current.clear();
                trace.warn(format!("unknown time window '{raw}', matching nothing"));
                trace.record(STAGE_TIME_WINDOW, before, 0, format!("unknown: {raw}"));
            }
        }
    }

    // status
    if let Some(raw) = config.status_filter.as_deref() {
        let before = current.len();
        match raw.parse::<TaskStatus>() {
            Ok(status) => {
                current.retain(|t| t.status == status);
                trace.record(
                    STAGE_STATUS,
                    before,
                    current.len(),
                    format!("status = {}", status.as_str()),
                );
            }
            Err(_) => {
                current.clear();
                trace.warn(format!("unknown status '{raw}', matching nothing"));
                trace.record(STAGE_STATUS, before, 0, format!("unknown: {raw}"));
            }
        }
    }

    // hide done
    if config.hide_done {
        let before = current.len();
        current.retain(|t| t.status != TaskStatus::Done);
        trace.record(
            STAGE_HIDE_DONE,
            before,
            current.len(),
            "dropping done".into(),
        );
    }

    // location
    match (config.include_inbox_only, config.include_canvas_only) {
        (true, true) => {
            // Contradictory flags: pass through rather than guess
            trace.warn("inbox-only and canvas-only are mutually exclusive, ignoring both");
        }
        (true, false) => {
            let before = current.len();
            current.retain(|t| t.is_inbox());
            trace.record(STAGE_LOCATION, before, current.len(), "inbox".into());
        }
        (false, true) => {
            let before = current.len();
            current.retain(|t| t.canvas_position.is_some());
            trace.record(STAGE_LOCATION, before, current.len(), "canvas".into());
        }
        (false, false) => {}
    }

    FilterOutcome {
        tasks: current.into_iter().cloned().collect(),
        trace,
    }
}
