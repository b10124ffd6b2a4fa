use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Filter criteria for deriving one named view from the task collection.
///
/// Immutable per pipeline invocation. Every field is optional or defaulted so
/// ad-hoc view configs deserialize from loosely-typed host JSON; unknown
/// values in the string-vocabulary fields degrade inside the pipeline (no
/// match plus a trace warning) instead of failing here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfig {
    /// Keep only tasks assigned to this project
    pub project_id: Option<String>,
    /// Named smart view: `today` or `week`
    pub smart_view: Option<String>,
    /// Keep only tasks with this status (lenient spelling)
    pub status_filter: Option<String>,
    /// Drop tasks whose status is done
    pub hide_done: bool,
    /// Keep only inbox tasks (no project, no canvas placement).
    /// Mutually exclusive with `include_canvas_only`.
    pub include_inbox_only: bool,
    /// Keep only tasks placed on the canvas
    pub include_canvas_only: bool,
    /// Time window: `all`, `now`, `today`, `tomorrow`, `thisWeek`, `noDate`
    pub time_filter: Option<String>,
}

impl FilterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no stage would run (the pipeline is the identity)
    pub fn is_empty(&self) -> bool {
        self == &FilterConfig::default()
    }

    pub fn for_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_smart_view(mut self, view: impl Into<String>) -> Self {
        self.smart_view = Some(view.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status_filter = Some(status.into());
        self
    }

    pub fn with_time_filter(mut self, window: impl Into<String>) -> Self {
        self.time_filter = Some(window.into());
        self
    }

    pub fn hiding_done(mut self) -> Self {
        self.hide_done = true;
        self
    }

    pub fn inbox_only(mut self) -> Self {
        self.include_inbox_only = true;
        self
    }

    pub fn canvas_only(mut self) -> Self {
        self.include_canvas_only = true;
        self
    }
}

/// A named smart view with semantics beyond field equality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmartView {
    Today,
    Week,
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("unknown smart view: {0}")]
pub struct ParseSmartViewError(pub String);

impl FromStr for SmartView {
    type Err = ParseSmartViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "today" => Ok(SmartView::Today),
            "week" | "thisweek" => Ok(SmartView::Week),
            _ => Err(ParseSmartViewError(s.to_string())),
        }
    }
}

/// Time-window vocabulary for the pipeline's time stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    All,
    Now,
    Today,
    Tomorrow,
    ThisWeek,
    NoDate,
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("unknown time window: {0}")]
pub struct ParseTimeWindowError(pub String);

impl FromStr for TimeWindow {
    type Err = ParseTimeWindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "all" => Ok(TimeWindow::All),
            "now" => Ok(TimeWindow::Now),
            "today" => Ok(TimeWindow::Today),
            "tomorrow" => Ok(TimeWindow::Tomorrow),
            "thisweek" | "week" => Ok(TimeWindow::ThisWeek),
            "nodate" => Ok(TimeWindow::NoDate),
            _ => Err(ParseTimeWindowError(s.to_string())),
        }
    }
}
