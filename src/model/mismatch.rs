use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How bad a mismatch is. Ordering is ascending badness, so `max` picks the
/// severity that wins the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// What kind of cross-view invariant was violated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    CountMismatch,
    TaskMissing,
    LogicViolation,
}

impl MismatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MismatchKind::CountMismatch => "count_mismatch",
            MismatchKind::TaskMissing => "task_missing",
            MismatchKind::LogicViolation => "logic_violation",
        }
    }
}

/// A detected violation of a declared cross-view invariant
#[derive(Debug, Clone, Serialize)]
pub struct Mismatch {
    pub id: u64,
    pub detected_at: DateTime<Utc>,
    pub severity: Severity,
    pub kind: MismatchKind,
    /// Views involved, superset first for subset-relation violations
    pub affected_views: Vec<String>,
    pub expected: String,
    pub actual: String,
    pub resolution_hint: String,
}

/// Overall monitor health, strict precedence: error > warning > info >
/// healthy. Never a blended score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Info,
    Warning,
    Error,
}

impl From<Severity> for HealthStatus {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Info => HealthStatus::Info,
            Severity::Warning => HealthStatus::Warning,
            Severity::Error => HealthStatus::Error,
        }
    }
}

/// Summary surfaced to hosts next to the mismatch log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorSummary {
    pub status: HealthStatus,
    pub message: String,
}
