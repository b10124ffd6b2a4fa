use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use crate::model::task::{Task, TaskStatus};

/// Duration assumed for a timed occurrence that doesn't declare one
pub const DEFAULT_OCCURRENCE_MINUTES: u32 = 60;

/// One normalized scheduled occurrence, produced from either scheduling form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
}

/// Lenient calendar-date parse. Accepts `YYYY-MM-DD`, an RFC 3339 timestamp,
/// or a naive `YYYY-MM-DDTHH:MM:SS`. Anything else is treated as no date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    tracing::debug!(value = s, "unparseable date treated as unscheduled");
    None
}

/// Lenient clock-time parse (`HH:MM` or `HH:MM:SS`)
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

/// Normalize both scheduling representations to one shape.
///
/// This is the single seam of truth for schedule extraction: every date
/// predicate below goes through it, so the Instance list and the legacy
/// single-field pair can never diverge. Malformed date strings drop out
/// here, which is what makes them classify as "no date" everywhere.
pub fn occurrences(task: &Task) -> Vec<Occurrence> {
    let mut out: Vec<Occurrence> = task
        .instances
        .iter()
        .filter_map(|inst| {
            let date = parse_date(&inst.scheduled_date)?;
            Some(Occurrence {
                date,
                time: inst.scheduled_time.as_deref().and_then(parse_time),
                duration_minutes: inst.duration_minutes,
            })
        })
        .collect();

    if let Some(legacy) = task.scheduled_date.as_deref()
        && let Some(date) = parse_date(legacy)
    {
        out.push(Occurrence {
            date,
            time: task.scheduled_time.as_deref().and_then(parse_time),
            duration_minutes: None,
        });
    }

    out
}

/// All dates the task is scheduled on (deduplicated is not needed; callers
/// only test membership)
pub fn scheduled_dates(task: &Task) -> Vec<NaiveDate> {
    occurrences(task).iter().map(|o| o.date).collect()
}

/// "No date": no parseable occurrence in either scheduling form. The due
/// date is irrelevant to this classification.
pub fn has_no_date(task: &Task) -> bool {
    occurrences(task).is_empty()
}

/// The due date as a calendar date, if present and parseable
pub fn due_on(task: &Task) -> Option<NaiveDate> {
    task.due_date.as_deref().and_then(parse_date)
}

/// "Relevant to today" is a union, not an intersection: scheduled today
/// (either form), created today, due today, or currently in progress.
/// Callers needing strict scheduling semantics must narrow further.
pub fn is_relevant_today(task: &Task, today: NaiveDate) -> bool {
    scheduled_dates(task).contains(&today)
        || task.created_at.with_timezone(&Local).date_naive() == today
        || due_on(task) == Some(today)
        || task.status == TaskStatus::InProgress
}

/// Scheduled on or due on the given date (strict, no created-at union)
pub fn is_scheduled_or_due_on(task: &Task, date: NaiveDate) -> bool {
    scheduled_dates(task).contains(&date) || due_on(task) == Some(date)
}

/// The calendar week containing `today`: week-start day through 6 days later
pub fn week_bounds(today: NaiveDate, week_start: Weekday) -> (NaiveDate, NaiveDate) {
    let offset = (today.weekday().num_days_from_monday() as i64
        - week_start.num_days_from_monday() as i64)
        .rem_euclid(7);
    let start = today - Duration::days(offset);
    (start, start + Duration::days(6))
}

/// Scheduled or due inside the calendar week containing `today`
pub fn in_week(task: &Task, today: NaiveDate, week_start: Weekday) -> bool {
    let (start, end) = week_bounds(today, week_start);
    scheduled_dates(task)
        .iter()
        .any(|d| *d >= start && *d <= end)
        || due_on(task).is_some_and(|d| d >= start && d <= end)
}

/// "Happening now": an occurrence today whose time window contains `now`
/// (untimed occurrences count for the whole day), or an in-progress task.
pub fn is_now(task: &Task, now: DateTime<Local>) -> bool {
    if task.status == TaskStatus::InProgress {
        return true;
    }
    let today = now.date_naive();
    let clock = now.time();
    occurrences(task).iter().any(|occ| {
        if occ.date != today {
            return false;
        }
        match occ.time {
            None => true,
            Some(start) => {
                let minutes = occ.duration_minutes.unwrap_or(DEFAULT_OCCURRENCE_MINUTES);
                let (end, wrapped) =
                    start.overflowing_add_signed(Duration::minutes(i64::from(minutes)));
                if wrapped != 0 {
                    clock >= start
                } else {
                    clock >= start && clock < end
                }
            }
        }
    })
}
