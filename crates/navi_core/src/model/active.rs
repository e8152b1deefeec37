//! The running challenge record (`active/current`).
//!
//! # Invariants
//! - At most one `ActiveList` exists per user; activation overwrites it.
//! - Completion history is append-only per day; "daily reset" is implicit in
//!   how completions are evaluated, not in deleting them.

use crate::calendar::{is_task_done, DayProgress};
use crate::model::task_list::{Task, TaskList};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Document id of the singleton active record.
pub const ACTIVE_DOCUMENT_ID: &str = "current";

/// One "mark complete" event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletion {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub completed_at: DateTime<Utc>,
    /// Calendar date in the user's zone, serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveList {
    pub id: String,
    pub list_id: String,
    pub list_title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub activated_at: DateTime<Utc>,
    #[serde(default)]
    pub task_completions: BTreeMap<String, Vec<TaskCompletion>>,
    pub last_reset_date: NaiveDate,
}

/// Body written on activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActiveList {
    pub list_id: String,
    pub list_title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub activated_at: DateTime<Utc>,
    pub task_completions: BTreeMap<String, Vec<TaskCompletion>>,
    pub last_reset_date: NaiveDate,
}

impl NewActiveList {
    pub fn for_list(list: &TaskList, activated_at: DateTime<Utc>, today: NaiveDate) -> Self {
        Self {
            list_id: list.id.clone(),
            list_title: list.title.clone(),
            activated_at,
            task_completions: BTreeMap::new(),
            last_reset_date: today,
        }
    }
}

/// Completed-today counter for the challenge header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// Rounded to the nearest whole percent; 0 for an empty list.
    pub percentage: u8,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            let ratio = completed.min(total) as f64 / total as f64;
            (ratio * 100.0).round() as u8
        };
        Self {
            completed,
            total,
            percentage,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }
}

impl ActiveList {
    pub fn completions(&self, task_id: &str) -> &[TaskCompletion] {
        self.task_completions
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_task_done(&self, task: &Task, today: NaiveDate) -> bool {
        is_task_done(task.reset_daily, self.completions(&task.id), today)
    }

    /// How many of `tasks` count as done on `today`.
    pub fn progress(&self, tasks: &[Task], today: NaiveDate) -> Progress {
        let completed = tasks
            .iter()
            .filter(|task| self.is_task_done(task, today))
            .count();
        Progress::new(completed, tasks.len())
    }

    pub fn day_progress(&self, duration_days: u32, now: DateTime<Utc>) -> DayProgress {
        DayProgress::compute(self.activated_at, duration_days, now)
    }

    /// Whether the stored reset marker lags behind `today`.
    pub fn needs_daily_reset(&self, today: NaiveDate) -> bool {
        self.last_reset_date != today
    }

    /// Completion history for `task` after marking it done or not done.
    ///
    /// Returns `None` when nothing would change.
    pub fn completions_after_toggle(
        &self,
        task: &Task,
        completed: bool,
        completed_at: DateTime<Utc>,
        today: NaiveDate,
    ) -> Option<Vec<TaskCompletion>> {
        let current = self.completions(&task.id);
        let done = is_task_done(task.reset_daily, current, today);
        if done == completed {
            return None;
        }

        let next = if completed {
            let mut next = current.to_vec();
            next.push(TaskCompletion {
                completed_at,
                date: today,
            });
            next
        } else if task.reset_daily {
            current
                .iter()
                .filter(|completion| completion.date != today)
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        Some(next)
    }
}
