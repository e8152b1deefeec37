//! Task list templates.
//!
//! A `TaskList` is a reusable template. Activating it creates a separate
//! `ActiveList` record; editing the template never touches completion history.

use crate::validation::{required_text, validate_duration, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-generated task identifier (UUID v4 string).
pub type TaskId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub reset_daily: bool,
    /// Only meaningful while editing the template.
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub order: i64,
}

impl Task {
    /// Creates a task with a fresh id.
    pub fn new(title: impl Into<String>, reset_daily: bool, order: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            reset_daily,
            completed: false,
            order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub id: String,
    pub title: String,
    /// Challenge length in days.
    pub duration: u32,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl TaskList {
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    /// Order value for a task appended now.
    pub fn next_task_order(&self) -> i64 {
        i64::try_from(self.tasks.len()).unwrap_or(i64::MAX)
    }
}

/// Body written when creating a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTaskList {
    pub title: String,
    pub duration: u32,
    pub tasks: Vec<Task>,
}

impl NewTaskList {
    /// Validated, trimmed list with no tasks.
    pub fn new(title: &str, duration: u32) -> Result<Self, ValidationError> {
        Ok(Self {
            title: required_text("title", title)?,
            duration: validate_duration(duration)?,
            tasks: Vec::new(),
        })
    }
}

/// Partial update of list-level fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

impl TaskListPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.duration.is_none()
    }

    /// Trims the title and checks the duration.
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            title: self
                .title
                .map(|title| required_text("title", &title))
                .transpose()?,
            duration: self.duration.map(validate_duration).transpose()?,
        })
    }
}

/// Task fields supplied by the caller; id and order are assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub reset_daily: bool,
}

impl NewTask {
    pub fn new(title: &str, reset_daily: bool) -> Result<Self, ValidationError> {
        Ok(Self {
            title: required_text("task title", title)?,
            reset_daily,
        })
    }
}

/// Partial update of one task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub reset_daily: Option<bool>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            title: self
                .title
                .map(|title| required_text("task title", &title))
                .transpose()?,
            ..self
        })
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(reset_daily) = self.reset_daily {
            task.reset_daily = reset_daily;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NewTaskList, Task, TaskList, TaskListPatch, TaskPatch};
    use crate::validation::ValidationError;
    use serde_json::json;

    #[test]
    fn decodes_wire_shape() {
        let list: TaskList = serde_json::from_value(json!({
            "id": "l1",
            "title": "Morning",
            "duration": 7,
            "tasks": [
                {"id": "t1", "title": "Stretch", "resetDaily": true, "completed": false, "order": 0}
            ],
            "createdAt": 1_700_000_000_000_i64,
            "updatedAt": 1_700_000_000_000_i64
        }))
        .unwrap();

        assert_eq!(list.duration, 7);
        assert!(list.tasks[0].reset_daily);
        assert_eq!(list.next_task_order(), 1);
        assert!(list.task("t1").is_some());
    }

    #[test]
    fn new_list_rejects_blank_title_and_zero_duration() {
        assert_eq!(
            NewTaskList::new("  ", 7).unwrap_err(),
            ValidationError::EmptyField("title")
        );
        assert_eq!(
            NewTaskList::new("Run", 0).unwrap_err(),
            ValidationError::DurationTooShort(0)
        );
        assert_eq!(NewTaskList::new(" Run ", 3).unwrap().title, "Run");
    }

    #[test]
    fn list_patch_serializes_only_present_fields() {
        let patch = TaskListPatch {
            duration: Some(14),
            ..TaskListPatch::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"duration": 14}));
    }

    #[test]
    fn task_patch_applies_selected_fields() {
        let mut task = Task::new("Read", false, 2);
        TaskPatch {
            reset_daily: Some(true),
            ..TaskPatch::default()
        }
        .apply(&mut task);
        assert!(task.reset_daily);
        assert_eq!(task.title, "Read");
        assert_eq!(task.order, 2);
    }
}
