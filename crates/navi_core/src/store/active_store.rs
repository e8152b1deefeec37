//! The running challenge (`users/{uid}/active/current`).
//!
//! # Invariants
//! - Activation overwrites the singleton record; deactivation deletes it.
//! - The daily-reset check only moves `lastResetDate`; completion history
//!   is never rewritten by it.

use super::{not_found_as, StoreCore, StoreError, StoreResult, StoreState};
use crate::backend::{
    field, to_fields, BackendError, CollectionPath, Document, DocumentPath, DocumentStore,
};
use crate::calendar::{Clock, DayProgress, DATE_FORMAT};
use crate::model::active::{ActiveList, NewActiveList, Progress, ACTIVE_DOCUMENT_ID};
use crate::model::task_list::{Task, TaskList};
use crate::observe::Subscription;
use crate::validation::ValidationError;
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use std::sync::Arc;

const FIELD_TASK_COMPLETIONS: &str = "taskCompletions";
const FIELD_LAST_RESET_DATE: &str = "lastResetDate";

pub struct ActiveStore {
    backend: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    core: StoreCore<Option<ActiveList>>,
}

fn active_path(user_id: &str) -> DocumentPath {
    CollectionPath::active(user_id).doc(ACTIVE_DOCUMENT_ID)
}

fn decode_active(doc: Option<&Document>) -> Result<Option<ActiveList>, BackendError> {
    doc.map(Document::decode).transpose()
}

impl ActiveStore {
    pub fn new(backend: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            core: StoreCore::new("active"),
        }
    }

    pub fn subscribe(&self, user_id: &str) -> StoreResult<Subscription> {
        self.core
            .attach_document(self.backend.as_ref(), &active_path(user_id), decode_active)
    }

    pub fn state(&self) -> StoreState<Option<ActiveList>> {
        self.core.state()
    }

    /// The mirrored challenge, if one is running.
    pub fn current(&self) -> Option<ActiveList> {
        self.core.data()
    }

    pub fn watch(
        &self,
        listener: impl Fn(&StoreState<Option<ActiveList>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.core.watch(listener)
    }

    pub fn is_subscribed(&self) -> bool {
        self.core.is_attached()
    }

    pub fn clear_error(&self) {
        self.core.clear_error();
    }

    pub fn reset(&self) {
        self.core.reset();
    }

    /// Starts a challenge from `list`, replacing any running one.
    pub fn activate_list(
        &self,
        user_id: &str,
        list: &TaskList,
        today: NaiveDate,
    ) -> StoreResult<()> {
        if list.tasks.is_empty() {
            return Err(self
                .core
                .fail("list_activate", ValidationError::EmptyTaskList.into()));
        }
        let record = NewActiveList::for_list(list, self.clock.now(), today);
        to_fields(&record)
            .and_then(|fields| self.backend.set_document(&active_path(user_id), fields))
            .map_err(|err| self.core.fail("list_activate", err.into()))?;
        info!(
            "event=list_activate module=store status=ok list_id={} today={}",
            list.id,
            today.format(DATE_FORMAT)
        );
        Ok(())
    }

    pub fn deactivate_list(&self, user_id: &str) -> StoreResult<()> {
        self.backend
            .delete_document(&active_path(user_id))
            .map_err(|err| self.core.fail("list_deactivate", err.into()))?;
        info!("event=list_deactivate module=store status=ok");
        Ok(())
    }

    /// Marks `task` done or not done for `today`.
    ///
    /// Returns `false` without writing when the task already has the
    /// requested state.
    pub fn toggle_task_completion(
        &self,
        user_id: &str,
        task: &Task,
        completed: bool,
        today: NaiveDate,
    ) -> StoreResult<bool> {
        let active = self
            .current()
            .ok_or_else(|| self.core.fail("task_toggle", StoreError::NoActiveList))?;
        let Some(completions) =
            active.completions_after_toggle(task, completed, self.clock.now(), today)
        else {
            return Ok(false);
        };

        let mut all = active.task_completions;
        all.insert(task.id.clone(), completions);
        serde_json::to_value(&all)
            .map_err(BackendError::from)
            .and_then(|value| {
                self.backend
                    .update_document(&active_path(user_id), field(FIELD_TASK_COMPLETIONS, value))
            })
            .map_err(|err| {
                let err = not_found_as(err, || StoreError::NoActiveList);
                self.core.fail("task_toggle", err)
            })?;
        info!(
            "event=task_toggle module=store status=ok task_id={} completed={}",
            task.id, completed
        );
        Ok(true)
    }

    /// Advances `lastResetDate` to `today` when it lags behind.
    ///
    /// Returns whether a write happened. No running challenge means no reset.
    pub fn check_and_reset_daily(&self, user_id: &str, today: NaiveDate) -> StoreResult<bool> {
        let Some(active) = self.current() else {
            return Ok(false);
        };
        if !active.needs_daily_reset(today) {
            return Ok(false);
        }

        let today_string = today.format(DATE_FORMAT).to_string();
        self.backend
            .update_document(
                &active_path(user_id),
                field(FIELD_LAST_RESET_DATE, today_string.as_str()),
            )
            .map_err(|err| {
                let err = not_found_as(err, || StoreError::NoActiveList);
                self.core.fail("daily_reset", err)
            })?;
        info!(
            "event=daily_reset module=store status=ok from={} to={}",
            active.last_reset_date.format(DATE_FORMAT),
            today_string
        );
        Ok(true)
    }

    /// Done count for `tasks` on `today`; zero when no challenge runs.
    pub fn progress(&self, tasks: &[Task], today: NaiveDate) -> Progress {
        match self.current() {
            Some(active) => active.progress(tasks, today),
            None => Progress::new(0, 0),
        }
    }

    pub fn day_progress(&self, duration_days: u32, now: DateTime<Utc>) -> Option<DayProgress> {
        self.current()
            .map(|active| active.day_progress(duration_days, now))
    }
}
