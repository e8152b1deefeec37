//! Call-site actions on top of a `Session`.
//!
//! # Responsibility
//! - Validate user input before anything reaches the backend.
//! - Turn store failures into error toasts and confirm successes.
//! - Build the active-challenge screen, running the daily-reset check.
//!
//! # Invariants
//! - `ActionError::Invalid` means no remote call was made.
//! - Every `ActionError::Reported` has already pushed an error toast.

use crate::calendar::DayProgress;
use crate::model::active::Progress;
use crate::model::note::{NoteDraft, ShareText};
use crate::model::profile::{PreferencesPatch, UserPreferences, UserProfile};
use crate::model::task_list::{
    NewTask, NewTaskList, Task, TaskId, TaskList, TaskListPatch, TaskPatch,
};
use crate::notify::NotificationCenter;
use crate::platform::PlatformSignals;
use crate::routes::Route;
use crate::session::{AuthUser, Session, SessionError};
use crate::store::{StoreError, StoreResult};
use crate::validation::{required_text, ValidationError};
use chrono::NaiveDate;
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ActionError {
    /// Input rejected locally.
    Invalid(ValidationError),
    NotSignedIn,
    /// The referenced list, task or note is not in the mirrored state.
    NotFound(String),
    /// A backend failure that was shown to the user as a toast.
    Reported(StoreError),
}

impl Display for ActionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "{err}"),
            Self::NotSignedIn => write!(f, "sign in first"),
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::Reported(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ActionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Reported(err) => Some(err),
            Self::NotSignedIn | Self::NotFound(_) => None,
        }
    }
}

impl From<ValidationError> for ActionError {
    fn from(value: ValidationError) -> Self {
        Self::Invalid(value)
    }
}

/// One task row on the challenge screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskView {
    pub task: Task,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeView {
    pub list_id: String,
    pub list_title: String,
    pub today: NaiveDate,
    pub day: DayProgress,
    pub progress: Progress,
    /// Tasks in template order.
    pub tasks: Vec<TaskView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveScreen {
    /// No challenge is running.
    Idle,
    /// A challenge runs but its template list was deleted.
    SourceMissing { list_title: String },
    Challenge(ChallengeView),
}

pub struct App {
    session: Session,
    notifications: NotificationCenter,
    platform: PlatformSignals,
}

impl App {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            notifications: NotificationCenter::new(),
            platform: PlatformSignals::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn platform(&self) -> &PlatformSignals {
        &self.platform
    }

    /// Applies the auth guard to a requested path.
    pub fn route(&self, path: &str) -> Route {
        Route::parse(path).resolve(self.session.is_signed_in())
    }

    pub fn sign_up(&self, user: AuthUser) -> Result<UserProfile, ActionError> {
        self.session
            .sign_up(user)
            .map_err(|err| self.session_failure("Failed to create account", err))
    }

    pub fn sign_in(&self, user: AuthUser) -> Result<(), ActionError> {
        self.session
            .sign_in(user)
            .map_err(|err| self.session_failure("Failed to sign in", err))
    }

    pub fn sign_out(&self) {
        self.session.sign_out();
    }

    pub fn update_preferences(
        &self,
        patch: PreferencesPatch,
    ) -> Result<UserPreferences, ActionError> {
        let patch = patch.validated()?;
        self.session
            .update_preferences(patch)
            .map_err(|err| self.session_failure("Failed to save preferences", err))
    }

    pub fn create_list(&self, title: &str, duration: u32) -> Result<String, ActionError> {
        let list = NewTaskList::new(title, duration)?;
        let user = self.user()?;
        let id = self.report(
            "Failed to create list",
            self.session.lists().create_list(&user.id, list),
        )?;
        self.notifications.success("List created!");
        Ok(id)
    }

    pub fn update_list(&self, list_id: &str, patch: TaskListPatch) -> Result<(), ActionError> {
        let patch = patch.validated()?;
        let user = self.user()?;
        self.report(
            "Failed to update list",
            self.session.lists().update_list(&user.id, list_id, patch),
        )
    }

    pub fn delete_list(&self, list_id: &str) -> Result<(), ActionError> {
        let user = self.user()?;
        self.report(
            "Failed to delete list",
            self.session.lists().delete_list(&user.id, list_id),
        )?;
        self.notifications.success("List deleted");
        Ok(())
    }

    pub fn add_task(
        &self,
        list_id: &str,
        title: &str,
        reset_daily: bool,
    ) -> Result<Task, ActionError> {
        let task = NewTask::new(title, reset_daily)?;
        let user = self.user()?;
        self.require_list(list_id)?;
        self.report(
            "Failed to add task",
            self.session.lists().add_task(&user.id, list_id, task),
        )
    }

    pub fn update_task(
        &self,
        list_id: &str,
        task_id: &str,
        patch: TaskPatch,
    ) -> Result<(), ActionError> {
        let patch = patch.validated()?;
        let user = self.user()?;
        self.require_task(list_id, task_id)?;
        self.report(
            "Failed to update task",
            self.session
                .lists()
                .update_task(&user.id, list_id, task_id, patch),
        )
    }

    pub fn delete_task(&self, list_id: &str, task_id: &str) -> Result<(), ActionError> {
        let user = self.user()?;
        self.require_task(list_id, task_id)?;
        self.report(
            "Failed to delete task",
            self.session.lists().delete_task(&user.id, list_id, task_id),
        )
    }

    pub fn reorder_tasks(
        &self,
        list_id: &str,
        ordered_ids: &[TaskId],
    ) -> Result<(), ActionError> {
        let user = self.user()?;
        for task_id in ordered_ids {
            self.require_task(list_id, task_id)?;
        }
        self.report(
            "Failed to reorder tasks",
            self.session
                .lists()
                .reorder_tasks(&user.id, list_id, ordered_ids),
        )
    }

    /// Starts a challenge from a list that has at least one task.
    pub fn activate_list(&self, list_id: &str) -> Result<(), ActionError> {
        let user = self.user()?;
        let list = self.require_list(list_id)?;
        if list.tasks.is_empty() {
            self.notifications.error("Add some tasks before activating");
            return Err(ValidationError::EmptyTaskList.into());
        }
        let today = self.session.today();
        self.report(
            "Failed to activate list",
            self.session.active().activate_list(&user.id, &list, today),
        )?;
        self.notifications
            .success(format!("\"{}\" is now active!", list.title));
        Ok(())
    }

    pub fn deactivate_list(&self) -> Result<(), ActionError> {
        let user = self.user()?;
        self.report(
            "Failed to deactivate list",
            self.session.active().deactivate_list(&user.id),
        )?;
        self.notifications.success("List deactivated");
        Ok(())
    }

    /// Marks a task of the running challenge done or not done today.
    ///
    /// Returns whether anything was written.
    pub fn set_task_done(&self, task_id: &str, done: bool) -> Result<bool, ActionError> {
        let user = self.user()?;
        let active = self
            .session
            .active()
            .current()
            .ok_or_else(|| ActionError::NotFound("active list".to_string()))?;
        let task = self.require_task(&active.list_id, task_id)?;
        let today = self.session.today();
        self.report(
            "Failed to update task",
            self.session
                .active()
                .toggle_task_completion(&user.id, &task, done, today),
        )
    }

    /// Builds the challenge screen for "now".
    ///
    /// The daily-reset marker is advanced first; a failure there is logged
    /// and does not block the screen.
    pub fn active_view(&self) -> Result<ActiveScreen, ActionError> {
        let user = self.user()?;
        let active_store = self.session.active();
        let now = self.session.now();
        let today = self.session.today();

        if let Err(err) = active_store.check_and_reset_daily(&user.id, today) {
            warn!("event=daily_reset module=app status=error error={err}");
        }

        let Some(active) = active_store.current() else {
            return Ok(ActiveScreen::Idle);
        };
        let Some(list) = self.session.lists().find_list(&active.list_id) else {
            return Ok(ActiveScreen::SourceMissing {
                list_title: active.list_title,
            });
        };

        let mut tasks = list.tasks.clone();
        tasks.sort_by_key(|task| task.order);
        let progress = active.progress(&tasks, today);
        let tasks = tasks
            .into_iter()
            .map(|task| TaskView {
                done: active.is_task_done(&task, today),
                task,
            })
            .collect();

        Ok(ActiveScreen::Challenge(ChallengeView {
            list_id: list.id,
            list_title: list.title,
            today,
            day: active.day_progress(list.duration, now),
            progress,
            tasks,
        }))
    }

    pub fn create_note(&self, draft: &NoteDraft) -> Result<String, ActionError> {
        let draft = draft.validated()?;
        let user = self.user()?;
        let id = self.report(
            "Failed to add note",
            self.session.notes().create_note(&user.id, &draft),
        )?;
        self.notifications.success("Note added!");
        Ok(id)
    }

    pub fn update_note(&self, note_id: &str, draft: &NoteDraft) -> Result<(), ActionError> {
        let draft = draft.validated()?;
        let user = self.user()?;
        self.require_note(note_id)?;
        self.report(
            "Failed to update note",
            self.session.notes().update_note(&user.id, note_id, &draft),
        )?;
        self.notifications.success("Note updated!");
        Ok(())
    }

    pub fn delete_note(&self, note_id: &str) -> Result<(), ActionError> {
        let user = self.user()?;
        self.report(
            "Failed to delete note",
            self.session.notes().delete_note(&user.id, note_id),
        )?;
        self.notifications.success("Note deleted");
        Ok(())
    }

    /// Archives or restores a note; returns the new archived flag.
    pub fn toggle_archive(&self, note_id: &str) -> Result<bool, ActionError> {
        let user = self.user()?;
        self.require_note(note_id)?;
        let archived = self.report(
            "Failed to archive note",
            self.session.notes().toggle_archive(&user.id, note_id),
        )?;
        self.notifications.success(if archived {
            "Note archived"
        } else {
            "Note restored"
        });
        Ok(archived)
    }

    pub fn reorder_notes(&self, ordered_ids: &[String]) -> Result<(), ActionError> {
        let user = self.user()?;
        for note_id in ordered_ids {
            self.require_note(note_id)?;
        }
        self.report(
            "Failed to reorder notes",
            self.session.notes().reorder_notes(&user.id, ordered_ids),
        )
    }

    pub fn set_show_archived(&self, show: bool) {
        self.session.notes().set_show_archived(show);
    }

    /// Text to hand to a share sheet for one note.
    pub fn share_note(&self, note_id: &str) -> Result<ShareText, ActionError> {
        match self.session.notes().find_note(note_id) {
            Some(note) => Ok(note.share_text()),
            None => {
                self.notifications.error("Failed to share");
                Err(ActionError::NotFound(format!("note {note_id}")))
            }
        }
    }

    fn user(&self) -> Result<AuthUser, ActionError> {
        self.session
            .current_user()
            .ok_or(ActionError::NotSignedIn)
    }

    fn require_list(&self, list_id: &str) -> Result<TaskList, ActionError> {
        let list_id = required_text("list id", list_id)?;
        self.session
            .lists()
            .find_list(&list_id)
            .ok_or_else(|| ActionError::NotFound(format!("list {list_id}")))
    }

    fn require_task(&self, list_id: &str, task_id: &str) -> Result<Task, ActionError> {
        self.require_list(list_id)?
            .task(task_id)
            .cloned()
            .ok_or_else(|| ActionError::NotFound(format!("task {task_id}")))
    }

    fn require_note(&self, note_id: &str) -> Result<(), ActionError> {
        match self.session.notes().find_note(note_id) {
            Some(_) => Ok(()),
            None => Err(ActionError::NotFound(format!("note {note_id}"))),
        }
    }

    fn report<T>(&self, failure: &str, result: StoreResult<T>) -> Result<T, ActionError> {
        result.map_err(|err| match err {
            StoreError::Validation(err) => ActionError::Invalid(err),
            other => {
                self.notifications.error(failure);
                ActionError::Reported(other)
            }
        })
    }

    fn session_failure(&self, failure: &str, err: SessionError) -> ActionError {
        match err {
            SessionError::NotSignedIn => ActionError::NotSignedIn,
            SessionError::Store(StoreError::Validation(err)) => ActionError::Invalid(err),
            SessionError::Store(err) => {
                self.notifications.error(failure);
                ActionError::Reported(err)
            }
        }
    }
}
