//! Core domain logic for Navi: time-boxed task-list challenges and notes.
//! This crate is the single source of truth for business invariants.

pub mod app;
pub mod backend;
pub mod calendar;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod observe;
pub mod platform;
pub mod routes;
pub mod session;
pub mod store;
pub mod validation;

pub use app::{ActionError, ActiveScreen, App, ChallengeView, TaskView};
pub use backend::{
    BackendError, BackendResult, CollectionPath, Document, DocumentPath, DocumentStore,
    SqliteDocumentStore,
};
pub use calendar::{CalendarContext, Clock, DayProgress, ManualClock, SystemClock, Zone};
pub use config::{ConfigError, NaviConfig, Storage};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget, LoggingError};
pub use model::active::{ActiveList, Progress, TaskCompletion};
pub use model::note::{Note, NoteBody, NoteDraft, NoteKind, ShareText};
pub use model::profile::{PreferencesPatch, ResolvedTheme, ThemeMode, UserPreferences, UserProfile};
pub use model::task_list::{NewTask, NewTaskList, Task, TaskList, TaskListPatch, TaskPatch};
pub use notify::{NotificationCenter, Toast, ToastKind};
pub use observe::{Observable, Signal, Subscription};
pub use platform::PlatformSignals;
pub use routes::Route;
pub use session::{AuthUser, Session, SessionError};
pub use store::{StoreError, StoreResult, StoreState};
pub use validation::ValidationError;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
