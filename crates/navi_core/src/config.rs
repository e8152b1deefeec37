//! Runtime configuration for hosts embedding the core.
//!
//! Hosts collect raw values (flags, environment) and hand them over here;
//! this module validates them and wires up the backend, session and app.

use crate::app::App;
use crate::backend::{BackendError, DocumentStore, SqliteDocumentStore};
use crate::calendar::{parse_zone, Clock, SystemClock, Zone};
use crate::logging::{default_log_level, init_logging, normalize_level, LogTarget, LoggingError};
use crate::session::Session;
use chrono_tz::Tz;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug)]
pub enum ConfigError {
    Logging(LoggingError),
    UnknownTimezone(String),
    Backend(BackendError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logging(err) => write!(f, "{err}"),
            Self::UnknownTimezone(value) => write!(f, "unknown timezone `{value}`"),
            Self::Backend(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(err) => Some(err),
            Self::Backend(err) => Some(err),
            Self::UnknownTimezone(_) => None,
        }
    }
}

impl From<LoggingError> for ConfigError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<BackendError> for ConfigError {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}

/// Where documents live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    File(PathBuf),
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaviConfig {
    pub storage: Storage,
    /// Normalized `trace|debug|info|warn|error`.
    pub log_level: &'static str,
    pub log_target: LogTarget,
    /// Overrides the timezone stored in user preferences.
    pub timezone: Option<Tz>,
}

impl NaviConfig {
    /// File-backed storage, default level, stderr logs, no zone override.
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            log_level: default_log_level(),
            log_target: LogTarget::Stderr,
            timezone: None,
        }
    }

    pub fn with_log_level(mut self, level: &str) -> Result<Self, ConfigError> {
        self.log_level = normalize_level(level)?;
        Ok(self)
    }

    /// Logs to rolling files in `dir` instead of stderr.
    pub fn with_log_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.log_target = dir.map_or(LogTarget::Stderr, LogTarget::Directory);
        self
    }

    /// Blank input clears the override.
    pub fn with_timezone(mut self, timezone: Option<&str>) -> Result<Self, ConfigError> {
        self.timezone = match timezone.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => Some(
                parse_zone(value).ok_or_else(|| ConfigError::UnknownTimezone(value.to_string()))?,
            ),
            None => None,
        };
        Ok(self)
    }

    pub fn init_logging(&self) -> Result<(), ConfigError> {
        init_logging(self.log_level, self.log_target.clone())?;
        Ok(())
    }

    pub fn open_backend(&self) -> Result<SqliteDocumentStore, ConfigError> {
        let store = match &self.storage {
            Storage::File(path) => SqliteDocumentStore::open(path)?,
            Storage::Memory => SqliteDocumentStore::in_memory()?,
        };
        Ok(store)
    }

    /// Opens the backend and returns a signed-out app on the wall clock.
    pub fn build_app(&self) -> Result<App, ConfigError> {
        self.build_app_with_clock(Arc::new(SystemClock))
    }

    pub fn build_app_with_clock(&self, clock: Arc<dyn Clock>) -> Result<App, ConfigError> {
        let backend: Arc<dyn DocumentStore> =
            Arc::new(self.open_backend()?.with_clock(Arc::clone(&clock)));
        let mut session = Session::new(backend, clock);
        if let Some(tz) = self.timezone {
            session = session.with_zone_override(Zone::Named(tz));
        }
        info!(
            "event=app_build module=config status=ok storage={} timezone={}",
            match &self.storage {
                Storage::File(_) => "file",
                Storage::Memory => "memory",
            },
            self.timezone.map_or("preferences", |tz| tz.name())
        );
        Ok(App::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, NaviConfig, Storage};
    use crate::logging::LogTarget;

    #[test]
    fn validates_level_and_timezone() {
        let config = NaviConfig::new(Storage::Memory)
            .with_log_level("WARNING")
            .unwrap()
            .with_timezone(Some(" Asia/Tokyo "))
            .unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.timezone.map(|tz| tz.name()), Some("Asia/Tokyo"));
        assert_eq!(config.log_target, LogTarget::Stderr);

        assert!(matches!(
            NaviConfig::new(Storage::Memory).with_timezone(Some("Mars/Olympus")),
            Err(ConfigError::UnknownTimezone(_))
        ));
        assert!(NaviConfig::new(Storage::Memory)
            .with_log_level("loud")
            .is_err());
    }

    #[test]
    fn blank_timezone_clears_override() {
        let config = NaviConfig::new(Storage::Memory)
            .with_timezone(Some("   "))
            .unwrap();
        assert!(config.timezone.is_none());
    }

    #[test]
    fn builds_signed_out_app_in_memory() {
        let app = NaviConfig::new(Storage::Memory).build_app().unwrap();
        assert!(!app.session().is_signed_in());
    }
}
