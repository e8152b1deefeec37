//! User profile document (`users/{id}`) and preferences.

use crate::calendar::{detected_zone_name, format_reset_time, parse_reset_time, parse_zone};
use crate::validation::ValidationError;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

/// Concrete theme after resolving `System`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTheme {
    Light,
    Dark,
}

impl ThemeMode {
    pub fn resolve(self, system_prefers_dark: bool) -> ResolvedTheme {
        match self {
            Self::Light => ResolvedTheme::Light,
            Self::Dark => ResolvedTheme::Dark,
            Self::System if system_prefers_dark => ResolvedTheme::Dark,
            Self::System => ResolvedTheme::Light,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default)]
    pub theme: ThemeMode,
    /// Daily reset time as `HH:mm`.
    pub reset_time: String,
    /// IANA zone name; empty means "follow the host zone".
    pub timezone: String,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: ThemeMode::System,
            reset_time: format_reset_time(NaiveTime::default()),
            timezone: detected_zone_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub preferences: UserPreferences,
}

/// Body written on sign-up.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewUserProfile<'a> {
    pub email: &'a str,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub preferences: &'a UserPreferences,
}

/// Partial preferences update, merged over the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferencesPatch {
    pub theme: Option<ThemeMode>,
    pub reset_time: Option<String>,
    pub timezone: Option<String>,
}

impl PreferencesPatch {
    pub fn is_empty(&self) -> bool {
        self.theme.is_none() && self.reset_time.is_none() && self.timezone.is_none()
    }

    /// Rejects malformed reset times and unknown zones; normalizes both.
    pub fn validated(self) -> Result<Self, ValidationError> {
        let reset_time = match self.reset_time {
            Some(value) => match parse_reset_time(&value) {
                Some(time) => Some(format_reset_time(time)),
                None => return Err(ValidationError::InvalidResetTime(value)),
            },
            None => None,
        };
        let timezone = match self.timezone {
            Some(value) => match parse_zone(&value) {
                Some(tz) => Some(tz.name().to_string()),
                None => return Err(ValidationError::UnknownTimezone(value)),
            },
            None => None,
        };
        Ok(Self {
            theme: self.theme,
            reset_time,
            timezone,
        })
    }

    pub fn apply_to(&self, preferences: &UserPreferences) -> UserPreferences {
        UserPreferences {
            theme: self.theme.unwrap_or(preferences.theme),
            reset_time: self
                .reset_time
                .clone()
                .unwrap_or_else(|| preferences.reset_time.clone()),
            timezone: self
                .timezone
                .clone()
                .unwrap_or_else(|| preferences.timezone.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PreferencesPatch, ResolvedTheme, ThemeMode, UserPreferences};
    use crate::validation::ValidationError;

    #[test]
    fn system_theme_follows_host() {
        assert_eq!(ThemeMode::System.resolve(true), ResolvedTheme::Dark);
        assert_eq!(ThemeMode::System.resolve(false), ResolvedTheme::Light);
        assert_eq!(ThemeMode::Light.resolve(true), ResolvedTheme::Light);
    }

    #[test]
    fn default_preferences_use_midnight_reset() {
        let preferences = UserPreferences::default();
        assert_eq!(preferences.theme, ThemeMode::System);
        assert_eq!(preferences.reset_time, "00:00");
    }

    #[test]
    fn patch_validates_and_merges() {
        let base = UserPreferences {
            theme: ThemeMode::Light,
            reset_time: "00:00".to_string(),
            timezone: "UTC".to_string(),
        };
        let patch = PreferencesPatch {
            reset_time: Some(" 05:30 ".to_string()),
            timezone: Some("Europe/Paris".to_string()),
            ..PreferencesPatch::default()
        }
        .validated()
        .unwrap();

        let merged = patch.apply_to(&base);
        assert_eq!(merged.theme, ThemeMode::Light);
        assert_eq!(merged.reset_time, "05:30");
        assert_eq!(merged.timezone, "Europe/Paris");
    }

    #[test]
    fn patch_rejects_bad_values() {
        let bad_time = PreferencesPatch {
            reset_time: Some("7pm".to_string()),
            ..PreferencesPatch::default()
        };
        assert!(matches!(
            bad_time.validated(),
            Err(ValidationError::InvalidResetTime(_))
        ));

        let bad_zone = PreferencesPatch {
            timezone: Some("Atlantis/Central".to_string()),
            ..PreferencesPatch::default()
        };
        assert!(matches!(
            bad_zone.validated(),
            Err(ValidationError::UnknownTimezone(_))
        ));
    }
}
