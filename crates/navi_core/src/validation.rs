//! Local input validation.
//!
//! Validation runs before any backend call. A failure leaves remote state
//! untouched and is meant to be shown inline next to the offending field.

use crate::model::note::NoteKind;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Smallest allowed challenge length.
pub const MIN_DURATION_DAYS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field is blank after trimming.
    EmptyField(&'static str),
    /// Challenge duration is below one day.
    DurationTooShort(u32),
    /// A note is missing a field its kind requires.
    MissingNoteField { kind: NoteKind, field: &'static str },
    /// A list without tasks cannot be activated.
    EmptyTaskList,
    /// Reset time is not `HH:mm`.
    InvalidResetTime(String),
    /// Timezone is not a known IANA name.
    UnknownTimezone(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "{field} must not be empty"),
            Self::DurationTooShort(days) => write!(
                f,
                "duration must be at least {MIN_DURATION_DAYS} day, got {days}"
            ),
            Self::MissingNoteField { kind, field } => {
                write!(f, "{kind} notes require a {field}")
            }
            Self::EmptyTaskList => write!(f, "add some tasks before activating"),
            Self::InvalidResetTime(value) => {
                write!(f, "reset time must be HH:mm, got `{value}`")
            }
            Self::UnknownTimezone(value) => write!(f, "unknown timezone `{value}`"),
        }
    }
}

impl Error for ValidationError {}

/// Trims `value` and rejects it when blank.
pub fn required_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional value, mapping blank input to `None`.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}

pub fn validate_duration(days: u32) -> Result<u32, ValidationError> {
    if days < MIN_DURATION_DAYS {
        return Err(ValidationError::DurationTooShort(days));
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::{optional_text, required_text, validate_duration, ValidationError};

    #[test]
    fn required_text_trims_and_rejects_blank() {
        assert_eq!(required_text("title", "  Run  ").unwrap(), "Run");
        assert_eq!(
            required_text("title", " \t").unwrap_err(),
            ValidationError::EmptyField("title")
        );
    }

    #[test]
    fn optional_text_drops_blank() {
        assert_eq!(optional_text(Some("  ")), None);
        assert_eq!(optional_text(Some(" x ")).as_deref(), Some("x"));
        assert_eq!(optional_text(None), None);
    }

    #[test]
    fn duration_must_be_positive() {
        assert_eq!(validate_duration(7).unwrap(), 7);
        assert_eq!(
            validate_duration(0).unwrap_err(),
            ValidationError::DurationTooShort(0)
        );
    }
}
