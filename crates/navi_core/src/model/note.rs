//! Captured notes: five disjoint shapes sharing common metadata.
//!
//! # Invariants
//! - Exactly one `NoteBody` variant applies per note; it is stored as a
//!   `type` tag next to the shared fields.
//! - Optional fields serialize as explicit `null` so field-merge updates
//!   clear them.
//! - `order` is `max(existing) + 1` on creation and only renumbered by an
//!   explicit reorder.

use crate::validation::{optional_text, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    Text,
    Link,
    Book,
    Film,
    Quote,
}

impl NoteKind {
    pub const ALL: [NoteKind; 5] = [
        NoteKind::Text,
        NoteKind::Link,
        NoteKind::Book,
        NoteKind::Film,
        NoteKind::Quote,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Link => "link",
            Self::Book => "book",
            Self::Film => "film",
            Self::Quote => "quote",
        }
    }
}

impl Display for NoteKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown note type `{value}`; expected text|link|book|film|quote"))
    }
}

/// Kind-specific note content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NoteBody {
    Text {
        title: String,
        content: String,
    },
    Link {
        url: String,
        title: Option<String>,
        description: Option<String>,
        image: Option<String>,
    },
    Book {
        title: String,
        author: String,
    },
    Film {
        title: String,
        year: Option<i32>,
    },
    Quote {
        text: String,
        author: Option<String>,
        source: Option<String>,
    },
}

impl NoteBody {
    pub fn kind(&self) -> NoteKind {
        match self {
            Self::Text { .. } => NoteKind::Text,
            Self::Link { .. } => NoteKind::Link,
            Self::Book { .. } => NoteKind::Book,
            Self::Film { .. } => NoteKind::Film,
            Self::Quote { .. } => NoteKind::Quote,
        }
    }

    /// Headline used in lists: the title, URL or quote text.
    pub fn headline(&self) -> &str {
        match self {
            Self::Text { title, .. } | Self::Book { title, .. } | Self::Film { title, .. } => {
                title.as_str()
            }
            Self::Link { title, url, .. } => title.as_deref().unwrap_or(url.as_str()),
            Self::Quote { text, .. } => text.as_str(),
        }
    }

    /// Trims every field, maps blank optionals to `None` and checks the
    /// fields this kind requires.
    pub fn normalized(&self) -> Result<Self, ValidationError> {
        let kind = self.kind();
        let required = |field: &'static str, value: &str| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(ValidationError::MissingNoteField { kind, field })
            } else {
                Ok(trimmed.to_string())
            }
        };

        Ok(match self {
            Self::Text { title, content } => Self::Text {
                title: required("title", title)?,
                content: required("content", content)?,
            },
            Self::Link {
                url,
                title,
                description,
                image,
            } => Self::Link {
                url: required("url", url)?,
                title: optional_text(title.as_deref()),
                description: optional_text(description.as_deref()),
                image: optional_text(image.as_deref()),
            },
            Self::Book { title, author } => Self::Book {
                title: required("title", title)?,
                author: required("author", author)?,
            },
            Self::Film { title, year } => Self::Film {
                title: required("title", title)?,
                year: *year,
            },
            Self::Quote {
                text,
                author,
                source,
            } => Self::Quote {
                text: required("text", text)?,
                author: optional_text(author.as_deref()),
                source: optional_text(source.as_deref()),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(flatten)]
    pub body: NoteBody,
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub order: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Text handed to a platform share sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareText {
    pub text: String,
    pub url: Option<String>,
}

impl Note {
    pub fn kind(&self) -> NoteKind {
        self.body.kind()
    }

    pub fn share_text(&self) -> ShareText {
        let (mut text, url) = match &self.body {
            NoteBody::Text { title, content } => (format!("{title}\n\n{content}"), None),
            NoteBody::Link { url, title, .. } => (
                title.clone().unwrap_or_else(|| "Check this out".to_string()),
                Some(url.clone()),
            ),
            NoteBody::Book { title, author } => (format!("{title} by {author}"), None),
            NoteBody::Film { title, year } => match year {
                Some(year) => (format!("{title} ({year})"), None),
                None => (title.clone(), None),
            },
            NoteBody::Quote { text, author, .. } => match author {
                Some(author) => (format!("\"{text}\" \u{2014} {author}"), None),
                None => (format!("\"{text}\""), None),
            },
        };

        if let Some(annotation) = &self.annotation {
            text.push_str("\n\nMy note: ");
            text.push_str(annotation);
        }
        ShareText { text, url }
    }
}

/// Caller input for creating or editing a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub body: NoteBody,
    pub annotation: Option<String>,
}

impl NoteDraft {
    pub fn new(body: NoteBody) -> Self {
        Self {
            body,
            annotation: None,
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    /// Returns the trimmed draft, or the first missing required field.
    pub fn validated(&self) -> Result<Self, ValidationError> {
        Ok(Self {
            body: self.body.normalized()?,
            annotation: optional_text(self.annotation.as_deref()),
        })
    }
}

/// Stored fields for a note. Ids and timestamps belong to the backend.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NoteFields<'a> {
    #[serde(flatten)]
    pub body: &'a NoteBody,
    pub annotation: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}
