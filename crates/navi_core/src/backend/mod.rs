//! Document backend seam.
//!
//! # Responsibility
//! - Describe the per-user document tree (`users/{uid}/lists`, `notes`,
//!   `active/current`, and the `users/{uid}` profile).
//! - Define the operations the stores need: one-shot reads, whole-field
//!   writes and live snapshot subscriptions.
//!
//! # Invariants
//! - Writes replace top-level fields wholesale; arrays are never patched.
//! - `add_document` stamps `createdAt` and `updatedAt`; `update_document`
//!   stamps `updatedAt`. `set_document` writes the body as given.
//! - Every subscription receives the current snapshot once on attach, then
//!   one snapshot per committed write that touches it.

use crate::db::DbError;
use crate::observe::Subscription;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod sqlite;

pub use sqlite::SqliteDocumentStore;

pub const FIELD_CREATED_AT: &str = "createdAt";
pub const FIELD_UPDATED_AT: &str = "updatedAt";

const USERS_COLLECTION: &str = "users";

pub type BackendResult<T> = Result<T, BackendError>;

/// Top-level document fields.
pub type Fields = Map<String, Value>;

#[derive(Debug)]
pub enum BackendError {
    Db(DbError),
    NotFound(DocumentPath),
    /// Stored or submitted data does not have the expected shape.
    InvalidData(String),
    Serialization(serde_json::Error),
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(path) => write!(f, "document not found: {path}"),
            Self::InvalidData(message) => write!(f, "invalid document data: {message}"),
            Self::Serialization(err) => write!(f, "document serialization failed: {err}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for BackendError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for BackendError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Slash-separated collection path, e.g. `users/u1/notes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn users() -> Self {
        Self::new(USERS_COLLECTION)
    }

    pub fn lists(user_id: &str) -> Self {
        Self::new(format!("{USERS_COLLECTION}/{user_id}/lists"))
    }

    pub fn notes(user_id: &str) -> Self {
        Self::new(format!("{USERS_COLLECTION}/{user_id}/notes"))
    }

    pub fn active(user_id: &str) -> Self {
        Self::new(format!("{USERS_COLLECTION}/{user_id}/active"))
    }

    pub fn doc(&self, id: impl Into<String>) -> DocumentPath {
        DocumentPath {
            collection: self.clone(),
            id: id.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CollectionPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    pub collection: CollectionPath,
    pub id: String,
}

impl DocumentPath {
    /// `users/{uid}` profile document.
    pub fn profile(user_id: &str) -> Self {
        CollectionPath::users().doc(user_id)
    }
}

impl Display for DocumentPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Collection query order on one top-level field. Ties break on document id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: &'static str,
    pub direction: Direction,
}

impl OrderBy {
    pub const fn asc(field: &'static str) -> Self {
        Self {
            field,
            direction: Direction::Ascending,
        }
    }

    pub const fn desc(field: &'static str) -> Self {
        Self {
            field,
            direction: Direction::Descending,
        }
    }
}

/// One stored document. `data` never contains `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    /// Deserializes into a record type whose `id` field mirrors the
    /// document id.
    pub fn decode<T: DeserializeOwned>(&self) -> BackendResult<T> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(data)).map_err(|err| {
            BackendError::InvalidData(format!("document `{}` does not decode: {err}", self.id))
        })
    }
}

/// Serializes `value` to top-level fields, dropping any `id` key.
pub fn to_fields<T: Serialize + ?Sized>(value: &T) -> BackendResult<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(mut fields) => {
            fields.remove("id");
            Ok(fields)
        }
        other => Err(BackendError::InvalidData(format!(
            "expected an object, got `{other}`"
        ))),
    }
}

/// Builds a single-field update.
pub fn field(name: &str, value: impl Into<Value>) -> Fields {
    let mut fields = Fields::new();
    fields.insert(name.to_string(), value.into());
    fields
}

pub type CollectionListener = Arc<dyn Fn(BackendResult<Vec<Document>>) + Send + Sync>;
pub type DocumentListener = Arc<dyn Fn(BackendResult<Option<Document>>) + Send + Sync>;

/// Remote document database as seen by the stores.
pub trait DocumentStore: Send + Sync {
    /// Inserts a document with a backend-assigned id.
    fn add_document(&self, collection: &CollectionPath, data: Fields) -> BackendResult<String>;

    /// Creates or fully replaces a document.
    fn set_document(&self, path: &DocumentPath, data: Fields) -> BackendResult<()>;

    /// Overwrites the given top-level fields of an existing document.
    fn update_document(&self, path: &DocumentPath, fields: Fields) -> BackendResult<()>;

    /// Deletes a document. Deleting a missing document is not an error.
    fn delete_document(&self, path: &DocumentPath) -> BackendResult<()>;

    fn get_document(&self, path: &DocumentPath) -> BackendResult<Option<Document>>;

    fn list_documents(
        &self,
        collection: &CollectionPath,
        order: Option<OrderBy>,
    ) -> BackendResult<Vec<Document>>;

    /// Attaches a live listener to a collection query.
    fn subscribe_collection(
        &self,
        collection: &CollectionPath,
        order: Option<OrderBy>,
        listener: CollectionListener,
    ) -> BackendResult<Subscription>;

    /// Attaches a live listener to one document.
    fn subscribe_document(
        &self,
        path: &DocumentPath,
        listener: DocumentListener,
    ) -> BackendResult<Subscription>;
}

#[cfg(test)]
mod tests {
    use super::{to_fields, CollectionPath, Document, DocumentPath};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        id: String,
        name: String,
    }

    #[test]
    fn paths_follow_user_tree() {
        assert_eq!(CollectionPath::lists("u1").as_str(), "users/u1/lists");
        assert_eq!(
            CollectionPath::active("u1").doc("current").to_string(),
            "users/u1/active/current"
        );
        assert_eq!(DocumentPath::profile("u1").to_string(), "users/u1");
    }

    #[test]
    fn decode_injects_id_and_to_fields_strips_it() {
        let fields = to_fields(&Sample {
            id: "ignored".to_string(),
            name: "n".to_string(),
        })
        .unwrap();
        assert!(!fields.contains_key("id"));

        let doc = Document {
            id: "d1".to_string(),
            data: fields,
        };
        let decoded: Sample = doc.decode().unwrap();
        assert_eq!(decoded.id, "d1");
    }

    #[test]
    fn to_fields_rejects_non_objects() {
        assert!(to_fields(&json!([1, 2])).is_err());
    }
}
