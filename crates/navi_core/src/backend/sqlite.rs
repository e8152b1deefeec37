//! Local `DocumentStore` over a single SQLite `documents` table.
//!
//! # Responsibility
//! - Persist JSON document bodies keyed by `(collection, doc_id)`.
//! - Track live collection/document listeners and push fresh snapshots to
//!   them after every committed write.
//!
//! # Invariants
//! - Neither the connection lock nor the registry lock is held while a
//!   listener runs.
//! - Collection snapshots are ordered by the requested field, then by
//!   `doc_id ASC` for deterministic ties.

use super::{
    BackendError, BackendResult, CollectionListener, CollectionPath, Direction, Document,
    DocumentListener, DocumentPath, DocumentStore, Fields, OrderBy, FIELD_CREATED_AT,
    FIELD_UPDATED_AT,
};
use crate::calendar::{Clock, SystemClock};
use crate::db::{open_db, open_db_in_memory};
use crate::observe::{lock, Subscription};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

struct CollectionWatch {
    collection: CollectionPath,
    order: Option<OrderBy>,
    listener: CollectionListener,
}

struct DocumentWatch {
    path: DocumentPath,
    listener: DocumentListener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    collections: BTreeMap<u64, CollectionWatch>,
    documents: BTreeMap<u64, DocumentWatch>,
}

impl Registry {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// SQLite-backed document store with in-process change fan-out.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    registry: Arc<Mutex<Registry>>,
}

impl SqliteDocumentStore {
    /// Opens (or creates) a document file with migrations applied.
    pub fn open(path: impl AsRef<Path>) -> BackendResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Private in-memory store; contents vanish on drop.
    pub fn in_memory() -> BackendResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already bootstrapped connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Replaces the clock used for `createdAt`/`updatedAt` stamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of attached listeners, collections and documents combined.
    pub fn listener_count(&self) -> usize {
        let registry = lock(&self.registry);
        registry.collections.len() + registry.documents.len()
    }

    fn now_millis(&self) -> Value {
        Value::from(self.clock.now().timestamp_millis())
    }

    fn read_body(conn: &Connection, path: &DocumentPath) -> BackendResult<Option<Fields>> {
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND doc_id = ?2;",
                params![path.collection.as_str(), path.id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|raw| parse_body(&path.id, &raw)).transpose()
    }

    fn write_body(conn: &Connection, path: &DocumentPath, body: &Fields) -> BackendResult<()> {
        let raw = serde_json::to_string(body)?;
        conn.execute(
            "INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3)
             ON CONFLICT (collection, doc_id) DO UPDATE SET body = excluded.body;",
            params![path.collection.as_str(), path.id, raw],
        )?;
        Ok(())
    }

    fn query_collection(
        conn: &Connection,
        collection: &CollectionPath,
        order: Option<OrderBy>,
    ) -> BackendResult<Vec<Document>> {
        let rows = match order {
            Some(order) => {
                let direction = match order.direction {
                    Direction::Ascending => "ASC",
                    Direction::Descending => "DESC",
                };
                let sql = format!(
                    "SELECT doc_id, body FROM documents
                     WHERE collection = ?1
                     ORDER BY json_extract(body, ?2) {direction}, doc_id ASC;"
                );
                let json_path = format!("$.{}", order.field);
                let mut stmt = conn.prepare(&sql)?;
                let mapped = stmt.query_map(params![collection.as_str(), json_path], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;
                mapped.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT doc_id, body FROM documents
                     WHERE collection = ?1
                     ORDER BY doc_id ASC;",
                )?;
                let mapped = stmt.query_map(params![collection.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;
                mapped.collect::<Result<Vec<_>, _>>()?
            }
        };

        rows.into_iter()
            .map(|(id, raw)| {
                let data = parse_body(&id, &raw)?;
                Ok(Document { id, data })
            })
            .collect()
    }

    fn snapshot_document(&self, path: &DocumentPath) -> BackendResult<Option<Document>> {
        let conn = lock(&self.conn);
        Ok(Self::read_body(&conn, path)?.map(|data| Document {
            id: path.id.clone(),
            data,
        }))
    }

    fn snapshot_collection(
        &self,
        collection: &CollectionPath,
        order: Option<OrderBy>,
    ) -> BackendResult<Vec<Document>> {
        let conn = lock(&self.conn);
        Self::query_collection(&conn, collection, order)
    }

    /// Pushes fresh snapshots to every listener watching `path` or its
    /// collection. Called after the write has committed and all locks are
    /// released.
    fn notify_changed(&self, path: &DocumentPath) {
        let (collection_watches, document_watches) = {
            let registry = lock(&self.registry);
            let collections: Vec<(Option<OrderBy>, CollectionListener)> = registry
                .collections
                .values()
                .filter(|watch| watch.collection == path.collection)
                .map(|watch| (watch.order, Arc::clone(&watch.listener)))
                .collect();
            let documents: Vec<DocumentListener> = registry
                .documents
                .values()
                .filter(|watch| watch.path == *path)
                .map(|watch| Arc::clone(&watch.listener))
                .collect();
            (collections, documents)
        };

        if !collection_watches.is_empty() || !document_watches.is_empty() {
            debug!(
                "event=snapshot_fanout module=backend status=start path={} collection_listeners={} document_listeners={}",
                path,
                collection_watches.len(),
                document_watches.len()
            );
        }

        for (order, listener) in collection_watches {
            let snapshot = self.snapshot_collection(&path.collection, order);
            if let Err(err) = &snapshot {
                warn!(
                    "event=snapshot_fanout module=backend status=error path={} error={}",
                    path.collection, err
                );
            }
            listener(snapshot);
        }
        for listener in document_watches {
            listener(self.snapshot_document(path));
        }
    }

    fn detach_handle(&self, id: u64) -> Subscription {
        let registry = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                let mut registry = lock(&registry);
                registry.collections.remove(&id);
                registry.documents.remove(&id);
            }
        })
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn add_document(&self, collection: &CollectionPath, mut data: Fields) -> BackendResult<String> {
        let path = collection.doc(Uuid::new_v4().simple().to_string());
        let now = self.now_millis();
        data.remove("id");
        data.insert(FIELD_CREATED_AT.to_string(), now.clone());
        data.insert(FIELD_UPDATED_AT.to_string(), now);
        {
            let conn = lock(&self.conn);
            Self::write_body(&conn, &path, &data)?;
        }
        debug!("event=doc_write module=backend status=ok op=add path={path}");
        self.notify_changed(&path);
        Ok(path.id)
    }

    fn set_document(&self, path: &DocumentPath, mut data: Fields) -> BackendResult<()> {
        data.remove("id");
        {
            let conn = lock(&self.conn);
            Self::write_body(&conn, path, &data)?;
        }
        debug!("event=doc_write module=backend status=ok op=set path={path}");
        self.notify_changed(path);
        Ok(())
    }

    fn update_document(&self, path: &DocumentPath, fields: Fields) -> BackendResult<()> {
        {
            let mut conn = lock(&self.conn);
            let tx = conn.transaction()?;
            let mut body = match Self::read_body(&tx, path)? {
                Some(body) => body,
                None => {
                    debug!("event=doc_write module=backend status=error op=update path={path} error_code=not_found");
                    return Err(BackendError::NotFound(path.clone()));
                }
            };
            for (key, value) in fields {
                if key != "id" {
                    body.insert(key, value);
                }
            }
            body.insert(FIELD_UPDATED_AT.to_string(), self.now_millis());
            Self::write_body(&tx, path, &body)?;
            tx.commit()?;
        }
        debug!("event=doc_write module=backend status=ok op=update path={path}");
        self.notify_changed(path);
        Ok(())
    }

    fn delete_document(&self, path: &DocumentPath) -> BackendResult<()> {
        let removed = {
            let conn = lock(&self.conn);
            conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND doc_id = ?2;",
                params![path.collection.as_str(), path.id],
            )?
        };
        debug!("event=doc_write module=backend status=ok op=delete path={path} removed={removed}");
        if removed > 0 {
            self.notify_changed(path);
        }
        Ok(())
    }

    fn get_document(&self, path: &DocumentPath) -> BackendResult<Option<Document>> {
        self.snapshot_document(path)
    }

    fn list_documents(
        &self,
        collection: &CollectionPath,
        order: Option<OrderBy>,
    ) -> BackendResult<Vec<Document>> {
        self.snapshot_collection(collection, order)
    }

    fn subscribe_collection(
        &self,
        collection: &CollectionPath,
        order: Option<OrderBy>,
        listener: CollectionListener,
    ) -> BackendResult<Subscription> {
        let initial = self.snapshot_collection(collection, order)?;
        let id = {
            let mut registry = lock(&self.registry);
            let id = registry.allocate_id();
            registry.collections.insert(
                id,
                CollectionWatch {
                    collection: collection.clone(),
                    order,
                    listener: Arc::clone(&listener),
                },
            );
            id
        };
        debug!("event=listener_attach module=backend status=ok kind=collection path={collection} listener_id={id}");
        let subscription = self.detach_handle(id);
        listener(Ok(initial));
        Ok(subscription)
    }

    fn subscribe_document(
        &self,
        path: &DocumentPath,
        listener: DocumentListener,
    ) -> BackendResult<Subscription> {
        let initial = self.snapshot_document(path)?;
        let id = {
            let mut registry = lock(&self.registry);
            let id = registry.allocate_id();
            registry.documents.insert(
                id,
                DocumentWatch {
                    path: path.clone(),
                    listener: Arc::clone(&listener),
                },
            );
            id
        };
        debug!("event=listener_attach module=backend status=ok kind=document path={path} listener_id={id}");
        let subscription = self.detach_handle(id);
        listener(Ok(initial));
        Ok(subscription)
    }
}

fn parse_body(id: &str, raw: &str) -> BackendResult<Fields> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(BackendError::InvalidData(format!(
            "document `{id}` body is not an object"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteDocumentStore;
    use crate::backend::{field, BackendError, CollectionPath, DocumentStore, OrderBy};
    use crate::calendar::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;

    fn store_with_clock() -> (SqliteDocumentStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ));
        let store = SqliteDocumentStore::in_memory()
            .unwrap()
            .with_clock(clock.clone());
        (store, clock)
    }

    #[test]
    fn add_stamps_and_update_merges_top_level_fields() {
        let (store, clock) = store_with_clock();
        let lists = CollectionPath::lists("u1");
        let id = store
            .add_document(&lists, field("title", "Focus"))
            .unwrap();

        clock.advance(Duration::seconds(5));
        store
            .update_document(&lists.doc(&id), field("duration", 7))
            .unwrap();

        let doc = store.get_document(&lists.doc(&id)).unwrap().unwrap();
        assert_eq!(doc.data["title"], "Focus");
        assert_eq!(doc.data["duration"], 7);
        assert_eq!(doc.data["createdAt"], json!(1_735_689_600_000_i64));
        assert_eq!(doc.data["updatedAt"], json!(1_735_689_605_000_i64));
    }

    #[test]
    fn update_of_missing_document_is_not_found() {
        let (store, _) = store_with_clock();
        let err = store
            .update_document(&CollectionPath::notes("u1").doc("nope"), field("a", 1))
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }

    #[test]
    fn listing_orders_by_field_then_id() {
        let (store, _) = store_with_clock();
        let notes = CollectionPath::notes("u1");
        store.set_document(&notes.doc("b"), field("order", 1)).unwrap();
        store.set_document(&notes.doc("a"), field("order", 1)).unwrap();
        store.set_document(&notes.doc("c"), field("order", 0)).unwrap();

        let ids: Vec<String> = store
            .list_documents(&notes, Some(OrderBy::asc("order")))
            .unwrap()
            .into_iter()
            .map(|doc| doc.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn collections_are_isolated_per_user() {
        let (store, _) = store_with_clock();
        store
            .add_document(&CollectionPath::lists("u1"), field("title", "mine"))
            .unwrap();
        assert!(store
            .list_documents(&CollectionPath::lists("u2"), None)
            .unwrap()
            .is_empty());
    }
}
