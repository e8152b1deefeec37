use navi_core::backend::{
    field, BackendResult, CollectionListener, CollectionPath, Document, DocumentPath,
    DocumentStore, OrderBy,
};
use navi_core::SqliteDocumentStore;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn recorded_ids() -> (Arc<Mutex<Vec<Vec<String>>>>, CollectionListener) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener: CollectionListener = Arc::new(move |result: BackendResult<Vec<Document>>| {
        let ids = result
            .unwrap()
            .into_iter()
            .map(|doc| doc.id)
            .collect::<Vec<_>>();
        sink.lock().unwrap().push(ids);
    });
    (seen, listener)
}

#[test]
fn collection_subscription_gets_initial_and_follow_up_snapshots() {
    let store = SqliteDocumentStore::in_memory().unwrap();
    let notes = CollectionPath::notes("u1");
    store.set_document(&notes.doc("a"), field("order", 0)).unwrap();

    let (seen, listener) = recorded_ids();
    let sub = store
        .subscribe_collection(&notes, Some(OrderBy::asc("order")), listener)
        .unwrap();
    store.set_document(&notes.doc("b"), field("order", 1)).unwrap();
    store.delete_document(&notes.doc("a")).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            vec!["a".to_string()],
            vec!["a".to_string(), "b".to_string()],
            vec!["b".to_string()],
        ]
    );
    drop(sub);
}

#[test]
fn unsubscribe_stops_updates() {
    let store = SqliteDocumentStore::in_memory().unwrap();
    let lists = CollectionPath::lists("u1");
    let (seen, listener) = recorded_ids();

    let sub = store.subscribe_collection(&lists, None, listener).unwrap();
    assert_eq!(store.listener_count(), 1);
    sub.unsubscribe();
    assert_eq!(store.listener_count(), 0);

    store.add_document(&lists, field("title", "Focus")).unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn writes_to_other_collections_do_not_notify() {
    let store = SqliteDocumentStore::in_memory().unwrap();
    let (seen, listener) = recorded_ids();
    let _sub = store
        .subscribe_collection(&CollectionPath::lists("u1"), None, listener)
        .unwrap();

    store
        .add_document(&CollectionPath::lists("u2"), field("title", "Theirs"))
        .unwrap();
    store
        .add_document(&CollectionPath::notes("u1"), field("order", 0))
        .unwrap();

    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn document_subscription_sees_create_update_and_delete() {
    let store = SqliteDocumentStore::in_memory().unwrap();
    let path = CollectionPath::active("u1").doc("current");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = store
        .subscribe_document(
            &path,
            Arc::new(move |result: BackendResult<Option<Document>>| {
                let value = result.unwrap().map(|doc| doc.data["lastResetDate"].clone());
                sink.lock().unwrap().push(value);
            }),
        )
        .unwrap();

    store
        .set_document(&path, field("lastResetDate", "2025-05-01"))
        .unwrap();
    store
        .update_document(&path, field("lastResetDate", "2025-05-02"))
        .unwrap();
    store.delete_document(&path).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            None,
            Some(json!("2025-05-01")),
            Some(json!("2025-05-02")),
            None,
        ]
    );
}

#[test]
fn listener_may_write_without_deadlock() {
    let store = Arc::new(SqliteDocumentStore::in_memory().unwrap());
    let path = DocumentPath::profile("u1");
    let writer = Arc::clone(&store);
    let mirror = CollectionPath::new("mirror").doc("u1");
    let target = mirror.clone();
    let _sub = store
        .subscribe_document(
            &path,
            Arc::new(move |result: BackendResult<Option<Document>>| {
                if let Some(doc) = result.unwrap() {
                    writer.set_document(&target, doc.data).unwrap();
                }
            }),
        )
        .unwrap();

    store
        .set_document(&path, field("email", "a@example.com"))
        .unwrap();

    let copied = store.get_document(&mirror).unwrap().unwrap();
    assert_eq!(copied.data["email"], "a@example.com");
}

#[test]
fn file_backed_documents_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("navi.db");
    let lists = CollectionPath::lists("u1");

    let id = {
        let store = SqliteDocumentStore::open(&path).unwrap();
        store.add_document(&lists, field("title", "Focus")).unwrap()
    };

    let reopened = SqliteDocumentStore::open(&path).unwrap();
    let doc = reopened.get_document(&lists.doc(id)).unwrap().unwrap();
    assert_eq!(doc.data["title"], "Focus");
    assert!(doc.data.contains_key("createdAt"));
}
