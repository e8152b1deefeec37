//! Captured notes (`users/{uid}/notes`).
//!
//! # Invariants
//! - Notes are mirrored by `order ASC`.
//! - A new note gets `max(order) + 1` over the mirrored notes, or 0.
//! - The archive view shows archived notes only; the default view hides them.

use super::{decode_all, not_found_as, StoreCore, StoreError, StoreResult, StoreState};
use crate::backend::{field, to_fields, CollectionPath, DocumentStore, OrderBy};
use crate::model::note::{Note, NoteDraft, NoteFields};
use crate::observe::{lock, Subscription};
use log::info;
use std::sync::{Arc, Mutex};

const NOTES_ORDER: OrderBy = OrderBy::asc("order");

pub struct NotesStore {
    backend: Arc<dyn DocumentStore>,
    core: StoreCore<Vec<Note>>,
    show_archived: Mutex<bool>,
}

impl NotesStore {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self {
            backend,
            core: StoreCore::new("notes"),
            show_archived: Mutex::new(false),
        }
    }

    pub fn subscribe(&self, user_id: &str) -> StoreResult<Subscription> {
        self.core.attach_collection(
            self.backend.as_ref(),
            &CollectionPath::notes(user_id),
            Some(NOTES_ORDER),
            decode_all::<Note>,
        )
    }

    pub fn state(&self) -> StoreState<Vec<Note>> {
        self.core.state()
    }

    /// Every mirrored note, archived or not.
    pub fn notes(&self) -> Vec<Note> {
        self.core.data()
    }

    pub fn find_note(&self, note_id: &str) -> Option<Note> {
        self.core.data().into_iter().find(|note| note.id == note_id)
    }

    pub fn watch(
        &self,
        listener: impl Fn(&StoreState<Vec<Note>>) + Send + Sync + 'static,
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
        *lock(&self.show_archived) = false;
        self.core.reset();
    }

    pub fn show_archived(&self) -> bool {
        *lock(&self.show_archived)
    }

    /// Switches between the archive view and the default view.
    pub fn set_show_archived(&self, show: bool) {
        let changed = {
            let mut current = lock(&self.show_archived);
            let changed = *current != show;
            *current = show;
            changed
        };
        if changed {
            self.core.touch();
        }
    }

    /// Notes for the current view, in stored order.
    pub fn visible_notes(&self) -> Vec<Note> {
        let show_archived = self.show_archived();
        self.core
            .data()
            .into_iter()
            .filter(|note| note.archived == show_archived)
            .collect()
    }

    pub fn create_note(&self, user_id: &str, draft: &NoteDraft) -> StoreResult<String> {
        let draft = draft
            .validated()
            .map_err(|err| self.core.fail("note_create", err.into()))?;
        let order = self
            .core
            .data()
            .iter()
            .map(|note| note.order)
            .max()
            .map_or(0, |max| max + 1);
        let fields = NoteFields {
            body: &draft.body,
            annotation: draft.annotation.as_deref(),
            archived: Some(false),
            order: Some(order),
        };
        let id = to_fields(&fields)
            .and_then(|fields| {
                self.backend
                    .add_document(&CollectionPath::notes(user_id), fields)
            })
            .map_err(|err| self.core.fail("note_create", err.into()))?;
        info!(
            "event=note_create module=store status=ok note_id={} kind={} order={}",
            id,
            draft.body.kind(),
            order
        );
        Ok(id)
    }

    /// Rewrites the note's content fields; `archived` and `order` are kept.
    pub fn update_note(
        &self,
        user_id: &str,
        note_id: &str,
        draft: &NoteDraft,
    ) -> StoreResult<()> {
        let draft = draft
            .validated()
            .map_err(|err| self.core.fail("note_update", err.into()))?;
        let fields = NoteFields {
            body: &draft.body,
            annotation: draft.annotation.as_deref(),
            archived: None,
            order: None,
        };
        to_fields(&fields)
            .and_then(|fields| {
                self.backend
                    .update_document(&CollectionPath::notes(user_id).doc(note_id), fields)
            })
            .map_err(|err| {
                let err = not_found_as(err, || StoreError::NoteNotFound(note_id.to_string()));
                self.core.fail("note_update", err)
            })?;
        info!("event=note_update module=store status=ok note_id={note_id}");
        Ok(())
    }

    pub fn delete_note(&self, user_id: &str, note_id: &str) -> StoreResult<()> {
        self.backend
            .delete_document(&CollectionPath::notes(user_id).doc(note_id))
            .map_err(|err| self.core.fail("note_delete", err.into()))?;
        info!("event=note_delete module=store status=ok note_id={note_id}");
        Ok(())
    }

    /// Flips the archived flag and returns the new value.
    pub fn toggle_archive(&self, user_id: &str, note_id: &str) -> StoreResult<bool> {
        let note = self.find_note(note_id).ok_or_else(|| {
            self.core
                .fail("note_archive", StoreError::NoteNotFound(note_id.to_string()))
        })?;
        let archived = !note.archived;
        self.backend
            .update_document(
                &CollectionPath::notes(user_id).doc(note_id),
                field("archived", archived),
            )
            .map_err(|err| {
                let err = not_found_as(err, || StoreError::NoteNotFound(note_id.to_string()));
                self.core.fail("note_archive", err)
            })?;
        info!("event=note_archive module=store status=ok note_id={note_id} archived={archived}");
        Ok(archived)
    }

    /// Sets each named note's `order` to its position in `ordered_ids`.
    ///
    /// Writes are issued one per note; a failure stops the remaining writes.
    pub fn reorder_notes(&self, user_id: &str, ordered_ids: &[String]) -> StoreResult<()> {
        let notes = CollectionPath::notes(user_id);
        for (index, note_id) in ordered_ids.iter().enumerate() {
            let order = i64::try_from(index).unwrap_or(i64::MAX);
            self.backend
                .update_document(&notes.doc(note_id.as_str()), field("order", order))
                .map_err(|err| {
                    let err = not_found_as(err, || StoreError::NoteNotFound(note_id.clone()));
                    self.core.fail("note_reorder", err)
                })?;
        }
        info!(
            "event=note_reorder module=store status=ok count={}",
            ordered_ids.len()
        );
        Ok(())
    }
}
