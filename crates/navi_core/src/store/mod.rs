//! Reactive stores mirroring remote snapshots into local state.
//!
//! # Responsibility
//! - Hold `StoreState<T>` for one collection or document per store.
//! - Attach at most one live backend listener per store and replace it on
//!   re-subscribe.
//! - Record mutation failures in the error slot.
//!
//! # Invariants
//! - Local data changes only when a snapshot arrives; writes never merge
//!   optimistically.
//! - A snapshot from a superseded listener is dropped.
//! - A `Subscription` returned by `subscribe` only detaches the listener it
//!   created.

use crate::backend::{
    BackendError, BackendResult, CollectionPath, Document, DocumentPath, DocumentStore, OrderBy,
};
use crate::observe::{lock, Signal, Subscription};
use crate::validation::ValidationError;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

pub mod active_store;
pub mod list_store;
pub mod notes_store;
pub mod profile_store;

pub use active_store::ActiveStore;
pub use list_store::ListStore;
pub use notes_store::NotesStore;
pub use profile_store::ProfileStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Validation(ValidationError),
    Backend(BackendError),
    ListNotFound(String),
    TaskNotFound { list_id: String, task_id: String },
    NoteNotFound(String),
    /// No challenge is running.
    NoActiveList,
    ProfileNotFound(String),
    /// Sign-up for an account that already has a profile.
    ProfileExists(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Backend(err) => write!(f, "{err}"),
            Self::ListNotFound(id) => write!(f, "list not found: {id}"),
            Self::TaskNotFound { list_id, task_id } => {
                write!(f, "task {task_id} not found in list {list_id}")
            }
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::NoActiveList => write!(f, "no active list"),
            Self::ProfileNotFound(id) => write!(f, "profile not found: {id}"),
            Self::ProfileExists(id) => write!(f, "profile already exists: {id}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<BackendError> for StoreError {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}

/// What a store exposes to readers.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreState<T> {
    pub data: T,
    /// True until the first snapshot after `subscribe` arrives.
    pub is_loading: bool,
    /// Message of the last failure, if any.
    pub error: Option<String>,
}

impl<T: Default> Default for StoreState<T> {
    fn default() -> Self {
        Self {
            data: T::default(),
            is_loading: true,
            error: None,
        }
    }
}

#[derive(Default)]
struct ListenerSlot {
    generation: u64,
    subscription: Option<Subscription>,
}

/// Shared state machinery behind every store.
pub(crate) struct StoreCore<T> {
    name: &'static str,
    state: Arc<Mutex<StoreState<T>>>,
    changed: Signal<StoreState<T>>,
    slot: Arc<Mutex<ListenerSlot>>,
}

impl<T> StoreCore<T>
where
    T: Clone + Default + Send + 'static,
{
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(StoreState::default())),
            changed: Signal::new(),
            slot: Arc::new(Mutex::new(ListenerSlot::default())),
        }
    }

    pub(crate) fn state(&self) -> StoreState<T> {
        lock(&self.state).clone()
    }

    pub(crate) fn data(&self) -> T {
        lock(&self.state).data.clone()
    }

    pub(crate) fn watch(
        &self,
        listener: impl Fn(&StoreState<T>) + Send + Sync + 'static,
    ) -> Subscription {
        self.changed.subscribe(listener)
    }

    /// Re-emits the current state to watchers.
    pub(crate) fn touch(&self) {
        let snapshot = self.state();
        self.changed.emit(&snapshot);
    }

    fn update(&self, apply: impl FnOnce(&mut StoreState<T>)) {
        let snapshot = {
            let mut state = lock(&self.state);
            apply(&mut state);
            state.clone()
        };
        self.changed.emit(&snapshot);
    }

    pub(crate) fn clear_error(&self) {
        self.update(|state| state.error = None);
    }

    /// Stores the failure message and hands the error back.
    pub(crate) fn fail(&self, operation: &'static str, err: StoreError) -> StoreError {
        warn!(
            "event={} module=store status=error store={} error={}",
            operation, self.name, err
        );
        let message = err.to_string();
        self.update(|state| state.error = Some(message));
        err
    }

    /// Detaches the live listener and restores the initial state.
    pub(crate) fn reset(&self) {
        self.detach_current();
        self.update(|state| *state = StoreState::default());
    }

    fn detach_current(&self) {
        let previous = {
            let mut slot = lock(&self.slot);
            slot.generation += 1;
            slot.subscription.take()
        };
        drop(previous);
    }

    /// Starts a new listener generation, dropping the previous listener.
    fn begin_generation(&self) -> u64 {
        let (generation, previous) = {
            let mut slot = lock(&self.slot);
            slot.generation += 1;
            (slot.generation, slot.subscription.take())
        };
        drop(previous);
        self.update(|state| *state = StoreState::default());
        generation
    }

    fn snapshot_sink(&self, generation: u64) -> impl Fn(BackendResult<T>) + Send + Sync + 'static {
        let name = self.name;
        let state = Arc::clone(&self.state);
        let changed = self.changed.clone();
        let slot = Arc::clone(&self.slot);
        move |result: BackendResult<T>| {
            if lock(&slot).generation != generation {
                return;
            }
            let snapshot = {
                let mut state = lock(&state);
                match result {
                    Ok(data) => {
                        state.data = data;
                        state.error = None;
                    }
                    Err(err) => {
                        warn!(
                            "event=snapshot module=store status=error store={} error={}",
                            name, err
                        );
                        state.error = Some(err.to_string());
                    }
                }
                state.is_loading = false;
                state.clone()
            };
            changed.emit(&snapshot);
        }
    }

    /// Keeps `subscription` as the live listener unless a newer generation
    /// already replaced it, and returns the caller's detach handle.
    fn install(&self, generation: u64, subscription: Subscription) -> Subscription {
        let stale = {
            let mut slot = lock(&self.slot);
            if slot.generation == generation {
                slot.subscription = Some(subscription);
                None
            } else {
                Some(subscription)
            }
        };
        drop(stale);

        let slot = Arc::downgrade(&self.slot);
        Subscription::new(move || {
            if let Some(slot) = slot.upgrade() {
                let detached = {
                    let mut slot = lock(&slot);
                    if slot.generation == generation {
                        slot.generation += 1;
                        slot.subscription.take()
                    } else {
                        None
                    }
                };
                drop(detached);
            }
        })
    }

    fn attach_failed(&self, err: BackendError) -> StoreError {
        let message = err.to_string();
        self.update(|state| {
            state.is_loading = false;
            state.error = Some(message);
        });
        StoreError::Backend(err)
    }

    /// Listens to a collection query, decoding each snapshot with `decode`.
    pub(crate) fn attach_collection(
        &self,
        backend: &dyn DocumentStore,
        collection: &CollectionPath,
        order: Option<OrderBy>,
        decode: fn(&[Document]) -> BackendResult<T>,
    ) -> StoreResult<Subscription> {
        let generation = self.begin_generation();
        let sink = self.snapshot_sink(generation);
        let listener = Arc::new(move |result: BackendResult<Vec<Document>>| {
            sink(result.and_then(|docs| decode(&docs)));
        });
        match backend.subscribe_collection(collection, order, listener) {
            Ok(subscription) => {
                info!(
                    "event=store_subscribe module=store status=ok store={} path={} generation={}",
                    self.name, collection, generation
                );
                Ok(self.install(generation, subscription))
            }
            Err(err) => Err(self.attach_failed(err)),
        }
    }

    /// Listens to one document, decoding each snapshot with `decode`.
    pub(crate) fn attach_document(
        &self,
        backend: &dyn DocumentStore,
        path: &DocumentPath,
        decode: fn(Option<&Document>) -> BackendResult<T>,
    ) -> StoreResult<Subscription> {
        let generation = self.begin_generation();
        let sink = self.snapshot_sink(generation);
        let listener = Arc::new(move |result: BackendResult<Option<Document>>| {
            sink(result.and_then(|doc| decode(doc.as_ref())));
        });
        match backend.subscribe_document(path, listener) {
            Ok(subscription) => {
                info!(
                    "event=store_subscribe module=store status=ok store={} path={} generation={}",
                    self.name, path, generation
                );
                Ok(self.install(generation, subscription))
            }
            Err(err) => Err(self.attach_failed(err)),
        }
    }

    /// Whether a backend listener is currently attached.
    pub(crate) fn is_attached(&self) -> bool {
        lock(&self.slot).subscription.is_some()
    }
}

/// Decodes every document of a collection snapshot.
pub(crate) fn decode_all<R: serde::de::DeserializeOwned>(docs: &[Document]) -> BackendResult<Vec<R>> {
    docs.iter().map(Document::decode).collect()
}

/// Maps a backend `NotFound` for a known record to the store's own error.
pub(crate) fn not_found_as(err: BackendError, missing: impl FnOnce() -> StoreError) -> StoreError {
    match err {
        BackendError::NotFound(_) => missing(),
        other => StoreError::Backend(other),
    }
}
