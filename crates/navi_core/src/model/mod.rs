//! Domain records mirrored from the document backend.
//!
//! # Responsibility
//! - Define the typed shape of every stored document.
//! - Keep wire naming (camelCase, epoch-millisecond timestamps) in one place.
//!
//! # Invariants
//! - Document ids are assigned by the backend; only task ids are generated
//!   client-side.
//! - Records never carry their own `id` inside the stored body.

pub mod active;
pub mod note;
pub mod profile;
pub mod task_list;
