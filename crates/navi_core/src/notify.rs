//! Transient user-facing notifications ("toasts").
//!
//! # Invariants
//! - Toast ids are unique and increase within one center.
//! - The queue keeps toasts in push order until dismissed or drained.
//! - At most `MAX_QUEUED_TOASTS` are kept; pushing past that drops the
//!   oldest. Hosts that only `subscribe` never need to drain.

use crate::observe::{lock, Signal, Subscription};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub const MAX_QUEUED_TOASTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

impl Display for ToastKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub kind: ToastKind,
    pub message: String,
}

pub struct NotificationCenter {
    queue: Mutex<Vec<Toast>>,
    next_id: AtomicU64,
    pushed: Signal<Toast>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            pushed: Signal::new(),
        }
    }

    pub fn push(&self, kind: ToastKind, message: impl Into<String>) -> u64 {
        let toast = Toast {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            message: message.into(),
        };
        {
            let mut queue = lock(&self.queue);
            if queue.len() >= MAX_QUEUED_TOASTS {
                let overflow = queue.len() + 1 - MAX_QUEUED_TOASTS;
                queue.drain(..overflow);
            }
            queue.push(toast.clone());
        }
        self.pushed.emit(&toast);
        toast.id
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.push(ToastKind::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.push(ToastKind::Error, message)
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push(ToastKind::Info, message)
    }

    /// Removes one toast. Returns whether it was still queued.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut queue = lock(&self.queue);
        let before = queue.len();
        queue.retain(|toast| toast.id != id);
        queue.len() != before
    }

    /// Toasts currently queued, oldest first.
    pub fn pending(&self) -> Vec<Toast> {
        lock(&self.queue).clone()
    }

    /// Empties the queue and returns what it held.
    pub fn drain(&self) -> Vec<Toast> {
        std::mem::take(&mut *lock(&self.queue))
    }

    /// Runs `listener` for every toast pushed from now on.
    pub fn subscribe(&self, listener: impl Fn(&Toast) + Send + Sync + 'static) -> Subscription {
        self.pushed.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::{NotificationCenter, ToastKind, MAX_QUEUED_TOASTS};
    use std::sync::{Arc, Mutex};

    #[test]
    fn queue_keeps_push_order_until_dismissed() {
        let center = NotificationCenter::new();
        let first = center.success("List created!");
        let second = center.error("Failed to add task");

        assert!(second > first);
        assert!(center.dismiss(first));
        assert!(!center.dismiss(first));

        let drained = center.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].kind, ToastKind::Error);
        assert!(center.pending().is_empty());
    }

    #[test]
    fn subscribers_see_each_push() {
        let center = NotificationCenter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = center.subscribe(move |toast| sink.lock().unwrap().push(toast.message.clone()));

        center.info("Viewing archived");
        assert_eq!(*seen.lock().unwrap(), vec!["Viewing archived".to_string()]);
    }

    #[test]
    fn undrained_queue_keeps_only_the_newest_toasts() {
        let center = NotificationCenter::new();
        let ids: Vec<u64> = (0..MAX_QUEUED_TOASTS + 5)
            .map(|n| center.info(format!("toast {n}")))
            .collect();

        let pending = center.pending();
        assert_eq!(pending.len(), MAX_QUEUED_TOASTS);
        assert_eq!(pending[0].id, ids[5]);
        assert_eq!(pending.last().unwrap().id, *ids.last().unwrap());
    }
}
