//! Update Queue
//!
//! An update queue records a state change until the next render consumes it.
//!
//! # Single Pending Slot
//!
//! A queue holds at most one pending update. Enqueueing while an update is
//! still pending replaces it, so only the last state change dispatched
//! before a render is observed by that render. Updates are not batched.
//!
//! # Thread Safety
//!
//! The pending slot is the only state that may be written from outside a
//! render (a dispatch from an event handler, another thread, ...), so it is
//! the only piece behind a lock.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// What an update does to the state.
pub enum Action<S> {
    /// Replace the state with this value.
    Value(S),
    /// Compute the next state from the previous one.
    Updater(Arc<dyn Fn(&S) -> S + Send + Sync>),
}

impl<S: Clone> Clone for Action<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Updater(updater) => Self::Updater(Arc::clone(updater)),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Action<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Updater(_) => f.write_str("Updater(..)"),
        }
    }
}

/// A recorded state change.
#[derive(Clone, Debug)]
pub struct Update<S> {
    action: Action<S>,
}

impl<S> Update<S> {
    /// Wrap an action into an update.
    pub fn new(action: Action<S>) -> Self {
        Self { action }
    }

    /// An update that replaces the state.
    pub fn value(value: S) -> Self {
        Self::new(Action::Value(value))
    }

    /// An update that derives the next state from the previous one.
    pub fn updater<F>(updater: F) -> Self
    where
        F: Fn(&S) -> S + Send + Sync + 'static,
    {
        Self::new(Action::Updater(Arc::new(updater)))
    }

    pub fn action(&self) -> &Action<S> {
        &self.action
    }
}

/// A single-slot queue of pending updates.
pub struct UpdateQueue<S> {
    pending: Mutex<Option<Update<S>>>,
}

impl<S> UpdateQueue<S> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(None),
        }
    }

    /// Store `update` as the pending update, replacing any unconsumed one.
    ///
    /// Returns `true` if an unconsumed update was replaced.
    pub fn enqueue(&self, update: Update<S>) -> bool {
        self.pending.lock().replace(update).is_some()
    }

    /// Take the pending update, leaving the slot empty.
    pub fn take_pending(&self) -> Option<Update<S>> {
        self.pending.lock().take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }
}

impl<S: Send + Sync + 'static> UpdateQueue<S> {
    /// A handle that puts `update` back into this queue.
    ///
    /// Used when a render consumed `update` but was then thrown away. The
    /// update is restored only if nothing newer was enqueued in the meantime.
    pub(crate) fn rollback(self: &Arc<Self>, update: Update<S>) -> Rollback {
        let queue = Arc::clone(self);
        Rollback(Box::new(move || {
            let mut pending = queue.pending.lock();
            if pending.is_none() {
                *pending = Some(update);
            }
        }))
    }
}

impl<S> Default for UpdateQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for UpdateQueue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateQueue")
            .field("has_pending", &self.has_pending())
            .finish()
    }
}

/// Restores an update consumed by a discarded render.
pub(crate) struct Rollback(Box<dyn FnOnce() + Send>);

impl Rollback {
    pub(crate) fn restore(self) {
        (self.0)();
    }
}

impl fmt::Debug for Rollback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Rollback(..)")
    }
}

/// Compute the next state from `base_state` and the pending update.
///
/// An updater is called with the base state; a value replaces it. Without a
/// pending update the base state is returned unchanged. Neither input is
/// modified.
pub fn process_update_queue<S: Clone>(base_state: &S, pending: Option<&Update<S>>) -> S {
    match pending.map(Update::action) {
        None => base_state.clone(),
        Some(Action::Value(value)) => value.clone(),
        Some(Action::Updater(updater)) => updater(base_state),
    }
}
