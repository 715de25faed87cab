//! State Dispatchers
//!
//! Handles returned by state hooks. A dispatcher stays valid after the
//! render that returned it, so it can be stored in event handlers or sent to
//! other threads and called at any time.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::Result;
use crate::fiber::FiberId;
use crate::root::ScheduleUpdate;
use crate::update_queue::{Action, Update, UpdateQueue};

/// Sets the value of a [`use_state`](super::Hooks::use_state) hook.
///
/// Every render of the same hook returns a dispatcher bound to the same
/// queue, and dispatchers compare equal when they are.
pub struct Dispatch<T> {
    queue: Arc<UpdateQueue<T>>,
    fiber: FiberId,
    scheduler: Weak<dyn ScheduleUpdate>,
}

impl<T> Dispatch<T>
where
    T: Send + Sync + 'static,
{
    pub(crate) fn new(
        queue: Arc<UpdateQueue<T>>,
        fiber: FiberId,
        scheduler: Weak<dyn ScheduleUpdate>,
    ) -> Self {
        Self {
            queue,
            fiber,
            scheduler,
        }
    }

    /// Replace the state with `value` and schedule a render.
    pub fn set(&self, value: T) -> Result<()> {
        self.dispatch(Action::Value(value))
    }

    /// Derive the next state from the current one and schedule a render.
    pub fn update<F>(&self, updater: F) -> Result<()>
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
    {
        self.dispatch(Action::Updater(Arc::new(updater)))
    }

    /// Enqueue `action` on the hook's queue and schedule a render of the
    /// owning fiber's root.
    ///
    /// An update still pending from an earlier dispatch is replaced. If the
    /// root is in the middle of a render, the update is picked up by a render
    /// that runs right after it; the error of that render, if any, surfaces
    /// from the call that started the running one.
    pub fn dispatch(&self, action: Action<T>) -> Result<()> {
        if self.queue.enqueue(Update::new(action)) {
            tracing::trace!(fiber = ?self.fiber, "replaced an unconsumed update");
        }
        match self.scheduler.upgrade() {
            Some(scheduler) => scheduler.schedule_update_on_fiber(self.fiber),
            None => {
                tracing::debug!(fiber = ?self.fiber, "dispatch after the root was dropped");
                Ok(())
            }
        }
    }
}

impl<T> Dispatch<T> {
    pub(crate) fn queue(&self) -> &Arc<UpdateQueue<T>> {
        &self.queue
    }
}

impl<T> Clone for Dispatch<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            fiber: self.fiber,
            scheduler: Weak::clone(&self.scheduler),
        }
    }
}

impl<T> PartialEq for Dispatch<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.queue, &other.queue) && self.fiber == other.fiber
    }
}

impl<T> fmt::Debug for Dispatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("fiber", &self.fiber)
            .field("queue", &self.queue)
            .finish()
    }
}

/// Sends actions to a [`use_reducer`](super::Hooks::use_reducer) hook.
pub struct ReducerDispatch<S, A> {
    inner: Dispatch<S>,
    reducer: Arc<dyn Fn(&S, A) -> S + Send + Sync>,
}

impl<S, A> ReducerDispatch<S, A>
where
    S: Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(inner: Dispatch<S>, reducer: Arc<dyn Fn(&S, A) -> S + Send + Sync>) -> Self {
        Self { inner, reducer }
    }

    /// Reduce `action` into the state and schedule a render.
    pub fn dispatch(&self, action: A) -> Result<()> {
        let reducer = Arc::clone(&self.reducer);
        self.inner.update(move |state| reducer(state, action.clone()))
    }
}

impl<S, A> Clone for ReducerDispatch<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            reducer: Arc::clone(&self.reducer),
        }
    }
}

impl<S, A> fmt::Debug for ReducerDispatch<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReducerDispatch")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

/// A mutable cell returned by [`use_ref`](super::Hooks::use_ref).
pub struct HookRef<T> {
    cell: Arc<Mutex<T>>,
}

impl<T> HookRef<T> {
    pub(crate) fn new(cell: Arc<Mutex<T>>) -> Self {
        Self { cell }
    }

    pub fn set(&self, value: T) {
        *self.cell.lock() = value;
    }

    /// Run `f` with mutable access to the value.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *self.cell.lock())
    }

    /// Whether both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T: Clone> HookRef<T> {
    pub fn get(&self) -> T {
        self.cell.lock().clone()
    }
}

impl<T> Clone for HookRef<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for HookRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HookRef").field(&*self.cell.lock()).finish()
    }
}
