//! Hooks
//!
//! Hooks give function components state that survives across renders.
//!
//! # How Hooks Work
//!
//! A component receives a [`Hooks`] context for the duration of one render.
//! Every hook call appends one record to the fiber's hook list, so the list
//! order is the call order of that render.
//!
//! - On **mount** (the fiber has no alternate) each call allocates a record
//!   and, for state hooks, a fresh update queue.
//! - On **update** each call advances a cursor through the previous render's
//!   list, clones the matching record, and applies its pending update.
//!
//! The previous list is only meaningful if the component calls the same hooks
//! in the same order every time. Calling more or fewer hooks, or a different
//! kind of hook at the same position, is a usage error that aborts the render.
//!
//! # Render Context
//!
//! The context is an explicit value created by the render phase for a single
//! fiber and consumed when the component returns. Hooks cannot be called
//! outside a render because there is no context to call them on.

mod state;

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::element::Children;
use crate::error::{ReconcileError, Result};
use crate::fiber::FiberId;
use crate::root::ScheduleUpdate;
use crate::update_queue::{process_update_queue, Rollback, UpdateQueue};

pub use state::{Dispatch, HookRef, ReducerDispatch};

/// The kind of hook recorded at a position of the hook list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// [`Hooks::use_state`] / [`Hooks::use_state_with`].
    State,
    /// [`Hooks::use_reducer`].
    Reducer,
    /// [`Hooks::use_ref`].
    Ref,
}

/// Whether hooks are being mounted or replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// First render of this fiber.
    Mount,
    /// Re-render; hooks are matched against the previous render.
    Update,
}

/// One hook record.
#[derive(Clone)]
pub(crate) struct Hook {
    kind: HookKind,
    /// Fiber the hook was mounted on. Dispatchers schedule from here.
    owner: FiberId,
    memoized_state: Arc<dyn Any + Send + Sync>,
    queue: Option<Arc<dyn Any + Send + Sync>>,
}

impl Hook {
    pub(crate) fn state<T: Any>(&self) -> Option<&T> {
        self.memoized_state.downcast_ref::<T>()
    }

    /// The update queue of a state or reducer hook over `T`.
    pub(crate) fn queue<T: Send + Sync + 'static>(&self) -> Option<Arc<UpdateQueue<T>>> {
        Arc::clone(self.queue.as_ref()?).downcast::<UpdateQueue<T>>().ok()
    }

    /// The shared cell of a ref hook holding a `T`.
    pub(crate) fn cell<T: Send + 'static>(&self) -> Option<Arc<Mutex<T>>> {
        Arc::clone(&self.memoized_state).downcast::<Mutex<T>>().ok()
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

pub(crate) type HookList = SmallVec<[Hook; 4]>;

/// What a component render left behind.
pub(crate) struct RenderOutcome {
    pub(crate) result: Result<(Children, HookList)>,
    /// Updates consumed by this render, restorable if the render is discarded.
    pub(crate) consumed: Vec<Rollback>,
}

/// Hook context handed to a function component while it renders.
pub struct Hooks {
    fiber: FiberId,
    mode: DispatchMode,
    previous: HookList,
    cursor: usize,
    list: HookList,
    consumed: Vec<Rollback>,
    violation: Option<ReconcileError>,
    scheduler: Weak<dyn ScheduleUpdate>,
}

impl Hooks {
    /// Context for rendering `fiber`. `previous` is the hook list of the
    /// fiber's alternate, or `None` on mount.
    pub(crate) fn new(
        fiber: FiberId,
        previous: Option<HookList>,
        scheduler: Weak<dyn ScheduleUpdate>,
    ) -> Self {
        let mode = if previous.is_some() {
            DispatchMode::Update
        } else {
            DispatchMode::Mount
        };
        Self {
            fiber,
            mode,
            previous: previous.unwrap_or_default(),
            cursor: 0,
            list: HookList::new(),
            consumed: Vec::new(),
            violation: None,
            scheduler,
        }
    }

    /// The fiber being rendered.
    pub fn fiber(&self) -> FiberId {
        self.fiber
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Declare a piece of state initialized to `initial`.
    ///
    /// Returns the current value and a dispatcher that schedules a re-render
    /// with a new value. `initial` is only used on mount.
    pub fn use_state<T>(&mut self, initial: T) -> Result<(T, Dispatch<T>)>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.use_state_with(move || initial)
    }

    /// Like [`use_state`](Self::use_state), but the initial value is produced
    /// by `init`, which runs exactly once, on mount.
    pub fn use_state_with<T, F>(&mut self, init: F) -> Result<(T, Dispatch<T>)>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let (value, queue, owner) = self.state_hook(HookKind::State, init)?;
        Ok((value, Dispatch::new(queue, owner, self.scheduler.clone())))
    }

    /// Declare state that changes by dispatching actions through `reducer`.
    ///
    /// The reducer of the render that returned the dispatcher is the one
    /// applied to actions sent through it.
    pub fn use_reducer<S, A, R>(&mut self, reducer: R, initial: S) -> Result<(S, ReducerDispatch<S, A>)>
    where
        S: Clone + Send + Sync + 'static,
        A: Clone + Send + Sync + 'static,
        R: Fn(&S, A) -> S + Send + Sync + 'static,
    {
        let (value, queue, owner) = self.state_hook(HookKind::Reducer, move || initial)?;
        let dispatch = Dispatch::new(queue, owner, self.scheduler.clone());
        Ok((value, ReducerDispatch::new(dispatch, Arc::new(reducer))))
    }

    /// Declare a mutable cell that keeps its identity across renders.
    ///
    /// Writing to the cell does not schedule a render.
    pub fn use_ref<T, F>(&mut self, init: F) -> Result<HookRef<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T,
    {
        match self.mode {
            DispatchMode::Mount => {
                let cell = Arc::new(Mutex::new(init()));
                self.list.push(Hook {
                    kind: HookKind::Ref,
                    owner: self.fiber,
                    memoized_state: cell.clone(),
                    queue: None,
                });
                Ok(HookRef::new(cell))
            }
            DispatchMode::Update => {
                let (index, hook) = self.next_previous(HookKind::Ref)?;
                let Some(cell) = hook.cell::<T>() else {
                    return Err(self.fail(ReconcileError::HookStateType { index }));
                };
                self.list.push(hook);
                Ok(HookRef::new(cell))
            }
        }
    }

    fn state_hook<T, F>(&mut self, kind: HookKind, init: F) -> Result<(T, Arc<UpdateQueue<T>>, FiberId)>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if self.mode == DispatchMode::Mount {
            let value = init();
            let queue = Arc::new(UpdateQueue::<T>::new());
            self.list.push(Hook {
                kind,
                owner: self.fiber,
                memoized_state: Arc::new(value.clone()),
                queue: Some(queue.clone()),
            });
            return Ok((value, queue, self.fiber));
        }

        let (index, mut hook) = self.next_previous(kind)?;
        let (Some(queue), Some(base)) = (hook.queue::<T>(), hook.state::<T>()) else {
            return Err(self.fail(ReconcileError::HookStateType { index }));
        };

        let value = match queue.take_pending() {
            Some(update) => {
                let next = process_update_queue(base, Some(&update));
                self.consumed.push(queue.rollback(update));
                hook.memoized_state = Arc::new(next.clone());
                next
            }
            None => base.clone(),
        };
        let owner = hook.owner;
        self.list.push(hook);
        Ok((value, queue, owner))
    }

    /// Advance the cursor through the previous render's hooks.
    fn next_previous(&mut self, kind: HookKind) -> Result<(usize, Hook)> {
        let index = self.cursor;
        let hook = match self.previous.get(index) {
            Some(hook) if hook.kind == kind => hook.clone(),
            Some(hook) => {
                let expected = hook.kind;
                return Err(self.fail(ReconcileError::HookKindMismatch {
                    index,
                    expected,
                    found: kind,
                }));
            }
            None => {
                let previous = self.previous.len();
                return Err(self.fail(ReconcileError::HookCountMismatch {
                    previous,
                    rendered: index + 1,
                }));
            }
        };
        self.cursor += 1;
        Ok((index, hook))
    }

    /// Remember the first usage error, so it aborts the render even if the
    /// component ignores it.
    fn fail(&mut self, err: ReconcileError) -> ReconcileError {
        if self.violation.is_none() {
            self.violation = Some(err.clone());
        }
        err
    }

    /// Close the context once the component returned.
    pub(crate) fn finish(self, rendered: Result<Children>) -> RenderOutcome {
        let Self {
            mode,
            previous,
            cursor,
            list,
            consumed,
            violation,
            ..
        } = self;

        let result = match (violation, rendered) {
            (Some(violation), _) => Err(violation),
            (None, Err(err)) => Err(err),
            (None, Ok(_)) if mode == DispatchMode::Update && cursor < previous.len() => {
                Err(ReconcileError::HookCountMismatch {
                    previous: previous.len(),
                    rendered: cursor,
                })
            }
            (None, Ok(children)) => Ok((children, list)),
        };
        RenderOutcome { result, consumed }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("fiber", &self.fiber)
            .field("mode", &self.mode)
            .field("cursor", &self.cursor)
            .field("hooks", &self.list.len())
            .finish_non_exhaustive()
    }
}
