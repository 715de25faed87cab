//! Fiber Roots
//!
//! A [`FiberRoot`] owns one mounted tree: the host target, its container,
//! the fiber arena with both buffers, and the id of the current root fiber.
//!
//! # Render Cycles
//!
//! Every state change ends up in `schedule_update_on_fiber`, which records
//! the fiber and runs render cycles until nothing is left to do:
//!
//! 1. walk `return` links from each scheduled fiber to its root fiber
//! 2. render a fresh work-in-progress tree from the current one
//! 3. commit it, which applies host mutations and publishes the new tree
//!
//! A cycle always runs to completion on the calling thread. An update
//! scheduled while the root is locked does not start a second cycle. The
//! lock holder runs it once it lets go of the lock: a running cycle after it
//! has committed, an accessor such as [`FiberRoot::with_host`] when its
//! closure returns. This covers updates dispatched from inside a render,
//! from a host callback, or from another thread.
//!
//! # Failed Renders
//!
//! If a component fails to render, the attempt is discarded: every fiber it
//! allocated is released and every update it consumed is put back. The cycle
//! then starts over from a fresh stack, up to
//! [`ReconcilerConfig::max_render_attempts`] times. Hook usage errors are
//! never retried. Either way the current tree stays as it was.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::config::ReconcilerConfig;
use crate::element::Children;
use crate::error::{ReconcileError, Result};
use crate::fiber::{ChildIter, Fiber, FiberArena, FiberId, FiberKind, StateNode, WorkTag};
use crate::host::HostConfig;
use crate::update_queue::{Update, UpdateQueue};
use crate::work::{commit_mutation_effects, work_loop, RenderContext};

/// Entry point for state changes.
///
/// Implemented by the shared state of a root. Dispatchers hold it weakly, so
/// a dispatcher outliving its root does nothing.
pub(crate) trait ScheduleUpdate: Send + Sync {
    /// Schedule a render of the tree that `fiber` belongs to.
    fn schedule_update_on_fiber(&self, fiber: FiberId) -> Result<()>;
}

/// State only touched by the thread running a cycle.
struct RootState<H: HostConfig> {
    host: H,
    container: H::Container,
    arena: FiberArena<H::Instance>,
    current: FiberId,
    finished_work: Option<FiberId>,
}

struct RootShared<H: HostConfig> {
    state: Mutex<RootState<H>>,
    config: ReconcilerConfig,
    /// Fibers with updates not yet picked up by a cycle.
    scheduled: Mutex<SmallVec<[FiberId; 4]>>,
    /// The first root fiber. It stays alive for the life of the root.
    root_fiber: FiberId,
    root_queue: Arc<UpdateQueue<Children>>,
    render_count: AtomicUsize,
    this: Weak<RootShared<H>>,
}

impl<H: HostConfig> ScheduleUpdate for RootShared<H> {
    fn schedule_update_on_fiber(&self, fiber: FiberId) -> Result<()> {
        self.scheduled.lock().push(fiber);
        self.perform_sync_work()
    }
}

impl<H: HostConfig> RootShared<H> {
    /// Run cycles until no scheduled fiber is left.
    ///
    /// The emptiness check happens with the state unlocked, so an update
    /// scheduled while someone else holds the state is either seen here or
    /// by the holder when it calls this after unlocking.
    ///
    /// A failed cycle does not stop the loop: updates scheduled during it
    /// still get their own cycle. The result is that of the last cycle run.
    fn perform_sync_work(&self) -> Result<()> {
        let limit = self.config.nested_update_limit.max(1);
        let mut cycles = 0;
        let mut outcome = Ok(());
        loop {
            if self.scheduled.lock().is_empty() {
                return outcome;
            }
            let Some(mut state) = self.state.try_lock() else {
                tracing::trace!("root locked, update deferred to the holder");
                return outcome;
            };
            let scheduled = std::mem::take(&mut *self.scheduled.lock());
            if scheduled.is_empty() {
                continue;
            }

            cycles += 1;
            if cycles > limit {
                return Err(ReconcileError::TooManyRerenders { limit });
            }

            let mut reached_root = false;
            let mut detached = None;
            for fiber in scheduled {
                match mark_update_from_fiber_to_root(&state.arena, fiber) {
                    Ok(root) => reached_root |= root.is_some(),
                    Err(err) => detached = Some(err),
                }
            }
            if reached_root {
                outcome = self.perform_sync_work_on_root(&mut state);
                if let Err(err) = &outcome {
                    tracing::debug!(error = %err, "render cycle failed");
                }
            }
            if let Some(err) = detached {
                outcome = Err(err);
            }
        }
    }

    /// Run the cycles for updates deferred while the caller held the state.
    fn flush_deferred(&self) {
        if let Err(err) = self.perform_sync_work() {
            tracing::warn!(error = %err, "deferred render cycle failed");
        }
    }

    fn perform_sync_work_on_root(&self, state: &mut RootState<H>) -> Result<()> {
        tracing::debug!(current = ?state.current, "render cycle started");
        self.render_root(state)?;
        self.commit_root(state);
        Ok(())
    }

    /// Build the work-in-progress tree, retrying failed renders.
    fn render_root(&self, state: &mut RootState<H>) -> Result<()> {
        let scheduler: Weak<dyn ScheduleUpdate> = self.this.clone();
        let attempts = self.config.render_attempts();

        for attempt in 1..=attempts {
            state.arena.begin_journal();
            let mut cx = RenderContext::new(
                &mut state.arena,
                &mut state.host,
                &scheduler,
                self.config.dev_warnings,
            );
            let wip = cx.prepare_fresh_stack(state.current);

            let err = match work_loop(&mut cx, wip) {
                Ok(()) => {
                    drop(cx);
                    state.arena.commit_journal();
                    state.finished_work = Some(wip);
                    return Ok(());
                }
                Err(err) => err,
            };

            cx.restore_consumed();
            drop(cx);
            let released = state.arena.rollback_journal();

            if err.is_usage_error() {
                tracing::debug!(error = %err, released, "render aborted");
                return Err(err);
            }
            if self.config.dev_warnings {
                tracing::warn!(attempt, attempts, error = %err, "render failed, restarting from a fresh stack");
            } else {
                tracing::debug!(attempt, attempts, error = %err, "render failed, restarting from a fresh stack");
            }
        }
        Err(ReconcileError::RetriesExhausted { attempts })
    }

    /// Apply the finished tree and make it current.
    fn commit_root(&self, state: &mut RootState<H>) {
        let Some(finished) = state.finished_work.take() else {
            return;
        };

        let fiber = &state.arena[finished];
        if (fiber.flags | fiber.subtree_flags).needs_mutation() {
            tracing::debug!(root = ?finished, "applying mutation effects");
            commit_mutation_effects(&mut state.arena, &mut state.host, &state.container, finished);
        } else {
            tracing::trace!(root = ?finished, "no mutations to apply");
        }

        state.current = finished;
        let commits = self.render_count.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(commits, "render cycle committed");
    }
}

/// Walk `return` links from `fiber` up to its root fiber.
///
/// Returns `None` if the walk runs into a released fiber (an update on an
/// unmounted component), and [`ReconcileError::DetachedFiber`] if it ends on
/// a fiber that is not a root.
pub(crate) fn mark_update_from_fiber_to_root<I>(
    arena: &FiberArena<I>,
    fiber: FiberId,
) -> Result<Option<FiberId>> {
    let mut node = fiber;
    loop {
        let Some(current) = arena.get(node) else {
            tracing::debug!(fiber = ?fiber, "update scheduled on an unmounted fiber");
            return Ok(None);
        };
        match current.return_fiber {
            Some(parent) => node = parent,
            None if matches!(current.state_node, StateNode::Root) => return Ok(Some(node)),
            None => return Err(ReconcileError::DetachedFiber),
        }
    }
}

/// A mounted tree.
///
/// Cloning a `FiberRoot` yields another handle to the same root.
///
/// The accessors that look into the root ([`inspect`](Self::inspect),
/// [`with_host`](Self::with_host), ...) wait for a running cycle to finish,
/// so they must not be called from inside a component's render.
pub struct FiberRoot<H: HostConfig> {
    shared: Arc<RootShared<H>>,
}

/// Create a root rendering into `container` with the default config.
pub fn create_container<H: HostConfig>(host: H, container: H::Container) -> FiberRoot<H> {
    create_container_with_config(host, container, ReconcilerConfig::default())
}

/// Create a root rendering into `container`.
///
/// Nothing is rendered until the first [`update_container`].
pub fn create_container_with_config<H: HostConfig>(
    host: H,
    container: H::Container,
    config: ReconcilerConfig,
) -> FiberRoot<H> {
    let root_queue = Arc::new(UpdateQueue::new());
    let mut fiber = Fiber::root();
    fiber.update_queue = Some(Arc::clone(&root_queue));

    let mut arena = FiberArena::new();
    let root_fiber = arena.insert(fiber);
    tracing::debug!(?container, "created root");

    let shared = Arc::new_cyclic(|this| RootShared {
        state: Mutex::new(RootState {
            host,
            container,
            arena,
            current: root_fiber,
            finished_work: None,
        }),
        config,
        scheduled: Mutex::new(SmallVec::new()),
        root_fiber,
        root_queue,
        render_count: AtomicUsize::new(0),
        this: this.clone(),
    });
    FiberRoot { shared }
}

/// Render `element` as the whole content of `root`.
///
/// The first call mounts the tree; later calls re-render it.
pub fn update_container<H: HostConfig>(element: impl Into<Children>, root: &FiberRoot<H>) -> Result<()> {
    root.update_container(element)
}

impl<H: HostConfig> FiberRoot<H> {
    /// Render `children` as the whole content of this root.
    pub fn update_container(&self, children: impl Into<Children>) -> Result<()> {
        let shared = &self.shared;
        if shared.root_queue.enqueue(Update::value(children.into())) {
            tracing::trace!("replaced an unrendered root update");
        }
        shared.schedule_update_on_fiber(shared.root_fiber)
    }

    /// Remove everything rendered into the container.
    pub fn unmount(&self) -> Result<()> {
        self.update_container(Children::Empty)
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.shared.config
    }

    /// The current root fiber.
    pub fn current(&self) -> FiberId {
        let current = self.shared.state.lock().current;
        self.shared.flush_deferred();
        current
    }

    /// Number of committed render cycles.
    pub fn render_count(&self) -> usize {
        self.shared.render_count.load(Ordering::Acquire)
    }

    /// Look at the fiber trees.
    ///
    /// Updates dispatched while `f` runs are rendered after it returns.
    pub fn inspect<R>(&self, f: impl FnOnce(TreeView<'_, H::Instance>) -> R) -> R {
        let result = {
            let state = self.shared.state.lock();
            f(TreeView {
                arena: &state.arena,
                current: state.current,
            })
        };
        self.shared.flush_deferred();
        result
    }

    /// Look at the host target.
    pub fn with_host<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        let result = f(&self.shared.state.lock().host);
        self.shared.flush_deferred();
        result
    }

    /// Modify the host target outside a render cycle.
    ///
    /// This is where host events are delivered: updates they dispatch are
    /// rendered once `f` returns.
    pub fn with_host_mut<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        let result = f(&mut self.shared.state.lock().host);
        self.shared.flush_deferred();
        result
    }
}

impl<H: HostConfig> Clone for FiberRoot<H> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<H: HostConfig> fmt::Debug for FiberRoot<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiberRoot")
            .field("root_fiber", &self.shared.root_fiber)
            .field("render_count", &self.render_count())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

/// Read-only view of a root's fibers.
#[derive(Debug)]
pub struct TreeView<'a, I> {
    arena: &'a FiberArena<I>,
    current: FiberId,
}

impl<'a, I> Clone for TreeView<'a, I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, I> Copy for TreeView<'a, I> {}

impl<'a, I> TreeView<'a, I> {
    /// The current root fiber.
    pub fn root(&self) -> FiberId {
        self.current
    }

    /// The arena holding both buffers.
    pub fn arena(&self) -> &'a FiberArena<I> {
        self.arena
    }

    pub fn fiber(&self, id: FiberId) -> Option<&'a Fiber<I>> {
        self.arena.get(id)
    }

    pub fn children(&self, id: FiberId) -> ChildIter<'a, I> {
        self.arena.children(id)
    }

    /// Fibers of the current tree in depth-first order, root first.
    pub fn fibers(&self) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut node = self.current;
        'walk: loop {
            out.push(node);
            let Some(fiber) = self.arena.get(node) else {
                break;
            };
            if let Some(child) = fiber.child {
                node = child;
                continue;
            }
            loop {
                if node == self.current {
                    break 'walk;
                }
                let Some(fiber) = self.arena.get(node) else {
                    break 'walk;
                };
                if let Some(sibling) = fiber.sibling {
                    node = sibling;
                    continue 'walk;
                }
                match fiber.return_fiber {
                    Some(parent) => node = parent,
                    None => break 'walk,
                }
            }
        }
        out
    }

    /// The first fiber of the current tree rendering the component `name`.
    pub fn find_component(&self, name: &str) -> Option<FiberId> {
        self.find(|fiber| matches!(&fiber.kind, FiberKind::Component(c) if c.name() == name))
    }

    /// The first host fiber of the current tree with tag `tag`.
    pub fn find_host(&self, tag: &str) -> Option<FiberId> {
        self.find(|fiber| matches!(&fiber.kind, FiberKind::Host(t) if t == tag))
    }

    /// The first fiber of the current tree matching `predicate`.
    pub fn find(&self, mut predicate: impl FnMut(&Fiber<I>) -> bool) -> Option<FiberId> {
        self.fibers()
            .into_iter()
            .find(|&id| self.arena.get(id).is_some_and(&mut predicate))
    }

    /// Fibers of the current tree with the given tag.
    pub fn count(&self, tag: WorkTag) -> usize {
        self.fibers()
            .into_iter()
            .filter(|&id| self.arena.get(id).is_some_and(|fiber| fiber.tag() == tag))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Component, Element};
    use crate::host::MemoryHost;

    fn root_with(config: ReconcilerConfig) -> FiberRoot<MemoryHost> {
        let host = MemoryHost::new();
        let container = host.container();
        create_container_with_config(host, container, config)
    }

    #[test]
    fn walk_reaches_the_root_fiber() {
        let mut arena: FiberArena<()> = FiberArena::new();
        let root = arena.insert(Fiber::root());
        let child = arena.insert(Fiber::new(FiberKind::Text, Default::default(), None));
        arena[child].return_fiber = Some(root);

        assert_eq!(mark_update_from_fiber_to_root(&arena, child), Ok(Some(root)));
    }

    #[test]
    fn walk_from_a_released_fiber_is_ignored() {
        let mut arena: FiberArena<()> = FiberArena::new();
        let child = arena.insert(Fiber::new(FiberKind::Text, Default::default(), None));
        arena.remove(child);

        assert_eq!(mark_update_from_fiber_to_root(&arena, child), Ok(None));
    }

    #[test]
    fn walk_ending_off_root_is_an_error() {
        let mut arena: FiberArena<()> = FiberArena::new();
        let orphan = arena.insert(Fiber::new(FiberKind::Host("div".into()), Default::default(), None));

        assert_eq!(
            mark_update_from_fiber_to_root(&arena, orphan),
            Err(ReconcileError::DetachedFiber)
        );
    }

    #[test]
    fn first_mount_commits_once() {
        let root = root_with(ReconcilerConfig::default());
        let initial = root.current();

        update_container(Element::host("button").child("100"), &root).unwrap();

        assert_eq!(root.render_count(), 1);
        let current = root.current();
        assert_ne!(current, initial);
        root.inspect(|view| {
            assert_eq!(view.fiber(current).unwrap().alternate(), Some(initial));
            assert_eq!(view.count(WorkTag::HostElement), 1);
            assert_eq!(view.count(WorkTag::TextElement), 1);
        });
    }

    #[test]
    fn retries_give_up_and_keep_the_current_tree() {
        let broken = Component::new("Broken", |_, _| Err(ReconcileError::render("Broken", "no data")));
        let root = root_with(ReconcilerConfig {
            max_render_attempts: 2,
            ..ReconcilerConfig::default()
        });
        root.update_container(Element::host("p")).unwrap();
        let before = root.current();
        let live = root.inspect(|view| view.arena().len());

        let err = root.update_container(Element::component(&broken)).unwrap_err();

        assert_eq!(err, ReconcileError::RetriesExhausted { attempts: 2 });
        assert_eq!(root.current(), before);
        assert_eq!(root.inspect(|view| view.arena().len()), live);
        assert_eq!(root.with_host(MemoryHost::to_markup), "<p></p>");
    }

    #[test]
    fn endless_render_updates_hit_the_limit() {
        let restless = Component::new("Restless", |_, hooks| {
            let (n, set) = hooks.use_state(0_u32)?;
            set.set(n + 1)?;
            Ok(Children::from(n.to_string()))
        });
        let root = root_with(ReconcilerConfig {
            nested_update_limit: 5,
            ..ReconcilerConfig::default()
        });

        let err = root.update_container(Element::component(&restless)).unwrap_err();

        assert_eq!(err, ReconcileError::TooManyRerenders { limit: 5 });
        assert_eq!(root.render_count(), 5);
    }

    #[test]
    fn unmount_clears_the_container() {
        let root = root_with(ReconcilerConfig::default());
        root.update_container(Element::host("div").child("x")).unwrap();
        root.unmount().unwrap();

        assert_eq!(root.with_host(MemoryHost::to_markup), "");
        assert_eq!(root.inspect(|view| view.fibers().len()), 1);
    }
}
