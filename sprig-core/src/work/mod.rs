//! Render and Commit Phases
//!
//! A render cycle has two phases:
//!
//! 1. **Render**: [`work_loop`] builds the work-in-progress tree from the
//!    current one, one fiber at a time. Descending, `begin_work` renders the
//!    fiber and reconciles its children. Ascending, `complete_work` creates
//!    host nodes for newly mounted fibers and bubbles effect flags up.
//!    Nothing visible changes in this phase, so a failed render can simply be
//!    thrown away.
//!
//! 2. **Commit**: [`commit_mutation_effects`] walks the flagged part of the
//!    finished tree and applies insertions, updates, and deletions to the
//!    host. The root then publishes the finished tree as its current tree.

mod begin;
mod commit;
mod complete;
mod work_loop;

use std::sync::{Arc, Weak};

use crate::fiber::{create_work_in_progress, FiberArena, FiberId};
use crate::host::HostConfig;
use crate::root::ScheduleUpdate;
use crate::update_queue::Rollback;

pub(crate) use commit::commit_mutation_effects;
pub(crate) use work_loop::work_loop;

/// Everything the render phase works with during one attempt.
pub(crate) struct RenderContext<'a, H: HostConfig> {
    pub(crate) arena: &'a mut FiberArena<H::Instance>,
    pub(crate) host: &'a mut H,
    /// Handed to every dispatcher created by this render.
    pub(crate) scheduler: &'a Weak<dyn ScheduleUpdate>,
    pub(crate) dev_warnings: bool,
    /// Updates consumed so far; restored if the attempt is discarded.
    pub(crate) consumed: Vec<Rollback>,
}

impl<'a, H: HostConfig> RenderContext<'a, H> {
    pub(crate) fn new(
        arena: &'a mut FiberArena<H::Instance>,
        host: &'a mut H,
        scheduler: &'a Weak<dyn ScheduleUpdate>,
        dev_warnings: bool,
    ) -> Self {
        Self {
            arena,
            host,
            scheduler,
            dev_warnings,
            consumed: Vec::new(),
        }
    }

    /// Start a render from the committed root: returns the work-in-progress
    /// root fiber.
    pub(crate) fn prepare_fresh_stack(&mut self, current_root: FiberId) -> FiberId {
        let props = Arc::clone(&self.arena[current_root].pending_props);
        create_work_in_progress(self.arena, current_root, props)
    }

    /// Put back every update this attempt consumed.
    pub(crate) fn restore_consumed(&mut self) {
        for rollback in self.consumed.drain(..) {
            rollback.restore();
        }
    }
}
