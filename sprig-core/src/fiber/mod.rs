//! Fiber Trees
//!
//! This module implements the node model shared by the render and commit
//! phases.
//!
//! # Overview
//!
//! A root owns two trees that share node identities pairwise:
//!
//! - the **current** tree, which matches what the host target shows
//! - the **work-in-progress** tree, built from the current one during render
//!
//! Each fiber points at its counterpart through `alternate`. Once a render
//! completes, the commit phase publishes the work-in-progress tree as the new
//! current tree and the old current tree becomes the pool of alternates for
//! the next render.
//!
//! # Design Decisions
//!
//! 1. Fibers live in an arena and link to each other by [`FiberId`] instead of
//!    references, so parent and alternate back-links carry no ownership.
//!
//! 2. Ids are generational. A stale id (for example one captured by a state
//!    dispatcher of an unmounted component) fails to resolve instead of
//!    aliasing a recycled slot.

mod arena;
mod flags;
mod node;

pub use arena::{ChildIter, FiberArena};
pub use flags::Flags;
pub use node::{Fiber, FiberId, FiberKind, StateNode, WorkTag};

pub(crate) use arena::create_work_in_progress;
pub(crate) use node::MemoizedState;
