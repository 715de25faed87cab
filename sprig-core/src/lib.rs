//! Sprig Core
//!
//! This crate provides the fiber reconciler of the Sprig component UI
//! runtime. It turns a declarative element tree into the smallest set of
//! mutations against a host target, and re-renders efficiently when
//! component state changes.
//!
//! It implements:
//!
//! - Double-buffered fiber trees in a generational arena
//! - A render phase driven by a stack-free work loop
//! - Keyed child reconciliation
//! - Hooks (`use_state`, `use_reducer`, `use_ref`) with single-slot update queues
//! - A commit phase that applies placements, updates, and deletions
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `element`: Element descriptions (the input of a render)
//! - `fiber`: Fiber nodes, flags, and the arena holding both buffers
//! - `update_queue`: Pending state changes
//! - `hooks`: The hook context handed to function components
//! - `host`: The host target interface and an in-memory host
//! - `root`: Roots, scheduling, and the public entry points
//!
//! # Example
//!
//! ```rust
//! use sprig_core::{create_container, Component, Element, MemoryHost};
//!
//! let counter = Component::new("Counter", |_props, hooks| {
//!     let (count, _set_count) = hooks.use_state(100)?;
//!     Ok(Element::host("button").child(count).into())
//! });
//!
//! let host = MemoryHost::new();
//! let container = host.container();
//! let root = create_container(host, container);
//!
//! root.update_container(Element::component(&counter)).unwrap();
//! assert_eq!(root.with_host(MemoryHost::to_markup), "<button>100</button>");
//! ```

pub mod config;
pub mod element;
pub mod error;
pub mod fiber;
pub mod hooks;
pub mod host;
pub mod root;
pub mod update_queue;

mod reconcile;
mod work;

pub use config::ReconcilerConfig;
pub use element::{Children, Component, Element, ElementType, Key, Props};
pub use error::{ReconcileError, Result};
pub use fiber::{FiberId, Flags, WorkTag};
pub use hooks::{Dispatch, DispatchMode, HookKind, HookRef, Hooks, ReducerDispatch};
pub use host::{HostConfig, HostSnapshot, HostStats, MemoryHost, NodeHandle};
pub use root::{create_container, create_container_with_config, update_container, FiberRoot, TreeView};
