//! Host Targets
//!
//! The reconciler never touches native nodes itself. It drives a
//! [`HostConfig`] implementation, which owns the native tree (DOM nodes,
//! terminal cells, widgets, ...) and performs the actual mutations.
//!
//! The render phase only creates nodes and assembles freshly mounted
//! subtrees off-screen. Everything that touches nodes already visible in the
//! container happens during commit.

pub mod memory;

use std::fmt::Debug;

use crate::element::Props;

pub use memory::{HostSnapshot, HostStats, MemoryHost, NodeHandle};

/// Capabilities the reconciler needs from a host target.
pub trait HostConfig: Send + 'static {
    /// Handle to a native node.
    type Instance: Clone + Debug + Send + Sync + 'static;

    /// Handle to the top-level container the tree renders into.
    type Container: Debug + Send + 'static;

    /// Create a native node for a host element.
    fn create_instance(&mut self, ty: &str, props: &Props) -> Self::Instance;

    /// Create a native text node.
    fn create_text_instance(&mut self, text: &str) -> Self::Instance;

    /// Attach `child` under a node that is not yet in the container.
    fn append_initial_child(&mut self, parent: &Self::Instance, child: &Self::Instance);

    /// Attach `child` as the last child of a mounted node.
    fn append_child(&mut self, parent: &Self::Instance, child: &Self::Instance) {
        self.append_initial_child(parent, child);
    }

    /// Attach `child` right before `before`. Moves `child` if already attached.
    fn insert_before(&mut self, parent: &Self::Instance, child: &Self::Instance, before: &Self::Instance);

    /// Detach `child` from `parent`.
    fn remove_child(&mut self, parent: &Self::Instance, child: &Self::Instance);

    /// Attach `child` as the last top-level node of the container.
    fn append_child_to_container(&mut self, container: &Self::Container, child: &Self::Instance);

    /// Attach `child` at the top level, right before `before`.
    fn insert_in_container_before(
        &mut self,
        container: &Self::Container,
        child: &Self::Instance,
        before: &Self::Instance,
    );

    /// Detach a top-level node from the container.
    fn remove_child_from_container(&mut self, container: &Self::Container, child: &Self::Instance);

    /// Apply changed attributes to a mounted host element.
    fn commit_update(&mut self, instance: &Self::Instance, old_props: &Props, new_props: &Props);

    /// Apply changed content to a mounted text node.
    fn commit_text_update(&mut self, instance: &Self::Instance, old_text: &str, new_text: &str);
}
