//! Fiber Nodes
//!
//! A fiber is one unit of work: one position in the rendered tree together
//! with its props, state, host node, and pending effects.
//!
//! Fibers form a singly-linked tree: `child` points at the first child,
//! `sibling` at the next sibling, and `return_fiber` back at the parent.
//! `alternate` links a fiber with its counterpart in the other buffer
//! (current vs. work-in-progress). All links are [`FiberId`]s into a
//! [`FiberArena`](super::FiberArena); no fiber owns another.

use std::any::Any;
use std::sync::Arc;

use smallvec::SmallVec;

use super::flags::Flags;
use crate::element::{Children, Component, ElementType, Key, Props};
use crate::hooks::{Hook, HookList};
use crate::update_queue::UpdateQueue;

/// Stable identifier of a fiber in its arena (generational).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiberId {
    index: u32,
    generation: u32,
}

impl FiberId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) const fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.generation
    }
}

/// Which render-phase behavior applies to a fiber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkTag {
    /// A function component.
    FunctionComponent,
    /// The root of a tree, owned by a [`FiberRoot`](crate::root::FiberRoot).
    Root,
    /// A native host element.
    HostElement,
    /// A native text node.
    TextElement,
}

/// Tag plus element kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FiberKind {
    /// The root fiber.
    Root,
    /// A host element with its tag name.
    Host(String),
    /// A text node.
    Text,
    /// A function component.
    Component(Component),
}

impl FiberKind {
    /// The work tag for this kind.
    pub fn tag(&self) -> WorkTag {
        match self {
            Self::Root => WorkTag::Root,
            Self::Host(_) => WorkTag::HostElement,
            Self::Text => WorkTag::TextElement,
            Self::Component(_) => WorkTag::FunctionComponent,
        }
    }

    pub(crate) fn from_element_type(ty: &ElementType) -> Self {
        match ty {
            ElementType::Host(tag) => Self::Host(tag.clone()),
            ElementType::Component(component) => Self::Component(component.clone()),
        }
    }

    /// Whether this fiber owns a host node.
    pub fn is_host(&self) -> bool {
        matches!(self, Self::Host(_) | Self::Text)
    }
}

/// What a fiber's `state_node` points at.
#[derive(Debug, Clone, Default)]
pub enum StateNode<I> {
    /// Nothing yet (or a component, which never has one).
    #[default]
    None,
    /// The host node created for this fiber.
    Instance(I),
    /// The owning root. Only set on root fibers.
    Root,
}

/// Per-tag memoized state.
#[derive(Debug, Clone, Default)]
pub(crate) enum MemoizedState {
    #[default]
    None,
    /// The root's current child description.
    Root(Children),
    /// A function component's hooks in call order.
    Hooks(HookList),
}

/// One node of a fiber tree.
#[derive(Debug)]
pub struct Fiber<I> {
    pub(crate) kind: FiberKind,
    pub(crate) key: Option<Key>,
    pub(crate) index: usize,

    pub(crate) pending_props: Arc<Props>,
    pub(crate) memoized_props: Option<Arc<Props>>,
    pub(crate) memoized_state: MemoizedState,
    pub(crate) update_queue: Option<Arc<UpdateQueue<Children>>>,
    pub(crate) state_node: StateNode<I>,

    pub(crate) return_fiber: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,

    pub(crate) flags: Flags,
    pub(crate) subtree_flags: Flags,
    pub(crate) deletions: SmallVec<[FiberId; 2]>,

    pub(crate) alternate: Option<FiberId>,
}

impl<I> Fiber<I> {
    pub(crate) fn new(kind: FiberKind, pending_props: Arc<Props>, key: Option<Key>) -> Self {
        Self {
            kind,
            key,
            index: 0,
            pending_props,
            memoized_props: None,
            memoized_state: MemoizedState::None,
            update_queue: None,
            state_node: StateNode::None,
            return_fiber: None,
            child: None,
            sibling: None,
            flags: Flags::NONE,
            subtree_flags: Flags::NONE,
            deletions: SmallVec::new(),
            alternate: None,
        }
    }

    /// A fresh root fiber with an empty update queue.
    pub(crate) fn root() -> Self {
        let mut fiber = Self::new(FiberKind::Root, Arc::new(Props::default()), None);
        fiber.state_node = StateNode::Root;
        fiber.update_queue = Some(Arc::new(UpdateQueue::new()));
        fiber
    }

    pub fn tag(&self) -> WorkTag {
        self.kind.tag()
    }

    pub fn kind(&self) -> &FiberKind {
        &self.kind
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Position among siblings.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pending_props(&self) -> &Props {
        &self.pending_props
    }

    /// Props of the last completed render of this fiber.
    pub fn memoized_props(&self) -> Option<&Props> {
        self.memoized_props.as_deref()
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn subtree_flags(&self) -> Flags {
        self.subtree_flags
    }

    pub fn alternate(&self) -> Option<FiberId> {
        self.alternate
    }

    pub fn return_fiber(&self) -> Option<FiberId> {
        self.return_fiber
    }

    pub fn child(&self) -> Option<FiberId> {
        self.child
    }

    pub fn sibling(&self) -> Option<FiberId> {
        self.sibling
    }

    /// Children removed by the last render of this fiber.
    pub fn deletions(&self) -> &[FiberId] {
        &self.deletions
    }

    /// The host node, once created.
    pub fn instance(&self) -> Option<&I> {
        match &self.state_node {
            StateNode::Instance(instance) => Some(instance),
            StateNode::None | StateNode::Root => None,
        }
    }

    pub(crate) fn hooks(&self) -> &[Hook] {
        match &self.memoized_state {
            MemoizedState::Hooks(hooks) => hooks,
            MemoizedState::None | MemoizedState::Root(_) => &[],
        }
    }

    /// Number of hooks recorded by the last render.
    pub fn hook_count(&self) -> usize {
        self.hooks().len()
    }

    /// Value held by the hook at `index`, if it is a state or reducer hook
    /// of type `T`.
    pub fn hook_state<T: Any + Clone>(&self, index: usize) -> Option<T> {
        self.hooks().get(index)?.state::<T>().cloned()
    }

    /// The child description last rendered by a root fiber.
    pub fn root_children(&self) -> Option<&Children> {
        match &self.memoized_state {
            MemoizedState::Root(children) => Some(children),
            MemoizedState::None | MemoizedState::Hooks(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_tags() {
        assert_eq!(FiberKind::Root.tag(), WorkTag::Root);
        assert_eq!(FiberKind::Host("div".into()).tag(), WorkTag::HostElement);
        assert_eq!(FiberKind::Text.tag(), WorkTag::TextElement);
        assert!(FiberKind::Text.is_host());
        assert!(!FiberKind::Root.is_host());
    }

    #[test]
    fn root_fiber_owns_a_queue() {
        let root = Fiber::<()>::root();
        assert_eq!(root.tag(), WorkTag::Root);
        assert!(root.update_queue.is_some());
        assert!(matches!(root.state_node, StateNode::Root));
        assert_eq!(root.hook_count(), 0);
    }
}
