//! Fiber Arena
//!
//! Both buffers of a tree live in one slab. Slots are reused through a free
//! list and carry a generation counter, so a [`FiberId`] kept after its fiber
//! was released can never resolve to an unrelated fiber.
//!
//! The arena can also journal allocations. A render cycle starts a journal
//! and, if it fails, rolls it back to release every fiber it allocated.

use std::ops::{Index, IndexMut};
use std::sync::Arc;

use super::node::{Fiber, FiberId};
use crate::element::Props;

/// Slab storage for fibers.
#[derive(Debug)]
pub struct FiberArena<I> {
    slots: Vec<Option<Fiber<I>>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    journal: Option<Vec<FiberId>>,
}

impl<I> Default for FiberArena<I> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            journal: None,
        }
    }
}

impl<I> FiberArena<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, fiber: Fiber<I>) -> FiberId {
        let id = if let Some(index) = self.free_list.pop() {
            self.slots[index] = Some(fiber);
            FiberId::new(index as u32, self.generations[index])
        } else {
            self.slots.push(Some(fiber));
            self.generations.push(0);
            FiberId::new((self.slots.len() - 1) as u32, 0)
        };
        if let Some(journal) = &mut self.journal {
            journal.push(id);
        }
        id
    }

    pub(crate) fn remove(&mut self, id: FiberId) -> Option<Fiber<I>> {
        if !self.contains(id) {
            return None;
        }
        let index = id.index();
        let fiber = self.slots[index].take();
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free_list.push(index);
        fiber
    }

    /// Whether `id` refers to a live fiber.
    pub fn contains(&self, id: FiberId) -> bool {
        self.generations.get(id.index()) == Some(&id.generation())
            && self.slots.get(id.index()).is_some_and(Option::is_some)
    }

    pub fn get(&self, id: FiberId) -> Option<&Fiber<I>> {
        if self.generations.get(id.index()) != Some(&id.generation()) {
            return None;
        }
        self.slots.get(id.index())?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber<I>> {
        if self.generations.get(id.index()) != Some(&id.generation()) {
            return None;
        }
        self.slots.get_mut(id.index())?.as_mut()
    }

    /// Number of live fibers across both buffers.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the children of `parent` in sibling order.
    pub fn children(&self, parent: FiberId) -> ChildIter<'_, I> {
        ChildIter {
            arena: self,
            next: self.get(parent).and_then(|fiber| fiber.child),
        }
    }

    pub(crate) fn begin_journal(&mut self) {
        self.journal = Some(Vec::new());
    }

    pub(crate) fn commit_journal(&mut self) {
        self.journal = None;
    }

    /// Release every fiber allocated since [`begin_journal`](Self::begin_journal).
    ///
    /// Fibers that were created as the alternate of a committed fiber are
    /// unlinked from it, so the committed tree looks as if the cycle never ran.
    pub(crate) fn rollback_journal(&mut self) -> usize {
        let Some(allocated) = self.journal.take() else {
            return 0;
        };
        for &id in allocated.iter().rev() {
            let Some(fiber) = self.remove(id) else {
                continue;
            };
            if let Some(alternate) = fiber.alternate.and_then(|alt| self.get_mut(alt)) {
                if alternate.alternate == Some(id) {
                    alternate.alternate = None;
                }
            }
        }
        allocated.len()
    }
}

impl<I> Index<FiberId> for FiberArena<I> {
    type Output = Fiber<I>;

    /// Panics if the fiber was released. Every id reached through tree links
    /// during a cycle is live, so a panic here is a broken tree invariant.
    fn index(&self, id: FiberId) -> &Fiber<I> {
        match self.get(id) {
            Some(fiber) => fiber,
            None => panic!("fiber {id:?} is not alive"),
        }
    }
}

impl<I> IndexMut<FiberId> for FiberArena<I> {
    fn index_mut(&mut self, id: FiberId) -> &mut Fiber<I> {
        match self.get_mut(id) {
            Some(fiber) => fiber,
            None => panic!("fiber {id:?} is not alive"),
        }
    }
}

/// Iterator over a fiber's children.
#[derive(Debug)]
pub struct ChildIter<'a, I> {
    arena: &'a FiberArena<I>,
    next: Option<FiberId>,
}

impl<I> Iterator for ChildIter<'_, I> {
    type Item = FiberId;

    fn next(&mut self) -> Option<FiberId> {
        let id = self.next?;
        self.next = self.arena.get(id).and_then(|fiber| fiber.sibling);
        Some(id)
    }
}

/// Produce the work-in-progress counterpart of `current`.
///
/// The first time a fiber is re-rendered this allocates its alternate. After
/// that, the existing alternate is reset and reused, so each fiber identity
/// costs at most two slots for the lifetime of the tree.
pub(crate) fn create_work_in_progress<I: Clone>(
    arena: &mut FiberArena<I>,
    current: FiberId,
    pending_props: Arc<Props>,
) -> FiberId {
    let existing = arena[current].alternate;
    let wip = match existing {
        Some(wip) => {
            let fiber = &mut arena[wip];
            fiber.pending_props = pending_props;
            fiber.flags = Default::default();
            fiber.subtree_flags = Default::default();
            fiber.deletions.clear();
            wip
        }
        None => {
            let source = &arena[current];
            let mut fiber = Fiber::new(source.kind.clone(), pending_props, source.key.clone());
            fiber.state_node = source.state_node.clone();
            fiber.alternate = Some(current);
            let wip = arena.insert(fiber);
            arena[current].alternate = Some(wip);
            wip
        }
    };

    let source = &arena[current];
    let update_queue = source.update_queue.clone();
    let child = source.child;
    let memoized_props = source.memoized_props.clone();
    let memoized_state = source.memoized_state.clone();

    let fiber = &mut arena[wip];
    fiber.update_queue = update_queue;
    fiber.child = child;
    fiber.sibling = None;
    fiber.index = 0;
    fiber.memoized_props = memoized_props;
    fiber.memoized_state = memoized_state;
    wip
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiber::{FiberKind, Flags};

    fn host(tag: &str) -> Fiber<u32> {
        Fiber::new(FiberKind::Host(tag.into()), Arc::new(Props::default()), None)
    }

    #[test]
    fn released_ids_do_not_resolve() {
        let mut arena = FiberArena::new();
        let first = arena.insert(host("div"));
        arena.remove(first);
        let second = arena.insert(host("span"));

        assert!(arena.get(first).is_none());
        assert!(!arena.contains(first));
        assert!(arena.contains(second));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn work_in_progress_links_both_ways() {
        let mut arena = FiberArena::new();
        let current = arena.insert(host("div"));
        let wip = create_work_in_progress(&mut arena, current, Arc::new(Props::default()));

        assert_ne!(current, wip);
        assert_eq!(arena[current].alternate, Some(wip));
        assert_eq!(arena[wip].alternate, Some(current));
    }

    #[test]
    fn work_in_progress_reuses_the_alternate() {
        let mut arena = FiberArena::new();
        let current = arena.insert(host("div"));
        let wip = create_work_in_progress(&mut arena, current, Arc::new(Props::default()));
        arena[wip].flags = Flags::PLACEMENT;
        arena[wip].subtree_flags = Flags::UPDATE;

        let again = create_work_in_progress(&mut arena, current, Arc::new(Props::default()));

        assert_eq!(again, wip);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena[again].flags, Flags::NONE);
        assert_eq!(arena[again].subtree_flags, Flags::NONE);
    }

    #[test]
    fn rollback_unlinks_new_alternates() {
        let mut arena = FiberArena::new();
        let current = arena.insert(host("div"));

        arena.begin_journal();
        let wip = create_work_in_progress(&mut arena, current, Arc::new(Props::default()));
        let child = arena.insert(host("span"));
        assert_eq!(arena.rollback_journal(), 2);

        assert!(!arena.contains(wip));
        assert!(!arena.contains(child));
        assert_eq!(arena[current].alternate, None);
    }

    #[test]
    fn children_follow_sibling_links() {
        let mut arena = FiberArena::new();
        let parent = arena.insert(host("ul"));
        let a = arena.insert(host("li"));
        let b = arena.insert(host("li"));
        arena[parent].child = Some(a);
        arena[a].sibling = Some(b);

        assert_eq!(arena.children(parent).collect::<Vec<_>>(), vec![a, b]);
    }
}
