//! Mutation Effects
//!
//! Applies the flags of a finished tree to the host.
//!
//! The walk only enters subtrees whose `subtree_flags` contain a mutation and
//! handles each fiber in two steps. Entering a fiber, its deletion list is
//! processed, so removed nodes leave the host before anything is inserted
//! next to them. Leaving a fiber (children first, siblings in order), its
//! own placement and update are applied.

use smallvec::SmallVec;

use crate::fiber::{FiberArena, FiberId, FiberKind, Flags, WorkTag};
use crate::host::HostConfig;

/// Where the host nodes of a fiber live.
#[derive(Debug)]
enum HostParent<I> {
    Instance(I),
    Container,
}

/// Apply every mutation recorded below `root` (a finished root fiber).
pub(crate) fn commit_mutation_effects<H: HostConfig>(
    arena: &mut FiberArena<H::Instance>,
    host: &mut H,
    container: &H::Container,
    root: FiberId,
) {
    let mut next = Some(root);
    while let Some(id) = next {
        let deletions = arena[id].deletions.clone();
        for deleted in deletions {
            commit_deletion(arena, host, container, id, deleted);
        }

        let fiber = &arena[id];
        if let Some(child) = fiber.child.filter(|_| fiber.subtree_flags.needs_mutation()) {
            next = Some(child);
            continue;
        }

        let mut completed = id;
        next = loop {
            commit_mutation_effects_on_fiber(arena, host, container, completed);
            if completed == root {
                break None;
            }
            let fiber = &arena[completed];
            if let Some(sibling) = fiber.sibling {
                break Some(sibling);
            }
            match fiber.return_fiber {
                Some(parent) => completed = parent,
                None => break None,
            }
        };
    }
}

fn commit_mutation_effects_on_fiber<H: HostConfig>(
    arena: &FiberArena<H::Instance>,
    host: &mut H,
    container: &H::Container,
    id: FiberId,
) {
    let flags = arena[id].flags;
    if flags.contains(Flags::PLACEMENT) {
        commit_placement(arena, host, container, id);
    }
    if flags.contains(Flags::UPDATE) {
        commit_update(arena, host, id);
    }
}

fn commit_placement<H: HostConfig>(
    arena: &FiberArena<H::Instance>,
    host: &mut H,
    container: &H::Container,
    id: FiberId,
) {
    let Some(parent) = find_host_parent(arena, arena[id].return_fiber) else {
        tracing::warn!(fiber = ?id, "placed fiber has no host parent");
        return;
    };
    let before = get_host_sibling(arena, id);
    tracing::trace!(fiber = ?id, anchored = before.is_some(), "placing host nodes");

    for instance in top_host_instances(arena, id) {
        match (&parent, &before) {
            (HostParent::Instance(parent), Some(before)) => host.insert_before(parent, &instance, before),
            (HostParent::Instance(parent), None) => host.append_child(parent, &instance),
            (HostParent::Container, Some(before)) => host.insert_in_container_before(container, &instance, before),
            (HostParent::Container, None) => host.append_child_to_container(container, &instance),
        }
    }
}

fn commit_update<H: HostConfig>(arena: &FiberArena<H::Instance>, host: &mut H, id: FiberId) {
    let fiber = &arena[id];
    let (Some(instance), Some(new)) = (fiber.instance(), fiber.memoized_props.as_deref()) else {
        return;
    };
    let Some(old) = fiber.alternate.and_then(|current| arena[current].memoized_props.clone()) else {
        return;
    };
    match fiber.kind {
        FiberKind::Text => host.commit_text_update(
            instance,
            old.text_content().unwrap_or_default(),
            new.text_content().unwrap_or_default(),
        ),
        _ => host.commit_update(instance, &old, new),
    }
}

/// Remove `deleted` (a child of `parent`) from the host and release its
/// fibers.
fn commit_deletion<H: HostConfig>(
    arena: &mut FiberArena<H::Instance>,
    host: &mut H,
    container: &H::Container,
    parent: FiberId,
    deleted: FiberId,
) {
    if !arena.contains(deleted) {
        return;
    }
    match find_host_parent(arena, Some(parent)) {
        Some(HostParent::Instance(parent)) => {
            for instance in top_host_instances(arena, deleted) {
                host.remove_child(&parent, &instance);
            }
        }
        Some(HostParent::Container) => {
            for instance in top_host_instances(arena, deleted) {
                host.remove_child_from_container(container, &instance);
            }
        }
        None => tracing::warn!(fiber = ?deleted, "deleted fiber has no host parent"),
    }

    let released = release_subtree(arena, deleted);
    tracing::trace!(fiber = ?deleted, released, "deleted subtree");
}

/// Release every fiber of the subtree rooted at `root`, along with their
/// alternates. Returns the number of fibers released.
fn release_subtree<I>(arena: &mut FiberArena<I>, root: FiberId) -> usize {
    let mut doomed: Vec<FiberId> = Vec::new();
    let mut node = root;
    'walk: loop {
        doomed.push(node);
        if let Some(child) = arena[node].child {
            node = child;
            continue;
        }
        loop {
            if node == root {
                break 'walk;
            }
            let fiber = &arena[node];
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

    let mut released = 0;
    for id in doomed {
        let alternate = arena.get(id).and_then(|fiber| fiber.alternate);
        for id in std::iter::once(id).chain(alternate) {
            if arena.remove(id).is_some() {
                released += 1;
            }
        }
    }
    released
}

/// The nearest host node at or above `start`.
fn find_host_parent<I: Clone>(arena: &FiberArena<I>, start: Option<FiberId>) -> Option<HostParent<I>> {
    let mut node = start;
    while let Some(id) = node {
        let fiber = &arena[id];
        match (&fiber.kind, fiber.instance()) {
            (FiberKind::Host(_), Some(instance)) => return Some(HostParent::Instance(instance.clone())),
            (FiberKind::Root, _) => return Some(HostParent::Container),
            _ => node = fiber.return_fiber,
        }
    }
    None
}

/// The host node that nodes placed for `id` must be inserted before.
///
/// Searches the following siblings (descending through components and
/// climbing out of components with no further siblings) for the first host
/// fiber that is not itself being placed. Returns `None` when the nodes go
/// at the end of their host parent.
fn get_host_sibling<I: Clone>(arena: &FiberArena<I>, id: FiberId) -> Option<I> {
    let mut node = id;
    'siblings: loop {
        let sibling = loop {
            if let Some(sibling) = arena[node].sibling {
                break sibling;
            }
            let parent = arena[node].return_fiber?;
            let fiber = &arena[parent];
            if fiber.kind.is_host() || fiber.tag() == WorkTag::Root {
                return None;
            }
            node = parent;
        };

        node = sibling;
        while !arena[node].kind.is_host() {
            let fiber = &arena[node];
            if fiber.flags.contains(Flags::PLACEMENT) {
                continue 'siblings;
            }
            match fiber.child {
                Some(child) => node = child,
                None => continue 'siblings,
            }
        }

        let fiber = &arena[node];
        if !fiber.flags.contains(Flags::PLACEMENT) {
            if let Some(instance) = fiber.instance() {
                return Some(instance.clone());
            }
        }
    }
}

/// Host nodes of the subtree rooted at `root` that have no host ancestor
/// inside the subtree (`root`'s own node if it has one).
fn top_host_instances<I: Clone>(arena: &FiberArena<I>, root: FiberId) -> SmallVec<[I; 4]> {
    let mut out = SmallVec::new();
    let mut node = root;
    'walk: loop {
        let fiber = &arena[node];
        match fiber.instance() {
            Some(instance) if fiber.kind.is_host() => out.push(instance.clone()),
            _ => {
                if let Some(child) = fiber.child {
                    node = child;
                    continue;
                }
            }
        }
        loop {
            if node == root {
                break 'walk;
            }
            let fiber = &arena[node];
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

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use super::*;
    use crate::element::{Children, Component, Element};
    use crate::error::Result;
    use crate::fiber::Fiber;
    use crate::host::{MemoryHost, NodeHandle};
    use crate::root::ScheduleUpdate;
    use crate::update_queue::Update;
    use crate::work::{work_loop, RenderContext};

    struct Detached;

    impl ScheduleUpdate for Detached {
        fn schedule_update_on_fiber(&self, _fiber: FiberId) -> Result<()> {
            Ok(())
        }
    }

    /// A root plus just enough machinery to render and commit by hand.
    struct Harness {
        arena: FiberArena<NodeHandle>,
        host: MemoryHost,
        current: FiberId,
        scheduler: Weak<dyn ScheduleUpdate>,
    }

    impl Harness {
        fn new() -> Self {
            let mut arena = FiberArena::new();
            let current = arena.insert(Fiber::root());
            Self {
                arena,
                host: MemoryHost::new(),
                current,
                scheduler: Weak::<Detached>::new(),
            }
        }

        fn render(&mut self, children: impl Into<Children>) {
            let queue = self.arena[self.current].update_queue.clone().unwrap();
            queue.enqueue(Update::value(children.into()));
            let mut cx = RenderContext::new(&mut self.arena, &mut self.host, &self.scheduler, false);
            let wip = cx.prepare_fresh_stack(self.current);
            work_loop(&mut cx, wip).unwrap();
            let container = self.host.container();
            commit_mutation_effects(&mut self.arena, &mut self.host, &container, wip);
            self.current = wip;
        }
    }

    fn list(keys: &[&str]) -> Element {
        Element::host("ul").children(keys.iter().map(|&key| Element::host("li").key(key).child(key)))
    }

    #[test]
    fn keyed_reorder_moves_host_nodes() {
        let mut harness = Harness::new();
        harness.render(list(&["a", "b", "c"]));
        harness.render(list(&["c", "a", "b"]));

        assert_eq!(
            harness.host.to_markup(),
            "<ul><li>c</li><li>a</li><li>b</li></ul>"
        );
        // a and b were moved after c; nothing was recreated.
        assert_eq!(harness.host.stats().instances, 4);
        assert_eq!(harness.host.stats().appends, 1 + 2);
    }

    #[test]
    fn insertion_goes_before_the_next_stable_sibling() {
        let mut harness = Harness::new();
        harness.render(list(&["a", "c"]));
        harness.render(list(&["a", "b", "c"]));

        assert_eq!(harness.host.to_markup(), "<ul><li>a</li><li>b</li><li>c</li></ul>");
        assert_eq!(harness.host.stats().inserts, 1);
    }

    #[test]
    fn deletion_through_a_component_removes_its_host_nodes() {
        let pair = Component::new("Pair", |_, _| {
            Ok(Children::from(vec![Element::host("i"), Element::host("b")]))
        });
        let mut harness = Harness::new();
        harness.render(Element::host("div").child(Element::component(&pair)).child("end"));
        let live = harness.arena.len();

        harness.render(Element::host("div").child("end"));

        assert_eq!(harness.host.to_markup(), "<div>end</div>");
        // i and b through Pair, plus the old text, which moved position.
        assert_eq!(harness.host.stats().removals, 3);
        // Four fibers released, a new div and text fiber allocated.
        assert_eq!(harness.arena.len(), live - 2);
    }

    #[test]
    fn placement_inside_a_component_finds_the_sibling_outside_it() {
        let maybe = Component::new("Maybe", |props, _| Ok(props.children.clone()));
        let tree = |show: bool| {
            Element::host("div")
                .child(Element::component(&maybe).child(if show { Some(Element::host("p")) } else { None }))
                .child(Element::host("footer"))
        };
        let mut harness = Harness::new();
        harness.render(tree(false));
        harness.render(tree(true));

        assert_eq!(harness.host.to_markup(), "<div><p></p><footer></footer></div>");
    }
}
