//! Ascent: create host nodes and bubble flags.

use std::sync::Arc;

use super::RenderContext;
use crate::fiber::{FiberArena, FiberId, FiberKind, Flags, StateNode};
use crate::host::HostConfig;

/// Finish `wip` once all of its children are complete.
///
/// Newly mounted host and text fibers get their host node here. Host
/// elements also adopt the host nodes of their (already complete) subtree,
/// so a mounted subtree is fully assembled before commit inserts its top
/// node. Fibers that already own a host node are flagged
/// [`Flags::UPDATE`] when their attributes or text changed.
pub(crate) fn complete_work<H: HostConfig>(cx: &mut RenderContext<'_, H>, wip: FiberId) {
    let fiber = &cx.arena[wip];
    let mounted = fiber.alternate.is_some() && fiber.instance().is_some();
    match &fiber.kind {
        FiberKind::Host(_) | FiberKind::Text if mounted => mark_update_if_changed(cx.arena, wip),
        FiberKind::Host(ty) => {
            let ty = ty.clone();
            let props = Arc::clone(&fiber.pending_props);
            let instance = cx.host.create_instance(&ty, &props);
            append_all_children(cx.arena, cx.host, &instance, wip);
            cx.arena[wip].state_node = StateNode::Instance(instance);
        }
        FiberKind::Text => {
            let props = Arc::clone(&fiber.pending_props);
            let instance = cx.host.create_text_instance(props.text_content().unwrap_or_default());
            cx.arena[wip].state_node = StateNode::Instance(instance);
        }
        FiberKind::Root | FiberKind::Component(_) => {}
    }
    bubble_properties(cx.arena, wip);
}

/// Flag an already mounted host or text fiber whose output changed.
///
/// This only notices that something changed; the host receives the old and
/// new props and decides what to patch.
fn mark_update_if_changed<I>(arena: &mut FiberArena<I>, wip: FiberId) {
    let fiber = &arena[wip];
    let Some(old) = fiber.alternate.and_then(|current| arena[current].memoized_props.clone()) else {
        return;
    };
    let new = &fiber.pending_props;
    if Arc::ptr_eq(&old, new) {
        return;
    }
    let changed = match fiber.kind {
        FiberKind::Text => old.text_content() != new.text_content(),
        _ => old.attributes != new.attributes,
    };
    if changed {
        arena[wip].flags |= Flags::UPDATE;
    }
}

/// Append the top-most host nodes below `wip` to `parent`.
///
/// Component fibers are transparent: the walk descends through them until it
/// reaches host fibers, and never descends into a host fiber (its own
/// children were appended when it completed).
fn append_all_children<H: HostConfig>(
    arena: &FiberArena<H::Instance>,
    host: &mut H,
    parent: &H::Instance,
    wip: FiberId,
) {
    let mut node = arena[wip].child;
    while let Some(id) = node {
        let fiber = &arena[id];
        match fiber.instance() {
            Some(instance) if fiber.kind.is_host() => host.append_initial_child(parent, instance),
            _ => {
                if let Some(child) = fiber.child {
                    node = Some(child);
                    continue;
                }
            }
        }

        let mut cursor = id;
        loop {
            if let Some(sibling) = arena[cursor].sibling {
                node = Some(sibling);
                break;
            }
            match arena[cursor].return_fiber {
                Some(parent) if parent != wip => cursor = parent,
                _ => return,
            }
        }
    }
}

/// Fold the children's flags into `wip.subtree_flags`.
///
/// Also points every child's `return_fiber` at `wip`, which is the parent
/// the commit phase will walk back up to.
fn bubble_properties<I>(arena: &mut FiberArena<I>, wip: FiberId) {
    let mut subtree_flags = Flags::NONE;
    let mut child = arena[wip].child;
    while let Some(id) = child {
        let fiber = &mut arena[id];
        subtree_flags |= fiber.flags | fiber.subtree_flags;
        fiber.return_fiber = Some(wip);
        child = fiber.sibling;
    }
    arena[wip].subtree_flags |= subtree_flags;
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use super::*;
    use crate::element::{Component, Element, Props};
    use crate::error::Result;
    use crate::fiber::Fiber;
    use crate::host::MemoryHost;
    use crate::reconcile::reconcile_child_fibers;
    use crate::root::ScheduleUpdate;

    struct Detached;

    impl ScheduleUpdate for Detached {
        fn schedule_update_on_fiber(&self, _fiber: FiberId) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn mounted_host_adopts_children_through_components() {
        let wrapper = Component::new("Wrapper", |_, _| Ok(Element::host("span").into()));
        let mut arena = FiberArena::new();
        let mut host = MemoryHost::new();
        let scheduler: Weak<dyn ScheduleUpdate> = Weak::<Detached>::new();

        // div > [Wrapper > span, "tail"], with the leaves completed by hand.
        let element = Element::host("div").child(Element::component(&wrapper)).child("tail");
        let div = arena.insert(Fiber::new(FiberKind::Host("div".into()), Arc::new(element.props.clone()), None));
        let first = reconcile_child_fibers(&mut arena, div, None, &element.props.children, false);
        arena[div].child = first;
        let component = first.unwrap();
        let tail = arena[component].sibling.unwrap();
        let span_element: crate::element::Children = Element::host("span").into();
        let span = reconcile_child_fibers(&mut arena, component, None, &span_element, false);
        arena[component].child = span;

        let mut cx = RenderContext::new(&mut arena, &mut host, &scheduler, false);
        complete_work(&mut cx, span.unwrap());
        complete_work(&mut cx, component);
        complete_work(&mut cx, tail);
        complete_work(&mut cx, div);

        let div_node = *arena[div].instance().unwrap();
        assert_eq!(host.children(div_node).len(), 2);
        assert_eq!(host.stats().initial_appends, 2);
        assert_eq!(host.snapshot(div_node), {
            let mut other = MemoryHost::new();
            let d = other.create_instance("div", &Props::default());
            let s = other.create_instance("span", &Props::default());
            let t = other.create_text_instance("tail");
            other.append_initial_child(&d, &s);
            other.append_initial_child(&d, &t);
            other.snapshot(d)
        });
    }

    #[test]
    fn changed_text_is_flagged_and_bubbles() {
        let mut arena: FiberArena<crate::host::NodeHandle> = FiberArena::new();
        let mut host = MemoryHost::new();
        let scheduler: Weak<dyn ScheduleUpdate> = Weak::<Detached>::new();

        let parent = arena.insert(Fiber::new(FiberKind::Host("p".into()), Arc::new(Props::default()), None));
        let current = arena.insert(Fiber::new(FiberKind::Text, Arc::new(Props::text("100")), None));
        let node = host.create_text_instance("100");
        arena[current].state_node = StateNode::Instance(node);
        arena[current].memoized_props = Some(Arc::new(Props::text("100")));

        let wip = crate::fiber::create_work_in_progress(&mut arena, current, Arc::new(Props::text("101")));
        arena[parent].child = Some(wip);

        let mut cx = RenderContext::new(&mut arena, &mut host, &scheduler, false);
        complete_work(&mut cx, wip);
        complete_work(&mut cx, parent);

        assert_eq!(arena[wip].flags, Flags::UPDATE);
        assert!(arena[parent].subtree_flags.needs_mutation());
        assert_eq!(arena[wip].return_fiber, Some(parent));
        // Only the parent was new; the text node was not recreated.
        assert_eq!(host.stats().text_instances, 1);
    }
}
