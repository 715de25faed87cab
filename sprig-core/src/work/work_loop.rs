//! Work Loop
//!
//! Drives the render phase over the work-in-progress tree without recursion.
//!
//! The walk keeps a single cursor and moves it along the tree's own links:
//! down through `child` while `begin_work` returns one, then, on the way up,
//! completing each fiber and continuing with its `sibling`, or with its
//! `return_fiber` once there are no more siblings. The walk ends when it
//! climbs past the root. Tree depth never costs call-stack depth.

use std::sync::Arc;

use super::begin::begin_work;
use super::complete::complete_work;
use super::RenderContext;
use crate::error::Result;
use crate::fiber::FiberId;
use crate::host::HostConfig;

/// Render the whole tree below `root` (a work-in-progress root fiber).
pub(crate) fn work_loop<H: HostConfig>(cx: &mut RenderContext<'_, H>, root: FiberId) -> Result<()> {
    let mut work_in_progress = Some(root);
    while let Some(unit) = work_in_progress {
        work_in_progress = perform_unit_of_work(cx, unit)?;
    }
    Ok(())
}

fn perform_unit_of_work<H: HostConfig>(cx: &mut RenderContext<'_, H>, unit: FiberId) -> Result<Option<FiberId>> {
    let next = begin_work(cx, unit)?;

    let fiber = &mut cx.arena[unit];
    fiber.memoized_props = Some(Arc::clone(&fiber.pending_props));

    match next {
        Some(child) => Ok(Some(child)),
        None => Ok(complete_unit_of_work(cx, unit)),
    }
}

/// Complete `unit` and as many ancestors as are finished, returning the next
/// fiber to begin, or `None` once the root completed.
fn complete_unit_of_work<H: HostConfig>(cx: &mut RenderContext<'_, H>, unit: FiberId) -> Option<FiberId> {
    let mut completed = unit;
    loop {
        complete_work(cx, completed);

        let fiber = &cx.arena[completed];
        if let Some(sibling) = fiber.sibling {
            return Some(sibling);
        }
        completed = fiber.return_fiber?;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use super::*;
    use crate::element::{Children, Component, Element};
    use crate::fiber::{Fiber, FiberArena, Flags};
    use crate::host::MemoryHost;
    use crate::root::ScheduleUpdate;
    use crate::update_queue::Update;

    struct Detached;

    impl ScheduleUpdate for Detached {
        fn schedule_update_on_fiber(&self, _fiber: FiberId) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn renders_nested_hosts_bottom_up() {
        let mut element = Element::host("leaf");
        for _ in 0..200 {
            element = Element::host("div").child(element);
        }

        let mut arena = FiberArena::new();
        let mut host = MemoryHost::new();
        let scheduler: Weak<dyn ScheduleUpdate> = Weak::<Detached>::new();
        let root = arena.insert(Fiber::root());
        arena[root].update_queue.as_ref().unwrap().enqueue(Update::value(element.into()));

        let mut cx = RenderContext::new(&mut arena, &mut host, &scheduler, false);
        let wip = cx.prepare_fresh_stack(root);
        work_loop(&mut cx, wip).unwrap();

        assert_eq!(host.stats().instances, 201);
        assert_eq!(host.stats().initial_appends, 200);
        assert_eq!(arena[wip].subtree_flags, Flags::PLACEMENT);
    }

    #[test]
    fn every_fiber_is_completed_once() {
        let item = Component::new("Item", |props, _| Ok(props.children.clone()));
        let list = Element::host("ul").children(
            ["a", "b", "c"]
                .into_iter()
                .map(|label| Element::component(&item).key(label).child(Element::host("li").child(label))),
        );

        let mut arena = FiberArena::new();
        let mut host = MemoryHost::new();
        let scheduler: Weak<dyn ScheduleUpdate> = Weak::<Detached>::new();
        let root = arena.insert(Fiber::root());
        arena[root].update_queue.as_ref().unwrap().enqueue(Update::value(list.into()));

        let mut cx = RenderContext::new(&mut arena, &mut host, &scheduler, false);
        let wip = cx.prepare_fresh_stack(root);
        work_loop(&mut cx, wip).unwrap();

        let stats = host.stats();
        assert_eq!(stats.instances, 4);
        assert_eq!(stats.text_instances, 3);
        // li into ul through the components, text into each li.
        assert_eq!(stats.initial_appends, 6);
        assert_eq!(stats.mutations(), 0);
        assert!(matches!(arena[wip].memoized_state, crate::fiber::MemoizedState::Root(Children::Element(_))));
    }
}
