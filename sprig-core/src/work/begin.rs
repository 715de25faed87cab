//! Descent: render a fiber and reconcile its children.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use smallvec::SmallVec;

use super::RenderContext;
use crate::element::Children;
use crate::error::{ReconcileError, Result};
use crate::fiber::{FiberId, FiberKind, MemoizedState, WorkTag};
use crate::hooks::Hooks;
use crate::host::HostConfig;
use crate::reconcile::reconcile_child_fibers;
use crate::update_queue::process_update_queue;

/// Do the render work of `wip` and return its first child, if any.
///
/// Only function components can fail: with their own render error (a panic
/// counts as one), or with a hook usage error.
pub(crate) fn begin_work<H: HostConfig>(cx: &mut RenderContext<'_, H>, wip: FiberId) -> Result<Option<FiberId>> {
    match cx.arena[wip].tag() {
        WorkTag::Root => Ok(update_host_root(cx, wip)),
        WorkTag::HostElement => Ok(update_host_component(cx, wip)),
        WorkTag::TextElement => Ok(None),
        WorkTag::FunctionComponent => update_function_component(cx, wip),
    }
}

fn update_host_root<H: HostConfig>(cx: &mut RenderContext<'_, H>, wip: FiberId) -> Option<FiberId> {
    let fiber = &cx.arena[wip];
    let base = match &fiber.memoized_state {
        MemoizedState::Root(children) => children.clone(),
        MemoizedState::None | MemoizedState::Hooks(_) => Children::Empty,
    };
    let queue = fiber.update_queue.clone();

    let pending = queue.as_ref().and_then(|queue| queue.take_pending());
    let next = process_update_queue(&base, pending.as_ref());
    if let (Some(queue), Some(update)) = (queue, pending) {
        cx.consumed.push(queue.rollback(update));
    }

    reconcile_children(cx, wip, &next);
    cx.arena[wip].memoized_state = MemoizedState::Root(next);
    cx.arena[wip].child
}

fn update_host_component<H: HostConfig>(cx: &mut RenderContext<'_, H>, wip: FiberId) -> Option<FiberId> {
    let props = Arc::clone(&cx.arena[wip].pending_props);
    reconcile_children(cx, wip, &props.children);
    cx.arena[wip].child
}

fn update_function_component<H: HostConfig>(
    cx: &mut RenderContext<'_, H>,
    wip: FiberId,
) -> Result<Option<FiberId>> {
    let children = render_with_hooks(cx, wip)?;
    reconcile_children(cx, wip, &children);
    Ok(cx.arena[wip].child)
}

/// Call the component's render function with a fresh hook context.
///
/// Hooks replay the alternate's hook list when there is one (update) and are
/// mounted otherwise. The context lives only for this call, so nothing of
/// it survives into the render of another fiber.
fn render_with_hooks<H: HostConfig>(cx: &mut RenderContext<'_, H>, wip: FiberId) -> Result<Children> {
    let fiber = &cx.arena[wip];
    let FiberKind::Component(component) = &fiber.kind else {
        return Ok(Children::Empty);
    };
    let component = component.clone();
    let props = Arc::clone(&fiber.pending_props);
    let previous = fiber
        .alternate
        .map(|current| cx.arena[current].hooks().iter().cloned().collect::<SmallVec<_>>());

    tracing::trace!(component = component.name(), fiber = ?wip, "rendering component");
    let mut hooks = Hooks::new(wip, previous, cx.scheduler.clone());
    let rendered = panic::catch_unwind(AssertUnwindSafe(|| component.render(&props, &mut hooks)))
        .unwrap_or_else(|payload| Err(ReconcileError::render(component.name(), panic_message(payload.as_ref()))));
    let outcome = hooks.finish(rendered);

    cx.consumed.extend(outcome.consumed);
    let (children, list) = outcome.result?;
    cx.arena[wip].memoized_state = MemoizedState::Hooks(list);
    Ok(children)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload");
    format!("panicked: {detail}")
}

/// Reconcile `children` into `wip`'s child list.
///
/// A fiber with an alternate is diffed against the alternate's children with
/// effect tracking; a fiber without one mounts its children untracked.
fn reconcile_children<H: HostConfig>(cx: &mut RenderContext<'_, H>, wip: FiberId, children: &Children) {
    let current = cx.arena[wip].alternate;
    let current_child = current.and_then(|current| cx.arena[current].child);
    let child = reconcile_child_fibers(cx.arena, wip, current_child, children, current.is_some());
    cx.arena[wip].child = child;
}
