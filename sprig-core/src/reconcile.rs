//! Child Reconciler
//!
//! Turns a fiber's new child description into a chain of child fibers,
//! reusing the previous render's fibers where possible.
//!
//! # Matching
//!
//! The description is flattened into a sequence of text and element items
//! (nested lists are spliced in place, empty entries are dropped). Each item
//! is matched against the old children by key, or by position when it has
//! no key. A match is reused only if the element type is unchanged;
//! otherwise the old fiber is deleted and a new one created.
//!
//! # Effects
//!
//! When tracking effects (the parent has been committed before), new fibers
//! are flagged [`Flags::PLACEMENT`]. Reused fibers are flagged only if they
//! moved before a fiber that kept its place: a reused fiber whose old index
//! is below the highest old index placed so far has to move. Old fibers that
//! were not matched are queued on the parent's deletion list.
//!
//! Without effect tracking (first mount of the parent) no flags are set,
//! since the whole subtree gets inserted by its nearest placed ancestor.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::element::{Children, Element, ElementType, Props};
use crate::fiber::{create_work_in_progress, Fiber, FiberArena, FiberId, FiberKind, Flags};

/// One flattened item of a child description.
#[derive(Debug, Clone, Copy)]
enum NewChild<'a> {
    Text(&'a str),
    Element(&'a Element),
}

impl NewChild<'_> {
    fn slot(&self, index: usize) -> Slot {
        match self {
            Self::Element(Element { key: Some(key), .. }) => Slot::Keyed(key.clone()),
            Self::Element(_) | Self::Text(_) => Slot::Indexed(index),
        }
    }

    fn props(&self) -> Arc<Props> {
        match self {
            Self::Text(text) => Arc::new(Props::text(text)),
            Self::Element(element) => Arc::new(element.props.clone()),
        }
    }

    /// Whether a fiber of `kind` can be reused for this item.
    fn matches(&self, kind: &FiberKind) -> bool {
        match (self, kind) {
            (Self::Text(_), FiberKind::Text) => true,
            (Self::Element(element), FiberKind::Host(tag)) => {
                matches!(&element.ty, ElementType::Host(ty) if ty == tag)
            }
            (Self::Element(element), FiberKind::Component(component)) => {
                matches!(&element.ty, ElementType::Component(ty) if ty == component)
            }
            _ => false,
        }
    }

    fn create_fiber<I>(&self) -> Fiber<I> {
        match self {
            Self::Text(_) => Fiber::new(FiberKind::Text, self.props(), None),
            Self::Element(element) => Fiber::new(
                FiberKind::from_element_type(&element.ty),
                self.props(),
                element.key.clone(),
            ),
        }
    }
}

/// Identity of a child among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Slot {
    Keyed(String),
    Indexed(usize),
}

fn flatten<'a>(children: &'a Children, out: &mut Vec<NewChild<'a>>) {
    match children {
        Children::Empty => {}
        Children::Text(text) => out.push(NewChild::Text(text)),
        Children::Element(element) => out.push(NewChild::Element(element)),
        Children::List(items) => {
            for item in items {
                flatten(item, out);
            }
        }
    }
}

/// Reconcile `new_children` against the old child chain starting at
/// `current_first_child` and return the first new child of `parent`.
///
/// Every returned fiber has `return_fiber` set to `parent` and `index` set to
/// its position. Deletions are recorded on `parent`.
pub(crate) fn reconcile_child_fibers<I: Clone>(
    arena: &mut FiberArena<I>,
    parent: FiberId,
    current_first_child: Option<FiberId>,
    new_children: &Children,
    track_effects: bool,
) -> Option<FiberId> {
    let mut items = Vec::new();
    flatten(new_children, &mut items);

    let mut existing: IndexMap<Slot, FiberId> = IndexMap::new();
    let mut old = current_first_child;
    while let Some(id) = old {
        let fiber = &arena[id];
        let slot = match &fiber.key {
            Some(key) => Slot::Keyed(key.clone()),
            None => Slot::Indexed(fiber.index),
        };
        old = fiber.sibling;
        if let Some(duplicate) = existing.insert(slot, id) {
            // A duplicate key in the old list can never be matched again.
            delete_child(arena, parent, duplicate, track_effects);
        }
    }

    let mut first: Option<FiberId> = None;
    let mut previous: Option<FiberId> = None;
    let mut last_placed_index = 0;

    for (new_index, item) in items.iter().enumerate() {
        let reused = match existing.shift_remove(&item.slot(new_index)) {
            Some(old) if item.matches(&arena[old].kind) => {
                Some(create_work_in_progress(arena, old, item.props()))
            }
            Some(old) => {
                delete_child(arena, parent, old, track_effects);
                None
            }
            None => None,
        };
        let fiber = match reused {
            Some(fiber) => fiber,
            None => arena.insert(item.create_fiber()),
        };

        arena[fiber].return_fiber = Some(parent);
        last_placed_index = place_child(arena, fiber, last_placed_index, new_index, track_effects);

        match previous {
            Some(previous) => arena[previous].sibling = Some(fiber),
            None => first = Some(fiber),
        }
        previous = Some(fiber);
    }

    for (_, old) in existing {
        delete_child(arena, parent, old, track_effects);
    }
    first
}

fn place_child<I>(
    arena: &mut FiberArena<I>,
    fiber: FiberId,
    last_placed_index: usize,
    new_index: usize,
    track_effects: bool,
) -> usize {
    arena[fiber].index = new_index;
    if !track_effects {
        return last_placed_index;
    }
    let old_index = arena[fiber].alternate.map(|current| arena[current].index);
    match old_index {
        Some(old_index) if old_index >= last_placed_index => old_index,
        Some(_) | None => {
            arena[fiber].flags |= Flags::PLACEMENT;
            last_placed_index
        }
    }
}

fn delete_child<I>(arena: &mut FiberArena<I>, parent: FiberId, child: FiberId, track_effects: bool) {
    if !track_effects {
        return;
    }
    let fiber = &mut arena[parent];
    fiber.deletions.push(child);
    fiber.flags |= Flags::CHILD_DELETION;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Component;

    fn parent(arena: &mut FiberArena<u32>) -> FiberId {
        arena.insert(Fiber::new(FiberKind::Host("ul".into()), Arc::new(Props::default()), None))
    }

    fn item(key: &str) -> Element {
        Element::host("li").key(key).child(key)
    }

    fn keys(arena: &FiberArena<u32>, first: Option<FiberId>) -> Vec<String> {
        let mut out = Vec::new();
        let mut next = first;
        while let Some(id) = next {
            out.push(arena[id].key().unwrap_or("-").to_owned());
            next = arena[id].sibling;
        }
        out
    }

    fn siblings(arena: &FiberArena<u32>, first: Option<FiberId>) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut next = first;
        while let Some(id) = next {
            out.push(id);
            next = arena[id].sibling;
        }
        out
    }

    /// Mount a keyed list and return (parent, first child).
    fn mounted(arena: &mut FiberArena<u32>, list: &[&str]) -> (FiberId, Option<FiberId>) {
        let parent = parent(arena);
        let children = Children::from(list.iter().map(|k| item(k)).collect::<Vec<_>>());
        let first = reconcile_child_fibers(arena, parent, None, &children, false);
        (parent, first)
    }

    #[test]
    fn mount_path_sets_no_flags() {
        let mut arena = FiberArena::new();
        let (_, first) = mounted(&mut arena, &["a", "b"]);

        assert_eq!(keys(&arena, first), ["a", "b"]);
        let fibers = siblings(&arena, first);
        assert_eq!(fibers.len(), 2);
        assert!(fibers.iter().all(|&id| arena[id].flags.is_empty()));
        assert_eq!(arena[first.unwrap()].index, 0);
    }

    #[test]
    fn nested_lists_are_flattened() {
        let mut arena = FiberArena::new();
        let parent = parent(&mut arena);
        let children = Children::List(vec![
            Children::text("x"),
            Children::List(vec![Children::Empty, Children::text("y")]),
        ]);

        let first = reconcile_child_fibers(&mut arena, parent, None, &children, false).unwrap();
        let second = arena[first].sibling.unwrap();

        assert_eq!(arena[first].pending_props().text_content(), Some("x"));
        assert_eq!(arena[second].pending_props().text_content(), Some("y"));
        assert_eq!(arena[second].index, 1);
        assert_eq!(arena[second].return_fiber, Some(parent));
    }

    #[test]
    fn keyed_reorder_reuses_fibers_and_places_the_moved_one() {
        let mut arena = FiberArena::new();
        let (parent, first) = mounted(&mut arena, &["a", "b", "c"]);
        let old = siblings(&arena, first);

        let reordered = Children::from(vec![item("c"), item("a"), item("b")]);
        let first = reconcile_child_fibers(&mut arena, parent, first, &reordered, true);

        assert_eq!(keys(&arena, first), ["c", "a", "b"]);
        let new = siblings(&arena, first);
        // c keeps its place; a and b come after it and have to move.
        assert_eq!(arena[new[0]].alternate, Some(old[2]));
        assert!(arena[new[0]].flags.is_empty());
        assert_eq!(arena[new[1]].flags, Flags::PLACEMENT);
        assert_eq!(arena[new[2]].flags, Flags::PLACEMENT);
        assert!(arena[parent].deletions.is_empty());
    }

    #[test]
    fn removed_and_retyped_children_are_deleted() {
        let mut arena = FiberArena::new();
        let (parent, first) = mounted(&mut arena, &["a", "b"]);
        let old_b = arena[first.unwrap()].sibling.unwrap();

        let next = Children::from(vec![Element::host("p").key("a"), item("c")]);
        let first = reconcile_child_fibers(&mut arena, parent, first, &next, true);

        assert_eq!(keys(&arena, first), ["a", "c"]);
        assert_eq!(arena[parent].deletions.len(), 2);
        assert!(arena[parent].deletions.contains(&old_b));
        assert!(arena[parent].flags.contains(Flags::CHILD_DELETION));
        assert!(arena[first.unwrap()].alternate.is_none());
    }

    #[test]
    fn unkeyed_children_match_by_position() {
        let mut arena = FiberArena::new();
        let parent = parent(&mut arena);
        let first = reconcile_child_fibers(&mut arena, parent, None, &Children::text("1"), false);

        let next = reconcile_child_fibers(&mut arena, parent, first, &Children::text("2"), true).unwrap();

        assert_eq!(arena[next].alternate, first);
        assert!(arena[next].flags.is_empty());
        assert_eq!(arena[next].pending_props().text_content(), Some("2"));
    }

    #[test]
    fn components_match_by_identity() {
        let app = Component::new("App", |_, _| Ok(Children::Empty));
        let other = Component::new("Other", |_, _| Ok(Children::Empty));
        let mut arena = FiberArena::new();
        let parent = parent(&mut arena);
        let first = reconcile_child_fibers(&mut arena, parent, None, &Element::component(&app).into(), false);

        let same = reconcile_child_fibers(&mut arena, parent, first, &Element::component(&app).into(), true);
        assert_eq!(arena[same.unwrap()].alternate, first);

        let swapped = reconcile_child_fibers(&mut arena, parent, first, &Element::component(&other).into(), true);
        assert!(arena[swapped.unwrap()].alternate.is_none());
        assert_eq!(arena[parent].deletions.as_slice(), &[first.unwrap()]);
    }
}
