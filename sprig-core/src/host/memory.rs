//! In-Memory Host
//!
//! A host target that keeps its native tree in plain memory. It is used for
//! headless rendering and in tests: it counts every host operation and can
//! snapshot or print the container contents.

use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::HostConfig;
use crate::element::Props;

/// Handle to a node of a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeHandle(usize);

#[derive(Debug, Clone)]
enum NodeData {
    Container,
    Element {
        tag: String,
        attributes: IndexMap<String, Value>,
    },
    Text(String),
    /// A reclaimed slot waiting for reuse.
    Vacant,
}

#[derive(Debug)]
struct MemoryNode {
    data: NodeData,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
}

/// Counts of host operations performed so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HostStats {
    pub instances: usize,
    pub text_instances: usize,
    /// Appends into nodes that were not mounted yet.
    pub initial_appends: usize,
    pub appends: usize,
    pub inserts: usize,
    pub removals: usize,
    pub updates: usize,
}

impl HostStats {
    /// Operations that touched nodes already mounted in the container.
    pub fn mutations(&self) -> usize {
        self.appends + self.inserts + self.removals + self.updates
    }
}

/// Serializable view of a host subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HostSnapshot {
    Text(String),
    Element {
        tag: String,
        #[serde(skip_serializing_if = "IndexMap::is_empty")]
        attributes: IndexMap<String, Value>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<HostSnapshot>,
    },
}

/// A host target backed by an in-memory node tree.
///
/// Removed subtrees are reclaimed and their slots reused, so a handle must not
/// be used once its node was removed. Nodes that are created but never
/// attached (as by a discarded render attempt) are kept until the host is
/// dropped, since the reconciler has no operation to destroy them.
///
/// # Example
///
/// ```rust
/// use sprig_core::{create_container, Element, MemoryHost};
///
/// let host = MemoryHost::new();
/// let container = host.container();
/// let root = create_container(host, container);
///
/// root.update_container(Element::host("button").child("100")).unwrap();
/// assert_eq!(root.with_host(|host| host.to_markup()), "<button>100</button>");
/// ```
#[derive(Debug)]
pub struct MemoryHost {
    nodes: Vec<MemoryNode>,
    free: Vec<NodeHandle>,
    container: NodeHandle,
    stats: HostStats,
}

impl MemoryHost {
    /// Create a host with one empty container.
    pub fn new() -> Self {
        Self {
            nodes: vec![MemoryNode {
                data: NodeData::Container,
                parent: None,
                children: Vec::new(),
            }],
            free: Vec::new(),
            container: NodeHandle(0),
            stats: HostStats::default(),
        }
    }

    pub fn container(&self) -> NodeHandle {
        self.container
    }

    pub fn stats(&self) -> HostStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = HostStats::default();
    }

    /// Number of live nodes, excluding the container.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len() - 1
    }

    pub fn children(&self, node: NodeHandle) -> &[NodeHandle] {
        &self.nodes[node.0].children
    }

    pub fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.nodes[node.0].parent
    }

    pub fn tag(&self, node: NodeHandle) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Container | NodeData::Text(_) | NodeData::Vacant => None,
        }
    }

    pub fn text(&self, node: NodeHandle) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Text(text) => Some(text),
            NodeData::Container | NodeData::Element { .. } | NodeData::Vacant => None,
        }
    }

    pub fn attribute(&self, node: NodeHandle, name: &str) -> Option<&Value> {
        match &self.nodes[node.0].data {
            NodeData::Element { attributes, .. } => attributes.get(name),
            NodeData::Container | NodeData::Text(_) | NodeData::Vacant => None,
        }
    }

    /// Whether `node` is reachable from the container.
    pub fn is_mounted(&self, node: NodeHandle) -> bool {
        let mut current = Some(node);
        while let Some(handle) = current {
            if handle == self.container {
                return true;
            }
            current = self.parent(handle);
        }
        false
    }

    /// Snapshot of `node` and everything below it.
    pub fn snapshot(&self, node: NodeHandle) -> HostSnapshot {
        let entry = &self.nodes[node.0];
        match &entry.data {
            NodeData::Text(text) => HostSnapshot::Text(text.clone()),
            NodeData::Vacant => HostSnapshot::Element {
                tag: "#vacant".to_owned(),
                attributes: IndexMap::new(),
                children: Vec::new(),
            },
            NodeData::Container => HostSnapshot::Element {
                tag: "#container".to_owned(),
                attributes: IndexMap::new(),
                children: entry.children.iter().map(|&c| self.snapshot(c)).collect(),
            },
            NodeData::Element { tag, attributes } => HostSnapshot::Element {
                tag: tag.clone(),
                attributes: attributes.clone(),
                children: entry.children.iter().map(|&c| self.snapshot(c)).collect(),
            },
        }
    }

    /// Snapshots of the container's top-level nodes.
    pub fn container_snapshot(&self) -> Vec<HostSnapshot> {
        self.children(self.container)
            .iter()
            .map(|&node| self.snapshot(node))
            .collect()
    }

    /// The container contents as markup, e.g. `<button>100</button>`.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        for &node in self.children(self.container) {
            self.write_markup(node, &mut out);
        }
        out
    }

    fn write_markup(&self, node: NodeHandle, out: &mut String) {
        let entry = &self.nodes[node.0];
        match &entry.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Container | NodeData::Vacant => {}
            NodeData::Element { tag, attributes } => {
                let _ = write!(out, "<{tag}");
                for (name, value) in attributes {
                    match value {
                        Value::String(s) => {
                            let _ = write!(out, " {name}=\"{s}\"");
                        }
                        other => {
                            let _ = write!(out, " {name}=\"{other}\"");
                        }
                    }
                }
                out.push('>');
                for &child in &entry.children {
                    self.write_markup(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn push(&mut self, data: NodeData) -> NodeHandle {
        if let Some(handle) = self.free.pop() {
            self.nodes[handle.0].data = data;
            return handle;
        }
        self.nodes.push(MemoryNode {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeHandle(self.nodes.len() - 1)
    }

    /// Free `node` and everything below it. The node must already be detached.
    fn reclaim(&mut self, node: NodeHandle) {
        let mut stack = vec![node];
        while let Some(handle) = stack.pop() {
            let entry = &mut self.nodes[handle.0];
            stack.append(&mut entry.children);
            entry.parent = None;
            entry.data = NodeData::Vacant;
            self.free.push(handle);
        }
    }

    fn detach(&mut self, child: NodeHandle) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != child);
        }
    }

    fn attach(&mut self, parent: NodeHandle, child: NodeHandle, before: Option<NodeHandle>) {
        self.detach(child);
        let siblings = &mut self.nodes[parent.0].children;
        let position = before
            .and_then(|before| siblings.iter().position(|&c| c == before))
            .unwrap_or(siblings.len());
        siblings.insert(position, child);
        self.nodes[child.0].parent = Some(parent);
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostConfig for MemoryHost {
    type Instance = NodeHandle;
    type Container = NodeHandle;

    fn create_instance(&mut self, ty: &str, props: &Props) -> NodeHandle {
        self.stats.instances += 1;
        self.push(NodeData::Element {
            tag: ty.to_owned(),
            attributes: props.attributes.clone(),
        })
    }

    fn create_text_instance(&mut self, text: &str) -> NodeHandle {
        self.stats.text_instances += 1;
        self.push(NodeData::Text(text.to_owned()))
    }

    fn append_initial_child(&mut self, parent: &NodeHandle, child: &NodeHandle) {
        self.stats.initial_appends += 1;
        self.attach(*parent, *child, None);
    }

    fn append_child(&mut self, parent: &NodeHandle, child: &NodeHandle) {
        self.stats.appends += 1;
        self.attach(*parent, *child, None);
    }

    fn insert_before(&mut self, parent: &NodeHandle, child: &NodeHandle, before: &NodeHandle) {
        self.stats.inserts += 1;
        self.attach(*parent, *child, Some(*before));
    }

    fn remove_child(&mut self, parent: &NodeHandle, child: &NodeHandle) {
        self.stats.removals += 1;
        if self.nodes[child.0].parent == Some(*parent) {
            self.detach(*child);
            self.reclaim(*child);
        }
    }

    fn append_child_to_container(&mut self, container: &NodeHandle, child: &NodeHandle) {
        self.append_child(container, child);
    }

    fn insert_in_container_before(&mut self, container: &NodeHandle, child: &NodeHandle, before: &NodeHandle) {
        self.insert_before(container, child, before);
    }

    fn remove_child_from_container(&mut self, container: &NodeHandle, child: &NodeHandle) {
        self.remove_child(container, child);
    }

    fn commit_update(&mut self, instance: &NodeHandle, _old_props: &Props, new_props: &Props) {
        self.stats.updates += 1;
        if let NodeData::Element { attributes, .. } = &mut self.nodes[instance.0].data {
            attributes.clone_from(&new_props.attributes);
        }
    }

    fn commit_text_update(&mut self, instance: &NodeHandle, _old_text: &str, new_text: &str) {
        self.stats.updates += 1;
        if let NodeData::Text(text) = &mut self.nodes[instance.0].data {
            new_text.clone_into(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_moves_attached_nodes() {
        let mut host = MemoryHost::new();
        let root = host.container();
        let a = host.create_text_instance("a");
        let b = host.create_text_instance("b");
        host.append_child_to_container(&root, &a);
        host.append_child_to_container(&root, &b);

        host.insert_in_container_before(&root, &b, &a);

        assert_eq!(host.children(root), &[b, a]);
        assert_eq!(host.to_markup(), "ba");
    }

    #[test]
    fn markup_includes_attributes() {
        let mut host = MemoryHost::new();
        let root = host.container();
        let props = Props {
            attributes: [("id".to_owned(), Value::from("go")), ("tabindex".to_owned(), Value::from(1))]
                .into_iter()
                .collect(),
            ..Props::default()
        };
        let button = host.create_instance("button", &props);
        let label = host.create_text_instance("Go");
        host.append_initial_child(&button, &label);
        host.append_child_to_container(&root, &button);

        assert_eq!(host.to_markup(), r#"<button id="go" tabindex="1">Go</button>"#);
        assert!(host.is_mounted(label));
        assert_eq!(host.stats().initial_appends, 1);
        assert_eq!(host.stats().appends, 1);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let mut host = MemoryHost::new();
        let root = host.container();
        let list = host.create_instance("ul", &Props::default());
        let item = host.create_text_instance("one");
        host.append_initial_child(&list, &item);
        host.append_child_to_container(&root, &list);

        let json = serde_json::to_value(host.container_snapshot()).unwrap();
        assert_eq!(json, serde_json::json!([{ "tag": "ul", "children": ["one"] }]));
    }

    #[test]
    fn removal_detaches_the_subtree() {
        let mut host = MemoryHost::new();
        let root = host.container();
        let div = host.create_instance("div", &Props::default());
        let text = host.create_text_instance("x");
        host.append_initial_child(&div, &text);
        host.append_child_to_container(&root, &div);

        host.remove_child_from_container(&root, &div);

        assert!(host.children(root).is_empty());
        assert!(!host.is_mounted(text));
        assert_eq!(host.stats().mutations(), 2);
    }

    #[test]
    fn removed_nodes_are_reused() {
        let mut host = MemoryHost::new();
        let root = host.container();
        let div = host.create_instance("div", &Props::default());
        let text = host.create_text_instance("x");
        host.append_initial_child(&div, &text);
        host.append_child_to_container(&root, &div);
        assert_eq!(host.node_count(), 2);

        host.remove_child_from_container(&root, &div);
        assert_eq!(host.node_count(), 0);

        // Both slots come back before the slab grows
        let a = host.create_text_instance("a");
        let b = host.create_text_instance("b");
        let mut reused = [a, b];
        reused.sort_by_key(|handle| handle.0);
        assert_eq!(reused, [div, text]);
        assert_eq!(host.text(a), Some("a"));
        assert_eq!(host.node_count(), 2);
        assert!(host.children(a).is_empty());
    }
}
