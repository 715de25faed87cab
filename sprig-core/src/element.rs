//! Element Descriptions
//!
//! Elements are the declarative description of what a tree should look like.
//! The reconciler reads them to build fibers; it never mutates them.
//!
//! An element is either a host element (a named native node such as
//! `"button"`) or a function component. Its props carry attributes and the
//! nested child description. Text is described directly as a child.
//!
//! # Example
//!
//! ```rust
//! use sprig_core::{Children, Element};
//!
//! let button = Element::host("button").attr("class", "primary").child("100");
//! assert_eq!(button.props.children, Children::text("100"));
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::Result;
use crate::hooks::Hooks;

/// Identity of an element among its siblings.
pub type Key = String;

/// Signature of a function component's render function.
pub type RenderFn = dyn Fn(&Props, &mut Hooks) -> Result<Children> + Send + Sync;

/// A function component.
///
/// Two components are the same component when they share the same render
/// function, so clone a `Component` rather than building it twice.
#[derive(Clone)]
pub struct Component {
    name: &'static str,
    render: Arc<RenderFn>,
}

impl Component {
    /// Create a component from its render function.
    pub fn new<F>(name: &'static str, render: F) -> Self
    where
        F: Fn(&Props, &mut Hooks) -> Result<Children> + Send + Sync + 'static,
    {
        Self {
            name,
            render: Arc::new(render),
        }
    }

    /// The component's display name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render(&self, props: &Props, hooks: &mut Hooks) -> Result<Children> {
        (self.render)(props, hooks)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.render), Arc::as_ptr(&other.render))
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.name).finish()
    }
}

/// What kind of element this is.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementType {
    /// A native node of the host target, named by its tag.
    Host(String),
    /// A function component.
    Component(Component),
}

/// Props of an element: attributes plus the child description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    /// Attributes in declaration order.
    pub attributes: IndexMap<String, Value>,
    /// Nested children.
    pub children: Children,
}

impl Props {
    /// Props for a text node.
    pub(crate) fn text(content: &str) -> Self {
        Self {
            attributes: IndexMap::new(),
            children: Children::Text(content.to_owned()),
        }
    }

    /// Text content, if these are the props of a text node.
    pub fn text_content(&self) -> Option<&str> {
        match &self.children {
            Children::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Look up an attribute.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// A child description: nothing, text, one element, or a sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Children {
    /// No children.
    #[default]
    Empty,
    /// A text node.
    Text(String),
    /// A single element.
    Element(Box<Element>),
    /// An ordered sequence. Nested sequences are flattened when reconciled.
    List(Vec<Children>),
}

impl Children {
    /// A text child.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Whether there is nothing to render.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::List(items) => items.iter().all(Self::is_empty),
            Self::Text(_) | Self::Element(_) => false,
        }
    }

    fn push(self, child: Self) -> Self {
        match self {
            Self::Empty => child,
            Self::List(mut items) => {
                items.push(child);
                Self::List(items)
            }
            single => Self::List(vec![single, child]),
        }
    }
}

impl From<Element> for Children {
    fn from(element: Element) -> Self {
        Self::Element(Box::new(element))
    }
}

impl From<&str> for Children {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Children {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<i64> for Children {
    fn from(value: i64) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i32> for Children {
    fn from(value: i32) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<Element>> for Children {
    fn from(elements: Vec<Element>) -> Self {
        Self::List(elements.into_iter().map(Self::from).collect())
    }
}

impl From<Vec<Children>> for Children {
    fn from(children: Vec<Children>) -> Self {
        Self::List(children)
    }
}

impl<T: Into<Children>> From<Option<T>> for Children {
    fn from(child: Option<T>) -> Self {
        child.map_or(Self::Empty, Into::into)
    }
}

/// A description of one node in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Host tag or component.
    pub ty: ElementType,
    /// Optional identity among siblings.
    pub key: Option<Key>,
    /// Attributes and children.
    pub props: Props,
}

impl Element {
    /// Describe a host element with the given tag.
    pub fn host(tag: impl Into<String>) -> Self {
        Self::new(ElementType::Host(tag.into()))
    }

    /// Describe an instance of a function component.
    pub fn component(component: &Component) -> Self {
        Self::new(ElementType::Component(component.clone()))
    }

    fn new(ty: ElementType) -> Self {
        Self {
            ty,
            key: None,
            props: Props::default(),
        }
    }

    /// Set the element's key.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.attributes.insert(name.into(), value.into());
        self
    }

    /// Append a child.
    pub fn child(mut self, child: impl Into<Children>) -> Self {
        let children = std::mem::take(&mut self.props.children);
        self.props.children = children.push(child.into());
        self
    }

    /// Replace the children with a sequence.
    pub fn children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Children>,
    {
        self.props.children = Children::List(children.into_iter().map(Into::into).collect());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_appends_into_a_list() {
        let element = Element::host("div").child("a").child("b");
        assert_eq!(
            element.props.children,
            Children::List(vec![Children::text("a"), Children::text("b")])
        );
    }

    #[test]
    fn components_compare_by_render_function() {
        let app = Component::new("App", |_, _| Ok(Children::Empty));
        let same = app.clone();
        let other = Component::new("App", |_, _| Ok(Children::Empty));
        assert_eq!(app, same);
        assert_ne!(app, other);
    }

    #[test]
    fn empty_lists_are_empty() {
        assert!(Children::List(vec![Children::Empty]).is_empty());
        assert!(!Children::from(7).is_empty());
        assert!(Children::from(None::<Element>).is_empty());
    }

    #[test]
    fn text_props_expose_content() {
        assert_eq!(Props::text("hi").text_content(), Some("hi"));
        assert_eq!(Props::default().text_content(), None);
    }
}
