//! Virtual Nodes
//!
//! A [`VNode`] is an immutable description of one element or text leaf.
//! Components build a fresh tree on every render; the reconciler compares
//! it with the previous one and records on each new node which host node
//! it ended up bound to.
//!
//! # Building Trees
//!
//! ```rust
//! use trellis_core::vnode::{node, Props};
//!
//! let items = vec!["one", "two"];
//! let list = node(
//!     "ul",
//!     Props::new().class("list"),
//!     items.iter().map(|item| node("li", Props::new().key(*item), *item)).collect::<Vec<_>>(),
//! );
//!
//! assert_eq!(list.children().len(), 2);
//! assert_eq!(list.children()[0].children()[0].text(), Some("one"));
//! ```
//!
//! Children can be any mix of nodes, strings, numbers, `Option`s, vectors,
//! arrays and tuples of those; nesting is flattened and `None` is dropped.
//!
//! # Properties
//!
//! Properties are a closed set of categories ([`Prop`]): plain attributes,
//! event listeners, an inline style map, raw markup, and the callbacks that
//! are never written to the host (node reference, mount, unmount).

use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::host::{Event, Handler, NodeId};

/// Tag reported by [`VNode::tag`] for text leaves.
pub const TEXT_TAG: &str = "#text";

/// Identity key of an element among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(Cow<'static, str>);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Key {
    fn from(key: &'static str) -> Self {
        Self(Cow::Borrowed(key))
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Self(Cow::Owned(key))
    }
}

macro_rules! key_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Key {
            fn from(key: $ty) -> Self {
                Self(Cow::Owned(key.to_string()))
            }
        })*
    };
}

key_from_int!(i32, i64, u32, u64, usize);

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value of a plain attribute or bound property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::Int(n) => write!(f, "{n}"),
            AttrValue::Float(n) => write!(f, "{n}"),
            AttrValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

macro_rules! attr_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for AttrValue {
            fn from(value: $ty) -> Self {
                AttrValue::Int(i64::from(value))
            }
        })*
    };
}

attr_from_int!(i32, i64, u32, u8, u16, i16);

// Values beyond `i64` keep their digits as a string.
macro_rules! attr_from_wide_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for AttrValue {
            fn from(value: $ty) -> Self {
                i64::try_from(value)
                    .map(AttrValue::Int)
                    .unwrap_or_else(|_| AttrValue::Str(value.to_string()))
            }
        })*
    };
}

attr_from_wide_int!(u64, usize);

/// Inline style entries, in declaration order.
pub type Style = IndexMap<Cow<'static, str>, String>;

/// Called once with the host node of a newly created element.
pub type NodeRef = Rc<dyn Fn(NodeId)>;

/// Mount or unmount callback.
pub type Hook = Rc<dyn Fn(NodeId, &VNode)>;

/// Which property slot a [`Prop`] occupies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropKey {
    Attr(Cow<'static, str>),
    Event(Cow<'static, str>),
    Style,
    InnerHtml,
    Ref,
    Mount,
    Unmount,
}

impl PropKey {
    /// Attribute or event name; a fixed label for the other slots.
    pub fn name(&self) -> &str {
        match self {
            PropKey::Attr(name) | PropKey::Event(name) => name,
            PropKey::Style => "style",
            PropKey::InnerHtml => "innerHTML",
            PropKey::Ref => "ref",
            PropKey::Mount => "onmount",
            PropKey::Unmount => "onunmount",
        }
    }
}

/// A property value, by category.
#[derive(Clone)]
pub enum Prop {
    Attr(AttrValue),
    Event(Handler),
    Style(Style),
    InnerHtml(String),
    Ref(NodeRef),
    Mount(Hook),
    Unmount(Hook),
}

impl fmt::Debug for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prop::Attr(value) => f.debug_tuple("Attr").field(value).finish(),
            Prop::Event(handler) => f.debug_tuple("Event").field(handler).finish(),
            Prop::Style(style) => f.debug_tuple("Style").field(style).finish(),
            Prop::InnerHtml(html) => f.debug_tuple("InnerHtml").field(html).finish(),
            Prop::Ref(_) => f.write_str("Ref"),
            Prop::Mount(_) => f.write_str("Mount"),
            Prop::Unmount(_) => f.write_str("Unmount"),
        }
    }
}

/// Properties of an element, built with chained setters.
///
/// A later setter for the same slot overwrites the earlier one, except
/// [`Props::style`], which merges entries.
#[derive(Clone, Default)]
pub struct Props {
    key: Option<Key>,
    entries: IndexMap<PropKey, Prop>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity key, copied onto the node built with these props.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Plain attribute or bound property.
    pub fn attr(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<AttrValue>) -> Self {
        self.entries
            .insert(PropKey::Attr(name.into()), Prop::Attr(value.into()));
        self
    }

    pub fn class(self, class: impl Into<AttrValue>) -> Self {
        self.attr("class", class)
    }

    pub fn id(self, id: impl Into<AttrValue>) -> Self {
        self.attr("id", id)
    }

    /// Add one inline style entry.
    pub fn style(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<String>) -> Self {
        let entry = self
            .entries
            .entry(PropKey::Style)
            .or_insert_with(|| Prop::Style(Style::new()));
        if let Prop::Style(style) = entry {
            style.insert(name.into(), value.into());
        }
        self
    }

    /// Raw markup replacing the element's content.
    pub fn inner_html(mut self, html: impl Into<String>) -> Self {
        self.entries
            .insert(PropKey::InnerHtml, Prop::InnerHtml(html.into()));
        self
    }

    /// Listen for `event`.
    pub fn on(self, event: impl Into<Cow<'static, str>>, f: impl Fn(&Event) + 'static) -> Self {
        self.on_handler(event, Handler::new(f))
    }

    /// Listen for `event` with an existing handler. Reusing one handler
    /// across renders keeps the listener bound instead of rebinding it.
    pub fn on_handler(mut self, event: impl Into<Cow<'static, str>>, handler: Handler) -> Self {
        self.entries
            .insert(PropKey::Event(event.into()), Prop::Event(handler));
        self
    }

    /// Receive the host node once, after it is created.
    ///
    /// The callback runs when the patch that created the element has
    /// finished, not during creation itself: inside one patch, children's
    /// callbacks run before their parent's.
    pub fn node_ref(mut self, f: impl Fn(NodeId) + 'static) -> Self {
        self.entries.insert(PropKey::Ref, Prop::Ref(Rc::new(f)));
        self
    }

    /// Called after the element is inserted into the host tree.
    pub fn on_mount(mut self, f: impl Fn(NodeId, &VNode) + 'static) -> Self {
        self.entries.insert(PropKey::Mount, Prop::Mount(Rc::new(f)));
        self
    }

    /// Called once the element has been discarded by a patch or dispose.
    pub fn on_unmount(mut self, f: impl Fn(NodeId, &VNode) + 'static) -> Self {
        self.entries
            .insert(PropKey::Unmount, Prop::Unmount(Rc::new(f)));
        self
    }

    pub fn get(&self, key: &PropKey) -> Option<&Prop> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropKey, &Prop)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        if let Some(key) = &self.key {
            map.entry(&"key", key);
        }
        map.entries(self.entries.iter().map(|(k, v)| (k.name(), v)));
        map.finish()
    }
}

/// An element description.
#[derive(Debug)]
pub struct Element {
    tag: Cow<'static, str>,
    key: Option<Key>,
    props: Props,
    children: Vec<VNode>,
}

impl Element {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn children(&self) -> &[VNode] {
        &self.children
    }
}

/// What a [`VNode`] describes.
#[derive(Debug)]
pub enum VNodeKind {
    Element(Element),
    Text(String),
}

/// One node of a virtual tree.
#[derive(Debug)]
pub struct VNode {
    kind: VNodeKind,
    host: Cell<Option<NodeId>>,
}

impl VNode {
    pub fn kind(&self) -> &VNodeKind {
        &self.kind
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, VNodeKind::Text(_))
    }

    /// Element tag, or [`TEXT_TAG`] for text leaves.
    pub fn tag(&self) -> &str {
        match &self.kind {
            VNodeKind::Element(element) => &element.tag,
            VNodeKind::Text(_) => TEXT_TAG,
        }
    }

    pub fn key(&self) -> Option<&Key> {
        match &self.kind {
            VNodeKind::Element(element) => element.key.as_ref(),
            VNodeKind::Text(_) => None,
        }
    }

    /// Element properties; `None` for text leaves.
    pub fn props(&self) -> Option<&Props> {
        match &self.kind {
            VNodeKind::Element(element) => Some(&element.props),
            VNodeKind::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[VNode] {
        match &self.kind {
            VNodeKind::Element(element) => &element.children,
            VNodeKind::Text(_) => &[],
        }
    }

    /// Content of a text leaf.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            VNodeKind::Text(content) => Some(content),
            VNodeKind::Element(_) => None,
        }
    }

    /// The host node this vnode is bound to, once realized.
    pub fn host(&self) -> Option<NodeId> {
        self.host.get()
    }

    pub(crate) fn set_host(&self, node: NodeId) {
        self.host.set(Some(node));
    }

    pub(crate) fn hook(&self, key: &PropKey) -> Option<&Hook> {
        match self.props()?.get(key)? {
            Prop::Mount(hook) | Prop::Unmount(hook) => Some(hook),
            _ => None,
        }
    }
}

/// Cloning copies the description only; the clone is not bound to a host
/// node.
impl Clone for VNode {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            VNodeKind::Element(element) => VNodeKind::Element(Element {
                tag: element.tag.clone(),
                key: element.key.clone(),
                props: element.props.clone(),
                children: element.children.clone(),
            }),
            VNodeKind::Text(content) => VNodeKind::Text(content.clone()),
        };
        Self {
            kind,
            host: Cell::new(None),
        }
    }
}

/// Whether `new` can update `old` in place rather than replace it.
///
/// Tags must match. Text leaves must also carry identical content. Elements
/// where either side declares a key must also agree on the key.
pub fn same_identity(old: &VNode, new: &VNode) -> bool {
    match (&old.kind, &new.kind) {
        (VNodeKind::Text(a), VNodeKind::Text(b)) => a == b,
        (VNodeKind::Element(a), VNodeKind::Element(b)) => {
            if a.tag != b.tag {
                return false;
            }
            if a.key.is_some() || b.key.is_some() {
                return a.key == b.key;
            }
            true
        }
        _ => false,
    }
}

/// Build an element.
pub fn node(tag: impl Into<Cow<'static, str>>, props: Props, children: impl IntoChildren) -> VNode {
    let mut flat = Vec::new();
    children.append_to(&mut flat);
    let Props { key, entries } = props;
    VNode {
        kind: VNodeKind::Element(Element {
            tag: tag.into(),
            key: key.clone(),
            props: Props { key, entries },
            children: flat,
        }),
        host: Cell::new(None),
    }
}

/// Build a text leaf.
pub fn text(content: impl Into<String>) -> VNode {
    VNode {
        kind: VNodeKind::Text(content.into()),
        host: Cell::new(None),
    }
}

/// Anything usable as the children of [`node`].
pub trait IntoChildren {
    fn append_to(self, out: &mut Vec<VNode>);
}

impl IntoChildren for VNode {
    fn append_to(self, out: &mut Vec<VNode>) {
        out.push(self);
    }
}

impl IntoChildren for () {
    fn append_to(self, _out: &mut Vec<VNode>) {}
}

impl IntoChildren for &str {
    fn append_to(self, out: &mut Vec<VNode>) {
        out.push(text(self));
    }
}

impl IntoChildren for String {
    fn append_to(self, out: &mut Vec<VNode>) {
        out.push(text(self));
    }
}

impl IntoChildren for &String {
    fn append_to(self, out: &mut Vec<VNode>) {
        out.push(text(self.as_str()));
    }
}

impl IntoChildren for Cow<'_, str> {
    fn append_to(self, out: &mut Vec<VNode>) {
        out.push(text(self.into_owned()));
    }
}

macro_rules! children_from_display {
    ($($ty:ty),*) => {
        $(impl IntoChildren for $ty {
            fn append_to(self, out: &mut Vec<VNode>) {
                out.push(text(self.to_string()));
            }
        })*
    };
}

children_from_display!(char, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);

impl<T: IntoChildren> IntoChildren for Option<T> {
    fn append_to(self, out: &mut Vec<VNode>) {
        if let Some(child) = self {
            child.append_to(out);
        }
    }
}

impl<T: IntoChildren> IntoChildren for Vec<T> {
    fn append_to(self, out: &mut Vec<VNode>) {
        for child in self {
            child.append_to(out);
        }
    }
}

impl<T: IntoChildren, const N: usize> IntoChildren for [T; N] {
    fn append_to(self, out: &mut Vec<VNode>) {
        for child in self {
            child.append_to(out);
        }
    }
}

macro_rules! children_from_tuple {
    ($($name:ident),+) => {
        impl<$($name: IntoChildren),+> IntoChildren for ($($name,)+) {
            #[allow(non_snake_case)]
            fn append_to(self, out: &mut Vec<VNode>) {
                let ($($name,)+) = self;
                $($name.append_to(out);)+
            }
        }
    };
}

children_from_tuple!(A);
children_from_tuple!(A, B);
children_from_tuple!(A, B, C);
children_from_tuple!(A, B, C, D);
children_from_tuple!(A, B, C, D, E);
children_from_tuple!(A, B, C, D, E, F);
children_from_tuple!(A, B, C, D, E, F, G);
children_from_tuple!(A, B, C, D, E, F, G, H);
