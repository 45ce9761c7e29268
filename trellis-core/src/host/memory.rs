//! In-memory host tree.
//!
//! Nodes live in an arena keyed by [`NodeId`]. Every mutation is appended to
//! a log that tests inspect to check exactly which host operations a patch
//! performed. Subtrees detached by `remove_child`, `replace_child`,
//! `clear_children` or `set_inner_html` are freed, so their listeners can
//! never fire again.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::trace;

use super::{Event, Handler, HostTree, NodeId};
use crate::error::HostError;
use crate::vnode::AttrValue;

/// One recorded host operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    CreateElement { node: NodeId, tag: String },
    CreateText { node: NodeId, content: String },
    SetAttribute { node: NodeId, name: String, value: AttrValue },
    RemoveAttribute { node: NodeId, name: String },
    SetStyle { node: NodeId, name: String, value: String },
    RemoveStyle { node: NodeId, name: String },
    SetInnerHtml { node: NodeId, html: String },
    AddListener { node: NodeId, event: String },
    RemoveListener { node: NodeId, event: String },
    SetText { node: NodeId, content: String },
    InsertChild { parent: NodeId, index: usize, child: NodeId },
    ReplaceChild { parent: NodeId, index: usize, child: NodeId },
    RemoveChild { parent: NodeId, index: usize },
    ClearChildren { parent: NodeId },
}

#[derive(Debug)]
struct ElementData {
    tag: String,
    attributes: IndexMap<String, AttrValue>,
    style: IndexMap<String, String>,
    listeners: Vec<(String, Handler)>,
    inner_html: Option<String>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug)]
struct HostNode {
    parent: Option<NodeId>,
    data: NodeData,
}

/// An arena-backed host tree with a mutation log.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: HashMap<NodeId, HostNode>,
    next_id: u64,
    mutations: Vec<Mutation>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached element to serve as a mount container. Not logged.
    pub fn create_root(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(ElementData::new(tag)))
    }

    /// All mutations recorded so far.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Drain the mutation log.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }

    /// Number of live nodes, detached roots included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        match self.nodes.get(&node).map(|n| &n.data) {
            Some(NodeData::Element(element)) => &element.children,
            _ => &[],
        }
    }

    pub fn child(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.children(node).get(index).copied()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(&node)?.data {
            NodeData::Element(element) => Some(&element.tag),
            NodeData::Text(_) => None,
        }
    }

    /// Content of a text node.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(&node)?.data {
            NodeData::Text(content) => Some(content),
            NodeData::Element(_) => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&AttrValue> {
        self.element_ref(node)?.attributes.get(name)
    }

    pub fn style(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element_ref(node)?.style.get(name).map(String::as_str)
    }

    pub fn inner_html(&self, node: NodeId) -> Option<&str> {
        self.element_ref(node)?.inner_html.as_deref()
    }

    pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
        self.element_ref(node)
            .map(|element| element.listeners.iter().filter(|(name, _)| name == event).count())
            .unwrap_or(0)
    }

    /// Handlers registered for `event` on `node`, in registration order.
    pub fn listeners(&self, node: NodeId, event: &str) -> Vec<Handler> {
        self.element_ref(node)
            .map(|element| {
                element
                    .listeners
                    .iter()
                    .filter(|(name, _)| name == event)
                    .map(|(_, handler)| handler.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Dispatch `event` on `node` and return how many handlers ran.
    ///
    /// The host is only borrowed while collecting handlers, so handlers may
    /// write signals that re-render into this same host.
    pub fn dispatch(
        host: &RefCell<MemoryHost>,
        node: NodeId,
        event: &str,
        data: serde_json::Value,
    ) -> usize {
        let handlers = host.borrow().listeners(node, event);
        let event = Event {
            name: event.to_string(),
            target: node,
            data,
        };
        for handler in &handlers {
            handler.call(&event);
        }
        handlers.len()
    }

    /// Serialize a subtree as HTML-like text.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Serialize the children of `node` without the node itself.
    pub fn inner_to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        if let Some(html) = self.inner_html(node) {
            out.push_str(html);
        }
        for child in self.children(node) {
            self.write_html(*child, &mut out);
        }
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Some(host_node) = self.nodes.get(&node) else {
            return;
        };
        match &host_node.data {
            NodeData::Text(content) => out.push_str(content),
            NodeData::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attributes {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                if !element.style.is_empty() {
                    let style: Vec<String> = element
                        .style
                        .iter()
                        .map(|(name, value)| format!("{name}: {value}"))
                        .collect();
                    let _ = write!(out, " style=\"{}\"", style.join("; "));
                }
                out.push('>');
                out.push_str(&self.inner_to_html(node));
                let _ = write!(out, "</{}>", element.tag);
            }
        }
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId::from(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, HostNode { parent: None, data });
        id
    }

    fn log(&mut self, mutation: Mutation) {
        trace!(?mutation, "host mutation");
        self.mutations.push(mutation);
    }

    fn element_ref(&self, node: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(&node)?.data {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Result<&mut ElementData, HostError> {
        match self.nodes.get_mut(&node) {
            Some(HostNode {
                data: NodeData::Element(element),
                ..
            }) => Ok(element),
            Some(_) => Err(HostError::NotAnElement(node)),
            None => Err(HostError::UnknownNode(node)),
        }
    }

    /// `moving` is a node about to be placed under `parent`; if it is already
    /// one of its children, the index is checked against the list without it.
    fn check_child_index(
        &self,
        parent: NodeId,
        index: usize,
        allow_end: bool,
        moving: Option<NodeId>,
    ) -> Result<(), HostError> {
        let mut len = self.children(parent).len();
        if moving.is_some_and(|child| self.parent(child) == Some(parent)) {
            len -= 1;
        }
        let in_bounds = if allow_end { index <= len } else { index < len };
        if in_bounds {
            Ok(())
        } else {
            Err(HostError::IndexOutOfBounds { parent, index, len })
        }
    }

    fn ensure_node(&self, node: NodeId) -> Result<(), HostError> {
        if self.nodes.contains_key(&node) {
            Ok(())
        } else {
            Err(HostError::UnknownNode(node))
        }
    }

    /// Unlink `child` from its current parent, if any.
    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.nodes.get(&child).and_then(|n| n.parent) else {
            return;
        };
        if let Ok(element) = self.element_mut(parent) {
            element.children.retain(|c| *c != child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = None;
        }
    }

    /// Drop a detached subtree from the arena.
    fn free(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(HostNode {
                data: NodeData::Element(element),
                ..
            }) = self.nodes.remove(&id)
            {
                stack.extend(element.children);
            }
        }
    }
}

impl ElementData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: IndexMap::new(),
            style: IndexMap::new(),
            listeners: Vec::new(),
            inner_html: None,
            children: Vec::new(),
        }
    }
}

fn check_name(kind: &'static str, name: &str) -> Result<(), HostError> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '"' || c == '=') {
        return Err(HostError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

impl HostTree for MemoryHost {
    fn create_element(&mut self, tag: &str) -> Result<NodeId, HostError> {
        check_name("tag", tag)?;
        let node = self.alloc(NodeData::Element(ElementData::new(tag)));
        self.log(Mutation::CreateElement {
            node,
            tag: tag.to_string(),
        });
        Ok(node)
    }

    fn create_text(&mut self, content: &str) -> Result<NodeId, HostError> {
        let node = self.alloc(NodeData::Text(content.to_string()));
        self.log(Mutation::CreateText {
            node,
            content: content.to_string(),
        });
        Ok(node)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &AttrValue) -> Result<(), HostError> {
        check_name("attribute", name)?;
        self.element_mut(node)?
            .attributes
            .insert(name.to_string(), value.clone());
        self.log(Mutation::SetAttribute {
            node,
            name: name.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), HostError> {
        self.element_mut(node)?.attributes.shift_remove(name);
        self.log(Mutation::RemoveAttribute {
            node,
            name: name.to_string(),
        });
        Ok(())
    }

    fn set_style(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), HostError> {
        check_name("style", name)?;
        self.element_mut(node)?
            .style
            .insert(name.to_string(), value.to_string());
        self.log(Mutation::SetStyle {
            node,
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn remove_style(&mut self, node: NodeId, name: &str) -> Result<(), HostError> {
        self.element_mut(node)?.style.shift_remove(name);
        self.log(Mutation::RemoveStyle {
            node,
            name: name.to_string(),
        });
        Ok(())
    }

    fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<(), HostError> {
        let element = self.element_mut(node)?;
        let dropped = std::mem::take(&mut element.children);
        element.inner_html = (!html.is_empty()).then(|| html.to_string());
        for child in dropped {
            self.free(child);
        }
        self.log(Mutation::SetInnerHtml {
            node,
            html: html.to_string(),
        });
        Ok(())
    }

    fn add_listener(&mut self, node: NodeId, event: &str, handler: Handler) -> Result<(), HostError> {
        check_name("event", event)?;
        let element = self.element_mut(node)?;
        // Same handler twice is a single registration.
        if !element
            .listeners
            .iter()
            .any(|(name, existing)| name == event && existing.same(&handler))
        {
            element.listeners.push((event.to_string(), handler));
        }
        self.log(Mutation::AddListener {
            node,
            event: event.to_string(),
        });
        Ok(())
    }

    fn remove_listener(&mut self, node: NodeId, event: &str, handler: &Handler) -> Result<(), HostError> {
        self.element_mut(node)?
            .listeners
            .retain(|(name, existing)| !(name == event && existing.same(handler)));
        self.log(Mutation::RemoveListener {
            node,
            event: event.to_string(),
        });
        Ok(())
    }

    fn set_text(&mut self, node: NodeId, content: &str) -> Result<(), HostError> {
        match self.nodes.get_mut(&node) {
            Some(HostNode {
                data: NodeData::Text(current),
                ..
            }) => {
                *current = content.to_string();
            }
            Some(_) => return Err(HostError::NotText(node)),
            None => return Err(HostError::UnknownNode(node)),
        }
        self.log(Mutation::SetText {
            node,
            content: content.to_string(),
        });
        Ok(())
    }

    fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), HostError> {
        self.ensure_node(child)?;
        self.element_mut(parent)?;
        self.check_child_index(parent, index, true, Some(child))?;
        self.detach(child);

        self.element_mut(parent)?.children.insert(index, child);
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        self.log(Mutation::InsertChild { parent, index, child });
        Ok(())
    }

    fn replace_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), HostError> {
        self.ensure_node(child)?;
        self.element_mut(parent)?;
        self.check_child_index(parent, index, false, Some(child))?;
        self.detach(child);

        let old = std::mem::replace(&mut self.element_mut(parent)?.children[index], child);
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        self.free(old);
        self.log(Mutation::ReplaceChild { parent, index, child });
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, index: usize) -> Result<(), HostError> {
        self.element_mut(parent)?;
        self.check_child_index(parent, index, false, None)?;

        let old = self.element_mut(parent)?.children.remove(index);
        self.free(old);
        self.log(Mutation::RemoveChild { parent, index });
        Ok(())
    }

    fn clear_children(&mut self, parent: NodeId) -> Result<(), HostError> {
        let element = self.element_mut(parent)?;
        let dropped = std::mem::take(&mut element.children);
        element.inner_html = None;
        for child in dropped {
            self.free(child);
        }
        self.log(Mutation::ClearChildren { parent });
        Ok(())
    }

    fn discard(&mut self, node: NodeId) -> Result<(), HostError> {
        self.ensure_node(node)?;
        self.detach(node);
        self.free(node);
        Ok(())
    }

    fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn is_container(&self, node: NodeId) -> bool {
        self.element_ref(node).is_some()
    }
}
