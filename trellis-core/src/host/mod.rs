//! Host Tree Adapter
//!
//! The reconciler never touches a concrete UI toolkit. It drives a
//! [`HostTree`]: the smallest set of operations needed to build and mutate a
//! live tree of element and text nodes. Host nodes are addressed by
//! [`NodeId`] handles chosen by the host.
//!
//! [`MemoryHost`] is the in-memory implementation used by tests, benchmarks
//! and headless rendering.

mod memory;

pub use memory::{MemoryHost, Mutation};

use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::error::HostError;
use crate::vnode::AttrValue;

/// Handle to a node in a host tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An event delivered to a listener.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name, e.g. `click`.
    pub name: String,
    /// The node the event was dispatched on.
    pub target: NodeId,
    /// Host-specific payload.
    pub data: serde_json::Value,
}

/// A shared event listener.
///
/// Two handlers are the same listener only if they share one allocation;
/// the reconciler rebinds a listener whenever a new render produced a
/// different `Handler`.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&Event)>);

impl Handler {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event);
    }

    /// Identity comparison.
    pub fn same(&self, other: &Handler) -> bool {
        Rc::as_ptr(&self.0) as *const () == Rc::as_ptr(&other.0) as *const ()
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Operations the reconciler needs from a live host tree.
///
/// Positions are indices into a parent's current child list. Every method
/// reports failure through [`HostError`]; the reconciler never retries.
pub trait HostTree {
    /// Create a detached element node.
    fn create_element(&mut self, tag: &str) -> Result<NodeId, HostError>;

    /// Create a detached text node.
    fn create_text(&mut self, content: &str) -> Result<NodeId, HostError>;

    /// Set an attribute or bound property.
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &AttrValue)
        -> Result<(), HostError>;

    /// Remove an attribute or reset a bound property to its default.
    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), HostError>;

    /// Set one inline style entry.
    fn set_style(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), HostError>;

    /// Clear one inline style entry.
    fn remove_style(&mut self, node: NodeId, name: &str) -> Result<(), HostError>;

    /// Replace the node's content with raw markup. An empty string clears it.
    fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<(), HostError>;

    /// Register `handler` for `event` on `node`.
    fn add_listener(&mut self, node: NodeId, event: &str, handler: Handler)
        -> Result<(), HostError>;

    /// Unregister a listener previously added with the same handler.
    fn remove_listener(&mut self, node: NodeId, event: &str, handler: &Handler)
        -> Result<(), HostError>;

    /// Overwrite a text node's content.
    fn set_text(&mut self, node: NodeId, content: &str) -> Result<(), HostError>;

    /// Insert `child` at `index` in `parent`'s child list. `index` may equal
    /// the current child count (append).
    fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId)
        -> Result<(), HostError>;

    /// Replace the child at `index` with `child`.
    fn replace_child(&mut self, parent: NodeId, index: usize, child: NodeId)
        -> Result<(), HostError>;

    /// Remove the child at `index`.
    fn remove_child(&mut self, parent: NodeId, index: usize) -> Result<(), HostError>;

    /// Remove every child of `parent`.
    fn clear_children(&mut self, parent: NodeId) -> Result<(), HostError>;

    /// Drop a subtree that will not be inserted, such as one whose
    /// realization failed partway. An attached node is detached first.
    fn discard(&mut self, node: NodeId) -> Result<(), HostError>;

    /// Whether `node` exists in this host.
    fn contains(&self, node: NodeId) -> bool;

    /// Whether `node` exists and can hold children.
    fn is_container(&self, node: NodeId) -> bool;
}
