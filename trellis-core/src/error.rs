//! Error types.
//!
//! Failures are grouped by the layer that detects them: the host tree, the
//! reconciler, the render entry point and configuration loading. Reading a
//! signal outside an effect is not an error and has no variant here.

use thiserror::Error;

use crate::host::NodeId;

/// A host-tree operation was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The node does not exist in the host tree.
    #[error("unknown host node {0}")]
    UnknownNode(NodeId),

    /// The node is a text node and cannot hold children, attributes or
    /// listeners.
    #[error("host node {0} is not an element")]
    NotAnElement(NodeId),

    /// Text content was written to a node that is not a text node.
    #[error("host node {0} is not a text node")]
    NotText(NodeId),

    /// A child position past the end of the parent's child list.
    #[error("child index {index} out of bounds for node {parent} with {len} children")]
    IndexOutOfBounds {
        parent: NodeId,
        index: usize,
        len: usize,
    },

    /// An attribute, style or event name the host cannot represent.
    #[error("invalid {kind} name `{name}`")]
    InvalidName { kind: &'static str, name: String },
}

/// A patch could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The host tree rejected a mutation.
    #[error(transparent)]
    Host(#[from] HostError),

    /// An old vnode was patched that was never realized into the host tree.
    #[error("vnode at child index {index} of node {parent} has no host node")]
    Unrealized { parent: NodeId, index: usize },
}

/// Mounting or re-rendering a component failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The container handle does not name a node in the host tree.
    #[error("container {0} not found in the host tree")]
    ContainerNotFound(NodeId),

    /// The container exists but cannot hold children.
    #[error("container {0} cannot hold children")]
    InvalidContainer(NodeId),

    /// The session has already been disposed.
    #[error("render session was already disposed")]
    Disposed,

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// A configuration document could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid render configuration: {0}")]
    Json(#[from] serde_json::Error),
}
