//! Trellis Core
//!
//! This crate provides the core of the Trellis UI rendering engine.
//! It implements:
//!
//! - Reactive primitives (signals, effects, memos)
//! - A virtual node model for describing UI trees
//! - A reconciler that patches a live host tree from one virtual tree to the next
//! - The render entry point that ties a component to a host container
//!
//! Everything is single-threaded and synchronous: a signal write re-renders
//! every dependent component before it returns.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Signals, effects and dependency tracking
//! - `vnode`: Virtual nodes and their properties
//! - `html`: Tag shorthands for building virtual nodes
//! - `host`: The host tree abstraction and an in-memory implementation
//! - `reconcile`: Diffing and patching
//! - `render`: Mounting components and re-rendering them on change
//! - `store`: Reducer-driven state built on signals
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use trellis_core::host::MemoryHost;
//! use trellis_core::html::{button, div, span};
//! use trellis_core::reactive::Signal;
//! use trellis_core::render::mount;
//! use trellis_core::vnode::Props;
//!
//! let host = Rc::new(RefCell::new(MemoryHost::new()));
//! let root = host.borrow_mut().create_root("body");
//! let count = Signal::new(0);
//!
//! let count_clone = count.clone();
//! let handle = mount(host.clone(), root, move || {
//!     let count_click = count_clone.clone();
//!     div(
//!         Props::new().class("counter"),
//!         (
//!             span(Props::new(), count_clone.get()),
//!             button(
//!                 Props::new().on("click", move |_| count_click.update(|n| n + 1)),
//!                 "+",
//!             ),
//!         ),
//!     )
//! })
//! .unwrap();
//!
//! count.set(5);
//! assert_eq!(
//!     host.borrow().inner_to_html(root),
//!     "<div class=\"counter\"><span>5</span><button>+</button></div>"
//! );
//! # drop(handle);
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod html;
pub mod reactive;
pub mod reconcile;
pub mod render;
pub mod store;
pub mod vnode;

pub use config::{RenderConfig, TextLeafPolicy};
pub use error::{ConfigError, HostError, ReconcileError, RenderError};
pub use host::{HostTree, MemoryHost, NodeId};
pub use reactive::{Effect, Memo, Signal};
pub use reconcile::Reconciler;
pub use render::{mount, mount_with, RenderHandle};
pub use store::Store;
pub use vnode::{node, text, Props, VNode};
