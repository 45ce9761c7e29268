//! Render Entry Point
//!
//! [`mount`] binds a component function to a container node. The component
//! runs inside one [`Effect`], so every signal it reads during a render
//! schedules the next render. Each render patches the host tree from the
//! previously rendered tree to the new one.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use trellis_core::host::MemoryHost;
//! use trellis_core::reactive::Signal;
//! use trellis_core::render::mount;
//! use trellis_core::vnode::{node, Props};
//!
//! let host = Rc::new(RefCell::new(MemoryHost::new()));
//! let root = host.borrow_mut().create_root("main");
//! let name = Signal::new("world".to_string());
//!
//! let name_clone = name.clone();
//! let handle = mount(host.clone(), root, move || {
//!     node("p", Props::new(), format!("hello {}", name_clone.get()))
//! })
//! .unwrap();
//! assert_eq!(host.borrow().inner_to_html(root), "<p>hello world</p>");
//!
//! name.set("trellis".to_string());
//! assert_eq!(host.borrow().inner_to_html(root), "<p>hello trellis</p>");
//!
//! handle.dispose().unwrap();
//! assert_eq!(host.borrow().inner_to_html(root), "");
//! ```
//!
//! # Errors
//!
//! A failure during the first render is returned from [`mount`]. Later
//! renders are triggered by signal writes, which cannot fail; their errors
//! are logged, kept on the session and available from
//! [`RenderHandle::take_error`]. After a failed render the container's
//! contents are discarded: unmount callbacks run for the last successful
//! tree and the next render rebuilds the container from scratch.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, error};

use crate::config::RenderConfig;
use crate::error::{ReconcileError, RenderError};
use crate::host::{HostTree, NodeId};
use crate::reactive::Effect;
use crate::reconcile::{Lifecycle, Reconciler};
use crate::vnode::VNode;

/// Mount `component` into `container` with the default configuration.
pub fn mount<H, F>(host: Rc<RefCell<H>>, container: NodeId, component: F) -> Result<RenderHandle<H>, RenderError>
where
    H: HostTree + 'static,
    F: FnMut() -> VNode + 'static,
{
    mount_with(RenderConfig::default(), host, container, component)
}

/// Mount `component` into `container`.
///
/// The container's existing children are removed on the first render.
pub fn mount_with<H, F>(
    config: RenderConfig,
    host: Rc<RefCell<H>>,
    container: NodeId,
    mut component: F,
) -> Result<RenderHandle<H>, RenderError>
where
    H: HostTree + 'static,
    F: FnMut() -> VNode + 'static,
{
    {
        let host = host.borrow();
        if !host.contains(container) {
            return Err(RenderError::ContainerNotFound(container));
        }
        if !host.is_container(container) {
            return Err(RenderError::InvalidContainer(container));
        }
    }

    let session = Rc::new(Session {
        host,
        container,
        reconciler: Reconciler::new(config),
        previous: RefCell::new(None),
        last_error: RefCell::new(None),
        disposed: Cell::new(false),
    });

    let session_clone = session.clone();
    let effect = Effect::new(move || {
        let next = component();
        session_clone.render(next);
    });

    let first_error = session.last_error.borrow_mut().take();
    if let Some(err) = first_error {
        effect.dispose();
        session.disposed.set(true);
        return Err(err);
    }

    debug!(%container, "mounted");
    Ok(RenderHandle { session, effect })
}

struct Session<H> {
    host: Rc<RefCell<H>>,
    container: NodeId,
    reconciler: Reconciler,

    /// The last tree that was patched in successfully. `None` after a
    /// failure, so the next render starts from an empty container.
    previous: RefCell<Option<VNode>>,

    last_error: RefCell<Option<RenderError>>,
    disposed: Cell<bool>,
}

impl<H: HostTree> Session<H> {
    fn render(&self, next: VNode) {
        if self.disposed.get() {
            return;
        }

        let previous = self.previous.borrow_mut().take();
        let result = self.patch(previous.as_ref(), &next).map(Lifecycle::dispatch);
        match result {
            Ok(()) => {
                *self.previous.borrow_mut() = Some(next);
            }
            Err(err) => {
                error!(container = %self.container, error = %err, "render failed");
                // The container holds a half-patched tree now. Unmount what
                // was mounted and rebuild from scratch on the next render.
                if let Some(previous) = &previous {
                    let mut lifecycle = Lifecycle::new();
                    lifecycle.unmount_tree(previous);
                    lifecycle.dispatch();
                }
                *self.last_error.borrow_mut() = Some(err);
            }
        }
    }

    fn patch<'a>(&self, previous: Option<&'a VNode>, next: &'a VNode) -> Result<Lifecycle<'a>, RenderError> {
        let mut host = self.host.borrow_mut();
        let lifecycle = match previous {
            None => {
                host.clear_children(self.container)
                    .map_err(ReconcileError::from)?;
                self.reconciler
                    .patch(&mut *host, self.container, None, Some(next), 0)?
            }
            Some(previous) => {
                debug!(container = %self.container, "re-render");
                self.reconciler
                    .patch(&mut *host, self.container, Some(previous), Some(next), 0)?
            }
        };
        Ok(lifecycle)
    }
}

/// A mounted component.
///
/// Dropping the handle disposes the session. Use [`RenderHandle::forget`]
/// to keep it rendering for the rest of the program.
pub struct RenderHandle<H: HostTree + 'static> {
    session: Rc<Session<H>>,
    effect: Effect,
}

impl<H: HostTree + 'static> RenderHandle<H> {
    /// The container this session renders into.
    pub fn container(&self) -> NodeId {
        self.session.container
    }

    /// The host tree this session renders into.
    pub fn host(&self) -> &Rc<RefCell<H>> {
        &self.session.host
    }

    /// Number of renders so far, failed ones included.
    pub fn run_count(&self) -> usize {
        self.effect.run_count()
    }

    pub fn is_disposed(&self) -> bool {
        self.session.disposed.get()
    }

    /// Take the error of the latest failed re-render, if any.
    pub fn take_error(&self) -> Option<RenderError> {
        self.session.last_error.borrow_mut().take()
    }

    /// Stop re-rendering, run unmount callbacks for the rendered tree and
    /// clear the container.
    pub fn dispose(&self) -> Result<(), RenderError> {
        if self.session.disposed.replace(true) {
            return Err(RenderError::Disposed);
        }
        self.effect.dispose();

        let previous = self.session.previous.borrow_mut().take();
        if let Some(previous) = &previous {
            let mut lifecycle = Lifecycle::new();
            lifecycle.unmount_tree(previous);
            lifecycle.dispatch();
        }

        self.session
            .host
            .borrow_mut()
            .clear_children(self.session.container)?;
        debug!(container = %self.session.container, "disposed");
        Ok(())
    }

    /// Keep the session alive and rendering without a handle.
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

impl<H: HostTree + 'static> Drop for RenderHandle<H> {
    fn drop(&mut self) {
        if self.session.disposed.get() {
            return;
        }
        if let Err(err) = self.dispose() {
            error!(container = %self.session.container, error = %err, "dispose failed");
        }
    }
}

impl<H: HostTree + 'static> std::fmt::Debug for RenderHandle<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHandle")
            .field("container", &self.session.container)
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
