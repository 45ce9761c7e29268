//! Reconciler
//!
//! Compares a previous and a next virtual tree and applies the mutations
//! needed to bring the host tree from one to the other.
//!
//! # Algorithm
//!
//! [`Reconciler::patch`] works on one position of one parent:
//!
//! 1. Nothing old, something new: realize the new subtree and insert it.
//! 2. Something old, nothing new: remove the host node.
//! 3. Both present but not the same identity: realize the new subtree and
//!    replace the old host node with it.
//! 4. Same-identity text leaves: keep the host node.
//! 5. Same-identity elements: keep the host node, diff properties, then
//!    patch every child index positionally.
//!
//! Children are matched by index only. A key only decides whether the node
//! at a given index is the same one; reordering keyed siblings shows up as
//! a replacement at every index that changed.
//!
//! # Lifecycle
//!
//! Reference, mount and unmount callbacks are not run during the patch.
//! They are collected into a [`Lifecycle`] batch, in the order they are
//! due, and run by [`Lifecycle::dispatch`] once the caller has released the
//! host tree. Mount callbacks run parent first, unmount callbacks children
//! first, and only for nodes that were created or discarded.

use std::cmp;

use tracing::{trace, warn};

use crate::config::{RenderConfig, TextLeafPolicy};
use crate::error::ReconcileError;
use crate::host::{HostTree, NodeId};
use crate::reactive::untrack;
use crate::vnode::{same_identity, Element, Hook, NodeRef, Prop, PropKey, Props, Style, VNode, VNodeKind};

/// A callback that is due after a patch.
enum Pending<'a> {
    Ref(NodeRef, NodeId),
    Mount(Hook, NodeId, &'a VNode),
    Unmount(Hook, NodeId, &'a VNode),
}

/// Callbacks collected during a patch, in dispatch order.
#[must_use = "lifecycle callbacks only run when the batch is dispatched"]
#[derive(Default)]
pub struct Lifecycle<'a> {
    pending: Vec<Pending<'a>>,
}

impl<'a> Lifecycle<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Append the callbacks of `other` after this batch's.
    pub fn extend(&mut self, other: Lifecycle<'a>) {
        self.pending.extend(other.pending);
    }

    /// Run every collected callback.
    ///
    /// Signals read by the callbacks are not tracked by any running effect.
    pub fn dispatch(self) {
        untrack(|| {
            for pending in self.pending {
                match pending {
                    Pending::Ref(callback, node) => callback(node),
                    Pending::Mount(hook, node, vnode) | Pending::Unmount(hook, node, vnode) => {
                        hook(node, vnode)
                    }
                }
            }
        });
    }

    /// Queue mount callbacks for a freshly realized subtree, parent first.
    pub fn mount_tree(&mut self, vnode: &'a VNode) {
        if let (Some(hook), Some(node)) = (vnode.hook(&PropKey::Mount), vnode.host()) {
            self.pending.push(Pending::Mount(hook.clone(), node, vnode));
        }
        for child in vnode.children() {
            self.mount_tree(child);
        }
    }

    /// Queue unmount callbacks for a subtree about to be discarded,
    /// children first.
    pub fn unmount_tree(&mut self, vnode: &'a VNode) {
        for child in vnode.children() {
            self.unmount_tree(child);
        }
        if let (Some(hook), Some(node)) = (vnode.hook(&PropKey::Unmount), vnode.host()) {
            self.pending.push(Pending::Unmount(hook.clone(), node, vnode));
        }
    }

    fn node_ref(&mut self, callback: NodeRef, node: NodeId) {
        self.pending.push(Pending::Ref(callback, node));
    }
}

impl std::fmt::Debug for Lifecycle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// The diff/patch engine.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: RenderConfig,
}

impl Reconciler {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Same-identity under this reconciler's text leaf policy.
    pub fn same_identity(&self, old: &VNode, new: &VNode) -> bool {
        match self.config.text_leaves {
            TextLeafPolicy::InPlace if old.is_text() && new.is_text() => true,
            _ => same_identity(old, new),
        }
    }

    /// Realize `vnode` into a new, detached host subtree and return its root.
    ///
    /// Reference callbacks of the subtree are queued on `lifecycle`; mount
    /// callbacks are not, since the subtree is not inserted yet.
    pub fn create_host<'a, H>(
        &self,
        host: &mut H,
        vnode: &'a VNode,
        lifecycle: &mut Lifecycle<'a>,
    ) -> Result<NodeId, ReconcileError>
    where
        H: HostTree + ?Sized,
    {
        let node = match vnode.kind() {
            VNodeKind::Text(content) => host.create_text(content)?,
            VNodeKind::Element(element) => {
                let node = host.create_element(element.tag())?;
                if let Err(err) = self.fill_element(host, node, element, lifecycle) {
                    discard(host, node);
                    return Err(err);
                }
                if let Some(Prop::Ref(callback)) = element.props().get(&PropKey::Ref) {
                    lifecycle.node_ref(callback.clone(), node);
                }
                node
            }
        };
        vnode.set_host(node);
        Ok(node)
    }

    fn fill_element<'a, H>(
        &self,
        host: &mut H,
        node: NodeId,
        element: &'a Element,
        lifecycle: &mut Lifecycle<'a>,
    ) -> Result<(), ReconcileError>
    where
        H: HostTree + ?Sized,
    {
        self.diff_props(host, node, &Props::new(), element.props())?;
        for (index, child) in element.children().iter().enumerate() {
            self.place(host, node, index, child, Placement::Insert, lifecycle)?;
        }
        Ok(())
    }

    /// Realize `vnode` and put it at `index` of `parent`. A subtree that
    /// cannot be placed is discarded again.
    fn place<'a, H>(
        &self,
        host: &mut H,
        parent: NodeId,
        index: usize,
        vnode: &'a VNode,
        placement: Placement,
        lifecycle: &mut Lifecycle<'a>,
    ) -> Result<(), ReconcileError>
    where
        H: HostTree + ?Sized,
    {
        let node = self.create_host(host, vnode, lifecycle)?;
        let placed = match placement {
            Placement::Insert => host.insert_child(parent, index, node),
            Placement::Replace => host.replace_child(parent, index, node),
        };
        if let Err(err) = placed {
            discard(host, node);
            return Err(err.into());
        }
        Ok(())
    }

    /// Apply the property changes from `old` to `new` on `node`.
    pub fn diff_props<H>(
        &self,
        host: &mut H,
        node: NodeId,
        old: &Props,
        new: &Props,
    ) -> Result<(), ReconcileError>
    where
        H: HostTree + ?Sized,
    {
        for (key, prop) in old.iter() {
            if new.get(key).is_none() {
                remove_prop(host, node, key, prop)?;
            }
        }
        for (key, prop) in new.iter() {
            apply_prop(host, node, key, old.get(key), prop)?;
        }
        Ok(())
    }

    /// Bring position `index` of `parent` from `old` to `new`.
    ///
    /// Returns the lifecycle callbacks that became due; the caller
    /// dispatches them once it no longer borrows the host.
    pub fn patch<'a, H>(
        &self,
        host: &mut H,
        parent: NodeId,
        old: Option<&'a VNode>,
        new: Option<&'a VNode>,
        index: usize,
    ) -> Result<Lifecycle<'a>, ReconcileError>
    where
        H: HostTree + ?Sized,
    {
        let mut lifecycle = Lifecycle::new();
        self.patch_at(host, parent, old, new, index, &mut lifecycle)?;
        Ok(lifecycle)
    }

    fn patch_at<'a, H>(
        &self,
        host: &mut H,
        parent: NodeId,
        old: Option<&'a VNode>,
        new: Option<&'a VNode>,
        index: usize,
        lifecycle: &mut Lifecycle<'a>,
    ) -> Result<(), ReconcileError>
    where
        H: HostTree + ?Sized,
    {
        let (old, new) = match (old, new) {
            (None, None) => return Ok(()),
            (None, Some(new)) => {
                trace!(%parent, index, tag = new.tag(), "insert");
                self.place(host, parent, index, new, Placement::Insert, lifecycle)?;
                lifecycle.mount_tree(new);
                return Ok(());
            }
            (Some(old), new) => {
                if old.host().is_none() {
                    return Err(ReconcileError::Unrealized { parent, index });
                }
                match new {
                    Some(new) => (old, new),
                    None => {
                        trace!(%parent, index, tag = old.tag(), "remove");
                        lifecycle.unmount_tree(old);
                        host.remove_child(parent, index)?;
                        return Ok(());
                    }
                }
            }
        };

        if std::ptr::eq(old, new) {
            return Ok(());
        }

        if !self.same_identity(old, new) {
            trace!(%parent, index, from = old.tag(), to = new.tag(), "replace");
            self.place(host, parent, index, new, Placement::Replace, lifecycle)?;
            lifecycle.unmount_tree(old);
            lifecycle.mount_tree(new);
            return Ok(());
        }

        let Some(node) = old.host() else {
            return Err(ReconcileError::Unrealized { parent, index });
        };
        new.set_host(node);

        match (old.kind(), new.kind()) {
            (VNodeKind::Text(old_content), VNodeKind::Text(new_content)) => {
                if old_content != new_content {
                    trace!(%node, "update text");
                    host.set_text(node, new_content)?;
                }
            }
            (VNodeKind::Element(old_element), VNodeKind::Element(new_element)) => {
                let (old_html, new_html) = (inner_html(old_element.props()), inner_html(new_element.props()));
                self.diff_props(host, node, old_element.props(), new_element.props())?;
                if old_html == new_html {
                    self.patch_children(host, node, old_element.children(), new_element.children(), lifecycle)?;
                } else {
                    // Setting the markup dropped every host child.
                    trace!(%node, "rebuild children after inner html");
                    for child in old_element.children() {
                        lifecycle.unmount_tree(child);
                    }
                    for (index, child) in new_element.children().iter().enumerate() {
                        self.place(host, node, index, child, Placement::Insert, lifecycle)?;
                        lifecycle.mount_tree(child);
                    }
                }
            }
            _ => unreachable!("same-identity nodes have the same kind"),
        }
        Ok(())
    }

    fn patch_children<'a, H>(
        &self,
        host: &mut H,
        node: NodeId,
        old: &'a [VNode],
        new: &'a [VNode],
        lifecycle: &mut Lifecycle<'a>,
    ) -> Result<(), ReconcileError>
    where
        H: HostTree + ?Sized,
    {
        let common = cmp::min(old.len(), new.len());
        for index in 0..common {
            self.patch_at(host, node, Some(&old[index]), Some(&new[index]), index, lifecycle)?;
        }
        for (index, child) in new.iter().enumerate().skip(common) {
            self.patch_at(host, node, None, Some(child), index, lifecycle)?;
        }
        // Each removal shifts the next excess child down to `common`.
        for child in old.iter().skip(common) {
            self.patch_at(host, node, Some(child), None, common, lifecycle)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Placement {
    Insert,
    Replace,
}

/// Free a subtree that failed to realize or place. The original error is
/// the one reported.
fn discard<H>(host: &mut H, node: NodeId)
where
    H: HostTree + ?Sized,
{
    if let Err(err) = host.discard(node) {
        warn!(%node, error = %err, "failed to discard subtree");
    }
}

fn inner_html(props: &Props) -> Option<&str> {
    match props.get(&PropKey::InnerHtml) {
        Some(Prop::InnerHtml(html)) => Some(html),
        _ => None,
    }
}

fn remove_prop<H>(host: &mut H, node: NodeId, key: &PropKey, prop: &Prop) -> Result<(), ReconcileError>
where
    H: HostTree + ?Sized,
{
    match prop {
        Prop::Attr(_) => host.remove_attribute(node, key.name())?,
        Prop::Event(handler) => host.remove_listener(node, key.name(), handler)?,
        Prop::Style(style) => {
            for name in style.keys() {
                host.remove_style(node, name)?;
            }
        }
        Prop::InnerHtml(_) => host.set_inner_html(node, "")?,
        Prop::Ref(_) | Prop::Mount(_) | Prop::Unmount(_) => {}
    }
    Ok(())
}

fn apply_prop<H>(
    host: &mut H,
    node: NodeId,
    key: &PropKey,
    old: Option<&Prop>,
    new: &Prop,
) -> Result<(), ReconcileError>
where
    H: HostTree + ?Sized,
{
    match (new, old) {
        (Prop::Event(handler), Some(Prop::Event(previous))) if handler.same(previous) => {}
        (Prop::Event(handler), previous) => {
            if let Some(Prop::Event(stale)) = previous {
                host.remove_listener(node, key.name(), stale)?;
            }
            host.add_listener(node, key.name(), handler.clone())?;
        }
        (Prop::Attr(value), Some(Prop::Attr(previous))) if value == previous => {}
        (Prop::Attr(value), _) => host.set_attribute(node, key.name(), value)?,
        (Prop::Style(style), previous) => {
            let empty = Style::new();
            let previous = match previous {
                Some(Prop::Style(previous)) => previous,
                _ => &empty,
            };
            for name in previous.keys() {
                if !style.contains_key(name) {
                    host.remove_style(node, name)?;
                }
            }
            for (name, value) in style {
                if previous.get(name) != Some(value) {
                    host.set_style(node, name, value)?;
                }
            }
        }
        (Prop::InnerHtml(html), Some(Prop::InnerHtml(previous))) if html == previous => {}
        (Prop::InnerHtml(html), _) => host.set_inner_html(node, html)?,
        (Prop::Ref(_) | Prop::Mount(_) | Prop::Unmount(_), _) => {}
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
