// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Invalidation: per-node dirty flags, pull accessors, and explicit notification.
//!
//! ## Propagation
//!
//! - Draw changes (visibility, radius, color, reference targets) mark the node
//!   `DRAW | BOUNDS` and every ancestor `BOUNDS`. Ancestors never get `DRAW`:
//!   a child's look changes its parent's extent, not the parent's own drawing.
//! - Transform changes additionally mark the node `FRAME`, mark every descendant
//!   `FRAME`, and redraw referents whose references point into the subtree.
//! - Structural changes mark the parent chain `BOUNDS` and the attached or
//!   detached subtree `FRAME`.
//!
//! ## Pulling
//!
//! Consumers ask and recompute: [`Tree::validate_draw`] reports (and clears) a
//! stale draw representation, [`Tree::bounds`] recomputes stale bounding boxes
//! bottom-up, and [`Tree::world_frame`] refreshes cached absolute frames.
//! Each recomputation clears the flag it serves, so nothing is deferred forever.
//!
//! ## Notification
//!
//! Every mark is also queued, coalesced per node, for listeners registered with
//! [`Tree::subscribe`]. Nothing is delivered until the host calls
//! [`Tree::flush_invalidations`], typically once per frame or after a batch of edits.

use alloc::boxed::Box;
use alloc::vec::Vec;

use glam::DVec3;
use zeobuilder_transform::Aabb3;

use crate::class::PropertyId;
use crate::tree::Tree;
use crate::types::{Capabilities, Dirty, NodeId};

/// Receives coalesced invalidations from [`Tree::flush_invalidations`].
pub trait InvalidationListener {
    /// `node` was invalidated for `flags` since the previous flush.
    fn invalidated(&mut self, node: NodeId, flags: Dirty);
}

impl<F: FnMut(NodeId, Dirty)> InvalidationListener for F {
    fn invalidated(&mut self, node: NodeId, flags: Dirty) {
        self(node, flags);
    }
}

/// Handle returned by [`Tree::subscribe`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(u32);

impl Tree {
    /// Current dirty flags of a node; empty for stale ids.
    pub fn dirty(&self, id: NodeId) -> Dirty {
        self.node_opt(id).map_or(Dirty::empty(), |n| n.dirty)
    }

    /// True if none of `flags` is dirty on the node.
    pub fn is_valid(&self, id: NodeId, flags: Dirty) -> bool {
        !self.dirty(id).intersects(flags)
    }

    /// Returns `true` if the node's draw representation must be rebuilt, and
    /// considers it rebuilt from then on.
    pub fn validate_draw(&mut self, id: NodeId) -> bool {
        let Some(n) = self.node_opt_mut(id) else {
            return false;
        };
        let stale = n.dirty.contains(Dirty::DRAW);
        n.dirty.remove(Dirty::DRAW);
        stale
    }

    /// Bounding box of the node and its visible subtree, in the node's own frame.
    ///
    /// Atoms and points contribute a sphere of their radius around the origin,
    /// referents the origins of their targets. Returns `None` when nothing visible
    /// has extent. Stale boxes are recomputed bottom-up and their flags cleared.
    pub fn bounds(&mut self, id: NodeId) -> Option<Aabb3> {
        let n = self.node_opt(id)?;
        if !n.dirty.contains(Dirty::BOUNDS) {
            return n.bounds;
        }
        let mut acc = self.own_bounds(id);
        let children = self.node(id).children.clone();
        for child in children {
            let c = self.node(child);
            if !c.visible || c.class.has(Capabilities::REFERENCE) {
                continue;
            }
            if let Some(b) = self.bounds_in_parent(child) {
                acc = Some(acc.map_or(b, |a| a.union(&b)));
            }
        }
        let n = self.node_mut(id);
        n.bounds = acc;
        n.dirty.remove(Dirty::BOUNDS);
        acc
    }

    /// [`bounds`](Self::bounds) mapped through the node's local transformation.
    pub fn bounds_in_parent(&mut self, id: NodeId) -> Option<Aabb3> {
        let local = self.local(id);
        self.bounds(id).map(|b| b.transformed(&local))
    }

    fn own_bounds(&self, id: NodeId) -> Option<Aabb3> {
        let class = self.node(id).class;
        if class.has(Capabilities::REFERENT) {
            let points = self
                .targets(id)
                .into_iter()
                .filter_map(|t| self.position_relative_to(t, id).ok());
            return Aabb3::from_points(points);
        }
        let radius = self.property(id, PropertyId::Radius).ok()?.as_real()?;
        Some(Aabb3::from_sphere(DVec3::ZERO, radius))
    }

    // --- propagation ---

    /// Mark a node's draw representation stale.
    pub fn invalidate_draw(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        self.mark(id, Dirty::DRAW | Dirty::BOUNDS);
        self.mark_ancestors(id, Dirty::BOUNDS);
    }

    /// Mark everything derived from a node's local transformation stale.
    pub fn invalidate_transform(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        self.mark(id, Dirty::DRAW | Dirty::BOUNDS | Dirty::FRAME);
        let subtree = self.descendants(id);
        for n in subtree.iter().skip(1) {
            self.mark(*n, Dirty::FRAME);
        }
        self.mark_ancestors(id, Dirty::BOUNDS);
        self.invalidate_referents(&subtree);
        tracing::trace!(?id, subtree = subtree.len(), "invalidate transform");
    }

    /// Propagate a child being attached to or detached from `parent`.
    pub(crate) fn invalidate_structure(&mut self, parent: NodeId, child: NodeId) {
        if self.capabilities(child).contains(Capabilities::REFERENCE) {
            self.invalidate_draw(parent);
            return;
        }
        self.mark(parent, Dirty::BOUNDS);
        self.mark_ancestors(parent, Dirty::BOUNDS);
        let subtree = self.descendants(child);
        for n in &subtree {
            self.mark(*n, Dirty::FRAME);
        }
        self.invalidate_referents(&subtree);
    }

    fn invalidate_referents(&mut self, subtree: &[NodeId]) {
        let mut referents = Vec::new();
        for n in subtree {
            for reference in self.referrers(*n) {
                if let Some(referent) = self.parent(*reference)
                    && !referents.contains(&referent)
                {
                    referents.push(referent);
                }
            }
        }
        for referent in referents {
            self.invalidate_draw(referent);
        }
    }

    fn mark_ancestors(&mut self, id: NodeId, flags: Dirty) {
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            self.mark(p, flags);
            cur = self.parent(p);
        }
    }

    fn mark(&mut self, id: NodeId, flags: Dirty) {
        let n = self.node_mut(id);
        let queued = !n.pending.is_empty();
        n.dirty.insert(flags);
        n.pending.insert(flags);
        if !queued {
            self.pending.push(id);
        }
    }

    // --- notification ---

    /// Register a listener for [`flush_invalidations`](Self::flush_invalidations).
    pub fn subscribe(&mut self, listener: impl InvalidationListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    /// Deliver pending invalidations, one call per node and listener, in first-marked order.
    ///
    /// Nodes freed since they were marked are skipped. Returns the number of nodes
    /// delivered.
    pub fn flush_invalidations(&mut self) -> usize {
        let pending = core::mem::take(&mut self.pending);
        let mut batch = Vec::with_capacity(pending.len());
        for id in pending {
            if let Some(n) = self.node_opt_mut(id) {
                let flags = core::mem::replace(&mut n.pending, Dirty::empty());
                if !flags.is_empty() {
                    batch.push((id, flags));
                }
            }
        }
        for (_, listener) in &mut self.listeners {
            for (id, flags) in &batch {
                listener.invalidated(*id, *flags);
            }
        }
        tracing::trace!(nodes = batch.len(), "flush invalidations");
        batch.len()
    }
}
