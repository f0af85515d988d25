// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: arena, structural edits, references, properties, queries.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use zeobuilder_transform::{Aabb3, Transformation};

use crate::class::{NodeClass, PropertyId, PropertyValue};
use crate::dirty::{InvalidationListener, ListenerId};
use crate::error::{PropertyError, ReferenceTargetError, StructuralError};
use crate::types::{Capabilities, Dirty, NodeId, NodeInit, Placement, Side, fresh_stamp};

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

/// The scene-graph document tree.
///
/// Nodes live in an arena and refer to each other by [`NodeId`]. Several roots may
/// coexist: freshly created nodes are unattached until [`add`](Self::add)ed, and
/// removed subtrees stay alive (detached) so that undo can restore them.
pub struct Tree {
    nodes: Vec<Option<Node>>, // slots
    generations: Vec<u32>,    // last generation per slot (persists across frees)
    free_list: Vec<usize>,
    pub(crate) epoch: u64,
    pub(crate) pending: Vec<NodeId>,
    pub(crate) listeners: Vec<(ListenerId, Box<dyn InvalidationListener>)>,
    pub(crate) next_listener: u32,
}

impl core::fmt::Debug for Tree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        let free = self.free_list.len();
        f.debug_struct("Tree")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &free)
            .field("epoch", &self.epoch)
            .field("pending", &self.pending.len())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) generation: u32,
    pub(crate) class: &'static NodeClass,
    pub(crate) name: String,
    pub(crate) fixed: bool,
    pub(crate) visible: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) transformation: Option<Transformation>,
    pub(crate) properties: Vec<(PropertyId, PropertyValue)>,
    pub(crate) target: Option<NodeId>,
    pub(crate) referrers: Vec<NodeId>,
    pub(crate) dirty: Dirty,
    pub(crate) pending: Dirty,
    pub(crate) world: Transformation,
    pub(crate) bounds: Option<Aabb3>,
}

impl Node {
    fn new(generation: u32, class: &'static NodeClass, init: NodeInit) -> Self {
        Self {
            generation,
            class,
            name: init.name,
            fixed: init.fixed,
            visible: init.visible,
            parent: None,
            children: Vec::new(),
            transformation: class
                .has(Capabilities::TRANSFORMABLE)
                .then_some(init.transformation),
            properties: class
                .properties
                .iter()
                .map(|spec| (spec.id, (spec.default)()))
                .collect(),
            target: None,
            referrers: Vec::new(),
            dirty: Dirty::all(),
            pending: Dirty::empty(),
            world: Transformation::IDENTITY,
            bounds: None,
        }
    }
}

/// Everything [`Tree::remove`] detached, in detach order.
///
/// The node itself is detached last; the referents that had to go with it are
/// detached first, in `cascade` order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Removal {
    /// The removed node.
    pub node: NodeId,
    /// Where the removed node was.
    pub placement: Placement,
    /// Referents detached because they pointed into the removed subtree.
    pub cascade: Vec<(NodeId, Placement)>,
}

impl Removal {
    /// All detached subtree roots: the cascade first, then the node.
    pub fn detached(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.cascade
            .iter()
            .map(|(id, _)| *id)
            .chain(core::iter::once(self.node))
    }
}

impl Tree {
    /// Create a new empty tree.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            epoch: fresh_stamp(),
            pending: Vec::new(),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Create an unattached node of `class`.
    ///
    /// Properties start at the class defaults. Attach the node with [`add`](Self::add)
    /// (or an `Add` primitive), or keep it as a root.
    pub fn create(&mut self, class: &'static NodeClass, init: NodeInit) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            (idx, generation)
        } else {
            self.nodes.push(None);
            self.generations.push(1);
            (self.nodes.len() - 1, 1_u32)
        };
        self.nodes[idx] = Some(Node::new(generation, class, init));
        #[allow(
            clippy::cast_possible_truncation,
            reason = "NodeId uses 32-bit indices by design."
        )]
        let id = NodeId::new(idx as u32, generation);
        tracing::trace!(?id, class = class.name, "create");
        id
    }

    /// Returns true if `id` refers to a live node.
    ///
    /// A `NodeId` is considered live if its slot exists and its generation matches
    /// the current generation stored in that slot.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some()
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// True if the tree holds no live nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over all live nodes in slot order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, n)| {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            n.as_ref().map(|n| NodeId::new(i as u32, n.generation))
        })
    }

    /// Stamp replaced by every structural change, every change of a fixed flag, and
    /// every [`destroy`](Self::destroy).
    ///
    /// Stamps are unique across trees, so an equal epoch means the same tree in the
    /// same state.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    // --- node attributes ---

    /// The class a node was created from.
    pub fn class(&self, id: NodeId) -> Option<&'static NodeClass> {
        self.node_opt(id).map(|n| n.class)
    }

    /// Capabilities of a node; empty for stale ids.
    pub fn capabilities(&self, id: NodeId) -> Capabilities {
        self.node_opt(id)
            .map_or(Capabilities::empty(), |n| n.class.capabilities)
    }

    /// Display name.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node_opt(id).map(|n| n.name.as_str())
    }

    /// Whether the node is fixed; false for stale ids.
    pub fn is_fixed(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some_and(|n| n.fixed)
    }

    /// Whether the node is visible; false for stale ids.
    pub fn is_visible(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some_and(|n| n.visible)
    }

    /// Local transformation, if the node is transformable.
    pub fn transformation(&self, id: NodeId) -> Option<Transformation> {
        self.node_opt(id).and_then(|n| n.transformation)
    }

    /// Local transformation, identity for non-transformable nodes.
    pub(crate) fn local(&self, id: NodeId) -> Transformation {
        self.transformation(id).unwrap_or_default()
    }

    // --- structure queries ---

    /// Parent of a node, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id).and_then(|n| n.parent)
    }

    /// Ordered children (structural or references); empty for stale ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node_opt(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Index of a node among its parent's children.
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    /// True if `node` is a direct child of `parent`.
    pub fn is_attached_to(&self, node: NodeId, parent: NodeId) -> bool {
        self.parent(node) == Some(parent)
    }

    /// Parent and index of an attached node.
    pub fn placement(&self, id: NodeId) -> Option<Placement> {
        Some(Placement {
            parent: self.parent(id)?,
            index: self.index_of(id)?,
        })
    }

    /// True if `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = self.parent(node);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.parent(p);
        }
        false
    }

    /// Number of edges from the root of the node's tree.
    pub fn depth(&self, id: NodeId) -> Option<usize> {
        self.trace(id).len().checked_sub(1)
    }

    /// Root of the tree containing `id` (itself when unattached).
    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        if !self.is_alive(id) {
            return None;
        }
        let mut cur = id;
        while let Some(p) = self.parent(cur) {
            cur = p;
        }
        Some(cur)
    }

    /// The node and everything below it, in pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.is_alive(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.node(n).children.iter().rev());
        }
        out
    }

    /// Path from the node up to its root (inclusive at both ends).
    pub fn trace(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.is_alive(id) {
            return out;
        }
        let mut cur = Some(id);
        while let Some(n) = cur {
            out.push(n);
            cur = self.parent(n);
        }
        out
    }

    /// Deepest node present in the traces of all `nodes`.
    ///
    /// Returns `None` for an empty slice or when the nodes live under different roots.
    /// A node is its own ancestor here, so `common_ancestor(&[a, child_of_a])` is `a`.
    pub fn common_ancestor(&self, nodes: &[NodeId]) -> Option<NodeId> {
        let (first, rest) = nodes.split_first()?;
        let mut path = self.trace(*first);
        path.reverse();
        for n in rest {
            let mut other = self.trace(*n);
            other.reverse();
            let common = path
                .iter()
                .zip(&other)
                .take_while(|(a, b)| a == b)
                .count();
            path.truncate(common);
            if path.is_empty() {
                return None;
            }
        }
        path.last().copied()
    }

    /// Nodes strictly between `from` and `to` on the path through their common ancestor.
    ///
    /// The common ancestor is included unless it is one of the endpoints. Returns
    /// `None` when the nodes share no root.
    pub fn bridge(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        let common = self.common_ancestor(&[from, to])?;
        let up = self.trace(from);
        let down = self.trace(to);
        let up_len = up.iter().position(|n| *n == common)?;
        let down_len = down.iter().position(|n| *n == common)?;
        let mut out: Vec<NodeId> = up.iter().take(up_len).skip(1).copied().collect();
        if common != from && common != to {
            out.push(common);
        }
        out.extend(down.iter().take(down_len).skip(1).rev());
        Some(out)
    }

    // --- structural edits ---

    /// Attach an unattached `node` under `parent` at `index` (end when `None`).
    ///
    /// Fails without side effects when the parent does not accept the node's kind,
    /// the node already has a parent, the edit would create a cycle, or the index
    /// is out of range.
    pub fn add(
        &mut self,
        node: NodeId,
        parent: NodeId,
        index: Option<usize>,
    ) -> Result<(), StructuralError> {
        let n = self.node_opt(node).ok_or(StructuralError::Dead(node))?;
        if n.parent.is_some() {
            return Err(StructuralError::AlreadyAttached(node));
        }
        let index = self.check_placement(node, parent, index)?;
        self.attach(node, parent, index);
        tracing::debug!(?node, ?parent, index, "add");
        Ok(())
    }

    /// Move an attached node under `new_parent` at `new_index` (end when `None`).
    ///
    /// The node keeps its identity, subtree, and reference targets. The index is
    /// interpreted after the node has been taken out of its old parent, so moving a
    /// node back to the returned placement restores the original ordering exactly.
    ///
    /// Returns the old placement.
    pub fn move_node(
        &mut self,
        node: NodeId,
        new_parent: NodeId,
        new_index: Option<usize>,
    ) -> Result<Placement, StructuralError> {
        let n = self.node_opt(node).ok_or(StructuralError::Dead(node))?;
        if n.fixed {
            return Err(StructuralError::Fixed(node));
        }
        if n.parent.is_none() {
            return Err(StructuralError::NotAttached(node));
        }
        let index = self.check_placement(node, new_parent, new_index)?;
        let old = self.detach(node)?;
        self.attach(node, new_parent, index);
        tracing::debug!(?node, ?new_parent, index, "move");
        Ok(old)
    }

    /// Detach a node and, first, every referent that would be left pointing into it.
    ///
    /// The cascade runs to a fixpoint: detaching a referent can orphan references
    /// that target the referent itself. Detached subtrees stay alive;
    /// [`restore`](Self::restore) puts everything back.
    pub fn remove(&mut self, node: NodeId) -> Result<Removal, StructuralError> {
        let n = self.node_opt(node).ok_or(StructuralError::Dead(node))?;
        if n.fixed {
            return Err(StructuralError::Fixed(node));
        }
        if n.parent.is_none() {
            return Err(StructuralError::NotAttached(node));
        }
        let doomed = self.referents_to_delete(node);
        if let Some(fixed) = doomed.iter().find(|r| self.is_fixed(**r)) {
            return Err(StructuralError::Fixed(*fixed));
        }
        // A referent root cannot be detached, so nothing may be.
        if let Some(root) = doomed.iter().find(|r| self.parent(**r).is_none()) {
            return Err(StructuralError::NotAttached(*root));
        }
        let mut cascade = Vec::with_capacity(doomed.len());
        for referent in doomed {
            cascade.push((referent, self.detach(referent)?));
        }
        let placement = self.detach(node)?;
        tracing::debug!(?node, cascade = cascade.len(), "remove");
        Ok(Removal {
            node,
            placement,
            cascade,
        })
    }

    /// Re-attach everything a [`Removal`] detached, in reverse order.
    pub(crate) fn restore(&mut self, removal: &Removal) -> Result<(), StructuralError> {
        for id in removal.detached() {
            let n = self.node_opt(id).ok_or(StructuralError::Dead(id))?;
            if n.parent.is_some() {
                return Err(StructuralError::AlreadyAttached(id));
            }
        }
        self.relocate_detached(removal.node, removal.placement)?;
        for (referent, placement) in removal.cascade.iter().rev() {
            self.relocate_detached(*referent, *placement)?;
        }
        tracing::debug!(node = ?removal.node, "restore");
        Ok(())
    }

    /// Referents outside `node`'s subtree that must go when it goes, in detach order.
    ///
    /// The result can hold the root of `node`'s tree when the root is itself a
    /// referent; [`remove`](Self::remove) refuses that case.
    pub fn referents_to_delete(&self, node: NodeId) -> Vec<NodeId> {
        let root = self.root_of(node);
        let mut doomed = vec![node];
        let mut cascade = Vec::new();
        let mut i = 0;
        while i < doomed.len() {
            let current = doomed[i];
            i += 1;
            for member in self.descendants(current) {
                for reference in &self.node(member).referrers {
                    let Some(referent) = self.parent(*reference) else {
                        continue;
                    };
                    // Referents in other (detached) trees belong to someone's undo state.
                    if self.root_of(referent) != root {
                        continue;
                    }
                    if doomed
                        .iter()
                        .any(|d| *d == referent || self.is_ancestor(*d, referent))
                    {
                        continue;
                    }
                    doomed.push(referent);
                    cascade.push(referent);
                }
            }
        }
        cascade
    }

    /// Free an unattached subtree. Its ids become stale.
    ///
    /// References elsewhere that still target a freed node are cleared.
    pub fn destroy(&mut self, node: NodeId) -> Result<(), StructuralError> {
        let n = self.node_opt(node).ok_or(StructuralError::Dead(node))?;
        if n.parent.is_some() {
            return Err(StructuralError::AlreadyAttached(node));
        }
        let members = self.descendants(node);
        for member in &members {
            if let Some(target) = self.node(*member).target
                && let Some(t) = self.node_opt_mut(target)
            {
                t.referrers.retain(|r| r != member);
            }
            let referrers = core::mem::take(&mut self.node_mut(*member).referrers);
            for reference in referrers {
                if let Some(r) = self.node_opt_mut(reference) {
                    r.target = None;
                }
            }
        }
        for member in &members {
            self.nodes[member.idx()] = None;
            self.free_list.push(member.idx());
        }
        self.epoch = fresh_stamp();
        tracing::debug!(?node, freed = members.len(), "destroy");
        Ok(())
    }

    /// Take an attached node out of its parent without any policy checks.
    pub(crate) fn detach(&mut self, node: NodeId) -> Result<Placement, StructuralError> {
        let n = self.node_opt(node).ok_or(StructuralError::Dead(node))?;
        let parent = n.parent.ok_or(StructuralError::NotAttached(node))?;
        let siblings = &mut self.node_mut(parent).children;
        let index = siblings
            .iter()
            .position(|c| *c == node)
            .expect("child listed under its parent");
        siblings.remove(index);
        self.node_mut(node).parent = None;
        self.epoch = fresh_stamp();
        self.invalidate_structure(parent, node);
        Ok(Placement { parent, index })
    }

    /// Put a node at `placement` without policy checks (undo path).
    pub(crate) fn relocate(
        &mut self,
        node: NodeId,
        placement: Placement,
    ) -> Result<(), StructuralError> {
        if self.parent(node).is_some() {
            self.detach(node)?;
        }
        self.relocate_detached(node, placement)
    }

    fn relocate_detached(
        &mut self,
        node: NodeId,
        placement: Placement,
    ) -> Result<(), StructuralError> {
        if !self.is_alive(placement.parent) {
            return Err(StructuralError::Dead(placement.parent));
        }
        let len = self.children(placement.parent).len();
        if placement.index > len {
            return Err(StructuralError::IndexOutOfRange {
                index: placement.index,
                len,
            });
        }
        self.attach(node, placement.parent, placement.index);
        Ok(())
    }

    fn attach(&mut self, node: NodeId, parent: NodeId, index: usize) {
        self.node_mut(parent).children.insert(index, node);
        self.node_mut(node).parent = Some(parent);
        self.epoch = fresh_stamp();
        self.invalidate_structure(parent, node);
    }

    /// Validate putting `node` under `parent`, returning the resolved index.
    fn check_placement(
        &self,
        node: NodeId,
        parent: NodeId,
        index: Option<usize>,
    ) -> Result<usize, StructuralError> {
        let p = self.node_opt(parent).ok_or(StructuralError::Dead(parent))?;
        let n = self.node(node);
        if node == parent || self.is_ancestor(node, parent) {
            return Err(StructuralError::Cycle { node, parent });
        }
        if !p.class.accepts(n.class) {
            return Err(StructuralError::Rejected {
                parent,
                child: node,
            });
        }
        if let Some(target) = n.target {
            let required = p.class.target_requires;
            if !self.capabilities(target).contains(required) || target == parent {
                return Err(StructuralError::Rejected {
                    parent,
                    child: node,
                });
            }
        }
        let len = p.children.len() - usize::from(n.parent == Some(parent));
        let index = index.unwrap_or(len);
        if index > len {
            return Err(StructuralError::IndexOutOfRange { index, len });
        }
        Ok(index)
    }

    // --- references ---

    /// Target of a reference node.
    pub fn target(&self, reference: NodeId) -> Option<NodeId> {
        self.node_opt(reference).and_then(|n| n.target)
    }

    /// Targets of a referent's reference children, in child order.
    pub fn targets(&self, referent: NodeId) -> Vec<NodeId> {
        self.children(referent)
            .iter()
            .filter_map(|r| self.target(*r))
            .collect()
    }

    /// References currently pointing at `node`.
    pub fn referrers(&self, node: NodeId) -> &[NodeId] {
        self.node_opt(node)
            .map_or(&[], |n| n.referrers.as_slice())
    }

    /// Point a reference at `target` (or clear it), returning the previous target.
    ///
    /// The target must be alive, must not be a reference, must not be the
    /// reference's own referent, and must carry the capabilities the referent's
    /// class requires.
    pub fn set_target(
        &mut self,
        reference: NodeId,
        target: Option<NodeId>,
    ) -> Result<Option<NodeId>, ReferenceTargetError> {
        let n = self
            .node_opt(reference)
            .ok_or(ReferenceTargetError::Dead(reference))?;
        if !n.class.has(Capabilities::REFERENCE) {
            return Err(ReferenceTargetError::NotAReference(reference));
        }
        let referent = n.parent;
        if let Some(t) = target {
            let tn = self.node_opt(t).ok_or(ReferenceTargetError::Dead(t))?;
            if t == reference || Some(t) == referent {
                return Err(ReferenceTargetError::SelfReference(reference));
            }
            let required = referent.map_or(Capabilities::empty(), |r| {
                self.node(r).class.target_requires
            });
            if tn.class.has(Capabilities::REFERENCE) || !tn.class.has(required) {
                return Err(ReferenceTargetError::Incompatible {
                    reference,
                    target: t,
                });
            }
        }
        let old = core::mem::replace(&mut self.node_mut(reference).target, target);
        if let Some(o) = old
            && let Some(on) = self.node_opt_mut(o)
        {
            on.referrers.retain(|r| *r != reference);
        }
        if let Some(t) = target {
            self.node_mut(t).referrers.push(reference);
        }
        if let Some(r) = referent {
            self.invalidate_draw(r);
        }
        tracing::trace!(?reference, ?target, "set target");
        Ok(old)
    }

    // --- properties and transformations ---

    /// Read a property.
    pub fn property(&self, id: NodeId, property: PropertyId) -> Result<PropertyValue, PropertyError> {
        let n = self.node_opt(id).ok_or(PropertyError::Dead(id))?;
        match property {
            PropertyId::Name => Ok(PropertyValue::Text(n.name.clone())),
            PropertyId::Visible => Ok(PropertyValue::Bool(n.visible)),
            PropertyId::Fixed => Ok(PropertyValue::Bool(n.fixed)),
            _ => n
                .properties
                .iter()
                .find(|(p, _)| *p == property)
                .map(|(_, v)| v.clone())
                .ok_or(PropertyError::Unknown {
                    class: n.class.name,
                    property,
                }),
        }
    }

    /// Write a property, returning the previous value.
    pub fn set_property(
        &mut self,
        id: NodeId,
        property: PropertyId,
        value: PropertyValue,
    ) -> Result<PropertyValue, PropertyError> {
        let n = self.node_opt_mut(id).ok_or(PropertyError::Dead(id))?;
        if !n.class.has_property(property) {
            return Err(PropertyError::Unknown {
                class: n.class.name,
                property,
            });
        }
        if value.kind() != property.kind() {
            return Err(PropertyError::KindMismatch {
                property,
                expected: property.kind(),
                found: value.kind(),
            });
        }
        let old = match (property, value) {
            (PropertyId::Name, PropertyValue::Text(s)) => {
                PropertyValue::Text(core::mem::replace(&mut n.name, s))
            }
            (PropertyId::Visible, PropertyValue::Bool(b)) => {
                PropertyValue::Bool(core::mem::replace(&mut n.visible, b))
            }
            (PropertyId::Fixed, PropertyValue::Bool(b)) => {
                PropertyValue::Bool(core::mem::replace(&mut n.fixed, b))
            }
            (property, value) => {
                let class = n.class.name;
                let slot = n
                    .properties
                    .iter_mut()
                    .find(|(p, _)| *p == property)
                    .ok_or(PropertyError::Unknown { class, property })?;
                core::mem::replace(&mut slot.1, value)
            }
        };
        if property == PropertyId::Fixed {
            self.epoch = fresh_stamp();
        }
        if property.affects_draw() {
            self.invalidate_draw(id);
        }
        Ok(old)
    }

    /// Replace a node's local transformation, returning the previous one.
    pub fn set_transformation(
        &mut self,
        id: NodeId,
        transformation: Transformation,
    ) -> Result<Transformation, StructuralError> {
        let n = self.node_opt_mut(id).ok_or(StructuralError::Dead(id))?;
        let slot = n
            .transformation
            .as_mut()
            .ok_or(StructuralError::NotTransformable(id))?;
        let old = core::mem::replace(slot, transformation);
        self.invalidate_transform(id);
        Ok(old)
    }

    /// Combine `t` with a node's local transformation on the given side.
    ///
    /// Returns the new local transformation.
    pub fn apply_transform(
        &mut self,
        id: NodeId,
        t: &Transformation,
        side: Side,
    ) -> Result<Transformation, StructuralError> {
        let old = self
            .node_opt(id)
            .ok_or(StructuralError::Dead(id))?
            .transformation
            .ok_or(StructuralError::NotTransformable(id))?;
        let new = match side {
            Side::Before => old.compose(t),
            Side::After => t.compose(&old),
        };
        self.set_transformation(id, new)?;
        Ok(new)
    }

    // --- internals ---

    /// Access a node; panics if `id` is stale.
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.idx()].as_ref().expect("dangling NodeId")
    }

    /// Access a node mutably; panics if `id` is stale.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.idx()].as_mut().expect("dangling NodeId")
    }

    pub(crate) fn node_opt(&self, id: NodeId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    pub(crate) fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ATOM, BOND, FRAME, NodeClass, REFERENCE, UNIVERSE};
    use glam::DVec3;

    static LINK: NodeClass = NodeClass {
        name: "Link",
        capabilities: Capabilities::REFERENT,
        properties: &[],
        target_requires: Capabilities::empty(),
    };

    static LINK_BOX: NodeClass = NodeClass {
        name: "LinkBox",
        capabilities: Capabilities::REFERENT.union(Capabilities::CONTAINER),
        properties: &[],
        target_requires: Capabilities::empty(),
    };

    fn universe(tree: &mut Tree) -> NodeId {
        tree.create(&UNIVERSE, NodeInit::named("universe").fixed())
    }

    fn child(tree: &mut Tree, class: &'static NodeClass, parent: NodeId, name: &str) -> NodeId {
        let id = tree.create(class, NodeInit::named(name));
        tree.add(id, parent, None).unwrap();
        id
    }

    fn link(tree: &mut Tree, class: &'static NodeClass, parent: NodeId, targets: &[NodeId]) -> NodeId {
        let referent = child(tree, class, parent, "link");
        for t in targets {
            let r = tree.create(&REFERENCE, NodeInit::default());
            tree.add(r, referent, None).unwrap();
            tree.set_target(r, Some(*t)).unwrap();
        }
        referent
    }

    #[test]
    fn add_inserts_at_index_and_sets_parent() {
        let mut tree = Tree::new();
        let root = universe(&mut tree);
        let a = child(&mut tree, &FRAME, root, "a");
        let c = child(&mut tree, &FRAME, root, "c");
        let b = tree.create(&FRAME, NodeInit::named("b"));
        tree.add(b, root, Some(1)).unwrap();
        assert_eq!(tree.children(root), &[a, b, c]);
        assert_eq!(tree.parent(b), Some(root));
        assert_eq!(tree.index_of(b), Some(1));
        assert_eq!(tree.add(b, root, None), Err(StructuralError::AlreadyAttached(b)));
        let d = tree.create(&FRAME, NodeInit::default());
        assert_eq!(
            tree.add(d, root, Some(9)),
            Err(StructuralError::IndexOutOfRange { index: 9, len: 3 })
        );
        assert_eq!(tree.parent(d), None);
    }

    #[test]
    fn kinds_are_checked() {
        let mut tree = Tree::new();
        let root = universe(&mut tree);
        let atom = child(&mut tree, &ATOM, root, "C");
        let r = tree.create(&REFERENCE, NodeInit::default());
        assert_eq!(
            tree.add(r, root, None),
            Err(StructuralError::Rejected { parent: root, child: r })
        );
        let bond = child(&mut tree, &BOND, root, "bond");
        let x = tree.create(&ATOM, NodeInit::default());
        assert!(matches!(tree.add(x, bond, None), Err(StructuralError::Rejected { .. })));
        assert!(matches!(tree.add(x, atom, None), Err(StructuralError::Rejected { .. })));
        tree.add(r, bond, None).unwrap();
        assert_eq!(tree.set_target(r, Some(atom)), Ok(None));
        assert_eq!(tree.referrers(atom), &[r]);
        assert_eq!(tree.targets(bond), [atom]);
    }

    #[test]
    fn reference_targets_are_validated() {
        let mut tree = Tree::new();
        let root = universe(&mut tree);
        let frame = child(&mut tree, &FRAME, root, "frame");
        let folder = child(&mut tree, &crate::class::FOLDER, root, "folder");
        let bond = link(&mut tree, &BOND, root, &[frame]);
        let r = tree.children(bond)[0];
        assert_eq!(
            tree.set_target(r, Some(folder)),
            Err(ReferenceTargetError::Incompatible { reference: r, target: folder }),
            "bonds need transformable targets"
        );
        assert_eq!(tree.set_target(r, Some(r)), Err(ReferenceTargetError::SelfReference(r)));
        assert_eq!(tree.set_target(r, Some(bond)), Err(ReferenceTargetError::SelfReference(r)));
        assert_eq!(tree.set_target(frame, Some(root)), Err(ReferenceTargetError::NotAReference(frame)));
        assert_eq!(tree.target(r), Some(frame), "failed assignments change nothing");
        assert_eq!(tree.set_target(r, None), Ok(Some(frame)));
        assert!(tree.referrers(frame).is_empty());
    }

    #[test]
    fn cycles_are_rejected() {
        let mut tree = Tree::new();
        let root = universe(&mut tree);
        let a = child(&mut tree, &FRAME, root, "a");
        let b = child(&mut tree, &FRAME, a, "b");
        assert_eq!(tree.move_node(a, b, None), Err(StructuralError::Cycle { node: a, parent: b }));
        assert_eq!(tree.move_node(a, a, None), Err(StructuralError::Cycle { node: a, parent: a }));
        assert_eq!(tree.parent(a), Some(root));
    }

    #[test]
    fn fixed_remove_leaves_tree_unchanged() {
        let mut tree = Tree::new();
        let root = universe(&mut tree);
        let a = child(&mut tree, &FRAME, root, "a");
        let pinned = tree.create(&ATOM, NodeInit::named("pinned").fixed());
        tree.add(pinned, a, None).unwrap();
        let b = child(&mut tree, &ATOM, a, "b");
        let before: Vec<_> = tree.ids().map(|id| (id, tree.parent(id), tree.children(id).to_vec())).collect();
        let epoch = tree.epoch();

        assert_eq!(tree.remove(pinned), Err(StructuralError::Fixed(pinned)));
        assert_eq!(tree.move_node(pinned, root, None), Err(StructuralError::Fixed(pinned)));

        let after: Vec<_> = tree.ids().map(|id| (id, tree.parent(id), tree.children(id).to_vec())).collect();
        assert_eq!(before, after);
        assert_eq!(tree.children(a), &[pinned, b]);
        assert_eq!(tree.epoch(), epoch);
    }

    #[test]
    fn move_and_move_back_restores_order() {
        let mut tree = Tree::new();
        let root = universe(&mut tree);
        let p = child(&mut tree, &FRAME, root, "p");
        let q = child(&mut tree, &FRAME, root, "q");
        let kids: Vec<_> = (0..4).map(|i| child(&mut tree, &ATOM, p, if i % 2 == 0 { "even" } else { "odd" })).collect();
        let original = tree.children(p).to_vec();

        let old = tree.move_node(kids[1], q, Some(0)).unwrap();
        assert_eq!(old, Placement { parent: p, index: 1 });
        assert_eq!(tree.children(q), &[kids[1]]);
        tree.move_node(kids[1], old.parent, Some(old.index)).unwrap();
        assert_eq!(tree.children(p), original.as_slice());

        // Within the same parent the index counts without the moved node.
        let old = tree.move_node(kids[0], p, Some(3)).unwrap();
        assert_eq!(tree.children(p), &[kids[1], kids[2], kids[3], kids[0]]);
        tree.move_node(kids[0], p, Some(old.index)).unwrap();
        assert_eq!(tree.children(p), original.as_slice());
    }

    #[test]
    fn move_preserves_reference_targets() {
        let mut tree = Tree::new();
        let root = universe(&mut tree);
        let f = child(&mut tree, &FRAME, root, "f");
        let a = child(&mut tree, &ATOM, root, "a");
        let b = child(&mut tree, &ATOM, root, "b");
        let bond = link(&mut tree, &BOND, root, &[a, b]);
        tree.move_node(a, f, None).unwrap();
        tree.move_node(bond, f, None).unwrap();
        assert_eq!(tree.targets(bond), [a, b]);
    }

    #[test]
    fn delete_cascades_through_referents() {
        let mut tree = Tree::new();
        let root = universe(&mut tree);
        let frame = child(&mut tree, &FRAME, root, "frame");
        let atom = child(&mut tree, &ATOM, frame, "atom");
        let r1 = link(&mut tree, &LINK, root, &[atom]);
        let r2 = link(&mut tree, &LINK, root, &[r1]);
        let bystander = link(&mut tree, &LINK, root, &[root]);

        assert_eq!(tree.referents_to_delete(frame), [r1, r2]);
        let removal = tree.remove(frame).unwrap();
        assert_eq!(removal.cascade.len(), 2);
        assert_eq!(tree.children(root), &[bystander]);
        assert!(tree.is_alive(r1) && tree.is_alive(r2), "detached, not freed");

        tree.restore(&removal).unwrap();
        assert_eq!(tree.children(root), &[frame, r1, r2, bystander]);
        assert_eq!(tree.targets(r2), [r1]);
    }

    #[test]
    fn delete_cascades_through_referent_contents() {
        let mut tree = Tree::new();
        let root = universe(&mut tree);
        let x = child(&mut tree, &ATOM, root, "x");
        let r1 = link(&mut tree, &LINK_BOX, root, &[x]);
        let inner = child(&mut tree, &ATOM, r1, "inner");
        let r2 = link(&mut tree, &LINK, root, &[inner]);

        let removal = tree.remove(x).unwrap();
        let cascade: Vec<_> = removal.cascade.iter().map(|(id, _)| *id).collect();
        assert_eq!(cascade, [r1, r2]);
        assert!(tree.children(root).is_empty());
        assert_eq!(tree.parent(inner), Some(r1), "contents travel with their container");

        tree.restore(&removal).unwrap();
        assert_eq!(tree.children(root), &[x, r1, r2]);
    }

    #[test]
    fn remove_refuses_to_cascade_into_the_root() {
        let mut tree = Tree::new();
        let root = tree.create(&LINK_BOX, NodeInit::named("root"));
        let x = child(&mut tree, &ATOM, root, "x");
        let inner = link(&mut tree, &LINK_BOX, root, &[x]);
        let r = tree.create(&REFERENCE, NodeInit::default());
        tree.add(r, root, None).unwrap();
        tree.set_target(r, Some(x)).unwrap();
        assert_eq!(tree.referents_to_delete(x), [inner, root]);

        let epoch = tree.epoch();
        assert_eq!(tree.remove(x), Err(StructuralError::NotAttached(root)));
        assert_eq!(tree.children(root), &[x, inner, r]);
        assert_eq!(tree.parent(inner), Some(root));
        assert_eq!(tree.epoch(), epoch);
    }

    #[test]
    fn detached_referents_do_not_cascade() {
        let mut tree = Tree::new();
        let root = universe(&mut tree);
        let a = child(&mut tree, &ATOM, root, "a");
        let b = child(&mut tree, &ATOM, root, "b");
        let bond = link(&mut tree, &BOND, root, &[a, b]);
        let first = tree.remove(bond).unwrap();
        assert!(first.cascade.is_empty());
        // The detached bond still targets `a`, but it is someone else's undo state.
        let second = tree.remove(a).unwrap();
        assert!(second.cascade.is_empty());
        assert_eq!(tree.parent(bond), None);
        assert_eq!(tree.children(bond).len(), 2);
    }

    #[test]
    fn common_ancestor_and_trace() {
        let mut tree = Tree::new();
        let root = universe(&mut tree);
        let a = child(&mut tree, &FRAME, root, "a");
        let b = child(&mut tree, &ATOM, a, "b");
        let c = child(&mut tree, &FRAME, root, "c");
        let d = child(&mut tree, &ATOM, c, "d");
        assert_eq!(tree.trace(b), [b, a, root]);
        assert_eq!(tree.depth(b), Some(2));
        assert_eq!(tree.common_ancestor(&[b, d]), Some(root));
        assert_eq!(tree.common_ancestor(&[a, b]), Some(a));
        assert_eq!(tree.common_ancestor(&[d]), Some(d));
        assert_eq!(tree.common_ancestor(&[]), None);

        let other_root = universe(&mut tree);
        let e = child(&mut tree, &ATOM, other_root, "e");
        assert_eq!(tree.common_ancestor(&[b, e]), None);
        assert_eq!(tree.root_of(e), Some(other_root));
    }

    #[test]
    fn bridge_excludes_endpoints() {
        let mut tree = Tree::new();
        let root = universe(&mut tree);
        let a = child(&mut tree, &FRAME, root, "a");
        let b = child(&mut tree, &FRAME, a, "b");
        let c = child(&mut tree, &FRAME, a, "c");
        let d = child(&mut tree, &ATOM, c, "d");
        assert_eq!(tree.bridge(b, d), Some(vec![a, c]));
        assert_eq!(tree.bridge(d, b), Some(vec![c, a]));
        assert_eq!(tree.bridge(b, root), Some(vec![a]));
        assert_eq!(tree.bridge(root, d), Some(vec![a, c]));
        assert_eq!(tree.bridge(b, c), Some(vec![a]));
        assert_eq!(tree.bridge(b, b), Some(vec![]));
        let stray = tree.create(&FRAME, NodeInit::default());
        assert_eq!(tree.bridge(b, stray), None);
    }

    #[test]
    fn destroy_frees_and_unlinks() {
        let mut tree = Tree::new();
        let root = universe(&mut tree);
        let a = child(&mut tree, &ATOM, root, "a");
        let b = child(&mut tree, &ATOM, root, "b");
        let bond = link(&mut tree, &BOND, root, &[a, b]);
        let refs = tree.children(bond).to_vec();
        assert_eq!(tree.destroy(bond), Err(StructuralError::AlreadyAttached(bond)));
        tree.remove(bond).unwrap();
        tree.destroy(bond).unwrap();
        assert!(!tree.is_alive(bond));
        assert!(refs.iter().all(|r| !tree.is_alive(*r)));
        assert!(tree.referrers(a).is_empty() && tree.referrers(b).is_empty());

        // Slot reuse yields a distinct id.
        let fresh = tree.create(&ATOM, NodeInit::default());
        assert!(tree.is_alive(fresh));
        assert!(!tree.is_alive(bond));
    }

    #[test]
    fn properties_are_typed() {
        let mut tree = Tree::new();
        let root = universe(&mut tree);
        let atom = child(&mut tree, &ATOM, root, "C");
        assert_eq!(tree.property(atom, PropertyId::Number), Ok(PropertyValue::Int(6)));
        assert_eq!(
            tree.set_property(atom, PropertyId::Number, PropertyValue::Int(8)),
            Ok(PropertyValue::Int(6))
        );
        assert_eq!(
            tree.set_property(atom, PropertyId::Radius, PropertyValue::Int(1)),
            Err(PropertyError::KindMismatch {
                property: PropertyId::Radius,
                expected: crate::class::ValueKind::Real,
                found: crate::class::ValueKind::Int,
            })
        );
        assert_eq!(
            tree.set_property(root, PropertyId::Radius, PropertyValue::Real(1.0)),
            Err(PropertyError::Unknown { class: "Universe", property: PropertyId::Radius })
        );
        tree.set_property(atom, PropertyId::Name, PropertyValue::Text("O".into())).unwrap();
        assert_eq!(tree.name(atom), Some("O"));
        let epoch = tree.epoch();
        tree.set_property(atom, PropertyId::Fixed, PropertyValue::Bool(true)).unwrap();
        assert!(tree.is_fixed(atom));
        assert!(tree.epoch() > epoch);
    }

    #[test]
    fn transforms_need_transformable_nodes() {
        let mut tree = Tree::new();
        let root = universe(&mut tree);
        let atom = child(&mut tree, &ATOM, root, "C");
        let shift = Transformation::translation(DVec3::X);
        assert_eq!(
            tree.apply_transform(root, &shift, Side::After),
            Err(StructuralError::NotTransformable(root))
        );
        tree.apply_transform(atom, &shift, Side::After).unwrap();
        let new = tree.apply_transform(atom, &shift, Side::Before).unwrap();
        assert_eq!(new, Transformation::translation(DVec3::new(2.0, 0.0, 0.0)));
    }
}
