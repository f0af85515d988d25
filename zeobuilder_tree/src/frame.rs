// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coordinate frames: composing local transformations along tree paths.
//!
//! A node's local transformation maps its own coordinates into its parent's. The
//! frame of a node relative to an ancestor is the composition of the local
//! transformations on the path between them, innermost applied first. Nodes that
//! are not transformable contribute the identity.
//!
//! For one-off queries use [`Tree::frame_up_to`], [`Tree::absolute_frame`], or
//! [`Tree::frame_relative_to`]. To measure many nodes against the same ancestor,
//! use a [`FrameResolver`], which memoizes every intermediate frame it composes.
//! [`Tree::world_frame`] keeps a per-node cache that is invalidated through the
//! `FRAME` dirty flag.

use alloc::vec::Vec;

use glam::DVec3;
use zeobuilder_transform::Transformation;

use crate::error::FrameError;
use crate::tree::Tree;
use crate::types::{Dirty, NodeId};

impl Tree {
    /// Frame of `node` relative to `ancestor`: maps `node` coordinates to `ancestor` coordinates.
    ///
    /// The identity when `node == ancestor`.
    pub fn frame_up_to(
        &self,
        node: NodeId,
        ancestor: NodeId,
    ) -> Result<Transformation, FrameError> {
        if !self.is_alive(node) {
            return Err(FrameError::Dead(node));
        }
        let mut acc = Transformation::IDENTITY;
        let mut cur = node;
        while cur != ancestor {
            acc = self.local(cur).compose(&acc);
            cur = self
                .parent(cur)
                .ok_or(FrameError::NotAnAncestor { node, ancestor })?;
        }
        Ok(acc)
    }

    /// Frame of `node` relative to the outside of its root, including the root's own
    /// transformation.
    pub fn absolute_frame(&self, node: NodeId) -> Result<Transformation, FrameError> {
        if !self.is_alive(node) {
            return Err(FrameError::Dead(node));
        }
        let mut acc = Transformation::IDENTITY;
        let mut cur = Some(node);
        while let Some(n) = cur {
            acc = self.local(n).compose(&acc);
            cur = self.parent(n);
        }
        Ok(acc)
    }

    /// Frame of `node` relative to `other`: maps `node` coordinates to `other` coordinates.
    ///
    /// Goes through the common ancestor, so only the two paths below it are composed.
    /// For any such pair, `frame_relative_to(a, b) ∘ frame_relative_to(b, a)` is the identity.
    pub fn frame_relative_to(
        &self,
        node: NodeId,
        other: NodeId,
    ) -> Result<Transformation, FrameError> {
        if !self.is_alive(node) {
            return Err(FrameError::Dead(node));
        }
        if !self.is_alive(other) {
            return Err(FrameError::Dead(other));
        }
        let common = self
            .common_ancestor(&[node, other])
            .ok_or(FrameError::NoCommonFrame { node, other })?;
        let up = self.frame_up_to(node, common)?;
        let down = self.frame_up_to(other, common)?;
        Ok(down.inverse().compose(&up))
    }

    /// Position of `node`'s origin in `other`'s coordinates.
    pub fn position_relative_to(&self, node: NodeId, other: NodeId) -> Result<DVec3, FrameError> {
        Ok(self.frame_relative_to(node, other)?.t())
    }

    /// Resolver for frames relative to `ancestor`.
    pub fn resolver(&self, ancestor: NodeId) -> FrameResolver<'_> {
        FrameResolver {
            tree: self,
            ancestor,
            memo: Vec::new(),
        }
    }

    /// Cached absolute frame of `node`.
    ///
    /// Recomputes only the stale part of the path, clearing `FRAME` on every node it
    /// refreshes.
    pub fn world_frame(&mut self, node: NodeId) -> Result<Transformation, FrameError> {
        if !self.is_alive(node) {
            return Err(FrameError::Dead(node));
        }
        let mut stale = Vec::new();
        let mut cur = Some(node);
        let mut base = Transformation::IDENTITY;
        while let Some(n) = cur {
            let state = self.node(n);
            if !state.dirty.contains(Dirty::FRAME) {
                base = state.world;
                break;
            }
            stale.push(n);
            cur = state.parent;
        }
        for n in stale.into_iter().rev() {
            base = base.compose(&self.local(n));
            let state = self.node_mut(n);
            state.world = base;
            state.dirty.remove(Dirty::FRAME);
        }
        Ok(base)
    }
}

/// Memoizing frame computation against a fixed ancestor.
///
/// Every frame composed on the way to a node is remembered, so resolving all atoms
/// of a molecule costs one composition per node instead of one per path edge.
/// The resolver borrows the tree; structural edits end its lifetime.
#[derive(Debug)]
pub struct FrameResolver<'a> {
    tree: &'a Tree,
    ancestor: NodeId,
    memo: Vec<Option<Transformation>>,
}

impl FrameResolver<'_> {
    /// The ancestor frames are expressed in.
    pub fn ancestor(&self) -> NodeId {
        self.ancestor
    }

    /// Frame of `node` relative to the resolver's ancestor.
    pub fn frame(&mut self, node: NodeId) -> Result<Transformation, FrameError> {
        if !self.tree.is_alive(node) {
            return Err(FrameError::Dead(node));
        }
        let mut path = Vec::new();
        let mut cur = node;
        let mut acc = loop {
            if cur == self.ancestor {
                break Transformation::IDENTITY;
            }
            if let Some(known) = self.memo.get(cur.idx()).copied().flatten() {
                break known;
            }
            path.push(cur);
            cur = self.tree.parent(cur).ok_or(FrameError::NotAnAncestor {
                node,
                ancestor: self.ancestor,
            })?;
        };
        for n in path.into_iter().rev() {
            acc = acc.compose(&self.tree.local(n));
            if self.memo.len() <= n.idx() {
                self.memo.resize(n.idx() + 1, None);
            }
            self.memo[n.idx()] = Some(acc);
        }
        Ok(acc)
    }

    /// Frame of `node` relative to `other`, both below the resolver's ancestor.
    pub fn relative(&mut self, node: NodeId, other: NodeId) -> Result<Transformation, FrameError> {
        let up = self.frame(node)?;
        let down = self.frame(other)?;
        Ok(down.inverse().compose(&up))
    }

    /// Position of `node`'s origin in the ancestor's coordinates.
    pub fn position(&mut self, node: NodeId) -> Result<DVec3, FrameError> {
        Ok(self.frame(node)?.t())
    }
}
