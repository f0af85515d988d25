// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the scene tree: node identifiers, capability and dirty flags,
//! placements, and node construction parameters.

use alloc::string::String;
use core::sync::atomic::{AtomicU64, Ordering};

use zeobuilder_transform::Transformation;

static NEXT_STAMP: AtomicU64 = AtomicU64::new(1);

/// A nonzero value never handed out before, shared by tree epochs and selection
/// generations so that equal stamps always mean the same state.
pub(crate) fn fresh_stamp() -> u64 {
    NEXT_STAMP.fetch_add(1, Ordering::Relaxed)
}

/// Identifier for a node in the tree.
///
/// This is a small, copyable handle that stays stable across updates but becomes
/// invalid when the underlying slot is reused.
/// It consists of a slot index and a generation counter.
///
/// ## Semantics
///
/// - On create, a fresh slot is allocated with generation `1`.
/// - On [`destroy`](crate::Tree::destroy), the slot is freed; any existing `NodeId`
///   that pointed to that slot is now stale.
/// - On reuse of a freed slot, its generation is incremented, producing a new, distinct `NodeId`.
///
/// Removing a node from its parent does not free it: detached subtrees stay alive so
/// that undo can put them back.
///
/// Use [`Tree::is_alive`](crate::Tree::is_alive) to check whether a `NodeId` still refers
/// to a live node. Stale `NodeId`s never alias a different live node because the
/// generation must match.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Orthogonal capabilities a node class can combine.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Owns ordered structural children.
        const CONTAINER     = 0b0000_0001;
        /// Owns ordered [`REFERENCE`](Self::REFERENCE) children pointing elsewhere.
        const REFERENT      = 0b0000_0010;
        /// Carries a local transformation relative to its parent.
        const TRANSFORMABLE = 0b0000_0100;
        /// Holds a non-owning pointer to a target node.
        const REFERENCE     = 0b0000_1000;
    }
}

bitflags::bitflags! {
    /// Per-node invalidation flags for derived data.
    ///
    /// A set flag means the cached value is stale and must be recomputed by the
    /// next consumer that pulls it.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Dirty: u8 {
        /// The node's own draw representation.
        const DRAW   = 0b0000_0001;
        /// The node's bounding box in its own frame.
        const BOUNDS = 0b0000_0010;
        /// The node's cached absolute frame.
        const FRAME  = 0b0000_0100;
    }
}

/// Where a transformation is applied relative to a node's current local transformation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Side {
    /// `new = old ∘ t`: `t` acts in the node's own frame, before the existing transformation.
    Before,
    /// `new = t ∘ old`: `t` acts in the parent frame, after the existing transformation.
    After,
}

/// Position of a node among its parent's children.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Placement {
    /// The parent node.
    pub parent: NodeId,
    /// Index among the parent's children.
    pub index: usize,
}

/// Construction parameters for a node.
#[derive(Clone, Debug)]
pub struct NodeInit {
    /// Display name.
    pub name: String,
    /// Local transformation; ignored unless the class is transformable.
    pub transformation: Transformation,
    /// Fixed nodes cannot be deleted, moved, or transformed by primitives.
    pub fixed: bool,
    /// Whether the node is drawn and contributes to its parent's bounds.
    pub visible: bool,
}

impl Default for NodeInit {
    fn default() -> Self {
        Self {
            name: String::new(),
            transformation: Transformation::IDENTITY,
            fixed: false,
            visible: true,
        }
    }
}

impl NodeInit {
    /// Parameters with the given name and defaults otherwise.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style local transformation.
    #[must_use]
    pub fn with_transformation(mut self, transformation: Transformation) -> Self {
        self.transformation = transformation;
        self
    }

    /// Builder-style fixed flag.
    #[must_use]
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }
}
