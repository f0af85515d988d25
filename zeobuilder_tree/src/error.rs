// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! Every tree-mutating operation checks its preconditions before the first side
//! effect, so an `Err` always means the tree is unchanged.

use thiserror::Error;

use crate::class::{PropertyId, ValueKind};
use crate::primitive::PrimitiveState;
use crate::types::NodeId;

/// Illegal structural edit.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StructuralError {
    /// The identifier is stale.
    #[error("node {0:?} is not alive")]
    Dead(NodeId),
    /// The parent does not accept children of this kind.
    #[error("{parent:?} does not accept {child:?} as a child")]
    Rejected {
        /// Intended parent.
        parent: NodeId,
        /// Rejected child.
        child: NodeId,
    },
    /// The node already has a parent.
    #[error("node {0:?} already has a parent")]
    AlreadyAttached(NodeId),
    /// The node has no parent.
    #[error("node {0:?} is not attached to a parent")]
    NotAttached(NodeId),
    /// The node is fixed.
    #[error("node {0:?} is fixed")]
    Fixed(NodeId),
    /// The edit would make a node its own ancestor.
    #[error("placing {node:?} under {parent:?} would create a cycle")]
    Cycle {
        /// Node being placed.
        node: NodeId,
        /// Intended parent, inside the node's subtree.
        parent: NodeId,
    },
    /// Child index past the end.
    #[error("index {index} is out of range for {len} children")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of children available.
        len: usize,
    },
    /// The node carries no transformation.
    #[error("node {0:?} is not transformable")]
    NotTransformable(NodeId),
}

/// A coordinate frame could not be resolved.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The identifier is stale.
    #[error("node {0:?} is not alive")]
    Dead(NodeId),
    /// The two nodes live in different trees.
    #[error("{node:?} and {other:?} share no common frame")]
    NoCommonFrame {
        /// Node whose frame was requested.
        node: NodeId,
        /// Node the frame was requested relative to.
        other: NodeId,
    },
    /// The requested ancestor is not on the node's trace.
    #[error("{ancestor:?} is not an ancestor of {node:?}")]
    NotAnAncestor {
        /// Node whose frame was requested.
        node: NodeId,
        /// Claimed ancestor.
        ancestor: NodeId,
    },
}

/// A reference target failed validation on assignment.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ReferenceTargetError {
    /// The node does not hold a reference.
    #[error("node {0:?} is not a reference")]
    NotAReference(NodeId),
    /// The identifier is stale.
    #[error("node {0:?} is not alive")]
    Dead(NodeId),
    /// The target lacks capabilities the referent requires.
    #[error("{target:?} is not a valid target for {reference:?}")]
    Incompatible {
        /// Reference being assigned.
        reference: NodeId,
        /// Rejected target.
        target: NodeId,
    },
    /// A reference may not point at itself or its own referent.
    #[error("{0:?} cannot target itself or its referent")]
    SelfReference(NodeId),
}

/// A property could not be read or written.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PropertyError {
    /// The identifier is stale.
    #[error("node {0:?} is not alive")]
    Dead(NodeId),
    /// The class schema has no such property.
    #[error("class {class} has no property {property:?}")]
    Unknown {
        /// Class name.
        class: &'static str,
        /// Requested property.
        property: PropertyId,
    },
    /// The value has the wrong kind.
    #[error("property {property:?} expects {expected:?}, got {found:?}")]
    KindMismatch {
        /// Property being written.
        property: PropertyId,
        /// Kind required by the property.
        expected: ValueKind,
        /// Kind of the supplied value.
        found: ValueKind,
    },
}

/// A primitive could not be applied or reverted.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    /// The victim is fixed; nothing was changed.
    #[error("node {0:?} is fixed")]
    Fixed(NodeId),
    /// `undo`/`redo` called out of sequence. This is a programming error.
    #[error("cannot {operation} a primitive in state {state:?}")]
    OutOfSequence {
        /// `"undo"` or `"redo"`.
        operation: &'static str,
        /// State the primitive was in.
        state: PrimitiveState,
    },
    /// An already-applied primitive lacks the state needed to revert it.
    #[error("{0} primitive is missing the state needed to revert it")]
    MissingPreState(&'static str),
    /// Structural failure.
    #[error(transparent)]
    Structural(#[from] StructuralError),
    /// Reference assignment failure.
    #[error(transparent)]
    Reference(#[from] ReferenceTargetError),
    /// Property failure.
    #[error(transparent)]
    Property(#[from] PropertyError),
}

/// Undo history misuse or a failed primitive.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// `begin` while an action is already being recorded.
    #[error("an action is already being recorded")]
    AlreadyRecording,
    /// `commit` without `begin`.
    #[error("no action is being recorded")]
    NotRecording,
    /// The undo stack is empty.
    #[error("nothing to undo")]
    NothingToUndo,
    /// The redo stack is empty.
    #[error("nothing to redo")]
    NothingToRedo,
    /// A primitive failed; the affected action was rolled back.
    #[error(transparent)]
    Primitive(#[from] PrimitiveError),
}
