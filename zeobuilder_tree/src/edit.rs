// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compound edits built from primitives.

use alloc::vec;
use alloc::vec::Vec;

use zeobuilder_transform::EPSILON;

use crate::error::FrameError;
use crate::primitive::Primitive;
use crate::tree::Tree;
use crate::types::{Capabilities, NodeId, Side};

/// Primitives that move `node` under `new_parent` without moving it in space.
///
/// The node's local transformation is corrected by the frame of the old parent
/// relative to the new one, so its absolute frame is unchanged. Non-transformable
/// nodes, unattached nodes, and moves between coinciding frames yield just the move.
pub fn move_keeping_frame(
    tree: &Tree,
    node: NodeId,
    new_parent: NodeId,
    index: Option<usize>,
) -> Result<Vec<Primitive>, FrameError> {
    let mut out = vec![Primitive::moved(node, new_parent, index)];
    let Some(old_parent) = tree.parent(node) else {
        return Ok(out);
    };
    if !tree.capabilities(node).contains(Capabilities::TRANSFORMABLE) {
        return Ok(out);
    }
    let delta = tree.frame_relative_to(old_parent, new_parent)?;
    if !delta.is_identity(EPSILON) {
        out.push(Primitive::transform(node, delta, Side::After));
    }
    Ok(out)
}
