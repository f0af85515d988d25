// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Zeobuilder Tree: the scene-graph core of a molecular model editor.
//!
//! - A mutable document [`Tree`] of nodes with typed capabilities: containers own
//!   structural children, referents own references that point at other nodes
//!   (a bond points at two atoms), transformable nodes carry a local
//!   [`Transformation`](zeobuilder_transform::Transformation).
//! - Coordinate frames composed on demand along tree paths: absolute, relative to an
//!   ancestor, or relative to any other node through the common ancestor.
//! - Per-node dirty flags for derived data (draw representation, bounds, cached
//!   frames), pulled and cleared by consumers, with an explicit flush that notifies
//!   registered listeners.
//! - Reversible [`Primitive`](primitive::Primitive) edits grouped into labeled
//!   actions by a bounded undo [`History`](history::History).
//!
//! ## Nodes and classes
//!
//! Every node is created from a static [`NodeClass`](class::NodeClass) that lists
//! its [`Capabilities`] and property schema. Nodes are addressed by generational
//! [`NodeId`]s. Removing a node only detaches it, so the undo history can restore
//! it later; slots are freed when the history lets go.
//!
//! Removing a node also removes, first, every referent left pointing into it,
//! transitively. Nodes marked fixed cannot be removed, moved, or transformed.
//!
//! ## Editing through primitives
//!
//! The tree's own mutators validate their input and fail before any side effect.
//! Editors should still go through primitives, which remember what they changed:
//!
//! ```
//! use glam::DVec3;
//! use zeobuilder_transform::{EPSILON, Transformation};
//! use zeobuilder_tree::class::{ATOM, BOND, FRAME, REFERENCE, UNIVERSE};
//! use zeobuilder_tree::history::History;
//! use zeobuilder_tree::primitive::Primitive;
//! use zeobuilder_tree::{NodeInit, Side, Tree};
//!
//! let mut tree = Tree::new();
//! let mut history = History::new();
//!
//! let root = tree.create(&UNIVERSE, NodeInit::named("universe").fixed());
//! let molecule = tree.create(&FRAME, NodeInit::named("water"));
//! let h = tree.create(&ATOM, NodeInit::named("H"));
//! let o = tree.create(
//!     &ATOM,
//!     NodeInit::named("O").with_transformation(Transformation::translation(DVec3::X)),
//! );
//! let bond = tree.create(&BOND, NodeInit::named("O-H"));
//! let ends = [tree.create(&REFERENCE, NodeInit::default()), tree.create(&REFERENCE, NodeInit::default())];
//!
//! history.begin("Build water").unwrap();
//! for p in [
//!     Primitive::add(molecule, root, None),
//!     Primitive::add(h, molecule, None),
//!     Primitive::add(o, molecule, None),
//!     Primitive::add(bond, molecule, None),
//!     Primitive::add(ends[0], bond, None),
//!     Primitive::add(ends[1], bond, None),
//!     Primitive::set_reference(ends[0], Some(h)),
//!     Primitive::set_reference(ends[1], Some(o)),
//! ] {
//!     history.record(&mut tree, p).unwrap();
//! }
//! history.commit(&mut tree).unwrap();
//!
//! // Move the whole molecule; the atoms keep their place inside it.
//! let lift = Transformation::translation(DVec3::Z);
//! history.record(&mut tree, Primitive::transform(molecule, lift, Side::After)).unwrap();
//! let o_pos = tree.absolute_frame(o).unwrap().t();
//! assert!(o_pos.abs_diff_eq(DVec3::new(1.0, 0.0, 1.0), EPSILON));
//!
//! // Deleting an atom takes the bond with it; undo brings both back.
//! history.record(&mut tree, Primitive::delete(h)).unwrap();
//! assert_eq!(tree.children(molecule), &[o]);
//! history.undo_last_action(&mut tree).unwrap();
//! assert_eq!(tree.children(molecule), &[h, o, bond]);
//! assert_eq!(tree.targets(bond), [h, o]);
//! ```
//!
//! ## Invalidation
//!
//! Mutations mark dirty flags synchronously, so every query after a primitive sees
//! a consistent tree. Renderers pull: [`Tree::validate_draw`], [`Tree::bounds`],
//! and [`Tree::world_frame`] recompute what is stale and clear the flags. Listeners
//! registered with [`Tree::subscribe`] receive coalesced notifications when the
//! host calls [`Tree::flush_invalidations`].
//!
//! ## Selection
//!
//! [`selection::SelectionCache`] memoizes facts about a [`selection::Selection`]
//! (parents, child indices, whether any node is fixed) until the selection or the
//! tree structure changes.
//!
//! ## Features
//!
//! - `std` (default): enables `std` in Glam and the error and logging crates.
//! - `libm`: Glam math through `libm` for `no_std` builds.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod binning;
pub mod class;
mod dirty;
pub mod edit;
pub mod error;
mod frame;
pub mod history;
pub mod primitive;
pub mod selection;
mod tree;
mod types;

pub use dirty::{InvalidationListener, ListenerId};
pub use error::{
    FrameError, HistoryError, PrimitiveError, PropertyError, ReferenceTargetError, StructuralError,
};
pub use frame::FrameResolver;
pub use tree::{Removal, Tree};
pub use types::{Capabilities, Dirty, NodeId, NodeInit, Placement, Side};
