// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitives: the smallest reversible edits of a [`Tree`].
//!
//! A [`Primitive`] applies one edit with [`redo`](Primitive::redo) and reverts it
//! with [`undo`](Primitive::undo). Whatever is needed to revert (the old
//! placement, the old transformation, the old property value) is captured from
//! the tree the first time the edit is applied.
//!
//! Editors that have already changed the tree themselves use the `*_done`
//! constructors. Those start in [`PrimitiveState::Done`] and capture the missing
//! state at the first undo instead, from the tree as it is then.
//!
//! ```
//! use glam::DVec3;
//! use zeobuilder_transform::Transformation;
//! use zeobuilder_tree::class::{ATOM, UNIVERSE};
//! use zeobuilder_tree::primitive::Primitive;
//! use zeobuilder_tree::{NodeInit, Side, Tree};
//!
//! let mut tree = Tree::new();
//! let root = tree.create(&UNIVERSE, NodeInit::named("root"));
//! let atom = tree.create(&ATOM, NodeInit::named("C"));
//!
//! let mut add = Primitive::add(atom, root, None);
//! add.redo(&mut tree).unwrap();
//! assert_eq!(tree.parent(atom), Some(root));
//!
//! let shift = Transformation::translation(DVec3::X);
//! let mut nudge = Primitive::transform(atom, shift, Side::After);
//! nudge.redo(&mut tree).unwrap();
//! nudge.undo(&mut tree).unwrap();
//! assert_eq!(tree.transformation(atom), Some(Transformation::IDENTITY));
//!
//! add.undo(&mut tree).unwrap();
//! assert_eq!(tree.parent(atom), None);
//! ```

use zeobuilder_transform::Transformation;

use crate::class::{PropertyId, PropertyValue};
use crate::error::PrimitiveError;
use crate::tree::{Removal, Tree};
use crate::types::{NodeId, Placement, Side};

/// Lifecycle of a primitive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveState {
    /// Constructed, never applied.
    Pending,
    /// Applied; may be undone.
    Done,
    /// Reverted; may be redone.
    Undone,
}

#[derive(Clone, Debug)]
enum Operation {
    Add {
        victim: NodeId,
        parent: Option<NodeId>,
        index: Option<usize>,
    },
    Move {
        victim: NodeId,
        to_parent: Option<NodeId>,
        to_index: Option<usize>,
        from: Option<Placement>,
    },
    Delete {
        victim: NodeId,
        removal: Option<Removal>,
    },
    Transform {
        victim: NodeId,
        transformation: Transformation,
        side: Side,
        old: Option<Transformation>,
    },
    SetProperty {
        victim: NodeId,
        property: PropertyId,
        new: Option<PropertyValue>,
        old: Option<PropertyValue>,
    },
    SetReference {
        reference: NodeId,
        new: Option<Option<NodeId>>,
        old: Option<Option<NodeId>>,
    },
}

/// One reversible edit.
#[derive(Clone, Debug)]
pub struct Primitive {
    op: Operation,
    state: PrimitiveState,
}

impl Primitive {
    const fn pending(op: Operation) -> Self {
        Self {
            op,
            state: PrimitiveState::Pending,
        }
    }

    const fn done(op: Operation) -> Self {
        Self {
            op,
            state: PrimitiveState::Done,
        }
    }

    /// Attach the unattached `victim` under `parent` at `index` (end when `None`).
    pub const fn add(victim: NodeId, parent: NodeId, index: Option<usize>) -> Self {
        Self::pending(Operation::Add {
            victim,
            parent: Some(parent),
            index,
        })
    }

    /// `victim` was already attached; its placement is read at the first undo.
    pub const fn add_done(victim: NodeId) -> Self {
        Self::done(Operation::Add {
            victim,
            parent: None,
            index: None,
        })
    }

    /// Move `victim` under `parent` at `index` (end when `None`).
    pub const fn moved(victim: NodeId, parent: NodeId, index: Option<usize>) -> Self {
        Self::pending(Operation::Move {
            victim,
            to_parent: Some(parent),
            to_index: index,
            from: None,
        })
    }

    /// `victim` was already moved away from `from`; the destination is read at the first undo.
    pub const fn move_done(victim: NodeId, from: Placement) -> Self {
        Self::done(Operation::Move {
            victim,
            to_parent: None,
            to_index: None,
            from: Some(from),
        })
    }

    /// Remove `victim`, cascading through referents that point into it.
    pub const fn delete(victim: NodeId) -> Self {
        Self::pending(Operation::Delete {
            victim,
            removal: None,
        })
    }

    /// Combine `transformation` with `victim`'s local transformation on `side`.
    pub const fn transform(victim: NodeId, transformation: Transformation, side: Side) -> Self {
        Self::pending(Operation::Transform {
            victim,
            transformation,
            side,
            old: None,
        })
    }

    /// `transformation` was already combined on `side`; the old value is derived at the first undo.
    pub const fn transform_done(victim: NodeId, transformation: Transformation, side: Side) -> Self {
        Self::done(Operation::Transform {
            victim,
            transformation,
            side,
            old: None,
        })
    }

    /// Write a property.
    pub fn set_property(victim: NodeId, property: PropertyId, value: PropertyValue) -> Self {
        Self::pending(Operation::SetProperty {
            victim,
            property,
            new: Some(value),
            old: None,
        })
    }

    /// The property was already changed from `old`; the new value is read at the first undo.
    pub fn set_property_done(victim: NodeId, property: PropertyId, old: PropertyValue) -> Self {
        Self::done(Operation::SetProperty {
            victim,
            property,
            new: None,
            old: Some(old),
        })
    }

    /// Point a reference at `target` (or clear it).
    pub const fn set_reference(reference: NodeId, target: Option<NodeId>) -> Self {
        Self::pending(Operation::SetReference {
            reference,
            new: Some(target),
            old: None,
        })
    }

    /// The reference was already retargeted away from `old`.
    pub const fn set_reference_done(reference: NodeId, old: Option<NodeId>) -> Self {
        Self::done(Operation::SetReference {
            reference,
            new: None,
            old: Some(old),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PrimitiveState {
        self.state
    }

    /// The node this primitive edits.
    pub fn victim(&self) -> NodeId {
        match &self.op {
            Operation::Add { victim, .. }
            | Operation::Move { victim, .. }
            | Operation::Delete { victim, .. }
            | Operation::Transform { victim, .. }
            | Operation::SetProperty { victim, .. } => *victim,
            Operation::SetReference { reference, .. } => *reference,
        }
    }

    /// Short human-readable name of the edit.
    pub fn description(&self) -> &'static str {
        match &self.op {
            Operation::Add { .. } => "Add",
            Operation::Move { .. } => "Move",
            Operation::Delete { .. } => "Delete",
            Operation::Transform { .. } => "Transform",
            Operation::SetProperty { .. } => "Set property",
            Operation::SetReference { .. } => "Set reference",
        }
    }

    /// Reject edits of fixed nodes before anything is touched.
    ///
    /// Deleting, moving, and transforming a fixed node is not allowed. The check
    /// runs again on every [`redo`](Self::redo).
    pub fn check(&self, tree: &Tree) -> Result<(), PrimitiveError> {
        match &self.op {
            Operation::Move { victim, .. }
            | Operation::Delete { victim, .. }
            | Operation::Transform { victim, .. }
                if tree.is_fixed(*victim) =>
            {
                Err(PrimitiveError::Fixed(*victim))
            }
            _ => Ok(()),
        }
    }

    /// Apply the edit. Requires [`Pending`](PrimitiveState::Pending) or
    /// [`Undone`](PrimitiveState::Undone).
    ///
    /// On error the tree is unchanged and the state stays as it was.
    pub fn redo(&mut self, tree: &mut Tree) -> Result<(), PrimitiveError> {
        debug_assert!(
            self.state != PrimitiveState::Done,
            "redo of a primitive that is already done"
        );
        if self.state == PrimitiveState::Done {
            return Err(PrimitiveError::OutOfSequence {
                operation: "redo",
                state: self.state,
            });
        }
        self.check(tree)?;
        match &mut self.op {
            Operation::Add {
                victim,
                parent,
                index,
            } => {
                let to = parent.ok_or(PrimitiveError::MissingPreState("Add"))?;
                tree.add(*victim, to, *index)?;
                *index = tree.index_of(*victim);
            }
            Operation::Move {
                victim,
                to_parent,
                to_index,
                from,
            } => {
                let to = to_parent.ok_or(PrimitiveError::MissingPreState("Move"))?;
                *from = Some(tree.move_node(*victim, to, *to_index)?);
                *to_index = tree.index_of(*victim);
            }
            Operation::Delete { victim, removal } => {
                *removal = Some(tree.remove(*victim)?);
            }
            Operation::Transform {
                victim,
                transformation,
                side,
                old,
            } => {
                let before = tree.transformation(*victim);
                tree.apply_transform(*victim, transformation, *side)?;
                *old = before;
            }
            Operation::SetProperty {
                victim,
                property,
                new,
                old,
            } => {
                let value = new
                    .clone()
                    .ok_or(PrimitiveError::MissingPreState("Set property"))?;
                *old = Some(tree.set_property(*victim, *property, value)?);
            }
            Operation::SetReference {
                reference,
                new,
                old,
            } => {
                let target = new.ok_or(PrimitiveError::MissingPreState("Set reference"))?;
                *old = Some(tree.set_target(*reference, target)?);
            }
        }
        tracing::debug!(victim = ?self.victim(), op = self.description(), "redo");
        self.state = PrimitiveState::Done;
        Ok(())
    }

    /// Revert the edit. Requires [`Done`](PrimitiveState::Done).
    ///
    /// On error the tree is unchanged and the state stays as it was.
    pub fn undo(&mut self, tree: &mut Tree) -> Result<(), PrimitiveError> {
        debug_assert!(
            self.state == PrimitiveState::Done,
            "undo of a primitive that is not done"
        );
        if self.state != PrimitiveState::Done {
            return Err(PrimitiveError::OutOfSequence {
                operation: "undo",
                state: self.state,
            });
        }
        match &mut self.op {
            Operation::Add {
                victim,
                parent,
                index,
            } => {
                let placement = tree
                    .placement(*victim)
                    .ok_or(crate::error::StructuralError::NotAttached(*victim))?;
                tree.detach(*victim)?;
                *parent = Some(placement.parent);
                *index = Some(placement.index);
            }
            Operation::Move {
                victim,
                to_parent,
                to_index,
                from,
            } => {
                let back = from.ok_or(PrimitiveError::MissingPreState("Move"))?;
                let here = tree.placement(*victim);
                tree.relocate(*victim, back)?;
                if let Some(here) = here {
                    *to_parent = Some(here.parent);
                    *to_index = Some(here.index);
                }
            }
            Operation::Delete { victim, removal } => {
                let removal = removal
                    .as_ref()
                    .ok_or(PrimitiveError::MissingPreState("Delete"))?;
                tree.restore(removal)?;
                tracing::trace!(?victim, "restored");
            }
            Operation::Transform {
                victim,
                transformation,
                side,
                old,
            } => {
                let previous = match *old {
                    Some(previous) => previous,
                    None => {
                        let current = tree
                            .transformation(*victim)
                            .ok_or(crate::error::StructuralError::NotTransformable(*victim))?;
                        let inverse = transformation.inverse();
                        match side {
                            Side::Before => current.compose(&inverse),
                            Side::After => inverse.compose(&current),
                        }
                    }
                };
                tree.set_transformation(*victim, previous)?;
                *old = Some(previous);
            }
            Operation::SetProperty {
                victim,
                property,
                new,
                old,
            } => {
                let previous = old
                    .clone()
                    .ok_or(PrimitiveError::MissingPreState("Set property"))?;
                let current = tree.set_property(*victim, *property, previous)?;
                if new.is_none() {
                    *new = Some(current);
                }
            }
            Operation::SetReference {
                reference,
                new,
                old,
            } => {
                let previous = old.ok_or(PrimitiveError::MissingPreState("Set reference"))?;
                let current = tree.set_target(*reference, previous)?;
                if new.is_none() {
                    *new = Some(current);
                }
            }
        }
        tracing::debug!(victim = ?self.victim(), op = self.description(), "undo");
        self.state = PrimitiveState::Undone;
        Ok(())
    }

    /// Drop the primitive for good, freeing nodes only it could bring back.
    ///
    /// That is the victim of an `Add` that is not applied, and whatever a done
    /// `Delete` detached. Nodes that have been re-attached in the meantime are kept.
    pub fn discard(self, tree: &mut Tree) {
        let free = |tree: &mut Tree, id: NodeId| {
            if tree.is_alive(id) && tree.parent(id).is_none() && tree.destroy(id).is_ok() {
                tracing::debug!(?id, "freed by discarded primitive");
            }
        };
        match (self.op, self.state) {
            (Operation::Add { victim, .. }, PrimitiveState::Pending | PrimitiveState::Undone) => {
                free(tree, victim);
            }
            (
                Operation::Delete {
                    removal: Some(removal),
                    ..
                },
                PrimitiveState::Done,
            ) => {
                for id in removal.detached() {
                    free(tree, id);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use core::f64::consts::FRAC_PI_3;

    use glam::DVec3;
    use zeobuilder_transform::EPSILON;

    use super::*;
    use crate::class::{ATOM, BOND, FRAME, REFERENCE, UNIVERSE};
    use crate::error::StructuralError;
    use crate::types::NodeInit;

    fn snapshot(tree: &Tree) -> Vec<(NodeId, Option<NodeId>, Vec<NodeId>, Option<Transformation>, Option<NodeId>)> {
        tree.ids()
            .map(|id| {
                (
                    id,
                    tree.parent(id),
                    tree.children(id).to_vec(),
                    tree.transformation(id),
                    tree.target(id),
                )
            })
            .collect()
    }

    fn scene() -> (Tree, NodeId, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new();
        let root = tree.create(&UNIVERSE, NodeInit::named("root").fixed());
        let frame = tree.create(&FRAME, NodeInit::named("frame"));
        tree.add(frame, root, None).unwrap();
        let a = tree.create(&ATOM, NodeInit::named("a"));
        let b = tree.create(&ATOM, NodeInit::named("b"));
        tree.add(a, frame, None).unwrap();
        tree.add(b, root, None).unwrap();
        (tree, root, frame, a, b)
    }

    #[test]
    fn every_kind_round_trips() {
        let (mut tree, root, frame, a, b) = scene();
        let bond = tree.create(&BOND, NodeInit::named("bond"));
        let r = tree.create(&REFERENCE, NodeInit::default());
        tree.add(bond, root, None).unwrap();
        tree.add(r, bond, None).unwrap();
        let c = tree.create(&ATOM, NodeInit::named("c"));
        let turn = Transformation::about_axis(DVec3::Z, FRAC_PI_3).unwrap();
        let before = snapshot(&tree);

        let mut prims = [
            Primitive::add(c, frame, Some(0)),
            Primitive::set_reference(r, Some(a)),
            Primitive::moved(b, frame, Some(1)),
            Primitive::transform(frame, turn, Side::After),
            Primitive::transform(a, Transformation::translation(DVec3::Y), Side::Before),
            Primitive::set_property(a, PropertyId::Radius, PropertyValue::Real(2.0)),
            Primitive::delete(a),
        ];
        for p in &mut prims {
            p.redo(&mut tree).unwrap();
        }
        let after = snapshot(&tree);
        assert_eq!(tree.children(frame), &[c, b]);
        assert_eq!(tree.parent(bond), None, "bond went with its target");

        for p in prims.iter_mut().rev() {
            p.undo(&mut tree).unwrap();
        }
        assert_eq!(snapshot(&tree), before);
        assert_eq!(tree.property(a, PropertyId::Radius), Ok(PropertyValue::Real(0.5)));

        for p in &mut prims {
            assert_eq!(p.state(), PrimitiveState::Undone);
            p.redo(&mut tree).unwrap();
        }
        assert_eq!(snapshot(&tree), after);
    }

    #[test]
    fn done_constructors_capture_lazily() {
        let (mut tree, root, frame, a, b) = scene();

        let old = tree.move_node(b, frame, Some(0)).unwrap();
        let mut mv = Primitive::move_done(b, old);

        let turn = Transformation::about_axis(DVec3::X, FRAC_PI_3).unwrap();
        let original = tree.transformation(a).unwrap();
        tree.apply_transform(a, &turn, Side::After).unwrap();
        let mut tf = Primitive::transform_done(a, turn, Side::After);

        let previous = tree
            .set_property(a, PropertyId::Number, PropertyValue::Int(8))
            .unwrap();
        let mut prop = Primitive::set_property_done(a, PropertyId::Number, previous);

        let c = tree.create(&ATOM, NodeInit::named("c"));
        tree.add(c, root, Some(0)).unwrap();
        let mut add = Primitive::add_done(c);

        for p in [&mut add, &mut prop, &mut tf, &mut mv] {
            assert_eq!(p.state(), PrimitiveState::Done);
            p.undo(&mut tree).unwrap();
        }
        assert_eq!(tree.parent(c), None);
        assert_eq!(tree.property(a, PropertyId::Number), Ok(PropertyValue::Int(6)));
        assert!(tree.transformation(a).unwrap().approx_eq(&original, EPSILON));
        assert_eq!(tree.placement(b), Some(old));

        for p in [&mut mv, &mut tf, &mut prop, &mut add] {
            p.redo(&mut tree).unwrap();
        }
        assert_eq!(tree.children(root)[0], c);
        assert_eq!(tree.parent(b), Some(frame));
        assert_eq!(tree.property(a, PropertyId::Number), Ok(PropertyValue::Int(8)));
    }

    #[test]
    fn fixed_victims_are_rejected_before_mutation() {
        let (mut tree, root, frame, ..) = scene();
        let before = snapshot(&tree);
        let shift = Transformation::translation(DVec3::X);
        tree.set_property(frame, PropertyId::Fixed, PropertyValue::Bool(true))
            .unwrap();
        for mut p in [
            Primitive::delete(frame),
            Primitive::moved(frame, root, Some(0)),
            Primitive::transform(frame, shift, Side::After),
        ] {
            assert_eq!(p.check(&tree), Err(PrimitiveError::Fixed(frame)));
            assert_eq!(p.redo(&mut tree), Err(PrimitiveError::Fixed(frame)));
            assert_eq!(p.state(), PrimitiveState::Pending);
        }
        assert_eq!(snapshot(&tree), before);
        // Fixed nodes may still be renamed.
        let mut rename = Primitive::set_property(frame, PropertyId::Name, PropertyValue::Text("f".into()));
        rename.redo(&mut tree).unwrap();
    }

    #[test]
    fn structural_failures_leave_state_alone() {
        let (mut tree, _, frame, _, b) = scene();
        let mut p = Primitive::moved(frame, b, None);
        assert!(matches!(
            p.redo(&mut tree),
            Err(PrimitiveError::Structural(StructuralError::Rejected { .. }))
        ));
        assert_eq!(p.state(), PrimitiveState::Pending);
    }

    #[test]
    fn discard_frees_unreachable_nodes() {
        let (mut tree, root, frame, a, _) = scene();
        let mut delete = Primitive::delete(frame);
        delete.redo(&mut tree).unwrap();
        delete.discard(&mut tree);
        assert!(!tree.is_alive(frame));
        assert!(!tree.is_alive(a));

        let c = tree.create(&ATOM, NodeInit::default());
        let mut add = Primitive::add(c, root, None);
        add.redo(&mut tree).unwrap();
        add.clone().discard(&mut tree);
        assert!(tree.is_alive(c), "applied adds keep their victim");
        add.undo(&mut tree).unwrap();
        add.discard(&mut tree);
        assert!(!tree.is_alive(c));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "undo of a primitive that is not done")]
    fn undo_out_of_sequence_panics_in_debug() {
        let (mut tree, root, ..) = scene();
        let c = tree.create(&ATOM, NodeInit::default());
        let mut p = Primitive::add(c, root, None);
        let _ = p.undo(&mut tree);
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn undo_out_of_sequence_is_an_error() {
        let (mut tree, root, ..) = scene();
        let c = tree.create(&ATOM, NodeInit::default());
        let mut p = Primitive::add(c, root, None);
        assert_eq!(
            p.undo(&mut tree),
            Err(PrimitiveError::OutOfSequence {
                operation: "undo",
                state: PrimitiveState::Pending
            })
        );
    }
}
