// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Invalidation and selection.
//!
//! Subscribe a listener, edit the scene, and flush once per "frame". Then ask the
//! selection cache about a selection and watch it recompute only after changes.
//!
//! Run:
//! - `cargo run -p zeobuilder_demos --example invalidation_and_selection`

use std::cell::RefCell;
use std::rc::Rc;

use glam::DVec3;
use zeobuilder_transform::Transformation;
use zeobuilder_tree::class::{ATOM, FRAME, PropertyId, PropertyValue, UNIVERSE};
use zeobuilder_tree::selection::{Selection, SelectionCache};
use zeobuilder_tree::{Dirty, NodeId, NodeInit, Tree};

fn main() {
    let mut tree = Tree::new();
    let root = tree.create(&UNIVERSE, NodeInit::named("universe"));
    let frame = tree.create(&FRAME, NodeInit::named("frame"));
    tree.add(frame, root, None).unwrap();
    let atoms: Vec<NodeId> = (0..4)
        .map(|i| {
            let at = Transformation::translation(DVec3::new(f64::from(i), 0.0, 0.0));
            let id = tree.create(&ATOM, NodeInit::named("C").with_transformation(at));
            tree.add(id, frame, None).unwrap();
            id
        })
        .collect();

    let redraw = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&redraw);
    tree.subscribe(move |id: NodeId, flags: Dirty| {
        if flags.contains(Dirty::DRAW) {
            sink.borrow_mut().push(id);
        }
    });
    tree.flush_invalidations();
    redraw.borrow_mut().clear();

    // Frame 1: recolor one atom and shift another.
    tree.set_property(atoms[1], PropertyId::Color, PropertyValue::Color([1.0, 0.0, 0.0, 1.0]))
        .unwrap();
    tree.set_transformation(atoms[2], Transformation::translation(DVec3::Y))
        .unwrap();
    let delivered = tree.flush_invalidations();
    println!("frame 1: {delivered} nodes invalidated, redraw {:?}", redraw.borrow());
    for id in redraw.borrow_mut().drain(..) {
        assert!(tree.validate_draw(id));
    }
    println!("root bounds: {:?}", tree.bounds(root));

    // Selection facts are computed lazily and memoized.
    let mut selection = Selection::new();
    selection.set([atoms[3], atoms[1]]);
    let mut cache = SelectionCache::new();
    println!(
        "parent {:?}, indices {:?}..{:?}",
        cache.parent(&tree, &selection),
        cache.lowest_index(&tree, &selection),
        cache.highest_index(&tree, &selection),
    );
    let computed = cache.computations();
    let _ = cache.parent(&tree, &selection);
    assert_eq!(cache.computations(), computed, "memoized");

    tree.move_node(atoms[3], root, None).unwrap();
    println!(
        "after move: parent {:?}, common parent {:?}",
        cache.parent(&tree, &selection),
        cache.common_parent(&tree, &selection),
    );
    assert!(cache.computations() > computed);
}
