// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Undo history.
//!
//! Record a batch of primitives as one action, move a node while keeping its place in
//! space, delete an atom together with its bond, and walk the history back and forth.
//! Set `RUST_LOG=zeobuilder_tree=debug` to watch primitives being applied.
//!
//! Run:
//! - `cargo run -p zeobuilder_demos --example undo_history`

use glam::DVec3;
use tracing_subscriber::EnvFilter;
use zeobuilder_transform::{EPSILON, Transformation};
use zeobuilder_tree::class::{ATOM, BOND, FRAME, REFERENCE, UNIVERSE};
use zeobuilder_tree::edit::move_keeping_frame;
use zeobuilder_tree::history::{History, HistoryConfig};
use zeobuilder_tree::primitive::Primitive;
use zeobuilder_tree::{NodeInit, Side, Tree};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut tree = Tree::new();
    let mut history = History::with_config(HistoryConfig { max_actions: 16 });
    let root = tree.create(&UNIVERSE, NodeInit::named("universe").fixed());

    let left = tree.create(&FRAME, NodeInit::named("left"));
    let right = tree.create(
        &FRAME,
        NodeInit::named("right").with_transformation(Transformation::translation(DVec3::new(5.0, 0.0, 0.0))),
    );
    let c = tree.create(&ATOM, NodeInit::named("C"));
    let o = tree.create(
        &ATOM,
        NodeInit::named("O").with_transformation(Transformation::translation(DVec3::new(1.2, 0.0, 0.0))),
    );
    let bond = tree.create(&BOND, NodeInit::named("C=O"));
    let ends = [
        tree.create(&REFERENCE, NodeInit::default()),
        tree.create(&REFERENCE, NodeInit::default()),
    ];

    history.begin("Build carbonyl")?;
    for p in [
        Primitive::add(left, root, None),
        Primitive::add(right, root, None),
        Primitive::add(c, left, None),
        Primitive::add(o, left, None),
        Primitive::add(bond, left, None),
        Primitive::add(ends[0], bond, None),
        Primitive::add(ends[1], bond, None),
        Primitive::set_reference(ends[0], Some(c)),
        Primitive::set_reference(ends[1], Some(o)),
    ] {
        history.record(&mut tree, p)?;
    }
    history.commit(&mut tree)?;
    tracing::info!(nodes = tree.len(), label = history.undo_label(), "scene built");

    let spin = Transformation::rotation_about_point(DVec3::Z, 0.5, DVec3::new(0.6, 0.0, 0.0))?;
    history.record(&mut tree, Primitive::transform(left, spin, Side::After))?;

    let before = tree.absolute_frame(o)?;
    history.begin("Move O to the right frame")?;
    for p in move_keeping_frame(&tree, o, right, None)? {
        history.record(&mut tree, p)?;
    }
    history.commit(&mut tree)?;
    assert!(tree.absolute_frame(o)?.approx_eq(&before, EPSILON));
    let local = tree.transformation(o).unwrap_or_default().t();
    println!("O now lives under {:?} at local {local:.3}", tree.name(right));

    history.record(&mut tree, Primitive::delete(c))?;
    println!("after delete, left holds {} nodes", tree.children(left).len());

    while history.can_undo() {
        println!("undo: {}", history.undo_label().unwrap_or_default());
        history.undo_last_action(&mut tree)?;
    }
    assert!(tree.children(root).is_empty());

    while history.can_redo() {
        println!("redo: {}", history.redo_label().unwrap_or_default());
        history.redo_last_action(&mut tree)?;
    }
    assert_eq!(tree.parent(o), Some(right));
    assert_eq!(tree.parent(bond), None, "the bond went with C");

    history.clear(&mut tree);
    println!("{} nodes alive after clearing the history", tree.len());
    Ok(())
}
