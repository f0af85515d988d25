// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene basics.
//!
//! Build a molecule inside a frame, query absolute and relative frames, pull bounds,
//! and find close atom pairs.
//!
//! Run:
//! - `cargo run -p zeobuilder_demos --example scene_basics`

use core::f64::consts::FRAC_PI_2;

use glam::DVec3;
use zeobuilder_transform::Transformation;
use zeobuilder_tree::binning::close_pairs;
use zeobuilder_tree::class::{ATOM, BOND, FRAME, PropertyId, PropertyValue, REFERENCE, UNIVERSE};
use zeobuilder_tree::{NodeId, NodeInit, Tree};

fn atom(tree: &mut Tree, parent: NodeId, name: &str, number: i64, at: DVec3) -> NodeId {
    let id = tree.create(
        &ATOM,
        NodeInit::named(name).with_transformation(Transformation::translation(at)),
    );
    tree.set_property(id, PropertyId::Number, PropertyValue::Int(number))
        .unwrap();
    tree.add(id, parent, None).unwrap();
    id
}

fn bond(tree: &mut Tree, parent: NodeId, a: NodeId, b: NodeId) -> NodeId {
    let id = tree.create(&BOND, NodeInit::named("bond"));
    tree.add(id, parent, None).unwrap();
    for target in [a, b] {
        let r = tree.create(&REFERENCE, NodeInit::default());
        tree.add(r, id, None).unwrap();
        tree.set_target(r, Some(target)).unwrap();
    }
    id
}

fn main() {
    let mut tree = Tree::new();
    let root = tree.create(&UNIVERSE, NodeInit::named("universe").fixed());

    // A water molecule in its own frame, turned a quarter around z.
    let turn = Transformation::about_axis(DVec3::Z, FRAC_PI_2).unwrap();
    let water = tree.create(&FRAME, NodeInit::named("water").with_transformation(turn));
    tree.add(water, root, None).unwrap();
    let o = atom(&mut tree, water, "O", 8, DVec3::ZERO);
    let h1 = atom(&mut tree, water, "H1", 1, DVec3::new(0.96, 0.0, 0.0));
    let h2 = atom(&mut tree, water, "H2", 1, DVec3::new(-0.24, 0.93, 0.0));
    bond(&mut tree, water, o, h1);
    bond(&mut tree, water, o, h2);

    // A lone probe atom in the universe frame.
    let probe = atom(&mut tree, root, "probe", 18, DVec3::new(0.0, 1.5, 0.0));

    for id in [o, h1, h2] {
        let p = tree.absolute_frame(id).unwrap().t();
        println!("{:>3} at {p:.3}", tree.name(id).unwrap_or("?"));
    }
    let rel = tree.frame_relative_to(probe, h1).unwrap();
    println!("probe seen from H1: {:.3}", rel.t());

    let bounds = tree.bounds(root).unwrap();
    println!("scene bounds: {:.3} .. {:.3}", bounds.min, bounds.max);

    let pairs = close_pairs(&tree, &[o, h1, h2, probe], 1.2).unwrap();
    for (a, b, d) in &pairs {
        println!(
            "close: {} - {} ({d:.3})",
            tree.name(*a).unwrap_or("?"),
            tree.name(*b).unwrap_or("?")
        );
    }
    assert!(pairs.iter().any(|(a, b, _)| (*a, *b) == (o, h1)));
    assert!(pairs.iter().any(|(a, b, _)| *a == h1 && *b == probe), "H1 turned toward the probe");
}
