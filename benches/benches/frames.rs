// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use glam::DVec3;
use zeobuilder_transform::Transformation;
use zeobuilder_tree::class::{ATOM, FRAME, UNIVERSE};
use zeobuilder_tree::{NodeId, NodeInit, Tree};

/// A chain of `depth` nested frames, each holding `leaves` atoms.
fn gen_chain(depth: usize, leaves: usize) -> (Tree, NodeId, Vec<NodeId>) {
    let mut tree = Tree::new();
    let root = tree.create(&UNIVERSE, NodeInit::named("root"));
    let step = Transformation::about_axis(DVec3::new(1.0, 1.0, 0.0), 0.1)
        .unwrap()
        .compose(&Transformation::translation(DVec3::new(0.5, 0.0, 0.25)));
    let mut parent = root;
    let mut atoms = Vec::with_capacity(depth * leaves);
    for _ in 0..depth {
        let frame = tree.create(&FRAME, NodeInit::default().with_transformation(step));
        tree.add(frame, parent, None).unwrap();
        for i in 0..leaves {
            let offset = Transformation::translation(DVec3::new(i as f64, 0.0, 0.0));
            let atom = tree.create(&ATOM, NodeInit::default().with_transformation(offset));
            tree.add(atom, frame, None).unwrap();
            atoms.push(atom);
        }
        parent = frame;
    }
    (tree, root, atoms)
}

fn bench_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("frames");
    for &(depth, leaves) in &[(16_usize, 16_usize), (64, 8)] {
        let (tree, root, atoms) = gen_chain(depth, leaves);
        group.throughput(Throughput::Elements(atoms.len() as u64));

        group.bench_function(format!("absolute_d{depth}_l{leaves}"), |b| {
            b.iter(|| {
                for atom in &atoms {
                    black_box(tree.absolute_frame(*atom).unwrap());
                }
            });
        });

        group.bench_function(format!("resolver_d{depth}_l{leaves}"), |b| {
            b.iter(|| {
                let mut resolver = tree.resolver(root);
                for atom in &atoms {
                    black_box(resolver.frame(*atom).unwrap());
                }
            });
        });

        group.bench_function(format!("relative_d{depth}_l{leaves}"), |b| {
            let first = atoms[0];
            let last = atoms[atoms.len() - 1];
            b.iter(|| black_box(tree.frame_relative_to(first, last).unwrap()));
        });

        group.bench_function(format!("world_cached_d{depth}_l{leaves}"), |b| {
            b.iter_batched(
                || gen_chain(depth, leaves),
                |(mut tree, _, atoms)| {
                    for atom in &atoms {
                        black_box(tree.world_frame(*atom).unwrap());
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_frames);
criterion_main!(benches);
