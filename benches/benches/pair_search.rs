// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use glam::DVec3;
use zeobuilder_tree::binning::{PairSearch, PairSearchConfig};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

/// `count` points uniformly spread in a cube sized for roughly liquid density.
fn gen_points(count: usize, seed: u64) -> Vec<DVec3> {
    let side = (count as f64 / 0.1).cbrt();
    let mut rng = Rng::new(seed);
    (0..count)
        .map(|_| DVec3::new(rng.next_f64(), rng.next_f64(), rng.next_f64()) * side)
        .collect()
}

fn brute_force(points: &[DVec3], cutoff: f64) -> usize {
    let mut n = 0;
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            if points[i].distance(points[j]) <= cutoff {
                n += 1;
            }
        }
    }
    n
}

fn bench_pairs(c: &mut Criterion) {
    let mut group = c.benchmark_group("pair_search");
    let config = PairSearchConfig { cutoff: 1.6 };
    for &count in &[500_usize, 2_000, 8_000] {
        let points = gen_points(count, 0x5eed_0000 + count as u64);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_function(format!("binned_{count}"), |b| {
            b.iter(|| {
                let search = PairSearch::new(config, points.iter().copied());
                black_box(search.pairs().len())
            });
        });

        if count <= 2_000 {
            group.bench_function(format!("brute_{count}"), |b| {
                b.iter(|| black_box(brute_force(&points, config.cutoff)));
            });
        }

        let search = PairSearch::new(config, points.iter().copied());
        group.bench_function(format!("neighbors_{count}"), |b| {
            b.iter(|| black_box(search.neighbors(points[count / 2]).len()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pairs);
criterion_main!(benches);
