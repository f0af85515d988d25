// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Close-pair search by uniform binning.
//!
//! Points are sorted into cubic bins with the cutoff as edge length, so every pair
//! closer than the cutoff lies in the same or in adjacent bins. Results are sorted
//! by index, which keeps them deterministic regardless of bin iteration order.
//!
//! ```
//! use glam::DVec3;
//! use zeobuilder_tree::binning::{PairSearch, PairSearchConfig};
//!
//! let points = [DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0), DVec3::new(5.0, 0.0, 0.0)];
//! let search = PairSearch::new(PairSearchConfig { cutoff: 1.5 }, points);
//! let pairs = search.pairs();
//! assert_eq!(pairs.len(), 1);
//! assert_eq!((pairs[0].first, pairs[0].second), (0, 1));
//! ```

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use glam::DVec3;

use crate::error::FrameError;
use crate::tree::Tree;
use crate::types::NodeId;

/// Parameters for a [`PairSearch`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PairSearchConfig {
    /// Largest distance (inclusive) at which two points form a pair.
    pub cutoff: f64,
}

impl Default for PairSearchConfig {
    fn default() -> Self {
        Self { cutoff: 2.0 }
    }
}

/// Two points within the cutoff.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pair {
    /// Index of the first point; always below `second`.
    pub first: usize,
    /// Index of the second point.
    pub second: usize,
    /// Distance between the points.
    pub distance: f64,
}

type Bin = [i64; 3];

/// Points binned for close-pair queries.
#[derive(Clone, Debug)]
pub struct PairSearch {
    cutoff: f64,
    points: Vec<DVec3>,
    bins: BTreeMap<Bin, Vec<usize>>,
}

impl PairSearch {
    /// Bin `points`. A cutoff that is not a positive finite number finds nothing.
    pub fn new(config: PairSearchConfig, points: impl IntoIterator<Item = DVec3>) -> Self {
        let points: Vec<DVec3> = points.into_iter().collect();
        let mut bins: BTreeMap<Bin, Vec<usize>> = BTreeMap::new();
        let usable = config.cutoff.is_finite() && config.cutoff > 0.0;
        if usable {
            for (i, p) in points.iter().enumerate() {
                bins.entry(bin_of(*p, config.cutoff)).or_default().push(i);
            }
        }
        Self {
            cutoff: config.cutoff,
            points,
            bins,
        }
    }

    /// The binned points, in input order.
    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    /// Number of binned points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if there are no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Every pair within the cutoff, sorted by `(first, second)`.
    pub fn pairs(&self) -> Vec<Pair> {
        let mut out = Vec::new();
        for (bin, members) in &self.bins {
            for neighbor in neighborhood(*bin) {
                let Some(others) = self.bins.get(&neighbor) else {
                    continue;
                };
                for &i in members {
                    for &j in others {
                        if i >= j {
                            continue;
                        }
                        let distance = self.points[i].distance(self.points[j]);
                        if distance <= self.cutoff {
                            out.push(Pair {
                                first: i,
                                second: j,
                                distance,
                            });
                        }
                    }
                }
            }
        }
        out.sort_by_key(|p| (p.first, p.second));
        out
    }

    /// Indices and distances of the points within the cutoff of `p`, sorted by index.
    pub fn neighbors(&self, p: DVec3) -> Vec<(usize, f64)> {
        if self.bins.is_empty() {
            return Vec::new();
        }
        let mut out: Vec<(usize, f64)> = neighborhood(bin_of(p, self.cutoff))
            .filter_map(|b| self.bins.get(&b))
            .flatten()
            .map(|&i| (i, self.points[i].distance(p)))
            .filter(|(_, d)| *d <= self.cutoff)
            .collect();
        out.sort_by_key(|(i, _)| *i);
        out
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "Bin coordinates saturate; points that far out share an edge bin."
)]
fn bin_of(p: DVec3, cutoff: f64) -> Bin {
    let cell = (p / cutoff).floor();
    [cell.x as i64, cell.y as i64, cell.z as i64]
}

/// The bin and its up to 26 neighbors, each once. Offsets past the edge of the
/// coordinate range are skipped.
fn neighborhood(bin: Bin) -> impl Iterator<Item = Bin> {
    (-1..=1_i64).flat_map(move |dx| {
        (-1..=1_i64).flat_map(move |dy| {
            (-1..=1_i64).filter_map(move |dz| {
                Some([
                    bin[0].checked_add(dx)?,
                    bin[1].checked_add(dy)?,
                    bin[2].checked_add(dz)?,
                ])
            })
        })
    })
}

/// Pairs of `nodes` whose origins are within `cutoff` of each other.
///
/// Positions are measured in the frame of the nodes' common ancestor, with one
/// [`FrameResolver`](crate::FrameResolver) shared by all of them.
pub fn close_pairs(
    tree: &Tree,
    nodes: &[NodeId],
    cutoff: f64,
) -> Result<Vec<(NodeId, NodeId, f64)>, FrameError> {
    let Some(first) = nodes.first() else {
        return Ok(Vec::new());
    };
    let common = tree.common_ancestor(nodes).ok_or_else(|| {
        let other = nodes
            .iter()
            .find(|n| tree.root_of(**n) != tree.root_of(*first))
            .copied()
            .unwrap_or(*first);
        FrameError::NoCommonFrame {
            node: *first,
            other,
        }
    })?;
    let mut resolver = tree.resolver(common);
    let positions = nodes
        .iter()
        .map(|n| resolver.position(*n))
        .collect::<Result<Vec<_>, _>>()?;
    let search = PairSearch::new(PairSearchConfig { cutoff }, positions);
    Ok(search
        .pairs()
        .into_iter()
        .map(|p| (nodes[p.first], nodes[p.second], p.distance))
        .collect())
}
