// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Axis-aligned bounding boxes in 3D.

use glam::DVec3;

use crate::transformation::Transformation;

/// Axis-aligned bounding box in 3D.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: DVec3,
    /// Maximum corner.
    pub max: DVec3,
}

impl Aabb3 {
    /// Create a new AABB from min/max corners.
    pub const fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// A degenerate box around a single point.
    pub const fn from_point(p: DVec3) -> Self {
        Self { min: p, max: p }
    }

    /// The box enclosing a sphere.
    pub fn from_sphere(center: DVec3, radius: f64) -> Self {
        let r = DVec3::splat(radius.abs());
        Self {
            min: center - r,
            max: center + r,
        }
    }

    /// The box enclosing all points; `None` when the iterator is empty.
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Option<Self> {
        let mut it = points.into_iter();
        let first = Self::from_point(it.next()?);
        Some(it.fold(first, |acc, p| acc.including(p)))
    }

    /// The smallest box containing both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// The smallest box containing `self` and `p`.
    #[must_use]
    pub fn including(&self, p: DVec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    /// Conservative bounds of the transformed box (all eight corners).
    #[must_use]
    pub fn transformed(&self, t: &Transformation) -> Self {
        let (lo, hi) = (self.min, self.max);
        let mut out = Self::from_point(t.apply(lo));
        for i in 1..8_u8 {
            let corner = DVec3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            );
            out = out.including(t.apply(corner));
        }
        out
    }

    /// Center point.
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Extent along each axis.
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Whether the (closed) box contains the point.
    pub fn contains_point(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Return true if the box is inverted along any axis. Assumes no NaN.
    pub fn is_empty(&self) -> bool {
        self.max.cmplt(self.min).any()
    }
}
