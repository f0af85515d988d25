// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The [`Transformation`] value type: identity, translation, rotation, or both.

use core::ops::Mul;

use glam::{DAffine3, DMat3, DVec3};
use thiserror::Error;

/// Tolerance used for orthonormality checks and approximate comparisons.
pub const EPSILON: f64 = 1e-10;

/// Errors raised when constructing a [`Transformation`].
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum TransformError {
    /// The rotation part is not orthonormal (`r^T r` deviates from identity).
    #[error("rotation matrix is not orthonormal (max deviation {deviation:e})")]
    NotOrthonormal {
        /// Largest absolute deviation of `r^T r` from the identity matrix.
        deviation: f64,
    },
    /// A rotation axis of (near) zero length was given.
    #[error("rotation axis has zero length")]
    DegenerateAxis,
}

/// Which typed variant a [`Transformation`] currently holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Kind {
    /// No-op.
    Identity,
    /// Pure translation.
    Translation,
    /// Pure rotation (or improper rotation).
    Rotation,
    /// Rotation followed by translation.
    Complete,
}

/// A rigid-body transformation.
///
/// Points map as `p' = r·p + t`: rotate first, then translate.
///
/// Composition keeps the kinds as narrow as possible:
///
/// - [`Identity`](Self::Identity) is neutral on both sides.
/// - Translation ∘ Translation stays a [`Translation`](Self::Translation).
/// - Rotation ∘ Rotation stays a [`Rotation`](Self::Rotation).
/// - Any other mix becomes [`Complete`](Self::Complete).
///
/// ```
/// use glam::DVec3;
/// use zeobuilder_transform::{Kind, Transformation};
///
/// let a = Transformation::translation(DVec3::X);
/// let b = Transformation::translation(DVec3::Y);
/// let ab = a.compose(&b);
/// assert_eq!(ab.kind(), Kind::Translation);
/// assert_eq!(ab.apply(DVec3::ZERO), DVec3::new(1.0, 1.0, 0.0));
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum Transformation {
    /// No-op.
    #[default]
    Identity,
    /// `p' = p + t`.
    Translation(DVec3),
    /// `p' = r·p`, with `r` orthonormal.
    Rotation(DMat3),
    /// `p' = r·p + t`.
    Complete {
        /// Rotation part (orthonormal).
        r: DMat3,
        /// Translation part, applied after the rotation.
        t: DVec3,
    },
}

impl Transformation {
    /// The identity transformation.
    pub const IDENTITY: Self = Self::Identity;

    /// A pure translation.
    pub const fn translation(t: DVec3) -> Self {
        Self::Translation(t)
    }

    /// A pure rotation. Fails if `r` is not orthonormal within [`EPSILON`].
    pub fn rotation(r: DMat3) -> Result<Self, TransformError> {
        check_orthonormal(r)?;
        Ok(Self::Rotation(r))
    }

    /// A pure rotation without the orthonormality check.
    pub const fn rotation_unchecked(r: DMat3) -> Self {
        Self::Rotation(r)
    }

    /// A rotation followed by a translation. Fails if `r` is not orthonormal.
    pub fn complete(r: DMat3, t: DVec3) -> Result<Self, TransformError> {
        check_orthonormal(r)?;
        Ok(Self::Complete { r, t })
    }

    /// Rotation by `angle` radians about `axis` through the origin.
    pub fn about_axis(axis: DVec3, angle: f64) -> Result<Self, TransformError> {
        let axis = axis.try_normalize().ok_or(TransformError::DegenerateAxis)?;
        Ok(Self::Rotation(DMat3::from_axis_angle(axis, angle)))
    }

    /// Rotation by `angle` radians about the line through `center` along `axis`.
    pub fn rotation_about_point(
        axis: DVec3,
        angle: f64,
        center: DVec3,
    ) -> Result<Self, TransformError> {
        let rot = Self::about_axis(axis, angle)?;
        Ok(Self::translation(center)
            .compose(&rot)
            .compose(&Self::translation(-center)))
    }

    /// Which variant this transformation holds.
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Identity => Kind::Identity,
            Self::Translation(_) => Kind::Translation,
            Self::Rotation(_) => Kind::Rotation,
            Self::Complete { .. } => Kind::Complete,
        }
    }

    /// Rotation part; identity for translations.
    pub fn r(&self) -> DMat3 {
        match self {
            Self::Rotation(r) | Self::Complete { r, .. } => *r,
            Self::Identity | Self::Translation(_) => DMat3::IDENTITY,
        }
    }

    /// Translation part; zero for rotations.
    pub fn t(&self) -> DVec3 {
        match self {
            Self::Translation(t) | Self::Complete { t, .. } => *t,
            Self::Identity | Self::Rotation(_) => DVec3::ZERO,
        }
    }

    /// Transform a point.
    pub fn apply(&self, p: DVec3) -> DVec3 {
        match self {
            Self::Identity => p,
            Self::Translation(t) => p + *t,
            Self::Rotation(r) => *r * p,
            Self::Complete { r, t } => *r * p + *t,
        }
    }

    /// Transform a direction (translation is ignored).
    pub fn apply_vector(&self, v: DVec3) -> DVec3 {
        match self {
            Self::Identity | Self::Translation(_) => v,
            Self::Rotation(r) | Self::Complete { r, .. } => *r * v,
        }
    }

    /// Map a point through the inverse transformation.
    pub fn apply_inverse(&self, p: DVec3) -> DVec3 {
        self.inverse().apply(p)
    }

    /// `self ∘ other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Identity, _) => *other,
            (_, Self::Identity) => *self,
            (Self::Translation(a), Self::Translation(b)) => Self::Translation(*a + *b),
            (Self::Rotation(a), Self::Rotation(b)) => Self::Rotation(*a * *b),
            _ => {
                let r = self.r();
                Self::Complete {
                    r: r * other.r(),
                    t: r * other.t() + self.t(),
                }
            }
        }
    }

    /// `other ∘ self`: apply `self` first, then `other`.
    pub fn compose_before(&self, other: &Self) -> Self {
        other.compose(self)
    }

    /// The inverse transformation. Rotations invert by transposition.
    pub fn inverse(&self) -> Self {
        match self {
            Self::Identity => Self::Identity,
            Self::Translation(t) => Self::Translation(-*t),
            Self::Rotation(r) => Self::Rotation(r.transpose()),
            Self::Complete { r, t } => {
                let rt = r.transpose();
                Self::Complete { r: rt, t: -(rt * *t) }
            }
        }
    }

    /// Whether the rotation part satisfies `r^T r ≈ I` within `eps`.
    pub fn is_orthonormal(&self, eps: f64) -> bool {
        orthonormal_deviation(self.r()) <= eps
    }

    /// Whether this is the identity within `eps`, regardless of variant.
    pub fn is_identity(&self, eps: f64) -> bool {
        self.approx_eq(&Self::Identity, eps)
    }

    /// Component-wise comparison of rotation and translation parts.
    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.r().abs_diff_eq(other.r(), eps) && self.t().abs_diff_eq(other.t(), eps)
    }

    /// Re-orthonormalize the rotation part (Gram-Schmidt), keeping handedness.
    ///
    /// Long chains of compositions accumulate rounding drift; this snaps the
    /// rotation back onto the orthonormal matrices.
    #[must_use]
    pub fn orthonormalized(&self) -> Self {
        let fix = |r: DMat3| {
            let x = r.x_axis.normalize();
            let y = (r.y_axis - x * x.dot(r.y_axis)).normalize();
            let z = if r.determinant() < 0.0 {
                -x.cross(y)
            } else {
                x.cross(y)
            };
            DMat3::from_cols(x, y, z)
        };
        match self {
            Self::Identity | Self::Translation(_) => *self,
            Self::Rotation(r) => Self::Rotation(fix(*r)),
            Self::Complete { r, t } => Self::Complete { r: fix(*r), t: *t },
        }
    }

    /// Convert to a glam affine for renderers.
    pub fn to_affine(&self) -> DAffine3 {
        DAffine3::from_mat3_translation(self.r(), self.t())
    }
}

impl Mul for Transformation {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.compose(&rhs)
    }
}

impl Mul<DVec3> for Transformation {
    type Output = DVec3;

    fn mul(self, rhs: DVec3) -> DVec3 {
        self.apply(rhs)
    }
}

fn orthonormal_deviation(r: DMat3) -> f64 {
    let d = r.transpose() * r - DMat3::IDENTITY;
    d.x_axis
        .abs()
        .max(d.y_axis.abs())
        .max(d.z_axis.abs())
        .max_element()
}

fn check_orthonormal(r: DMat3) -> Result<(), TransformError> {
    let deviation = orthonormal_deviation(r);
    if deviation <= EPSILON {
        Ok(())
    } else {
        Err(TransformError::NotOrthonormal { deviation })
    }
}
