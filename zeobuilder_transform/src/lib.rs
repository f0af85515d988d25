// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Zeobuilder Transform: rigid-body transformations for scene graphs.
//!
//! - [`Transformation`] is a small value type holding an identity, a translation,
//!   a rotation, or a rotation followed by a translation (`p' = r·p + t`).
//! - Composition is associative but not commutative and keeps the narrowest kind:
//!   translations compose to translations, rotations to rotations, anything else
//!   to a complete transformation.
//! - [`Aabb3`] is the 3D bounding box used for conservative bounds under transforms.
//!
//! Higher layers (like the Zeobuilder scene tree) compose local transformations
//! along tree paths to obtain absolute and relative coordinate frames.
//!
//! # Example
//!
//! ```rust
//! use core::f64::consts::FRAC_PI_2;
//! use glam::DVec3;
//! use zeobuilder_transform::{Transformation, EPSILON};
//!
//! let turn = Transformation::about_axis(DVec3::Z, FRAC_PI_2).unwrap();
//! let shift = Transformation::translation(DVec3::new(0.0, 0.0, 2.0));
//!
//! // Rotate first, then shift.
//! let both = shift.compose(&turn);
//! assert!(both.apply(DVec3::X).abs_diff_eq(DVec3::new(0.0, 1.0, 2.0), EPSILON));
//!
//! // Inverses cancel.
//! assert!(both.inverse().compose(&both).is_identity(EPSILON));
//! ```
//!
//! This crate is `no_std`.

#![no_std]

pub mod aabb;
pub mod transformation;

pub use aabb::Aabb3;
pub use transformation::{EPSILON, Kind, TransformError, Transformation};
