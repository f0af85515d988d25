// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node classes: static schemas of capabilities and typed properties.
//!
//! ## Overview
//!
//! Every node is created from a [`NodeClass`]. A class names the capabilities the
//! node has (container, referent, transformable, reference) and the table of
//! class-specific properties with their defaults. The table is assembled at
//! definition time, so there is no runtime registry.
//!
//! The core attributes [`PropertyId::Name`], [`PropertyId::Visible`], and
//! [`PropertyId::Fixed`] exist on every node. Everything else must be listed in
//! the class schema to be read or written.
//!
//! ## Custom classes
//!
//! ```
//! use zeobuilder_tree::class::{NodeClass, PropertyId, PropertySpec, PropertyValue};
//! use zeobuilder_tree::Capabilities;
//!
//! static PROBE: NodeClass = NodeClass {
//!     name: "Probe",
//!     capabilities: Capabilities::TRANSFORMABLE,
//!     properties: &[PropertySpec {
//!         id: PropertyId::Radius,
//!         default: || PropertyValue::Real(0.25),
//!     }],
//!     target_requires: Capabilities::empty(),
//! };
//!
//! assert!(PROBE.has_property(PropertyId::Radius));
//! assert!(!PROBE.has_property(PropertyId::BondOrder));
//! ```

use alloc::string::String;

use crate::types::Capabilities;

/// Typed property identifiers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PropertyId {
    /// Display name ([`ValueKind::Text`]).
    Name,
    /// Visibility ([`ValueKind::Bool`]).
    Visible,
    /// Fixed flag ([`ValueKind::Bool`]).
    Fixed,
    /// Atomic number ([`ValueKind::Int`]).
    Number,
    /// Drawing radius ([`ValueKind::Real`]).
    Radius,
    /// RGBA color ([`ValueKind::Color`]).
    Color,
    /// Bond order ([`ValueKind::Int`]).
    BondOrder,
}

/// Kind of value a property holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ValueKind {
    /// UTF-8 text.
    Text,
    /// Boolean.
    Bool,
    /// Signed integer.
    Int,
    /// Real number.
    Real,
    /// RGBA color.
    Color,
}

impl PropertyId {
    /// The value kind this property accepts.
    pub const fn kind(self) -> ValueKind {
        match self {
            Self::Name => ValueKind::Text,
            Self::Visible | Self::Fixed => ValueKind::Bool,
            Self::Number | Self::BondOrder => ValueKind::Int,
            Self::Radius => ValueKind::Real,
            Self::Color => ValueKind::Color,
        }
    }

    /// Whether the property is present on every node regardless of class.
    pub const fn is_core(self) -> bool {
        matches!(self, Self::Name | Self::Visible | Self::Fixed)
    }

    /// Whether changing the property changes what the node looks like.
    pub const fn affects_draw(self) -> bool {
        matches!(
            self,
            Self::Visible | Self::Number | Self::Radius | Self::Color | Self::BondOrder
        )
    }
}

/// A property value.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// UTF-8 text.
    Text(String),
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Real number.
    Real(f64),
    /// RGBA color.
    Color([f32; 4]),
}

impl PropertyValue {
    /// The kind of this value.
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Real(_) => ValueKind::Real,
            Self::Color(_) => ValueKind::Color,
        }
    }

    /// The boolean, if this is one.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The real number, if this is one.
    pub const fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The text, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One entry of a class schema.
#[derive(Copy, Clone, Debug)]
pub struct PropertySpec {
    /// The property.
    pub id: PropertyId,
    /// Produces the value new nodes start with.
    pub default: fn() -> PropertyValue,
}

/// Static description of a node kind.
#[derive(Debug)]
pub struct NodeClass {
    /// Class name, for diagnostics and serializers.
    pub name: &'static str,
    /// Capabilities of nodes of this class.
    pub capabilities: Capabilities,
    /// Class-specific properties and their defaults.
    pub properties: &'static [PropertySpec],
    /// For referents: capabilities every reference target must have.
    pub target_requires: Capabilities,
}

impl NodeClass {
    /// Whether nodes of this class have `caps`.
    pub const fn has(&self, caps: Capabilities) -> bool {
        self.capabilities.contains(caps)
    }

    /// Whether `id` can be read and written on nodes of this class.
    pub fn has_property(&self, id: PropertyId) -> bool {
        id.is_core() || self.spec(id).is_some()
    }

    /// Schema entry for a class-specific property.
    pub fn spec(&self, id: PropertyId) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.id == id)
    }

    /// Whether a node of class `child` may be added under a node of this class.
    ///
    /// References go under referents only; everything else goes under containers only.
    pub const fn accepts(&self, child: &Self) -> bool {
        if child.has(Capabilities::REFERENCE) {
            self.has(Capabilities::REFERENT)
        } else {
            self.has(Capabilities::CONTAINER)
        }
    }
}

/// Root of a model: holds everything, cannot be transformed.
pub static UNIVERSE: NodeClass = NodeClass {
    name: "Universe",
    capabilities: Capabilities::CONTAINER,
    properties: &[],
    target_requires: Capabilities::empty(),
};

/// A movable container with its own coordinate frame.
pub static FRAME: NodeClass = NodeClass {
    name: "Frame",
    capabilities: Capabilities::CONTAINER.union(Capabilities::TRANSFORMABLE),
    properties: &[],
    target_requires: Capabilities::empty(),
};

/// A grouping container without a coordinate frame of its own.
pub static FOLDER: NodeClass = NodeClass {
    name: "Folder",
    capabilities: Capabilities::CONTAINER,
    properties: &[],
    target_requires: Capabilities::empty(),
};

/// A single atom positioned by its transformation.
pub static ATOM: NodeClass = NodeClass {
    name: "Atom",
    capabilities: Capabilities::TRANSFORMABLE,
    properties: &[
        PropertySpec {
            id: PropertyId::Number,
            default: || PropertyValue::Int(6),
        },
        PropertySpec {
            id: PropertyId::Radius,
            default: || PropertyValue::Real(0.5),
        },
        PropertySpec {
            id: PropertyId::Color,
            default: || PropertyValue::Color([0.5, 0.5, 0.5, 1.0]),
        },
    ],
    target_requires: Capabilities::empty(),
};

/// A marker point.
pub static POINT: NodeClass = NodeClass {
    name: "Point",
    capabilities: Capabilities::TRANSFORMABLE,
    properties: &[
        PropertySpec {
            id: PropertyId::Radius,
            default: || PropertyValue::Real(0.1),
        },
        PropertySpec {
            id: PropertyId::Color,
            default: || PropertyValue::Color([1.0, 1.0, 1.0, 1.0]),
        },
    ],
    target_requires: Capabilities::empty(),
};

/// A bond between the nodes its two references target.
pub static BOND: NodeClass = NodeClass {
    name: "Bond",
    capabilities: Capabilities::REFERENT,
    properties: &[
        PropertySpec {
            id: PropertyId::BondOrder,
            default: || PropertyValue::Int(1),
        },
        PropertySpec {
            id: PropertyId::Color,
            default: || PropertyValue::Color([0.7, 0.7, 0.7, 1.0]),
        },
    ],
    target_requires: Capabilities::TRANSFORMABLE,
};

/// A reference child of a referent.
pub static REFERENCE: NodeClass = NodeClass {
    name: "Reference",
    capabilities: Capabilities::REFERENCE,
    properties: &[],
    target_requires: Capabilities::empty(),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acceptance_by_capability() {
        assert!(UNIVERSE.accepts(&FRAME));
        assert!(FRAME.accepts(&ATOM));
        assert!(!FRAME.accepts(&REFERENCE), "containers reject references");
        assert!(BOND.accepts(&REFERENCE));
        assert!(!BOND.accepts(&ATOM), "referents reject structural children");
        assert!(!ATOM.accepts(&POINT), "leaves accept nothing");
    }

    #[test]
    fn schema_lookup() {
        assert!(ATOM.has_property(PropertyId::Name));
        assert!(ATOM.has_property(PropertyId::Number));
        assert!(!FRAME.has_property(PropertyId::Radius));
        let radius = ATOM.spec(PropertyId::Radius).unwrap();
        assert_eq!((radius.default)(), PropertyValue::Real(0.5));
        assert_eq!(PropertyId::Radius.kind(), ValueKind::Real);
        for spec in ATOM.properties {
            assert_eq!((spec.default)().kind(), spec.id.kind(), "{:?}", spec.id);
        }
    }
}
