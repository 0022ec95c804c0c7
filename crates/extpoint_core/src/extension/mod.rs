//! Extension-point registry.
//!
//! # Responsibility
//! - Resolve named extensions declared in descriptor files to shared
//!   singleton instances of a registered extension-point trait.
//! - Fail fast with name-qualified diagnostics instead of the opaque
//!   "class not found" style of generic service discovery.
//!
//! # Invariants
//! - One loader per extension-point type for the process lifetime.
//! - Within one point, a name maps to exactly one implementation type.
//! - Instances are constructed at most once per name, and implementation
//!   types are deduplicated across names.

pub mod descriptor;
pub mod loader;
pub mod point;
pub mod registry;

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ExtensionResult<T> = Result<T, ExtensionError>;

/// Registry, discovery and lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionError {
    /// The type was never registered as an extension point.
    InvalidExtensionPoint { type_name: String },
    /// A point was re-registered with a conflicting descriptor.
    PointAlreadyRegistered { point: String },
    /// An implementation binding has an empty reference.
    EmptyReference { point: String },
    /// A reference was re-bound to a different implementation type.
    ConflictingBinding {
        reference: String,
        existing: String,
        incoming: String,
    },
    /// `get_extension` was called with an empty name.
    EmptyName { point: String },
    /// The `"true"` default sentinel; default resolution is not implemented.
    DefaultUnsupported { point: String },
    /// Adaptive extensions are recognized but not implemented.
    AdaptiveUnsupported { point: String },
    /// The point declared more than one default extension name.
    MultipleDefaultNames { point: String, declared: String },
    /// One name mapped to two different implementation types.
    DuplicateExtension {
        point: String,
        name: String,
        existing: String,
        incoming: String,
    },
    /// A reference resolved to a binding for a different extension point.
    IncompatibleExtension {
        reference: String,
        expected_point: String,
        actual_point: String,
    },
    /// A descriptor line referenced an unbound implementation.
    UnresolvedReference { reference: String, resource: String },
    /// No binding exists for the requested extension name.
    UnknownExtension { point: String, name: String },
    /// The implementation constructor failed.
    Instantiation {
        point: String,
        reference: String,
        message: String,
    },
}

impl Display for ExtensionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidExtensionPoint { type_name } => {
                write!(f, "type is not a registered extension point: {type_name}")
            }
            Self::PointAlreadyRegistered { point } => {
                write!(
                    f,
                    "extension point already registered with a different descriptor: {point}"
                )
            }
            Self::EmptyReference { point } => {
                write!(f, "implementation reference must not be empty: {point}")
            }
            Self::ConflictingBinding {
                reference,
                existing,
                incoming,
            } => write!(
                f,
                "reference {reference} is already bound to {existing}, refusing re-bind to {incoming}"
            ),
            Self::EmptyName { point } => {
                write!(f, "extension name must not be empty: {point}")
            }
            Self::DefaultUnsupported { point } => {
                write!(f, "default-extension resolution is not supported: {point}")
            }
            Self::AdaptiveUnsupported { point } => {
                write!(f, "adaptive extensions are not supported: {point}")
            }
            Self::MultipleDefaultNames { point, declared } => write!(
                f,
                "extension point {point} declares more than one default name: {declared}"
            ),
            Self::DuplicateExtension {
                point,
                name,
                existing,
                incoming,
            } => write!(
                f,
                "duplicate extension {name} on {point}: {existing} conflicts with {incoming}"
            ),
            Self::IncompatibleExtension {
                reference,
                expected_point,
                actual_point,
            } => write!(
                f,
                "reference {reference} is bound to point {actual_point}, not {expected_point}"
            ),
            Self::UnresolvedReference {
                reference,
                resource,
            } => write!(
                f,
                "unresolved implementation reference {reference} in {resource}"
            ),
            Self::UnknownExtension { point, name } => {
                write!(f, "no extension named {name} on {point}")
            }
            Self::Instantiation {
                point,
                reference,
                message,
            } => write!(f, "failed to construct {reference} for {point}: {message}"),
        }
    }
}

impl Error for ExtensionError {}

#[cfg(test)]
mod tests {
    use super::ExtensionError;

    #[test]
    fn unknown_extension_display_names_the_missing_extension() {
        let err = ExtensionError::UnknownExtension {
            point: "demo.Robot".to_string(),
            name: "mima".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("mima"));
        assert!(rendered.contains("demo.Robot"));
    }

    #[test]
    fn duplicate_extension_display_names_both_types() {
        let err = ExtensionError::DuplicateExtension {
            point: "demo.Robot".to_string(),
            name: "a".to_string(),
            existing: "demo::Foo".to_string(),
            incoming: "demo::Bar".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("demo::Foo"));
        assert!(rendered.contains("demo::Bar"));
    }
}
