//! Error types for the mesh kernel
//!
//! Programming errors (referencing an unallocated id, reading an absent
//! attribute value) are not represented here: they panic at the call site.
//! This module only covers failures a correct caller can still run into,
//! such as a bad configuration file or an attribute type clash.

use thiserror::Error;

/// Error types for mesh operations
#[derive(Error, Debug)]
pub enum MeshError {
    /// Mesh topology is invalid or corrupted
    ///
    /// Reported when a mesh handed across the API boundary violates a
    /// structural expectation that the callee cannot repair locally.
    #[error("Invalid mesh topology: {0}")]
    InvalidMeshTopology(String),

    /// An attribute map exists under the requested key but stores a
    /// different value type
    #[error("Attribute type mismatch for '{name}': expected {expected}, found {found}")]
    AttributeTypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    /// A required attribute (usually point position) is not bound
    #[error("Missing attribute: {0}")]
    MissingAttribute(String),

    /// Shape name could not be parsed
    #[error("Unknown shape: {0}")]
    UnknownShape(String),

    /// Operation name could not be parsed
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Reading or writing a configuration file failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration could not be parsed or holds out-of-range settings
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A geometric query had no answer (parallel planes, zero-length axis)
    #[error("Geometry error: {0}")]
    GeometryError(String),
}

/// Convenience type alias for Results with [`MeshError`]
///
/// ```
/// use polymesh::config::GeometryConfig;
///
/// fn check(config: &GeometryConfig) -> polymesh::Result<()> {
///     config.validate()
/// }
/// ```
pub type Result<T> = std::result::Result<T, MeshError>;
