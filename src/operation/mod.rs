//! Mesh operators
//!
//! Every operator except [`weld`] reads a source mesh and builds a new one
//! through [`GeometryOperation`], which carries the source attributes over.
//! [`weld`] edits a mesh in place.

use crate::config::GeometryConfig;
use crate::error::MeshError;
use crate::mesh::Mesh;
use std::fmt;
use std::str::FromStr;

pub mod ambo;
pub mod chamfer;
pub mod copy;
pub mod geometry_operation;
pub mod gyro;
pub mod merge_coplanar;
pub mod weld;

pub use ambo::ambo;
pub use chamfer::{chamfer, chamfer_with};
pub use copy::copy;
pub use geometry_operation::GeometryOperation;
pub use gyro::gyro;
pub use merge_coplanar::merge_coplanar_neighbors;
pub use weld::{weld, WeldReport};

/// Operator selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Copy,
    Ambo,
    Gyro,
    Chamfer,
    MergeCoplanar,
    Weld,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Copy,
        Operation::Ambo,
        Operation::Gyro,
        Operation::Chamfer,
        Operation::MergeCoplanar,
        Operation::Weld,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Copy => "copy",
            Operation::Ambo => "ambo",
            Operation::Gyro => "gyro",
            Operation::Chamfer => "chamfer",
            Operation::MergeCoplanar => "merge-coplanar",
            Operation::Weld => "weld",
        }
    }

    /// Apply the operator, consuming the input
    pub fn apply(self, mesh: Mesh, config: &GeometryConfig) -> Mesh {
        match self {
            Operation::Copy => copy(&mesh),
            Operation::Ambo => ambo(&mesh),
            Operation::Gyro => gyro(&mesh),
            Operation::Chamfer => chamfer_with(&mesh, &config.chamfer),
            Operation::MergeCoplanar => merge_coplanar_neighbors(&mesh),
            Operation::Weld => {
                let mut mesh = mesh;
                weld(&mut mesh, &config.weld);
                mesh
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace('_', "-");
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == normalized)
            .ok_or_else(|| MeshError::UnknownOperation(s.to_string()))
    }
}
