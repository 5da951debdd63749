//! Polymesh Library
//!
//! Polygon mesh topology kernel: an arena store of points, corners,
//! polygons and edges, connectivity reconstruction, interpolated attributes
//! and topology-changing operators (ambo, gyro, chamfer, weld).

pub mod config;
pub mod error;
pub mod mesh;
pub mod operation;
pub mod remapper;
pub mod shapes;

pub use error::{MeshError, Result};
