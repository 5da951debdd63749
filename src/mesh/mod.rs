//! Mesh data structures: the topology store, its attributes and derived data

pub mod attributes;
pub mod connectivity;
pub mod derived;
pub mod geometry;
pub mod property_map;
pub mod tangents;
pub mod topology;
pub mod types;

pub use attributes::{
    names, AttributeDescriptor, AttributeKey, AttributeMap, AttributeMaps, AttributeRegistry,
    AttributeValue, AttributeValues, InterpolationMode, TransformMode, ValueType,
};
pub use derived::{BoundingBox, MeshInfo};
pub use property_map::PropertyMap;
pub use tangents::{generate_tangents, MeshTangentSource, TangentSpaceSource};
pub use topology::{CornerNeighborhood, Mesh};
pub use types::*;
