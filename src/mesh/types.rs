//! Core entity records and strongly typed arena indices

use nalgebra::{Matrix4, Vector2, Vector3, Vector4};
use std::fmt;
use std::hash::Hash;

/// 2D float vector (texture coordinates)
pub type Vec2 = Vector2<f32>;
/// 3D float vector (positions, normals, centroids)
pub type Vec3 = Vector3<f32>;
/// 4D float vector (tangents with handedness, colors)
pub type Vec4 = Vector4<f32>;
/// 2D unsigned vector
pub type UVec2 = Vector2<u32>;
/// 3D unsigned vector
pub type UVec3 = Vector3<u32>;
/// 4D unsigned vector (joint indices)
pub type UVec4 = Vector4<u32>;
/// Homogeneous transform applied to attributes
pub type Mat4 = Matrix4<f32>;

/// Dense index into one of the mesh arenas
///
/// Implemented by every id newtype so generic containers
/// ([`PropertyMap`](crate::mesh::PropertyMap), [`Remapper`](crate::remapper::Remapper))
/// can convert between ids and slots without knowing the entity kind.
pub trait EntityId: Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + 'static {
    /// Build an id from an arena slot
    fn from_index(index: usize) -> Self;

    /// Arena slot of this id
    fn slot(self) -> usize;
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub u32);

        impl $name {
            /// Create an id from a raw index
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Raw index as `usize`
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl EntityId for $name {
            fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            fn slot(self) -> usize {
                self.0 as usize
            }
        }

        impl From<u32> for $name {
            fn from(index: u32) -> Self {
                Self(index)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Index of a point (unique vertex position identity)
    PointId,
    "p"
);
define_id!(
    /// Index of a corner (one face-vertex instance)
    CornerId,
    "c"
);
define_id!(
    /// Index of a polygon (facet)
    PolygonId,
    "f"
);
define_id!(
    /// Index of an edge (canonical point pair)
    EdgeId,
    "e"
);

/// A vertex position identity
///
/// The point's corners live in a contiguous slice of the mesh's
/// point-corner array, starting at `first_point_corner_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    /// First slot in the point-corner array
    pub first_point_corner_id: u32,

    /// Number of corners currently stored for this point
    pub corner_count: u32,

    /// Number of corners announced while polygons were being built
    pub reserved_corner_count: u32,
}

/// One face-vertex instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Corner {
    /// Point this corner instantiates
    pub point_id: PointId,

    /// Polygon whose ring contains this corner
    pub polygon_id: PolygonId,
}

/// An ordered cycle of corners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Polygon {
    /// First slot in the polygon-corner array
    pub first_polygon_corner_id: u32,

    /// Number of corners in the ring
    pub corner_count: u32,
}

impl Polygon {
    /// Slot range of this polygon's ring in the polygon-corner array
    pub fn corner_range(&self) -> std::ops::Range<usize> {
        let first = self.first_polygon_corner_id as usize;
        first..first + self.corner_count as usize
    }
}

/// An unordered point pair, always stored with `a < b`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Smaller point id
    pub a: PointId,

    /// Larger point id
    pub b: PointId,

    /// First slot in the edge-polygon array
    pub first_edge_polygon_id: u32,

    /// Number of incident polygons
    pub polygon_count: u32,
}

impl Edge {
    /// Create an edge record with no incident polygons yet
    pub fn new(a: PointId, b: PointId) -> Self {
        Self {
            a,
            b,
            first_edge_polygon_id: 0,
            polygon_count: 0,
        }
    }

    /// Point at the other end of the edge
    pub fn other(&self, point_id: PointId) -> PointId {
        if point_id == self.a {
            self.b
        } else {
            self.a
        }
    }
}

/// Order a point pair canonically (smaller id first)
pub fn canonical_pair(a: PointId, b: PointId) -> (PointId, PointId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_pair() {
        let (lo, hi) = canonical_pair(PointId(7), PointId(3));
        assert_eq!(lo, PointId(3));
        assert_eq!(hi, PointId(7));

        let (lo, hi) = canonical_pair(PointId(1), PointId(2));
        assert_eq!((lo, hi), (PointId(1), PointId(2)));
    }

    #[test]
    fn test_id_display_and_slot() {
        assert_eq!(PointId(4).to_string(), "p4");
        assert_eq!(CornerId(0).to_string(), "c0");
        assert_eq!(PolygonId::from_index(9).slot(), 9);
        assert_eq!(EdgeId::new(3).index(), 3);
    }

    #[test]
    fn test_polygon_corner_range() {
        let polygon = Polygon {
            first_polygon_corner_id: 4,
            corner_count: 3,
        };
        assert_eq!(polygon.corner_range(), 4..7);
    }

    #[test]
    fn test_edge_other() {
        let edge = Edge::new(PointId(1), PointId(5));
        assert_eq!(edge.other(PointId(1)), PointId(5));
        assert_eq!(edge.other(PointId(5)), PointId(1));
    }
}
