//! Regular polyhedra and boxes
//!
//! Every shape is centered at the origin with polygons wound
//! counter-clockwise seen from outside, and comes with connectivity,
//! normals, centroids, texture coordinates and tangents.

use crate::config::ProcessFlags;
use crate::error::MeshError;
use crate::mesh::{AttributeRegistry, Mesh, PointId};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Built-in shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Tetrahedron,
    Cube,
    Octahedron,
    Dodecahedron,
    Icosahedron,
    Cuboctahedron,
}

impl Shape {
    pub const ALL: [Shape; 6] = [
        Shape::Tetrahedron,
        Shape::Cube,
        Shape::Octahedron,
        Shape::Dodecahedron,
        Shape::Icosahedron,
        Shape::Cuboctahedron,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Shape::Tetrahedron => "tetrahedron",
            Shape::Cube => "cube",
            Shape::Octahedron => "octahedron",
            Shape::Dodecahedron => "dodecahedron",
            Shape::Icosahedron => "icosahedron",
            Shape::Cuboctahedron => "cuboctahedron",
        }
    }

    /// Build the shape with a given size and attribute registry
    ///
    /// `size` is the edge length of the cube and the radius scale of the
    /// other shapes.
    pub fn make(self, size: f32, registry: Arc<AttributeRegistry>) -> Mesh {
        let r = size as f64;
        let (points, polygons) = match self {
            Shape::Tetrahedron => tetrahedron(r),
            Shape::Cube => cuboid(r, r, r),
            Shape::Octahedron => octahedron(r),
            Shape::Dodecahedron => dodecahedron(r),
            Shape::Icosahedron => icosahedron(r),
            Shape::Cuboctahedron => cuboctahedron(r),
        };
        build(self.name(), registry, &points, &polygons)
    }

    /// Like [`make`](Self::make), but rejects sizes that are not finite and
    /// positive
    pub fn try_make(
        self,
        size: f32,
        registry: Arc<AttributeRegistry>,
    ) -> Result<Mesh, MeshError> {
        if !size.is_finite() || size <= 0.0 {
            return Err(MeshError::GeometryError(format!(
                "{} size must be finite and positive, got {}",
                self, size
            )));
        }
        Ok(self.make(size, registry))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Shape {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Shape::ALL
            .into_iter()
            .find(|shape| shape.name() == lower)
            .ok_or_else(|| MeshError::UnknownShape(s.to_string()))
    }
}

type Points = Vec<[f64; 3]>;
type Polygons = Vec<Vec<u32>>;

/// Create the mesh and orient every polygon away from the origin
fn build(
    name: &str,
    registry: Arc<AttributeRegistry>,
    points: &[[f64; 3]],
    polygons: &[Vec<u32>],
) -> Mesh {
    let mut mesh = Mesh::with_name(name, registry);
    let point_ids: Vec<PointId> = points
        .iter()
        .map(|p| mesh.make_point_with_position(p[0] as f32, p[1] as f32, p[2] as f32))
        .collect();

    for polygon in polygons {
        let mut ring: Vec<PointId> = polygon.iter().map(|&i| point_ids[i as usize]).collect();
        let positions: Vec<_> = ring
            .iter()
            .filter_map(|&p| mesh.point_position(p))
            .collect();
        let centroid = crate::mesh::geometry::polygon_centroid(&positions);
        let outward = crate::mesh::geometry::polygon_normal(&positions)
            .map(|n| n.dot(&centroid) >= 0.0)
            .unwrap_or(true);
        if !outward {
            ring.reverse();
        }
        mesh.make_polygon_from_points(&ring);
    }

    mesh.process(&ProcessFlags::all());
    mesh
}

fn standard_registry() -> Arc<AttributeRegistry> {
    Arc::new(AttributeRegistry::standard())
}

fn tetrahedron(r: f64) -> (Points, Polygons) {
    let sq2 = 2.0f64.sqrt();
    let sq3 = 3.0f64.sqrt();
    let points = vec![
        [0.0, r, 0.0],
        [0.0, -r / 3.0, r * 2.0 * sq2 / 3.0],
        [-r * sq3 * sq2 / 3.0, -r / 3.0, -r * sq2 / 3.0],
        [r * sq3 * sq2 / 3.0, -r / 3.0, -r * sq2 / 3.0],
    ];
    let polygons = vec![vec![0, 1, 2], vec![3, 1, 0], vec![0, 2, 3], vec![3, 2, 1]];
    (points, polygons)
}

fn cuboid(x: f64, y: f64, z: f64) -> (Points, Polygons) {
    let (x, y, z) = (0.5 * x, 0.5 * y, 0.5 * z);
    //    6------7
    //   /|     /|
    //  2-+----4 |
    //  | 3----+-5
    //  |/     |/
    //  0------1
    let points = vec![
        [-x, -y, -z],
        [x, -y, -z],
        [-x, y, -z],
        [-x, -y, z],
        [x, y, -z],
        [x, -y, z],
        [-x, y, z],
        [x, y, z],
    ];
    let polygons = vec![
        vec![0, 1, 4, 2],
        vec![0, 3, 5, 1],
        vec![0, 2, 6, 3],
        vec![7, 5, 3, 6],
        vec![7, 4, 1, 5],
        vec![6, 2, 4, 7],
    ];
    (points, polygons)
}

fn octahedron(r: f64) -> (Points, Polygons) {
    let points = vec![
        [0.0, r, 0.0],
        [0.0, -r, 0.0],
        [-r, 0.0, 0.0],
        [0.0, 0.0, -r],
        [r, 0.0, 0.0],
        [0.0, 0.0, r],
    ];
    let polygons = vec![
        vec![0, 2, 3],
        vec![0, 3, 4],
        vec![0, 4, 5],
        vec![0, 5, 2],
        vec![3, 2, 1],
        vec![4, 3, 1],
        vec![5, 4, 1],
        vec![2, 5, 1],
    ];
    (points, polygons)
}

fn dodecahedron(r: f64) -> (Points, Polygons) {
    let sq3 = 3.0f64.sqrt();
    let sq5 = 5.0f64.sqrt();
    let a = 2.0 / (sq3 + sq3 * sq5);
    let b = 1.0 / (3.0 * a);
    let c = r / sq3;
    let points = vec![
        [c, c, c],
        [c, c, -c],
        [c, -c, c],
        [c, -c, -c],
        [-c, c, c],
        [-c, c, -c],
        [-c, -c, c],
        [-c, -c, -c],
        [0.0, r * a, r * b],
        [0.0, r * a, -r * b],
        [0.0, -r * a, r * b],
        [0.0, -r * a, -r * b],
        [r * a, r * b, 0.0],
        [r * a, -r * b, 0.0],
        [-r * a, r * b, 0.0],
        [-r * a, -r * b, 0.0],
        [r * b, 0.0, r * a],
        [r * b, 0.0, -r * a],
        [-r * b, 0.0, r * a],
        [-r * b, 0.0, -r * a],
    ];
    let polygons = vec![
        vec![6, 18, 4, 8, 10],
        vec![10, 8, 0, 16, 2],
        vec![3, 17, 1, 9, 11],
        vec![5, 19, 7, 11, 9],
        vec![3, 13, 2, 16, 17],
        vec![17, 16, 0, 12, 1],
        vec![19, 18, 6, 15, 7],
        vec![5, 14, 4, 18, 19],
        vec![0, 8, 4, 14, 12],
        vec![12, 14, 5, 9, 1],
        vec![13, 15, 6, 10, 2],
        vec![3, 11, 7, 15, 13],
    ];
    (points, polygons)
}

fn icosahedron(r: f64) -> (Points, Polygons) {
    let sq5 = 5.0f64.sqrt();
    let b = ((3.0 + sq5) / (1.0 + sq5)).sqrt();
    let a = 2.0 / (1.0 + sq5) / b;
    let points = vec![
        [0.0, r * a, r / b],
        [0.0, r * a, -r / b],
        [0.0, -r * a, r / b],
        [0.0, -r * a, -r / b],
        [r * a, r / b, 0.0],
        [r * a, -r / b, 0.0],
        [-r * a, r / b, 0.0],
        [-r * a, -r / b, 0.0],
        [r / b, 0.0, r * a],
        [r / b, 0.0, -r * a],
        [-r / b, 0.0, r * a],
        [-r / b, 0.0, -r * a],
    ];
    let polygons = vec![
        vec![1, 4, 6],
        vec![0, 6, 4],
        vec![0, 2, 10],
        vec![0, 8, 2],
        vec![1, 3, 9],
        vec![1, 11, 3],
        vec![2, 5, 7],
        vec![3, 7, 5],
        vec![6, 10, 11],
        vec![7, 11, 10],
        vec![4, 9, 8],
        vec![5, 8, 9],
        vec![0, 10, 6],
        vec![0, 4, 8],
        vec![1, 6, 11],
        vec![1, 9, 4],
        vec![3, 11, 7],
        vec![3, 5, 9],
        vec![2, 7, 10],
        vec![2, 8, 5],
    ];
    (points, polygons)
}

fn cuboctahedron(r: f64) -> (Points, Polygons) {
    let h = r / 2.0;
    let s = r * 2.0f64.sqrt() / 2.0;
    let points = vec![
        [0.0, r, 0.0],
        [h, h, s],
        [h, h, -s],
        [r, 0.0, 0.0],
        [h, -h, s],
        [h, -h, -s],
        [0.0, -r, 0.0],
        [-h, -h, s],
        [-h, -h, -s],
        [-r, 0.0, 0.0],
        [-h, h, s],
        [-h, h, -s],
    ];
    let polygons = vec![
        vec![1, 4, 7, 10],
        vec![4, 3, 5, 6],
        vec![0, 2, 3, 1],
        vec![11, 8, 5, 2],
        vec![10, 9, 11, 0],
        vec![7, 6, 8, 9],
        vec![0, 1, 10],
        vec![3, 4, 1],
        vec![4, 6, 7],
        vec![10, 7, 9],
        vec![11, 2, 0],
        vec![2, 5, 3],
        vec![8, 6, 5],
        vec![9, 8, 11],
    ];
    (points, polygons)
}

pub fn make_tetrahedron(r: f32) -> Mesh {
    Shape::Tetrahedron.make(r, standard_registry())
}

/// Cube with edge length `r`
pub fn make_cube(r: f32) -> Mesh {
    Shape::Cube.make(r, standard_registry())
}

/// Axis-aligned box with the given extents
pub fn make_box(x: f32, y: f32, z: f32) -> Mesh {
    let (points, polygons) = cuboid(x as f64, y as f64, z as f64);
    build("box", standard_registry(), &points, &polygons)
}

pub fn make_octahedron(r: f32) -> Mesh {
    Shape::Octahedron.make(r, standard_registry())
}

pub fn make_dodecahedron(r: f32) -> Mesh {
    Shape::Dodecahedron.make(r, standard_registry())
}

pub fn make_icosahedron(r: f32) -> Mesh {
    Shape::Icosahedron.make(r, standard_registry())
}

pub fn make_cuboctahedron(r: f32) -> Mesh {
    Shape::Cuboctahedron.make(r, standard_registry())
}
