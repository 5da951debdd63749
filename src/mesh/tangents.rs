//! Tangent space generation
//!
//! The generator only talks to a [`TangentSpaceSource`], so it can run on
//! anything that exposes polygons with positions, normals and texture
//! coordinates. [`MeshTangentSource`] adapts a [`Mesh`].

use crate::mesh::attributes::{names, AttributeKey};
use crate::mesh::property_map::PropertyMap;
use crate::mesh::topology::Mesh;
use crate::mesh::types::{CornerId, EntityId, PointId, PolygonId, Vec2, Vec3, Vec4};

/// Data access needed by [`generate_tangents`]
///
/// Polygons and corners are addressed by position: `polygon` in
/// `0..polygon_count()`, `corner` in `0..corner_count(polygon)`.
pub trait TangentSpaceSource {
    fn polygon_count(&self) -> usize;
    fn corner_count(&self, polygon: usize) -> usize;
    fn position(&self, polygon: usize, corner: usize) -> Vec3;
    fn normal(&self, polygon: usize, corner: usize) -> Vec3;
    fn texcoord(&self, polygon: usize, corner: usize) -> Vec2;

    /// Receive the tangent of a corner; `w` is the bitangent handedness
    fn set_tangent(&mut self, polygon: usize, corner: usize, tangent: Vec4);
}

/// Any unit vector perpendicular to `n`
fn perpendicular(n: &Vec3) -> Vec3 {
    let axis = if n.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
    (axis - n * n.dot(&axis)).normalize()
}

/// Generate per-corner tangents
///
/// Tangent and bitangent directions are accumulated over the triangle fan
/// of each polygon, then orthonormalized against every corner normal.
/// Polygons whose texture mapping is degenerate still receive a tangent
/// perpendicular to the normal. Returns the number of such polygons.
pub fn generate_tangents<S: TangentSpaceSource>(source: &mut S) -> usize {
    let mut degenerate_count = 0usize;
    for polygon in 0..source.polygon_count() {
        let n = source.corner_count(polygon);
        if n < 3 {
            continue;
        }

        let mut tangent_sum = Vec3::zeros();
        let mut bitangent_sum = Vec3::zeros();
        let p0 = source.position(polygon, 0);
        let uv0 = source.texcoord(polygon, 0);
        for i in 1..n - 1 {
            let e1 = source.position(polygon, i) - p0;
            let e2 = source.position(polygon, i + 1) - p0;
            let d1 = source.texcoord(polygon, i) - uv0;
            let d2 = source.texcoord(polygon, i + 1) - uv0;
            let det = d1.x * d2.y - d2.x * d1.y;
            if det.abs() <= f32::EPSILON {
                continue;
            }
            let r = 1.0 / det;
            tangent_sum += (e1 * d2.y - e2 * d1.y) * r;
            bitangent_sum += (e2 * d1.x - e1 * d2.x) * r;
        }
        if tangent_sum.norm_squared() <= f32::EPSILON {
            degenerate_count += 1;
        }

        for corner in 0..n {
            let normal = source.normal(polygon, corner);
            let tangent = (tangent_sum - normal * normal.dot(&tangent_sum))
                .try_normalize(f32::EPSILON)
                .unwrap_or_else(|| perpendicular(&normal));
            let handedness = if normal.cross(&tangent).dot(&bitangent_sum) < 0.0 {
                -1.0
            } else {
                1.0
            };
            source.set_tangent(polygon, corner, tangent.push(handedness));
        }
    }
    degenerate_count
}

/// [`TangentSpaceSource`] over a [`Mesh`]
///
/// Normals come from the corner, then the polygon, then the smooth point
/// normal. Texture coordinates come from the corner, then the point.
/// Generated tangents are collected and written back by
/// [`Mesh::compute_tangents`].
pub struct MeshTangentSource<'a> {
    mesh: &'a Mesh,
    positions: &'a PropertyMap<PointId, Vec3>,
    corner_normals: Option<&'a PropertyMap<CornerId, Vec3>>,
    polygon_normals: Option<&'a PropertyMap<PolygonId, Vec3>>,
    point_normals: Option<&'a PropertyMap<PointId, Vec3>>,
    corner_texcoords: Option<&'a PropertyMap<CornerId, Vec2>>,
    point_texcoords: Option<&'a PropertyMap<PointId, Vec2>>,
    tangents: Vec<(CornerId, Vec4)>,
}

impl<'a> MeshTangentSource<'a> {
    /// `None` when the mesh has no positions
    pub fn new(mesh: &'a Mesh) -> Option<Self> {
        let positions = mesh.point_positions()?;
        let normal = AttributeKey::named(names::NORMAL);
        let texcoord = AttributeKey::named(names::TEXCOORD);
        Some(Self {
            mesh,
            positions,
            corner_normals: mesh.corner_attributes().find(&normal),
            polygon_normals: mesh.polygon_attributes().find(&normal),
            point_normals: mesh
                .point_attributes()
                .find(&AttributeKey::named(names::NORMAL_SMOOTH)),
            corner_texcoords: mesh.corner_attributes().find(&texcoord),
            point_texcoords: mesh.point_attributes().find(&texcoord),
            tangents: Vec::with_capacity(mesh.corner_count()),
        })
    }

    /// Generated `(corner, tangent)` pairs
    pub fn into_tangents(self) -> Vec<(CornerId, Vec4)> {
        self.tangents
    }

    fn corner_id(&self, polygon: usize, corner: usize) -> CornerId {
        self.mesh.polygon_corners(PolygonId::from_index(polygon))[corner]
    }

    fn point_id(&self, polygon: usize, corner: usize) -> PointId {
        self.mesh.corner(self.corner_id(polygon, corner)).point_id
    }
}

impl TangentSpaceSource for MeshTangentSource<'_> {
    fn polygon_count(&self) -> usize {
        self.mesh.polygon_count()
    }

    fn corner_count(&self, polygon: usize) -> usize {
        self.mesh.polygon(PolygonId::from_index(polygon)).corner_count as usize
    }

    fn position(&self, polygon: usize, corner: usize) -> Vec3 {
        self.positions
            .try_get(self.point_id(polygon, corner))
            .unwrap_or_default()
    }

    fn normal(&self, polygon: usize, corner: usize) -> Vec3 {
        let corner_id = self.corner_id(polygon, corner);
        self.corner_normals
            .and_then(|m| m.try_get(corner_id))
            .or_else(|| {
                self.polygon_normals
                    .and_then(|m| m.try_get(PolygonId::from_index(polygon)))
            })
            .or_else(|| {
                self.point_normals
                    .and_then(|m| m.try_get(self.point_id(polygon, corner)))
            })
            .unwrap_or_else(Vec3::y)
    }

    fn texcoord(&self, polygon: usize, corner: usize) -> Vec2 {
        let corner_id = self.corner_id(polygon, corner);
        self.corner_texcoords
            .and_then(|m| m.try_get(corner_id))
            .or_else(|| {
                self.point_texcoords
                    .and_then(|m| m.try_get(self.point_id(polygon, corner)))
            })
            .unwrap_or_default()
    }

    fn set_tangent(&mut self, polygon: usize, corner: usize, tangent: Vec4) {
        let corner_id = self.corner_id(polygon, corner);
        self.tangents.push((corner_id, tangent));
    }
}

impl Mesh {
    /// Per-corner tangents into corner attribute `tangent`
    ///
    /// Polygon normals, centroids, smooth point normals and missing
    /// texture coordinates are computed first. Returns false when the
    /// mesh has no positions.
    pub fn compute_tangents(&mut self) -> bool {
        self.compute_polygon_normals();
        self.compute_polygon_centroids();
        self.compute_point_normals();
        self.generate_polygon_texture_coordinates(false);

        let Some(mut source) = MeshTangentSource::new(self) else {
            log::warn!("Cannot compute tangents for {}: no positions", self.name);
            return false;
        };
        let degenerate = generate_tangents(&mut source);
        let tangents = source.into_tangents();
        if degenerate > 0 {
            log::debug!(
                "{}: {} polygons have degenerate texture mapping",
                self.name,
                degenerate
            );
        }

        match self.create_corner_attribute::<Vec4>(&AttributeKey::named(names::TANGENT)) {
            Ok(map) => {
                for (corner_id, tangent) in tangents {
                    map.put(corner_id, tangent);
                }
                true
            }
            Err(e) => {
                log::error!("Cannot store tangents: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// One quad in the xy plane with texture coordinates matching xy
    struct Quad {
        uv_flip: bool,
        tangents: Vec<Vec4>,
    }

    impl TangentSpaceSource for Quad {
        fn polygon_count(&self) -> usize {
            1
        }

        fn corner_count(&self, _polygon: usize) -> usize {
            4
        }

        fn position(&self, _polygon: usize, corner: usize) -> Vec3 {
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ][corner]
        }

        fn normal(&self, _polygon: usize, _corner: usize) -> Vec3 {
            Vec3::z()
        }

        fn texcoord(&self, polygon: usize, corner: usize) -> Vec2 {
            let p = self.position(polygon, corner);
            if self.uv_flip {
                Vec2::new(p.x, 1.0 - p.y)
            } else {
                p.xy()
            }
        }

        fn set_tangent(&mut self, _polygon: usize, corner: usize, tangent: Vec4) {
            self.tangents[corner] = tangent;
        }
    }

    #[test]
    fn test_tangent_follows_u_axis() {
        let mut quad = Quad {
            uv_flip: false,
            tangents: vec![Vec4::zeros(); 4],
        };
        assert_eq!(generate_tangents(&mut quad), 0);
        for tangent in &quad.tangents {
            assert_relative_eq!(*tangent, Vec4::new(1.0, 0.0, 0.0, 1.0), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_mirrored_mapping_flips_handedness() {
        let mut quad = Quad {
            uv_flip: true,
            tangents: vec![Vec4::zeros(); 4],
        };
        generate_tangents(&mut quad);
        for tangent in &quad.tangents {
            assert_relative_eq!(*tangent, Vec4::new(1.0, 0.0, 0.0, -1.0), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_mesh_tangents_are_perpendicular_to_normals() {
        use crate::mesh::attributes::AttributeRegistry;
        use std::sync::Arc;

        let mut mesh = Mesh::new(Arc::new(AttributeRegistry::standard()));
        let a = mesh.make_point_with_position(0.0, 0.0, 0.0);
        let b = mesh.make_point_with_position(2.0, 0.0, 0.0);
        let c = mesh.make_point_with_position(0.0, 0.0, -2.0);
        mesh.make_polygon_from_points(&[a, b, c]);
        mesh.build_connectivity();
        assert!(mesh.compute_tangents());

        let tangents = mesh
            .corner_attributes()
            .find::<Vec4>(&AttributeKey::named(names::TANGENT))
            .unwrap();
        assert_eq!(tangents.present_count(), 3);
        for (_, tangent) in tangents.iter() {
            assert_relative_eq!(tangent.xyz().dot(&Vec3::y()), 0.0, epsilon = 1e-5);
            assert_relative_eq!(tangent.xyz().norm(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(tangent.w.abs(), 1.0);
        }
    }
}
