//! Derived mesh data: polygon normals and centroids, smooth point normals,
//! planar texture coordinates, transforms, statistics and consistency checks

use crate::config::ProcessFlags;
use crate::mesh::attributes::{names, AttributeKey};
use crate::mesh::geometry::{polygon_centroid, polygon_normal};
use crate::mesh::topology::Mesh;
use crate::mesh::types::{CornerId, EntityId, Mat4, PointId, PolygonId, Vec2, Vec3};
use serde::Serialize;
use std::collections::BTreeMap;

/// Normal given to polygons that have no area
const FALLBACK_NORMAL: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// Axis-aligned bounding box of the point positions
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundingBox {
    /// Extent along each axis
    pub fn size(&self) -> Vec3 {
        Vec3::new(
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        )
    }
}

/// Summary statistics of a mesh
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshInfo {
    pub name: String,
    pub point_count: usize,
    pub corner_count: usize,
    pub polygon_count: usize,
    pub edge_count: usize,
    /// Number of polygons per corner count
    pub polygon_sizes: BTreeMap<u32, usize>,
    /// Edges with exactly one incident polygon
    pub boundary_edge_count: usize,
    /// Edges with more than two incident polygons
    pub non_manifold_edge_count: usize,
    /// V - E + F
    pub euler_characteristic: i64,
    pub bounding_box: Option<BoundingBox>,
    pub volume: f32,
}

impl Mesh {
    /// Positions of a polygon's points, in ring order
    ///
    /// Points without a position are skipped.
    pub fn polygon_positions(&self, polygon_id: PolygonId) -> Vec<Vec3> {
        let Some(positions) = self.point_positions() else {
            return Vec::new();
        };
        self.polygon_corners(polygon_id)
            .iter()
            .filter_map(|&c| positions.try_get(self.corners[c.index()].point_id))
            .collect()
    }

    /// Normal of one polygon, `(0, 1, 0)` for degenerate polygons
    pub fn compute_polygon_normal(&self, polygon_id: PolygonId) -> Vec3 {
        polygon_normal(&self.polygon_positions(polygon_id)).unwrap_or(FALLBACK_NORMAL)
    }

    /// Compute every polygon's normal into polygon attribute `normal`
    pub fn compute_polygon_normals(&mut self) {
        let normals: Vec<Vec3> = self
            .polygon_ids()
            .map(|polygon_id| self.compute_polygon_normal(polygon_id))
            .collect();
        match self.create_polygon_attribute::<Vec3>(&AttributeKey::named(names::NORMAL)) {
            Ok(map) => {
                for (i, normal) in normals.into_iter().enumerate() {
                    map.put(PolygonId::from_index(i), normal);
                }
            }
            Err(e) => log::error!("Cannot store polygon normals: {}", e),
        }
    }

    /// Compute every polygon's centroid into polygon attribute `centroid`
    pub fn compute_polygon_centroids(&mut self) {
        let centroids: Vec<Vec3> = self
            .polygon_ids()
            .map(|polygon_id| polygon_centroid(&self.polygon_positions(polygon_id)))
            .collect();
        match self.create_polygon_attribute::<Vec3>(&AttributeKey::named(names::CENTROID)) {
            Ok(map) => {
                for (i, centroid) in centroids.into_iter().enumerate() {
                    map.put(PolygonId::from_index(i), centroid);
                }
            }
            Err(e) => log::error!("Cannot store polygon centroids: {}", e),
        }
    }

    /// Smooth point normals into point attribute `normal_smooth`
    ///
    /// Each point receives the normalized sum of its polygons' normals.
    /// Requires point corners; polygon normals are computed when missing.
    pub fn compute_point_normals(&mut self) {
        let key = AttributeKey::named(names::NORMAL);
        if self.polygon_attributes.find::<Vec3>(&key).is_none() {
            self.compute_polygon_normals();
        }
        let Some(polygon_normals) = self.polygon_attributes.find::<Vec3>(&key) else {
            return;
        };

        let normals: Vec<Option<Vec3>> = self
            .point_ids()
            .map(|point_id| {
                let sum = self
                    .point_corners(point_id)
                    .iter()
                    .filter_map(|&c| polygon_normals.try_get(self.corners[c.index()].polygon_id))
                    .fold(Vec3::zeros(), |sum, n| sum + n);
                sum.try_normalize(f32::EPSILON)
            })
            .collect();

        match self.create_point_attribute::<Vec3>(&AttributeKey::named(names::NORMAL_SMOOTH)) {
            Ok(map) => {
                for (i, normal) in normals.into_iter().enumerate() {
                    let point_id = PointId::from_index(i);
                    match normal {
                        Some(normal) => map.put(point_id, normal),
                        None => map.erase(point_id),
                    }
                }
            }
            Err(e) => log::error!("Cannot store smooth point normals: {}", e),
        }
    }

    /// Planar texture coordinates into corner attribute `texcoord_0`
    ///
    /// Each polygon is projected onto its own plane, with the x axis
    /// pointing from the centroid to the first point. Polygons whose
    /// corners already have texture coordinates are left alone unless
    /// `overwrite` is set.
    pub fn generate_polygon_texture_coordinates(&mut self, overwrite: bool) {
        self.compute_polygon_normals();
        self.compute_polygon_centroids();

        let texcoord_key = AttributeKey::named(names::TEXCOORD);
        let existing = self.corner_attributes.find::<Vec2>(&texcoord_key);
        let normals = self
            .polygon_attributes
            .find::<Vec3>(&AttributeKey::named(names::NORMAL));
        let centroids = self
            .polygon_attributes
            .find::<Vec3>(&AttributeKey::named(names::CENTROID));
        let (Some(normals), Some(centroids), Some(positions)) =
            (normals, centroids, self.point_positions())
        else {
            log::warn!(
                "Cannot generate texture coordinates for {}: missing positions",
                self.name
            );
            return;
        };

        let mut generated: Vec<(CornerId, Vec2)> = Vec::new();
        let mut polygon_count = 0usize;
        for polygon_id in self.polygon_ids() {
            let ring = self.polygon_corners(polygon_id);
            if ring.len() < 3 {
                continue;
            }
            if !overwrite {
                if let Some(existing) = existing {
                    if ring.iter().all(|&c| existing.has(c)) {
                        continue;
                    }
                }
            }

            let centroid = centroids.get(polygon_id);
            let normal = normals.get(polygon_id);
            let Some(p0) = positions.try_get(self.corners[ring[0].index()].point_id) else {
                continue;
            };
            let Some(edge) = (p0 - centroid).try_normalize(f32::EPSILON) else {
                continue;
            };
            let side = normal.cross(&edge);

            // First pass finds the scale that fits the polygon in [0, 1]
            let mut unscaled = Vec::with_capacity(ring.len());
            let mut max_distance = 0.0f32;
            for &corner_id in ring {
                let Some(position) = positions.try_get(self.corners[corner_id.index()].point_id)
                else {
                    continue;
                };
                let local = position - centroid;
                let uv = Vec2::new(local.dot(&edge), local.dot(&side));
                max_distance = max_distance.max(uv.x.abs()).max(uv.y.abs());
                unscaled.push((corner_id, uv));
            }
            let scale = if max_distance > 0.0 { 0.5 / max_distance } else { 1.0 };
            generated.extend(
                unscaled
                    .into_iter()
                    .map(|(corner_id, uv)| (corner_id, uv * scale + Vec2::new(0.5, 0.5))),
            );
            polygon_count += 1;
        }

        match self.create_corner_attribute::<Vec2>(&texcoord_key) {
            Ok(map) => {
                for (corner_id, uv) in generated {
                    map.put(corner_id, uv);
                }
            }
            Err(e) => log::error!("Cannot store texture coordinates: {}", e),
        }
        log::debug!(
            "Generated texture coordinates for {} polygons of {}",
            polygon_count,
            self.name
        );
    }

    /// Apply `matrix` to every bound attribute according to its transform mode
    pub fn transform(&mut self, matrix: &Mat4) {
        let Some(inverse) = matrix.try_inverse() else {
            log::error!("Cannot transform {}: matrix is singular", self.name);
            return;
        };
        let inverse_transpose = inverse.transpose();
        self.point_attributes.transform(matrix, &inverse_transpose);
        self.corner_attributes.transform(matrix, &inverse_transpose);
        self.polygon_attributes.transform(matrix, &inverse_transpose);
        self.edge_attributes.transform(matrix, &inverse_transpose);
    }

    /// Flip the winding of every polygon
    ///
    /// Direction-like attributes are negated. Point corners and edges are
    /// rebuilt when they had been built.
    pub fn reverse_polygons(&mut self) {
        for polygon in &self.polygons {
            self.polygon_corners[polygon.corner_range()].reverse();
        }
        self.point_attributes.negate_directions();
        self.corner_attributes.negate_directions();
        self.polygon_attributes.negate_directions();

        if !self.point_corners.is_empty() {
            self.sort_point_corners();
        }
        if !self.edges.is_empty() {
            self.build_edges();
        }
    }

    /// Verify the data-model invariants, logging every violation
    ///
    /// Returns true when no violation was found.
    pub fn sanity_check(&self) -> bool {
        let mut error_count = 0usize;
        let point_count = self.points.len();
        let polygon_count = self.polygons.len();

        for point_id in self.point_ids() {
            for &corner_id in self.point_corners(point_id) {
                let Some(corner) = self.corners.get(corner_id.index()) else {
                    log::error!("Point {} uses invalid corner {}", point_id, corner_id);
                    error_count += 1;
                    continue;
                };
                if corner.point_id != point_id {
                    log::error!(
                        "Point {} uses corner {} but corner point is {}",
                        point_id,
                        corner_id,
                        corner.point_id
                    );
                    error_count += 1;
                }
            }
        }

        for polygon_id in self.polygon_ids() {
            let range = self.polygons[polygon_id.index()].corner_range();
            if range.end > self.polygon_corners.len() {
                log::error!(
                    "Polygon {} corner range {:?} is out of bounds",
                    polygon_id,
                    range
                );
                error_count += 1;
                continue;
            }
            for &corner_id in &self.polygon_corners[range] {
                let Some(corner) = self.corners.get(corner_id.index()) else {
                    log::error!("Polygon {} uses invalid corner {}", polygon_id, corner_id);
                    error_count += 1;
                    continue;
                };
                if corner.polygon_id != polygon_id {
                    log::error!(
                        "Polygon {} uses corner {} but corner polygon is {}",
                        polygon_id,
                        corner_id,
                        corner.polygon_id
                    );
                    error_count += 1;
                }
            }
        }

        let linked = !self.point_corners.is_empty();
        for corner_id in self.corner_ids() {
            let corner = self.corners[corner_id.index()];
            if corner.point_id.index() >= point_count {
                log::error!(
                    "Corner {} points to invalid point {}",
                    corner_id,
                    corner.point_id
                );
                error_count += 1;
            } else if linked && !self.point_corners(corner.point_id).contains(&corner_id) {
                log::error!(
                    "Corner {} is not referenced by its point {}",
                    corner_id,
                    corner.point_id
                );
                error_count += 1;
            }
            if corner.polygon_id.index() >= polygon_count {
                log::error!(
                    "Corner {} points to invalid polygon {}",
                    corner_id,
                    corner.polygon_id
                );
                error_count += 1;
            } else if !self.polygon_corners(corner.polygon_id).contains(&corner_id) {
                log::error!(
                    "Corner {} is not referenced by its polygon {}",
                    corner_id,
                    corner.polygon_id
                );
                error_count += 1;
            }
        }

        for edge_id in self.edge_ids() {
            let edge = self.edges[edge_id.index()];
            if edge.a >= edge.b {
                log::error!(
                    "Edge {} has unordered points {} {}",
                    edge_id,
                    edge.a,
                    edge.b
                );
                error_count += 1;
            }
            for &polygon_id in self.edge_polygons(edge_id) {
                let points = self.polygon_points(polygon_id);
                if !points.contains(&edge.a) || !points.contains(&edge.b) {
                    log::error!(
                        "Edge {} lists polygon {} which does not use both its points",
                        edge_id,
                        polygon_id
                    );
                    error_count += 1;
                }
            }
        }

        if error_count > 0 {
            log::error!("{}: {} sanity check errors", self.name, error_count);
        }
        error_count == 0
    }

    /// Dump every entity at trace level
    pub fn debug_trace(&self) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        log::trace!(
            "{}: {} points, {} corners, {} polygons, {} edges",
            self.name,
            self.points.len(),
            self.corners.len(),
            self.polygons.len(),
            self.edges.len()
        );
        for point_id in self.point_ids() {
            log::trace!(
                "point {} position {:?} corners {:?}",
                point_id,
                self.point_position(point_id).map(|p| [p.x, p.y, p.z]),
                self.point_corners(point_id)
            );
        }
        for corner_id in self.corner_ids() {
            let corner = self.corners[corner_id.index()];
            log::trace!(
                "corner {} point {} polygon {}",
                corner_id,
                corner.point_id,
                corner.polygon_id
            );
        }
        for polygon_id in self.polygon_ids() {
            log::trace!(
                "polygon {} corners {:?} points {:?}",
                polygon_id,
                self.polygon_corners(polygon_id),
                self.polygon_points(polygon_id)
            );
        }
        for edge_id in self.edge_ids() {
            let edge = self.edges[edge_id.index()];
            log::trace!(
                "edge {} {} - {} polygons {:?}",
                edge_id,
                edge.a,
                edge.b,
                self.edge_polygons(edge_id)
            );
        }
    }

    /// Bounding box of all positioned points
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let positions = self.point_positions()?;
        let mut iter = positions.iter().map(|(_, p)| p);
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p)));
        Some(BoundingBox {
            min: [min.x, min.y, min.z],
            max: [max.x, max.y, max.z],
        })
    }

    /// Signed volume enclosed by the polygons
    ///
    /// Each polygon is fanned from its centroid. Meaningful for closed,
    /// outward oriented meshes; negative for inward orientation.
    pub fn volume(&self) -> f32 {
        let mut sum = 0.0f32;
        for polygon_id in self.polygon_ids() {
            let positions = self.polygon_positions(polygon_id);
            let n = positions.len();
            if n < 3 {
                continue;
            }
            let c = polygon_centroid(&positions);
            for i in 0..n {
                let p1 = positions[i];
                let p2 = positions[(i + 1) % n];
                sum += c.dot(&p1.cross(&p2));
            }
        }
        sum / 6.0
    }

    /// Summary statistics
    pub fn info(&self) -> MeshInfo {
        let mut polygon_sizes = BTreeMap::new();
        for polygon in &self.polygons {
            *polygon_sizes.entry(polygon.corner_count).or_insert(0) += 1;
        }
        let boundary_edge_count = self
            .edges
            .iter()
            .filter(|e| e.polygon_count == 1)
            .count();
        let non_manifold_edge_count = self.edges.iter().filter(|e| e.polygon_count > 2).count();

        MeshInfo {
            name: self.name.clone(),
            point_count: self.points.len(),
            corner_count: self.corners.len(),
            polygon_count: self.polygons.len(),
            edge_count: self.edges.len(),
            polygon_sizes,
            boundary_edge_count,
            non_manifold_edge_count,
            euler_characteristic: self.points.len() as i64 - self.edges.len() as i64
                + self.polygons.len() as i64,
            bounding_box: self.bounding_box(),
            volume: self.volume(),
        }
    }

    /// Run the selected post-processing steps in a fixed order
    pub fn process(&mut self, flags: &ProcessFlags) {
        if flags.build_edges {
            let unsorted = self.build_connectivity();
            if !unsorted.is_empty() {
                log::warn!(
                    "{}: {} points have unsortable corner fans",
                    self.name,
                    unsorted.len()
                );
            }
        }
        if flags.compute_polygon_normals {
            self.compute_polygon_normals();
        }
        if flags.compute_polygon_centroids {
            self.compute_polygon_centroids();
        }
        if flags.compute_smooth_point_normals {
            self.compute_point_normals();
        }
        if flags.generate_texture_coordinates {
            self.generate_polygon_texture_coordinates(false);
        }
        if flags.compute_tangents {
            self.compute_tangents();
        }
        if flags.debug_trace {
            self.debug_trace();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::attributes::AttributeRegistry;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    /// Unit cube `[0, 1]^3` with outward winding
    fn unit_cube() -> Mesh {
        let mut mesh = Mesh::with_name("cube", Arc::new(AttributeRegistry::standard()));
        let p: Vec<PointId> = [
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (1.0, 1.0, 0.0),
            (0.0, 1.0, 0.0),
            (0.0, 0.0, 1.0),
            (1.0, 0.0, 1.0),
            (1.0, 1.0, 1.0),
            (0.0, 1.0, 1.0),
        ]
        .iter()
        .map(|&(x, y, z)| mesh.make_point_with_position(x, y, z))
        .collect();
        for face in [
            [0, 3, 2, 1],
            [4, 5, 6, 7],
            [0, 1, 5, 4],
            [2, 3, 7, 6],
            [1, 2, 6, 5],
            [0, 4, 7, 3],
        ] {
            mesh.make_polygon_from_points(&face.map(|i| p[i]));
        }
        mesh.build_connectivity();
        mesh
    }

    #[test]
    fn test_polygon_normals_point_outward() {
        let mut mesh = unit_cube();
        mesh.compute_polygon_normals();
        mesh.compute_polygon_centroids();
        let normals = mesh
            .polygon_attributes()
            .find::<Vec3>(&AttributeKey::named(names::NORMAL))
            .unwrap();
        let centroids = mesh
            .polygon_attributes()
            .find::<Vec3>(&AttributeKey::named(names::CENTROID))
            .unwrap();
        for polygon_id in mesh.polygon_ids() {
            let outward = centroids.get(polygon_id) - Vec3::new(0.5, 0.5, 0.5);
            assert_relative_eq!(normals.get(polygon_id), outward * 2.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_degenerate_polygon_gets_fallback_normal() {
        let mut mesh = Mesh::new(Arc::new(AttributeRegistry::standard()));
        let a = mesh.make_point_with_position(0.0, 0.0, 0.0);
        let b = mesh.make_point_with_position(1.0, 0.0, 0.0);
        let c = mesh.make_point_with_position(2.0, 0.0, 0.0);
        let polygon = mesh.make_polygon_from_points(&[a, b, c]);
        assert_eq!(
            mesh.compute_polygon_normal(polygon),
            Vec3::new(0.0, 1.0, 0.0)
        );
    }

    #[test]
    fn test_smooth_point_normals() {
        let mut mesh = unit_cube();
        mesh.compute_point_normals();
        let normals = mesh
            .point_attributes()
            .find::<Vec3>(&AttributeKey::named(names::NORMAL_SMOOTH))
            .unwrap();
        let expected = Vec3::new(-1.0, -1.0, -1.0).normalize();
        assert_relative_eq!(normals.get(PointId(0)), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_volume_and_info() {
        let mesh = unit_cube();
        assert_relative_eq!(mesh.volume(), 1.0, epsilon = 1e-5);

        let info = mesh.info();
        assert_eq!(info.point_count, 8);
        assert_eq!(info.edge_count, 12);
        assert_eq!(info.polygon_sizes.get(&4), Some(&6));
        assert_eq!(info.boundary_edge_count, 0);
        assert_eq!(info.euler_characteristic, 2);
        let bbox = info.bounding_box.unwrap();
        assert_eq!(bbox.min, [0.0, 0.0, 0.0]);
        assert_eq!(bbox.max, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_reverse_polygons_negates_volume_and_normals() {
        let mut mesh = unit_cube();
        mesh.compute_polygon_normals();
        mesh.reverse_polygons();
        assert_relative_eq!(mesh.volume(), -1.0, epsilon = 1e-5);
        let normal = mesh
            .polygon_attributes()
            .find::<Vec3>(&AttributeKey::named(names::NORMAL))
            .unwrap()
            .get(PolygonId(0));
        assert_relative_eq!(normal, Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-6);
        assert!(mesh.sanity_check());
    }

    #[test]
    fn test_transform_scales_positions() {
        let mut mesh = unit_cube();
        mesh.compute_polygon_normals();
        mesh.transform(&Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 1.0, 1.0)));
        assert_relative_eq!(mesh.volume(), 2.0, epsilon = 1e-5);
        let normal = mesh
            .polygon_attributes()
            .find::<Vec3>(&AttributeKey::named(names::NORMAL))
            .unwrap()
            .get(PolygonId(4));
        assert_relative_eq!(normal, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_texture_coordinates_in_unit_square() {
        let mut mesh = unit_cube();
        mesh.generate_polygon_texture_coordinates(false);
        let texcoords = mesh
            .corner_attributes()
            .find::<Vec2>(&AttributeKey::named(names::TEXCOORD))
            .unwrap();
        assert_eq!(texcoords.present_count(), mesh.corner_count());
        for (_, uv) in texcoords.iter() {
            assert!((-1e-5..=1.0 + 1e-5).contains(&uv.x));
            assert!((-1e-5..=1.0 + 1e-5).contains(&uv.y));
        }
    }

    #[test]
    fn test_sanity_check_detects_corruption() {
        let mut mesh = unit_cube();
        assert!(mesh.sanity_check());
        mesh.corners[0].polygon_id = PolygonId(5);
        assert!(!mesh.sanity_check());
    }
}
