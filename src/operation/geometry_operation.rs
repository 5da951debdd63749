//! Source tracking framework for operators that derive a new mesh
//!
//! An operator builds the destination topology through the `make_*`
//! primitives, which record for every new point, corner and polygon the
//! weighted source entities it was derived from. After the topology is
//! complete, [`GeometryOperation::interpolate_mesh_attributes`] carries
//! every bound source attribute over, and
//! [`GeometryOperation::post_processing`] rebuilds connectivity and
//! derived data.

use crate::config::ProcessFlags;
use crate::mesh::types::{canonical_pair, CornerId, EntityId, PointId, PolygonId};
use crate::mesh::Mesh;
use std::collections::HashMap;

/// Builder of a destination mesh derived from a borrowed source mesh
pub struct GeometryOperation<'a> {
    pub source: &'a Mesh,
    pub destination: Mesh,

    point_old_to_new: Vec<Option<PointId>>,
    polygon_centroid_to_new_point: Vec<Option<PointId>>,
    polygon_old_to_new: Vec<Option<PolygonId>>,

    new_point_sources: Vec<Vec<(f32, PointId)>>,
    new_point_corner_sources: Vec<Vec<(f32, CornerId)>>,
    new_corner_sources: Vec<Vec<(f32, CornerId)>>,
    new_polygon_sources: Vec<Vec<(f32, PolygonId)>>,

    /// First new point of each split source edge, keyed by `(lo, hi)`
    edge_new_points: HashMap<(PointId, PointId), PointId>,
    split_count: usize,

    interpolated: bool,
}

fn push_source<K: EntityId, S>(sources: &mut Vec<Vec<(f32, S)>>, key: K, weight: f32, source: S) {
    let i = key.slot();
    if sources.len() <= i {
        sources.resize_with(i + 1, Vec::new);
    }
    sources[i].push((weight, source));
}

fn record<K: EntityId, V>(map: &mut Vec<Option<V>>, key: K, value: V) {
    let i = key.slot();
    if map.len() <= i {
        map.resize_with(i + 1, || None);
    }
    map[i] = Some(value);
}

impl<'a> GeometryOperation<'a> {
    /// Start an operation; the destination shares the source's registry
    pub fn new(source: &'a Mesh, name: impl Into<String>) -> Self {
        Self {
            source,
            destination: Mesh::with_name(name, source.registry().clone()),
            point_old_to_new: Vec::new(),
            polygon_centroid_to_new_point: Vec::new(),
            polygon_old_to_new: Vec::new(),
            new_point_sources: Vec::new(),
            new_point_corner_sources: Vec::new(),
            new_corner_sources: Vec::new(),
            new_polygon_sources: Vec::new(),
            edge_new_points: HashMap::new(),
            split_count: 0,
            interpolated: false,
        }
    }

    /// New point made from a source point
    pub fn point_new(&self, old_point_id: PointId) -> Option<PointId> {
        self.point_old_to_new
            .get(old_point_id.index())
            .copied()
            .flatten()
    }

    /// New point made from a source polygon's centroid
    pub fn polygon_centroid_point(&self, old_polygon_id: PolygonId) -> Option<PointId> {
        self.polygon_centroid_to_new_point
            .get(old_polygon_id.index())
            .copied()
            .flatten()
    }

    /// New polygon made from a source polygon
    pub fn polygon_new(&self, old_polygon_id: PolygonId) -> Option<PolygonId> {
        self.polygon_old_to_new
            .get(old_polygon_id.index())
            .copied()
            .flatten()
    }

    // ---- source recording --------------------------------------------------

    pub fn add_point_source(&mut self, new_point_id: PointId, weight: f32, old_point_id: PointId) {
        push_source(&mut self.new_point_sources, new_point_id, weight, old_point_id);
    }

    /// Record a source corner for the corners that will later use `new_point_id`
    pub fn add_point_corner_source(
        &mut self,
        new_point_id: PointId,
        weight: f32,
        old_corner_id: CornerId,
    ) {
        push_source(
            &mut self.new_point_corner_sources,
            new_point_id,
            weight,
            old_corner_id,
        );
    }

    pub fn add_corner_source(
        &mut self,
        new_corner_id: CornerId,
        weight: f32,
        old_corner_id: CornerId,
    ) {
        push_source(&mut self.new_corner_sources, new_corner_id, weight, old_corner_id);
    }

    pub fn add_polygon_source(
        &mut self,
        new_polygon_id: PolygonId,
        weight: f32,
        old_polygon_id: PolygonId,
    ) {
        push_source(
            &mut self.new_polygon_sources,
            new_polygon_id,
            weight,
            old_polygon_id,
        );
    }

    /// Give a new corner the point-corner sources of its point, scaled by
    /// `weight`
    pub fn distribute_corner_sources(
        &mut self,
        new_corner_id: CornerId,
        weight: f32,
        new_point_id: PointId,
    ) {
        let Some(point_corner_sources) = self.new_point_corner_sources.get(new_point_id.index())
        else {
            return;
        };
        let scaled: Vec<(f32, CornerId)> = point_corner_sources
            .iter()
            .map(|&(w, corner_id)| (weight * w, corner_id))
            .collect();
        for (w, corner_id) in scaled {
            self.add_corner_source(new_corner_id, w, corner_id);
        }
    }

    // ---- points ------------------------------------------------------------

    /// One new point per source point
    pub fn make_points_from_points(&mut self) {
        self.point_old_to_new.reserve(self.source.point_count());
        for old_point_id in self.source.point_ids() {
            self.make_new_point_from_point(1.0, old_point_id);
        }
    }

    pub fn make_new_point_from_point(&mut self, weight: f32, old_point_id: PointId) -> PointId {
        let new_point_id = self.destination.make_point();
        self.add_point_source(new_point_id, weight, old_point_id);
        record(&mut self.point_old_to_new, old_point_id, new_point_id);
        new_point_id
    }

    /// One new point per source polygon, at its centroid
    pub fn make_polygon_centroids(&mut self) {
        self.polygon_centroid_to_new_point
            .reserve(self.source.polygon_count());
        for old_polygon_id in self.source.polygon_ids() {
            self.make_new_point_from_polygon_centroid(old_polygon_id);
        }
    }

    pub fn make_new_point_from_polygon_centroid(&mut self, old_polygon_id: PolygonId) -> PointId {
        let new_point_id = self.destination.make_point();
        record(
            &mut self.polygon_centroid_to_new_point,
            old_polygon_id,
            new_point_id,
        );
        self.add_polygon_centroid(new_point_id, 1.0, old_polygon_id);
        new_point_id
    }

    /// Add every point and corner of a source polygon as sources of
    /// `new_point_id`
    pub fn add_polygon_centroid(
        &mut self,
        new_point_id: PointId,
        weight: f32,
        old_polygon_id: PolygonId,
    ) {
        let source = self.source;
        for &corner_id in source.polygon_corners(old_polygon_id) {
            self.add_point_corner_source(new_point_id, weight, corner_id);
            self.add_point_source(new_point_id, weight, source.corner(corner_id).point_id);
        }
    }

    /// Add the one-ring neighbors of a source point as sources of
    /// `new_point_id`
    pub fn add_point_ring(&mut self, new_point_id: PointId, weight: f32, old_point_id: PointId) {
        let source = self.source;
        for &corner_id in source.point_corners(old_point_id) {
            match source.corner_neighborhood(corner_id) {
                Some(n) => self.add_point_source(new_point_id, weight, n.next_point_id),
                None => log::warn!("{} of {} is not in its polygon", corner_id, old_point_id),
            }
        }
    }

    /// Split every source edge at the given relative positions
    ///
    /// For each edge `(lo, hi)` one new point is made per position `t`,
    /// at `(1 - t) * lo + t * hi`. The positions should be symmetric
    /// around 0.5 (such as `[0.5]` or `[1/3, 2/3]`) so that
    /// [`get_edge_new_point`](Self::get_edge_new_point) can count from
    /// either end.
    pub fn make_edge_midpoints(&mut self, relative_positions: &[f32]) {
        let source = self.source;
        self.split_count = relative_positions.len();
        self.edge_new_points.clear();
        let mut degenerate = 0usize;

        for polygon_id in source.polygon_ids() {
            for n in source.corner_neighborhoods(polygon_id) {
                let (a, b) = (n.point_id, n.next_point_id);
                if a == b {
                    degenerate += 1;
                    continue;
                }
                let (lo, hi) = canonical_pair(a, b);
                let first = match self.edge_new_points.get(&(lo, hi)) {
                    Some(&first) => first,
                    None => {
                        let first = PointId::from_index(self.destination.point_count());
                        for &t in relative_positions {
                            let new_point_id = self.destination.make_point();
                            self.add_point_source(new_point_id, 1.0 - t, lo);
                            self.add_point_source(new_point_id, t, hi);
                        }
                        self.edge_new_points.insert((lo, hi), first);
                        first
                    }
                };

                // Corner sources are per half-edge, so every polygon using
                // the edge contributes its own corners
                let (lo_corner, hi_corner) = if a == lo {
                    (n.corner_id, n.next_corner_id)
                } else {
                    (n.next_corner_id, n.corner_id)
                };
                for (k, &t) in relative_positions.iter().enumerate() {
                    let new_point_id = PointId::from_index(first.index() + k);
                    self.add_point_corner_source(new_point_id, 1.0 - t, lo_corner);
                    self.add_point_corner_source(new_point_id, t, hi_corner);
                }
            }
        }
        if degenerate > 0 {
            log::warn!(
                "Skipped {} degenerate half-edges while splitting edges",
                degenerate
            );
        }
        log::debug!(
            "Split {} edges into {} points each",
            self.edge_new_points.len(),
            self.split_count
        );
    }

    /// The `k`-th split point of source edge `(a, b)`, counted from `a`
    pub fn get_edge_new_point(&self, a: PointId, b: PointId, k: usize) -> Option<PointId> {
        if k >= self.split_count {
            return None;
        }
        let first = self.edge_new_points.get(&canonical_pair(a, b))?;
        let offset = if a < b { k } else { self.split_count - 1 - k };
        Some(PointId::from_index(first.index() + offset))
    }

    // ---- polygons and corners ----------------------------------------------

    pub fn make_new_polygon_from_polygon(&mut self, old_polygon_id: PolygonId) -> PolygonId {
        let new_polygon_id = self.destination.make_polygon();
        self.add_polygon_source(new_polygon_id, 1.0, old_polygon_id);
        record(&mut self.polygon_old_to_new, old_polygon_id, new_polygon_id);
        new_polygon_id
    }

    /// Corner of a new point, sourced from the point's corner sources
    pub fn make_new_corner_from_point(
        &mut self,
        new_polygon_id: PolygonId,
        new_point_id: PointId,
    ) -> CornerId {
        let new_corner_id = self
            .destination
            .make_polygon_corner(new_polygon_id, new_point_id);
        self.distribute_corner_sources(new_corner_id, 1.0, new_point_id);
        new_corner_id
    }

    /// Corner of a source polygon's centroid point
    pub fn make_new_corner_from_polygon_centroid(
        &mut self,
        new_polygon_id: PolygonId,
        old_polygon_id: PolygonId,
    ) -> Option<CornerId> {
        let Some(new_point_id) = self.polygon_centroid_point(old_polygon_id) else {
            log::warn!("No centroid point was made for {}", old_polygon_id);
            return None;
        };
        Some(self.make_new_corner_from_point(new_polygon_id, new_point_id))
    }

    /// Copy of a source corner, on the new point made from its point
    pub fn make_new_corner_from_corner(
        &mut self,
        new_polygon_id: PolygonId,
        old_corner_id: CornerId,
    ) -> Option<CornerId> {
        let old_point_id = self.source.corner(old_corner_id).point_id;
        let Some(new_point_id) = self.point_new(old_point_id) else {
            log::warn!(
                "No new point was made for {} of {}",
                old_point_id,
                old_corner_id
            );
            return None;
        };
        let new_corner_id = self
            .destination
            .make_polygon_corner(new_polygon_id, new_point_id);
        self.add_corner_source(new_corner_id, 1.0, old_corner_id);
        Some(new_corner_id)
    }

    /// Copy every corner of a source polygon into a new polygon
    pub fn add_polygon_corners(&mut self, new_polygon_id: PolygonId, old_polygon_id: PolygonId) {
        let source = self.source;
        for &old_corner_id in source.polygon_corners(old_polygon_id) {
            self.make_new_corner_from_corner(new_polygon_id, old_corner_id);
        }
    }

    // ---- finishing ---------------------------------------------------------

    /// Carry every bound source attribute over to the destination
    ///
    /// Each destination value is the weight-normalized sum of the source
    /// values recorded for it. Edge attributes are not carried since
    /// edges are rebuilt. Must be called once, after topology is complete.
    pub fn interpolate_mesh_attributes(&mut self) {
        if self.interpolated {
            log::warn!(
                "{}: attributes were already interpolated",
                self.destination.name
            );
            return;
        }
        self.interpolated = true;

        self.new_point_sources
            .resize_with(self.destination.point_count(), Vec::new);
        self.new_corner_sources
            .resize_with(self.destination.corner_count(), Vec::new);
        self.new_polygon_sources
            .resize_with(self.destination.polygon_count(), Vec::new);

        let source = self.source;
        source
            .point_attributes()
            .interpolate(self.destination.point_attributes_mut(), &self.new_point_sources);
        source
            .corner_attributes()
            .interpolate(self.destination.corner_attributes_mut(), &self.new_corner_sources);
        source.polygon_attributes().interpolate(
            self.destination.polygon_attributes_mut(),
            &self.new_polygon_sources,
        );
        if !source.edge_attributes().is_empty() {
            log::debug!(
                "{} edge attribute maps are not carried to {}",
                source.edge_attributes().len(),
                self.destination.name
            );
        }
    }

    /// Rebuild connectivity and derived data of the destination
    pub fn post_processing(&mut self) {
        if !self.interpolated {
            log::warn!(
                "{}: post processing before attribute interpolation",
                self.destination.name
            );
        }
        self.destination.process(&ProcessFlags::all());
    }

    /// Hand over the destination mesh
    pub fn finish(self) -> Mesh {
        log::info!(
            "{}: {} points, {} polygons, {} edges from {} points, {} polygons",
            self.destination.name,
            self.destination.point_count(),
            self.destination.polygon_count(),
            self.destination.edge_count(),
            self.source.point_count(),
            self.source.polygon_count()
        );
        self.destination
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::attributes::{names, AttributeKey, AttributeRegistry};
    use crate::mesh::types::Vec3;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn triangle() -> Mesh {
        let mut mesh = Mesh::with_name("triangle", Arc::new(AttributeRegistry::standard()));
        let a = mesh.make_point_with_position(0.0, 0.0, 0.0);
        let b = mesh.make_point_with_position(3.0, 0.0, 0.0);
        let c = mesh.make_point_with_position(0.0, 3.0, 0.0);
        mesh.make_polygon_from_points(&[a, b, c]);
        mesh.build_connectivity();
        mesh
    }

    fn position(mesh: &Mesh, point_id: PointId) -> Vec3 {
        mesh.point_position(point_id).unwrap()
    }

    #[test]
    fn test_edge_trisection_counts_from_either_end() {
        let source = triangle();
        let mut op = GeometryOperation::new(&source, "split");
        op.make_points_from_points();
        op.make_edge_midpoints(&[1.0 / 3.0, 2.0 / 3.0]);
        op.interpolate_mesh_attributes();

        let (a, b) = (PointId(0), PointId(1));
        let near_a = op.get_edge_new_point(a, b, 0).unwrap();
        let near_b = op.get_edge_new_point(b, a, 0).unwrap();
        assert_eq!(op.get_edge_new_point(a, b, 1), Some(near_b));
        assert_eq!(op.get_edge_new_point(a, b, 2), None);

        let mesh = op.finish();
        assert_eq!(mesh.point_count(), 3 + 3 * 2);
        assert_relative_eq!(
            position(&mesh, near_a),
            Vec3::new(1.0, 0.0, 0.0),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            position(&mesh, near_b),
            Vec3::new(2.0, 0.0, 0.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_centroid_point() {
        let source = triangle();
        let mut op = GeometryOperation::new(&source, "centroid");
        let centroid = op.make_new_point_from_polygon_centroid(PolygonId(0));
        assert_eq!(op.polygon_centroid_point(PolygonId(0)), Some(centroid));
        op.interpolate_mesh_attributes();
        let mesh = op.finish();
        assert_relative_eq!(
            position(&mesh, centroid),
            Vec3::new(1.0, 1.0, 0.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_point_ring() {
        let source = triangle();
        let mut op = GeometryOperation::new(&source, "ring");
        let p = op.destination.make_point();
        op.add_point_ring(p, 1.0, PointId(0));
        op.interpolate_mesh_attributes();
        let mesh = op.finish();
        // The only neighbor following p0 in its single polygon is p1
        assert_relative_eq!(position(&mesh, p), Vec3::new(3.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_corner_sources_carry_texture_coordinates() {
        let mut source = triangle();
        source.generate_polygon_texture_coordinates(false);

        let mut op = GeometryOperation::new(&source, "copy");
        op.make_points_from_points();
        let polygon = op.make_new_polygon_from_polygon(PolygonId(0));
        op.add_polygon_corners(polygon, PolygonId(0));
        assert_eq!(op.polygon_new(PolygonId(0)), Some(polygon));
        op.interpolate_mesh_attributes();
        op.post_processing();
        let mesh = op.finish();

        let key = AttributeKey::named(names::TEXCOORD);
        let before = source.corner_attributes().find::<crate::mesh::Vec2>(&key).unwrap();
        let after = mesh.corner_attributes().find::<crate::mesh::Vec2>(&key).unwrap();
        for corner_id in source.corner_ids() {
            assert_relative_eq!(before.get(corner_id), after.get(corner_id), epsilon = 1e-6);
        }
    }
}
