//! Arena-indexed polygon mesh store
//!
//! Points, corners, polygons and edges live in parallel arrays owned by
//! [`Mesh`]; entities refer to each other only through typed ids. Three
//! flat index arrays hold the variable-length relations:
//!
//! - polygon-corner array: each polygon's ring of corners, contiguous
//! - point-corner array: each point's corners, laid out by
//!   [`Mesh::make_point_corners`] and ordered by [`Mesh::sort_point_corners`]
//! - edge-polygon array: each edge's incident polygons, filled by
//!   [`Mesh::build_edges`]

use crate::error::Result;
use crate::mesh::attributes::{
    names, AttributeKey, AttributeMaps, AttributeRegistry, AttributeValue,
};
use crate::mesh::property_map::PropertyMap;
use crate::mesh::types::{
    Corner, CornerId, Edge, EdgeId, EntityId, Point, PointId, Polygon, PolygonId, Vec2, Vec3,
};
use std::collections::HashMap;
use std::sync::Arc;

/// A corner together with its neighbors in the owning polygon's ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CornerNeighborhood {
    pub prev_corner_id: CornerId,
    pub corner_id: CornerId,
    pub next_corner_id: CornerId,
    pub prev_point_id: PointId,
    pub point_id: PointId,
    pub next_point_id: PointId,
}

/// Polygon mesh topology store
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Human readable name
    pub name: String,

    registry: Arc<AttributeRegistry>,

    pub(crate) points: Vec<Point>,
    pub(crate) corners: Vec<Corner>,
    pub(crate) polygons: Vec<Polygon>,
    pub(crate) edges: Vec<Edge>,

    pub(crate) point_corners: Vec<CornerId>,
    pub(crate) polygon_corners: Vec<CornerId>,
    pub(crate) edge_polygons: Vec<PolygonId>,

    /// Canonical `(lo, hi)` point pair to edge
    pub(crate) vertex_pair_to_edge: HashMap<(PointId, PointId), EdgeId>,

    /// Edges incident to each point
    pub(crate) point_edges: Vec<Vec<EdgeId>>,

    pub(crate) point_attributes: AttributeMaps<PointId>,
    pub(crate) corner_attributes: AttributeMaps<CornerId>,
    pub(crate) polygon_attributes: AttributeMaps<PolygonId>,
    pub(crate) edge_attributes: AttributeMaps<EdgeId>,
}

impl Mesh {
    /// Create an empty mesh bound to an attribute registry
    pub fn new(registry: Arc<AttributeRegistry>) -> Self {
        Self::with_name("", registry)
    }

    /// Create an empty named mesh
    pub fn with_name(name: impl Into<String>, registry: Arc<AttributeRegistry>) -> Self {
        Self {
            name: name.into(),
            registry,
            points: Vec::new(),
            corners: Vec::new(),
            polygons: Vec::new(),
            edges: Vec::new(),
            point_corners: Vec::new(),
            polygon_corners: Vec::new(),
            edge_polygons: Vec::new(),
            vertex_pair_to_edge: HashMap::new(),
            point_edges: Vec::new(),
            point_attributes: AttributeMaps::new(),
            corner_attributes: AttributeMaps::new(),
            polygon_attributes: AttributeMaps::new(),
            edge_attributes: AttributeMaps::new(),
        }
    }

    /// Attribute registry this mesh was created with
    pub fn registry(&self) -> &Arc<AttributeRegistry> {
        &self.registry
    }

    // ---- construction ------------------------------------------------------

    /// Allocate a new point
    pub fn make_point(&mut self) -> PointId {
        let point_id = PointId::from_index(self.points.len());
        self.points.push(Point::default());
        point_id
    }

    /// Allocate a new point and store its position
    pub fn make_point_with_position(&mut self, x: f32, y: f32, z: f32) -> PointId {
        let point_id = self.make_point();
        match self.create_point_attribute::<Vec3>(&AttributeKey::named(names::POSITION)) {
            Ok(positions) => positions.put(point_id, Vec3::new(x, y, z)),
            Err(e) => log::error!("Cannot store position of {}: {}", point_id, e),
        }
        point_id
    }

    /// Allocate a new point and store its position and texture coordinate
    pub fn make_point_with_position_and_texture(
        &mut self,
        x: f32,
        y: f32,
        z: f32,
        s: f32,
        t: f32,
    ) -> PointId {
        let point_id = self.make_point_with_position(x, y, z);
        match self.create_point_attribute::<Vec2>(&AttributeKey::named(names::TEXCOORD)) {
            Ok(texcoords) => texcoords.put(point_id, Vec2::new(s, t)),
            Err(e) => log::error!("Cannot store texture coordinate of {}: {}", point_id, e),
        }
        point_id
    }

    /// Allocate a new, empty polygon
    pub fn make_polygon(&mut self) -> PolygonId {
        let polygon_id = PolygonId::from_index(self.polygons.len());
        self.polygons.push(Polygon {
            first_polygon_corner_id: self.polygon_corners.len() as u32,
            corner_count: 0,
        });
        polygon_id
    }

    /// Allocate a polygon and one corner per point, in order
    pub fn make_polygon_from_points(&mut self, point_ids: &[PointId]) -> PolygonId {
        let polygon_id = self.make_polygon();
        for &point_id in point_ids {
            self.make_polygon_corner(polygon_id, point_id);
        }
        polygon_id
    }

    /// Allocate a corner of `point_id` owned by `polygon_id`
    ///
    /// The corner is not added to the polygon's ring; use
    /// [`make_polygon_corner`](Self::make_polygon_corner) for that.
    ///
    /// # Panics
    ///
    /// Panics when either id is not allocated.
    pub fn make_corner(&mut self, point_id: PointId, polygon_id: PolygonId) -> CornerId {
        self.assert_point(point_id, "make_corner");
        self.assert_polygon(polygon_id, "make_corner");
        let corner_id = CornerId::from_index(self.corners.len());
        self.corners.push(Corner {
            point_id,
            polygon_id,
        });
        corner_id
    }

    /// Create a corner, append it to the polygon's ring and reserve a slot
    /// for it in the point's corner list
    ///
    /// # Panics
    ///
    /// Panics when either id is not allocated.
    pub fn make_polygon_corner(&mut self, polygon_id: PolygonId, point_id: PointId) -> CornerId {
        let corner_id = self.make_corner(point_id, polygon_id);

        let polygon = self.polygons[polygon_id.index()];
        let range = polygon.corner_range();
        if range.end != self.polygon_corners.len() {
            // Another ring was appended after this one; move this ring to the end
            let ring = self.polygon_corners[range].to_vec();
            let first = self.polygon_corners.len() as u32;
            self.polygon_corners.extend(ring);
            self.polygons[polygon_id.index()].first_polygon_corner_id = first;
            log::trace!("Relocated ring of {} to slot {}", polygon_id, first);
        }
        self.polygon_corners.push(corner_id);
        self.polygons[polygon_id.index()].corner_count += 1;

        self.reserve_point_corner(point_id);
        corner_id
    }

    /// Announce one more corner for `point_id`
    ///
    /// The reservation is consumed by [`make_point_corners`](Self::make_point_corners).
    pub fn reserve_point_corner(&mut self, point_id: PointId) {
        self.assert_point(point_id, "reserve_point_corner");
        self.points[point_id.index()].reserved_corner_count += 1;
    }

    /// Create the edge `(a, b)`
    ///
    /// # Panics
    ///
    /// Panics unless `a < b` and both points are allocated.
    pub fn make_edge(&mut self, a: PointId, b: PointId) -> EdgeId {
        assert!(
            a < b,
            "make_edge: points must be ordered, got {} and {}",
            a,
            b
        );
        self.assert_point(b, "make_edge");
        let edge_id = EdgeId::from_index(self.edges.len());
        self.edges.push(Edge::new(a, b));
        self.vertex_pair_to_edge.insert((a, b), edge_id);
        if self.point_edges.len() < self.points.len() {
            self.point_edges.resize(self.points.len(), Vec::new());
        }
        self.point_edges[a.index()].push(edge_id);
        self.point_edges[b.index()].push(edge_id);
        edge_id
    }

    fn assert_point(&self, point_id: PointId, operation: &str) {
        assert!(
            point_id.index() < self.points.len(),
            "{}: point {} is not allocated (point count {})",
            operation,
            point_id,
            self.points.len()
        );
    }

    fn assert_polygon(&self, polygon_id: PolygonId, operation: &str) {
        assert!(
            polygon_id.index() < self.polygons.len(),
            "{}: polygon {} is not allocated (polygon count {})",
            operation,
            polygon_id,
            self.polygons.len()
        );
    }

    // ---- counts and records ------------------------------------------------

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn corner_count(&self) -> usize {
        self.corners.len()
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn point(&self, point_id: PointId) -> &Point {
        &self.points[point_id.index()]
    }

    pub fn corner(&self, corner_id: CornerId) -> &Corner {
        &self.corners[corner_id.index()]
    }

    pub fn polygon(&self, polygon_id: PolygonId) -> &Polygon {
        &self.polygons[polygon_id.index()]
    }

    pub fn edge(&self, edge_id: EdgeId) -> &Edge {
        &self.edges[edge_id.index()]
    }

    pub fn point_ids(&self) -> impl Iterator<Item = PointId> {
        (0..self.points.len()).map(PointId::from_index)
    }

    pub fn corner_ids(&self) -> impl Iterator<Item = CornerId> {
        (0..self.corners.len()).map(CornerId::from_index)
    }

    pub fn polygon_ids(&self) -> impl Iterator<Item = PolygonId> {
        (0..self.polygons.len()).map(PolygonId::from_index)
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> {
        (0..self.edges.len()).map(EdgeId::from_index)
    }

    // ---- relations ---------------------------------------------------------

    /// Corners of a polygon, in ring order
    pub fn polygon_corners(&self, polygon_id: PolygonId) -> &[CornerId] {
        &self.polygon_corners[self.polygons[polygon_id.index()].corner_range()]
    }

    /// Points of a polygon, in ring order
    pub fn polygon_points(&self, polygon_id: PolygonId) -> Vec<PointId> {
        self.polygon_corners(polygon_id)
            .iter()
            .map(|&c| self.corners[c.index()].point_id)
            .collect()
    }

    /// Corners of a point (rotationally ordered after `sort_point_corners`)
    pub fn point_corners(&self, point_id: PointId) -> &[CornerId] {
        let point = &self.points[point_id.index()];
        let first = point.first_point_corner_id as usize;
        let end = (first + point.corner_count as usize).min(self.point_corners.len());
        &self.point_corners[first.min(end)..end]
    }

    /// Polygons incident to an edge
    pub fn edge_polygons(&self, edge_id: EdgeId) -> &[PolygonId] {
        let edge = &self.edges[edge_id.index()];
        let first = edge.first_edge_polygon_id as usize;
        &self.edge_polygons[first..first + edge.polygon_count as usize]
    }

    /// Edges incident to a point (empty before `build_edges`)
    pub fn point_edges(&self, point_id: PointId) -> &[EdgeId] {
        self.point_edges
            .get(point_id.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Corner following `corner_id` in the polygon's ring
    pub fn next_corner(&self, polygon_id: PolygonId, corner_id: CornerId) -> Option<CornerId> {
        let ring = self.polygon_corners(polygon_id);
        let i = ring.iter().position(|&c| c == corner_id)?;
        Some(ring[(i + 1) % ring.len()])
    }

    /// Corner preceding `corner_id` in the polygon's ring
    pub fn prev_corner(&self, polygon_id: PolygonId, corner_id: CornerId) -> Option<CornerId> {
        let ring = self.polygon_corners(polygon_id);
        let i = ring.iter().position(|&c| c == corner_id)?;
        Some(ring[(i + ring.len() - 1) % ring.len()])
    }

    /// Every corner of a polygon with its ring neighbors
    pub fn corner_neighborhoods(
        &self,
        polygon_id: PolygonId,
    ) -> impl Iterator<Item = CornerNeighborhood> + '_ {
        let ring = self.polygon_corners(polygon_id);
        let n = ring.len();
        (0..n).map(move |i| {
            let prev_corner_id = ring[(i + n - 1) % n];
            let corner_id = ring[i];
            let next_corner_id = ring[(i + 1) % n];
            CornerNeighborhood {
                prev_corner_id,
                corner_id,
                next_corner_id,
                prev_point_id: self.corners[prev_corner_id.index()].point_id,
                point_id: self.corners[corner_id.index()].point_id,
                next_point_id: self.corners[next_corner_id.index()].point_id,
            }
        })
    }

    /// Neighborhood of one corner within its own polygon
    pub fn corner_neighborhood(&self, corner_id: CornerId) -> Option<CornerNeighborhood> {
        let polygon_id = self.corners[corner_id.index()].polygon_id;
        self.corner_neighborhoods(polygon_id)
            .find(|n| n.corner_id == corner_id)
    }

    // ---- attributes --------------------------------------------------------

    pub fn point_attributes(&self) -> &AttributeMaps<PointId> {
        &self.point_attributes
    }

    pub fn point_attributes_mut(&mut self) -> &mut AttributeMaps<PointId> {
        &mut self.point_attributes
    }

    pub fn corner_attributes(&self) -> &AttributeMaps<CornerId> {
        &self.corner_attributes
    }

    pub fn corner_attributes_mut(&mut self) -> &mut AttributeMaps<CornerId> {
        &mut self.corner_attributes
    }

    pub fn polygon_attributes(&self) -> &AttributeMaps<PolygonId> {
        &self.polygon_attributes
    }

    pub fn polygon_attributes_mut(&mut self) -> &mut AttributeMaps<PolygonId> {
        &mut self.polygon_attributes
    }

    pub fn edge_attributes(&self) -> &AttributeMaps<EdgeId> {
        &self.edge_attributes
    }

    pub fn edge_attributes_mut(&mut self) -> &mut AttributeMaps<EdgeId> {
        &mut self.edge_attributes
    }

    /// Bind (or fetch) a point attribute registered under `key`
    pub fn create_point_attribute<V: AttributeValue>(
        &mut self,
        key: &AttributeKey,
    ) -> Result<&mut PropertyMap<PointId, V>> {
        let descriptor = self.registry.require(key)?.clone();
        let count = self.points.len();
        let map = self.point_attributes.create::<V>(&descriptor)?;
        if map.len() < count {
            map.resize(count);
        }
        Ok(map)
    }

    /// Bind (or fetch) a corner attribute registered under `key`
    pub fn create_corner_attribute<V: AttributeValue>(
        &mut self,
        key: &AttributeKey,
    ) -> Result<&mut PropertyMap<CornerId, V>> {
        let descriptor = self.registry.require(key)?.clone();
        let count = self.corners.len();
        let map = self.corner_attributes.create::<V>(&descriptor)?;
        if map.len() < count {
            map.resize(count);
        }
        Ok(map)
    }

    /// Bind (or fetch) a polygon attribute registered under `key`
    pub fn create_polygon_attribute<V: AttributeValue>(
        &mut self,
        key: &AttributeKey,
    ) -> Result<&mut PropertyMap<PolygonId, V>> {
        let descriptor = self.registry.require(key)?.clone();
        let count = self.polygons.len();
        let map = self.polygon_attributes.create::<V>(&descriptor)?;
        if map.len() < count {
            map.resize(count);
        }
        Ok(map)
    }

    /// Bind (or fetch) an edge attribute registered under `key`
    pub fn create_edge_attribute<V: AttributeValue>(
        &mut self,
        key: &AttributeKey,
    ) -> Result<&mut PropertyMap<EdgeId, V>> {
        let descriptor = self.registry.require(key)?.clone();
        let count = self.edges.len();
        let map = self.edge_attributes.create::<V>(&descriptor)?;
        if map.len() < count {
            map.resize(count);
        }
        Ok(map)
    }

    /// Point positions, if bound
    pub fn point_positions(&self) -> Option<&PropertyMap<PointId, Vec3>> {
        self.point_attributes
            .find::<Vec3>(&AttributeKey::named(names::POSITION))
    }

    /// Position of one point, if it has one
    pub fn point_position(&self, point_id: PointId) -> Option<Vec3> {
        self.point_positions().and_then(|p| p.try_get(point_id))
    }
}
