//! Connectivity reconstruction: point-corner layout, rotational fan
//! ordering and edge building

use crate::mesh::topology::Mesh;
use crate::mesh::types::{canonical_pair, CornerId, EdgeId, EntityId, PointId, PolygonId};

/// One corner around a point, with the neighbors it has in its polygon
#[derive(Debug, Clone, Copy)]
struct FanEntry {
    corner_id: CornerId,
    prev_point_id: PointId,
    next_point_id: PointId,
}

/// Chain fan entries so that each entry's `next_point_id` equals the
/// previous entry's `prev_point_id`
///
/// Returns the order and whether every entry was reached by one chain.
/// Unreached entries are appended in their original order.
fn chain_fan(entries: &[FanEntry]) -> (Vec<CornerId>, bool) {
    let n = entries.len();
    let mut used = vec![false; n];
    let mut order = Vec::with_capacity(n);

    // An open fan must start at the entry nothing chains into
    let start = (0..n)
        .find(|&i| {
            !entries
                .iter()
                .enumerate()
                .any(|(j, e)| j != i && e.prev_point_id == entries[i].next_point_id)
        })
        .unwrap_or(0);

    let mut current = start;
    used[current] = true;
    order.push(entries[current].corner_id);
    while order.len() < n {
        let wanted = entries[current].prev_point_id;
        let next = (0..n).find(|&j| !used[j] && entries[j].next_point_id == wanted);
        match next {
            Some(j) => {
                used[j] = true;
                order.push(entries[j].corner_id);
                current = j;
            }
            None => break,
        }
    }

    let complete = order.len() == n;
    if !complete {
        order.extend((0..n).filter(|&j| !used[j]).map(|j| entries[j].corner_id));
    }
    (order, complete)
}

impl Mesh {
    /// Lay out the point-corner array from the reserved corner counts and
    /// scatter every polygon's corners into their point's slot range
    ///
    /// The order within each point is arbitrary until
    /// [`sort_point_corners`](Self::sort_point_corners) runs.
    pub fn make_point_corners(&mut self) {
        let mut next_slot = 0u32;
        for point in &mut self.points {
            point.first_point_corner_id = next_slot;
            point.corner_count = 0;
            next_slot += point.reserved_corner_count;
        }
        self.point_corners.clear();
        self.point_corners
            .resize(next_slot as usize, CornerId::default());

        let mut overflow = 0usize;
        for polygon in &self.polygons {
            for &corner_id in &self.polygon_corners[polygon.corner_range()] {
                let point_id = self.corners[corner_id.index()].point_id;
                let point = &mut self.points[point_id.index()];
                if point.corner_count >= point.reserved_corner_count {
                    overflow += 1;
                    continue;
                }
                let slot = (point.first_point_corner_id + point.corner_count) as usize;
                self.point_corners[slot] = corner_id;
                point.corner_count += 1;
            }
        }
        if overflow > 0 {
            log::error!(
                "{} corners exceeded their point's reserved corner count and were not linked",
                overflow
            );
        }
        log::debug!(
            "Laid out {} point corners for {} points",
            self.point_corners.len(),
            self.points.len()
        );
    }

    /// Rotate every point's corner list into fan order
    ///
    /// After sorting, consecutive corners of a point belong to polygons that
    /// share the edge between them. Points whose corners do not form a
    /// single fan (non-manifold points) are left partially ordered and
    /// returned.
    pub fn sort_point_corners(&mut self) -> Vec<PointId> {
        let mut unsorted = Vec::new();
        let mut entries: Vec<FanEntry> = Vec::with_capacity(16);

        for point_index in 0..self.points.len() {
            let point_id = PointId::from_index(point_index);
            let point = self.points[point_index];
            let first = point.first_point_corner_id as usize;
            let count = point.corner_count as usize;
            if count < 2 {
                continue;
            }

            entries.clear();
            for &corner_id in &self.point_corners[first..first + count] {
                match self.corner_neighborhood(corner_id) {
                    Some(n) => entries.push(FanEntry {
                        corner_id,
                        prev_point_id: n.prev_point_id,
                        next_point_id: n.next_point_id,
                    }),
                    None => {
                        log::warn!(
                            "Corner {} of {} is not in its polygon's ring",
                            corner_id,
                            point_id
                        );
                        entries.push(FanEntry {
                            corner_id,
                            prev_point_id: point_id,
                            next_point_id: point_id,
                        });
                    }
                }
            }

            let (order, complete) = chain_fan(&entries);
            self.point_corners[first..first + count].copy_from_slice(&order);
            if !complete {
                log::warn!(
                    "Corners of {} do not form a single fan; left partially ordered",
                    point_id
                );
                unsorted.push(point_id);
            }
        }

        if !unsorted.is_empty() {
            log::warn!("{} points could not be fully sorted", unsorted.len());
        }
        unsorted
    }

    /// Directed half-edges `(polygon, from, to)` of every polygon ring
    fn half_edges(&self) -> Vec<(PolygonId, PointId, PointId)> {
        let mut half_edges = Vec::with_capacity(self.polygon_corners.len());
        for (polygon_index, polygon) in self.polygons.iter().enumerate() {
            let ring = &self.polygon_corners[polygon.corner_range()];
            let n = ring.len();
            for i in 0..n {
                let a = self.corners[ring[i].index()].point_id;
                let b = self.corners[ring[(i + 1) % n].index()].point_id;
                half_edges.push((PolygonId::from_index(polygon_index), a, b));
            }
        }
        half_edges
    }

    /// Rebuild all edges and edge-polygon adjacency from the polygon rings
    ///
    /// 1. Shared-edge pass: every half-edge `(a, b)` with `a < b` creates
    ///    its edge.
    /// 2. Reverse pass: half-edges whose canonical pair is still missing
    ///    (only ever traversed from the larger id) create it.
    /// 3. Adjacency pass: every half-edge appends its polygon to its edge.
    ///
    /// Half-edges whose endpoints coincide are skipped.
    pub fn build_edges(&mut self) {
        self.edges.clear();
        self.edge_polygons.clear();
        self.vertex_pair_to_edge.clear();
        self.point_edges.clear();
        self.point_edges.resize(self.points.len(), Vec::new());

        let half_edges = self.half_edges();
        let degenerate = half_edges.iter().filter(|(_, a, b)| a == b).count();
        if degenerate > 0 {
            log::warn!("Skipping {} degenerate half-edges", degenerate);
        }

        for &(_, a, b) in &half_edges {
            if a < b && !self.vertex_pair_to_edge.contains_key(&(a, b)) {
                self.make_edge(a, b);
            }
        }
        let first_pass_count = self.edges.len();

        for &(_, a, b) in &half_edges {
            if a == b {
                continue;
            }
            let key = canonical_pair(a, b);
            if !self.vertex_pair_to_edge.contains_key(&key) {
                self.make_edge(key.0, key.1);
            }
        }

        let mut adjacency: Vec<Vec<PolygonId>> = vec![Vec::new(); self.edges.len()];
        for &(polygon_id, a, b) in &half_edges {
            if a == b {
                continue;
            }
            match self.vertex_pair_to_edge.get(&canonical_pair(a, b)) {
                Some(edge_id) => adjacency[edge_id.index()].push(polygon_id),
                None => log::error!("Half-edge {}-{} of {} has no edge", a, b, polygon_id),
            }
        }
        for (edge, polygons) in self.edges.iter_mut().zip(adjacency) {
            edge.first_edge_polygon_id = self.edge_polygons.len() as u32;
            edge.polygon_count = polygons.len() as u32;
            self.edge_polygons.extend(polygons);
        }

        log::debug!(
            "Built {} edges ({} from reverse pass) from {} half-edges",
            self.edges.len(),
            self.edges.len() - first_pass_count,
            half_edges.len()
        );
    }

    /// Edge between two points, in either order
    pub fn find_edge(&self, a: PointId, b: PointId) -> Option<EdgeId> {
        if a == b {
            return None;
        }
        self.vertex_pair_to_edge.get(&canonical_pair(a, b)).copied()
    }

    /// Lay out point corners, sort fans and build edges
    ///
    /// Returns the points that could not be sorted into a single fan.
    pub fn build_connectivity(&mut self) -> Vec<PointId> {
        self.make_point_corners();
        let unsorted = self.sort_point_corners();
        self.build_edges();
        unsorted
    }

    /// True when two corners of the same point belong to polygons that
    /// share the edge between them
    pub fn corners_share_edge(&self, lhs: CornerId, rhs: CornerId) -> bool {
        let (Some(l), Some(r)) = (
            self.corner_neighborhood(lhs),
            self.corner_neighborhood(rhs),
        ) else {
            return false;
        };
        l.prev_point_id == r.next_point_id || l.next_point_id == r.prev_point_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::attributes::AttributeRegistry;
    use std::sync::Arc;

    fn registry() -> Arc<AttributeRegistry> {
        Arc::new(AttributeRegistry::standard())
    }

    /// Two quads sharing the edge 1-4
    ///
    /// ```text
    /// 3---4---5
    /// |   |   |
    /// 0---1---2
    /// ```
    fn make_quad_strip() -> Mesh {
        let mut mesh = Mesh::new(registry());
        for (x, y) in [
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 0.0),
            (0.0, 1.0),
            (1.0, 1.0),
            (2.0, 1.0),
        ] {
            mesh.make_point_with_position(x, y, 0.0);
        }
        mesh.make_polygon_from_points(&[PointId(0), PointId(1), PointId(4), PointId(3)]);
        mesh.make_polygon_from_points(&[PointId(1), PointId(2), PointId(5), PointId(4)]);
        mesh
    }

    /// Square pyramid apex 4 over base 0..4, outward winding
    fn make_pyramid() -> Mesh {
        let mut mesh = Mesh::new(registry());
        for (x, y, z) in [
            (-1.0, 0.0, -1.0),
            (1.0, 0.0, -1.0),
            (1.0, 0.0, 1.0),
            (-1.0, 0.0, 1.0),
            (0.0, 1.0, 0.0),
        ] {
            mesh.make_point_with_position(x, y, z);
        }
        let p = |i: u32| PointId(i);
        mesh.make_polygon_from_points(&[p(0), p(1), p(2), p(3)]);
        mesh.make_polygon_from_points(&[p(1), p(0), p(4)]);
        mesh.make_polygon_from_points(&[p(2), p(1), p(4)]);
        mesh.make_polygon_from_points(&[p(3), p(2), p(4)]);
        mesh.make_polygon_from_points(&[p(0), p(3), p(4)]);
        mesh
    }

    #[test]
    fn test_make_point_corners_layout() {
        let mut mesh = make_quad_strip();
        mesh.make_point_corners();
        assert_eq!(mesh.point_corners(PointId(1)).len(), 2);
        assert_eq!(mesh.point_corners(PointId(0)).len(), 1);
        for point_id in mesh.point_ids() {
            for &corner_id in mesh.point_corners(point_id) {
                assert_eq!(mesh.corner(corner_id).point_id, point_id);
            }
        }
    }

    #[test]
    fn test_build_edges_strip() {
        let mut mesh = make_quad_strip();
        mesh.build_connectivity();

        assert_eq!(mesh.edge_count(), 7);
        let shared = mesh.find_edge(PointId(4), PointId(1)).unwrap();
        assert_eq!(mesh.edge_polygons(shared), &[PolygonId(0), PolygonId(1)]);
        let boundary = mesh.find_edge(PointId(0), PointId(1)).unwrap();
        assert_eq!(mesh.edge_polygons(boundary), &[PolygonId(0)]);
        assert!(mesh.find_edge(PointId(0), PointId(5)).is_none());

        for edge_id in mesh.edge_ids() {
            let edge = mesh.edge(edge_id);
            assert!(edge.a < edge.b);
        }
        assert_eq!(mesh.point_edges(PointId(1)).len(), 3);
    }

    #[test]
    fn test_reverse_pass_creates_missing_edges() {
        // A single triangle traversed 2 -> 1 -> 0 only has one a < b half-edge
        let mut mesh = Mesh::new(registry());
        let points: Vec<_> = (0..3).map(|_| mesh.make_point()).collect();
        mesh.make_polygon_from_points(&[points[2], points[1], points[0]]);
        mesh.build_edges();
        assert_eq!(mesh.edge_count(), 3);
        for edge_id in mesh.edge_ids() {
            assert_eq!(mesh.edge_polygons(edge_id), &[PolygonId(0)]);
        }
    }

    #[test]
    fn test_sort_point_corners_closed_fan() {
        let mut mesh = make_pyramid();
        let unsorted = mesh.build_connectivity();
        assert!(unsorted.is_empty());

        for point_id in mesh.point_ids() {
            let corners = mesh.point_corners(point_id);
            assert_eq!(corners.len(), if point_id == PointId(4) { 4 } else { 3 });
            for pair in corners.windows(2) {
                assert!(mesh.corners_share_edge(pair[0], pair[1]));
            }
            // Closed fans wrap around
            assert!(mesh.corners_share_edge(corners[corners.len() - 1], corners[0]));
        }
    }

    #[test]
    fn test_sort_point_corners_open_fan() {
        let mut mesh = make_quad_strip();
        // Add a third quad on top of the middle column so point 4 has 3 corners
        let top_left = mesh.make_point_with_position(0.0, 2.0, 0.0);
        let top_mid = mesh.make_point_with_position(1.0, 2.0, 0.0);
        mesh.make_polygon_from_points(&[PointId(3), PointId(4), top_mid, top_left]);

        let unsorted = mesh.build_connectivity();
        assert!(unsorted.is_empty());
        let corners = mesh.point_corners(PointId(4));
        assert_eq!(corners.len(), 3);
        for pair in corners.windows(2) {
            assert!(mesh.corners_share_edge(pair[0], pair[1]));
        }
    }

    #[test]
    fn test_sort_point_corners_bowtie_reports_failure() {
        // Two triangles touching only at point 0
        let mut mesh = Mesh::new(registry());
        let p: Vec<_> = (0..5).map(|_| mesh.make_point()).collect();
        mesh.make_polygon_from_points(&[p[0], p[1], p[2]]);
        mesh.make_polygon_from_points(&[p[0], p[3], p[4]]);
        let unsorted = mesh.build_connectivity();
        assert_eq!(unsorted, vec![p[0]]);
        assert_eq!(mesh.point_corners(p[0]).len(), 2);
    }

    #[test]
    fn test_degenerate_half_edges_skipped() {
        let mut mesh = Mesh::new(registry());
        let p: Vec<_> = (0..3).map(|_| mesh.make_point()).collect();
        mesh.make_polygon_from_points(&[p[0], p[1], p[1], p[2]]);
        mesh.build_edges();
        assert_eq!(mesh.edge_count(), 3);
    }
}
