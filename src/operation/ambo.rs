//! Ambo (rectification)

use crate::mesh::{CornerNeighborhood, Mesh, PointId};
use crate::operation::geometry_operation::GeometryOperation;

/// Rectify `source`
///
/// Every edge becomes a point at its midpoint. Each source polygon is
/// replaced by the polygon of its edge midpoints, and each source point
/// with at least three corners by the polygon of the midpoints around it.
/// Around boundary points that polygon also takes the midpoint of the
/// trailing boundary edge.
/// Points are expected to have their corners sorted into fans.
pub fn ambo(source: &Mesh) -> Mesh {
    let mut op = GeometryOperation::new(source, format!("ambo({})", source.name));
    op.make_edge_midpoints(&[0.5]);

    for old_polygon_id in source.polygon_ids() {
        let new_polygon_id = op.make_new_polygon_from_polygon(old_polygon_id);
        for n in source.corner_neighborhoods(old_polygon_id) {
            match op.get_edge_new_point(n.point_id, n.next_point_id, 0) {
                Some(midpoint) => {
                    op.make_new_corner_from_point(new_polygon_id, midpoint);
                }
                None => log::warn!(
                    "ambo: no midpoint for {}-{} of {}",
                    n.point_id,
                    n.next_point_id,
                    old_polygon_id
                ),
            }
        }
    }

    for old_point_id in source.point_ids() {
        let point_corners = source.point_corners(old_point_id);
        if point_corners.len() < 3 {
            continue;
        }
        let new_polygon_id = op.destination.make_polygon();
        let mut fan = Vec::with_capacity(point_corners.len());
        for &old_corner_id in point_corners {
            let old_polygon_id = source.corner(old_corner_id).polygon_id;
            op.add_polygon_source(new_polygon_id, 1.0, old_polygon_id);
            let Some(n) = source.corner_neighborhood(old_corner_id) else {
                continue;
            };
            fan.push(n);
            if let Some(midpoint) = op.get_edge_new_point(old_point_id, n.next_point_id, 0) {
                op.make_new_corner_from_point(new_polygon_id, midpoint);
            }
        }

        // An open fan has one more edge than corners; close the ring with it
        if let Some(trailing_point_id) = open_fan_end(&fan) {
            if let Some(midpoint) = op.get_edge_new_point(old_point_id, trailing_point_id, 0) {
                op.make_new_corner_from_point(new_polygon_id, midpoint);
            }
        }
    }

    op.interpolate_mesh_attributes();
    op.post_processing();
    op.finish()
}

/// The far point of the last edge of an open, fully chained fan
///
/// Returns `None` for closed fans and for corners that do not chain
/// (non-manifold points).
fn open_fan_end(fan: &[CornerNeighborhood]) -> Option<PointId> {
    let (first, last) = (fan.first()?, fan.last()?);
    let chained = fan
        .windows(2)
        .all(|pair| pair[1].next_point_id == pair[0].prev_point_id);
    (chained && last.prev_point_id != first.next_point_id).then_some(last.prev_point_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{make_cube, make_tetrahedron};
    use approx::assert_relative_eq;

    #[test]
    fn test_ambo_cube_is_cuboctahedron() {
        let result = ambo(&make_cube(2.0));
        let info = result.info();
        assert_eq!(info.point_count, 12);
        assert_eq!(info.polygon_count, 14);
        assert_eq!(info.edge_count, 24);
        assert_eq!(info.polygon_sizes.get(&4), Some(&6));
        assert_eq!(info.polygon_sizes.get(&3), Some(&8));
        assert_eq!(info.boundary_edge_count, 0);
        assert!(info.volume > 0.0);

        // Midpoints of a cube with edge 2 are at distance sqrt(2)
        for point_id in result.point_ids() {
            let p = result.point_position(point_id).unwrap();
            assert_relative_eq!(p.norm(), 2.0f32.sqrt(), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_ambo_open_fan_keeps_boundary_edges() {
        use crate::mesh::AttributeRegistry;
        use std::sync::Arc;

        let mut mesh = Mesh::new(Arc::new(AttributeRegistry::standard()));
        let v = mesh.make_point_with_position(0.0, 0.0, 0.0);
        let ring: Vec<PointId> = [(1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (-1.0, 1.0)]
            .iter()
            .map(|&(x, y)| mesh.make_point_with_position(x, y, 0.0))
            .collect();
        for pair in ring.windows(2) {
            mesh.make_polygon_from_points(&[v, pair[0], pair[1]]);
        }
        mesh.build_connectivity();

        let result = ambo(&mesh);
        let info = result.info();
        assert_eq!(info.point_count, 7);
        assert_eq!(info.polygon_count, 4);
        assert_eq!(info.polygon_sizes.get(&3), Some(&3));
        // Four edges meet at v, so its polygon has four corners
        assert_eq!(result.polygon(crate::mesh::PolygonId(3)).corner_count, 4);
        assert_eq!(info.edge_count, 10);
        assert_eq!(info.non_manifold_edge_count, 0);
        assert!(result.sanity_check());
    }

    #[test]
    fn test_ambo_tetrahedron_is_octahedron() {
        let result = ambo(&make_tetrahedron(1.0));
        let info = result.info();
        assert_eq!(info.point_count, 6);
        assert_eq!(info.polygon_count, 8);
        assert_eq!(info.polygon_sizes.get(&3), Some(&8));
        assert_eq!(info.euler_characteristic, 2);
        assert!(result.sanity_check());
    }
}
