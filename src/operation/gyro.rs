//! Gyro

use crate::mesh::Mesh;
use crate::operation::geometry_operation::GeometryOperation;

/// Gyro of `source`
///
/// Source points are kept, every edge is split in three and every polygon
/// gets a point at its centroid. Each source corner `a` with ring
/// neighbors `z` (previous) and `b` (next) becomes the pentagon
///
/// `centroid, 1/3 of a-z, a, 1/3 of a-b, 2/3 of a-b`
pub fn gyro(source: &Mesh) -> Mesh {
    let mut op = GeometryOperation::new(source, format!("gyro({})", source.name));
    op.make_points_from_points();
    op.make_edge_midpoints(&[1.0 / 3.0, 2.0 / 3.0]);
    op.make_polygon_centroids();

    for old_polygon_id in source.polygon_ids() {
        for n in source.corner_neighborhoods(old_polygon_id) {
            let (a, b, z) = (n.point_id, n.next_point_id, n.prev_point_id);
            let (Some(za), Some(ab), Some(ba)) = (
                op.get_edge_new_point(a, z, 0),
                op.get_edge_new_point(a, b, 0),
                op.get_edge_new_point(a, b, 1),
            ) else {
                log::warn!(
                    "gyro: degenerate corner {} of {}",
                    n.corner_id,
                    old_polygon_id
                );
                continue;
            };

            let new_polygon_id = op.destination.make_polygon();
            op.add_polygon_source(new_polygon_id, 1.0, old_polygon_id);
            op.make_new_corner_from_polygon_centroid(new_polygon_id, old_polygon_id);
            op.make_new_corner_from_point(new_polygon_id, za);
            op.make_new_corner_from_corner(new_polygon_id, n.corner_id);
            op.make_new_corner_from_point(new_polygon_id, ab);
            op.make_new_corner_from_point(new_polygon_id, ba);
        }
    }

    op.interpolate_mesh_attributes();
    op.post_processing();
    op.finish()
}
