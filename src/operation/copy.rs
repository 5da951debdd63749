//! Identity operator

use crate::mesh::Mesh;
use crate::operation::geometry_operation::GeometryOperation;

/// Structural copy of `source`
///
/// Every point, polygon and corner is recreated one to one, so ids and
/// attribute values are preserved.
pub fn copy(source: &Mesh) -> Mesh {
    let mut op = GeometryOperation::new(source, format!("copy({})", source.name));
    op.make_points_from_points();
    for old_polygon_id in source.polygon_ids() {
        let new_polygon_id = op.make_new_polygon_from_polygon(old_polygon_id);
        op.add_polygon_corners(new_polygon_id, old_polygon_id);
    }
    op.interpolate_mesh_attributes();
    op.post_processing();
    op.finish()
}
