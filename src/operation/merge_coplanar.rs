//! Merging of coplanar neighbor polygons

use crate::mesh::{CornerId, EntityId, Mesh, PointId, PolygonId, Vec3};
use crate::operation::copy::copy;
use crate::operation::geometry_operation::GeometryOperation;
use std::collections::HashMap;

/// Minimum dot product of unit normals for two polygons to count as coplanar
const COPLANAR_THRESHOLD: f32 = 0.99;

/// Merge regions of edge-connected coplanar polygons into single polygons
///
/// Regions grow from a seed polygon across edges shared by exactly two
/// polygons, accepting neighbors whose normal is within the threshold of
/// the seed's. A region whose boundary is one closed loop becomes a single
/// polygon; other regions are copied polygon by polygon. Points left
/// inside merged regions are kept.
pub fn merge_coplanar_neighbors(source: &Mesh) -> Mesh {
    if source.edge_count() == 0 {
        log::warn!(
            "merge_coplanar_neighbors: {} has no edges, copying",
            source.name
        );
        return copy(source);
    }

    let normals: Vec<Vec3> = source
        .polygon_ids()
        .map(|polygon_id| source.compute_polygon_normal(polygon_id))
        .collect();

    let mut op = GeometryOperation::new(source, format!("merge({})", source.name));
    op.make_points_from_points();

    let mut region_of: Vec<Option<PolygonId>> = vec![None; source.polygon_count()];
    let mut merged_region_count = 0usize;
    for seed in source.polygon_ids() {
        if region_of[seed.index()].is_some() {
            continue;
        }
        let region = grow_region(source, seed, &normals, &mut region_of);

        let boundary = if region.len() > 1 {
            boundary_loop(source, &region, seed, &region_of)
        } else {
            None
        };
        match boundary {
            Some(ring) => {
                let new_polygon_id = op.destination.make_polygon();
                for &old_polygon_id in &region {
                    op.add_polygon_source(new_polygon_id, 1.0, old_polygon_id);
                }
                for old_corner_id in ring {
                    op.make_new_corner_from_corner(new_polygon_id, old_corner_id);
                }
                merged_region_count += 1;
            }
            None => {
                if region.len() > 1 {
                    log::debug!(
                        "Region of {} polygons around {} has no single boundary loop",
                        region.len(),
                        seed
                    );
                }
                for old_polygon_id in region {
                    let new_polygon_id = op.make_new_polygon_from_polygon(old_polygon_id);
                    op.add_polygon_corners(new_polygon_id, old_polygon_id);
                }
            }
        }
    }
    log::debug!("Merged {} coplanar regions", merged_region_count);

    op.interpolate_mesh_attributes();
    op.post_processing();
    op.finish()
}

/// Flood fill from `seed`, marking every accepted polygon with the seed
fn grow_region(
    source: &Mesh,
    seed: PolygonId,
    normals: &[Vec3],
    region_of: &mut [Option<PolygonId>],
) -> Vec<PolygonId> {
    let seed_normal = normals[seed.index()];
    region_of[seed.index()] = Some(seed);
    let mut region = vec![seed];
    let mut worklist = vec![seed];

    while let Some(polygon_id) = worklist.pop() {
        for n in source.corner_neighborhoods(polygon_id) {
            let Some(edge_id) = source.find_edge(n.point_id, n.next_point_id) else {
                continue;
            };
            let &[lhs, rhs] = source.edge_polygons(edge_id) else {
                continue;
            };
            let neighbor = if lhs == polygon_id { rhs } else { lhs };
            if region_of[neighbor.index()].is_some() {
                continue;
            }
            if seed_normal.dot(&normals[neighbor.index()]) >= COPLANAR_THRESHOLD {
                region_of[neighbor.index()] = Some(seed);
                region.push(neighbor);
                worklist.push(neighbor);
            }
        }
    }
    region
}

/// Corners along the boundary of a region, in ring order, when the
/// boundary is a single closed loop
fn boundary_loop(
    source: &Mesh,
    region: &[PolygonId],
    seed: PolygonId,
    region_of: &[Option<PolygonId>],
) -> Option<Vec<CornerId>> {
    let in_region = |polygon_id: PolygonId| region_of[polygon_id.index()] == Some(seed);

    let mut next: HashMap<PointId, (CornerId, PointId)> = HashMap::new();
    for &polygon_id in region {
        for n in source.corner_neighborhoods(polygon_id) {
            let interior = source
                .find_edge(n.point_id, n.next_point_id)
                .map(|edge_id| {
                    let polygons = source.edge_polygons(edge_id);
                    polygons.len() == 2 && polygons.iter().all(|&p| in_region(p))
                })
                .unwrap_or(false);
            if interior {
                continue;
            }
            if next
                .insert(n.point_id, (n.corner_id, n.next_point_id))
                .is_some()
            {
                // Boundary touches itself at this point
                return None;
            }
        }
    }

    let start = next.keys().min().copied()?;
    let mut ring = Vec::with_capacity(next.len());
    let mut point_id = start;
    loop {
        let &(corner_id, next_point_id) = next.get(&point_id)?;
        ring.push(corner_id);
        point_id = next_point_id;
        if point_id == start || ring.len() > next.len() {
            break;
        }
    }
    (point_id == start && ring.len() == next.len() && ring.len() >= 3).then_some(ring)
}
