//! Chamfer
//!
//! Every edge is replaced by a hexagon and every polygon shrinks inward.
//! The geometry comes from edge planes: each edge gets a plane through its
//! midpoint, normal to the average of its two polygon normals, pushed
//! inward by a fraction of the smallest edge height around its points.
//! Source points move to where the planes of their edges meet, and every
//! polygon corner moves to where the polygon's plane meets the planes of
//! its two edges.

use crate::config::ChamferSettings;
use crate::mesh::geometry::{
    intersect_plane, intersect_three_planes, intersect_two_planes, line_point_distance,
    polygon_centroid, Plane,
};
use crate::mesh::{
    names, AttributeKey, CornerId, CornerNeighborhood, EdgeId, EntityId, Mesh, PointId, PolygonId,
    PropertyMap, Vec3,
};
use crate::operation::copy::copy;
use crate::operation::geometry_operation::GeometryOperation;

/// Chamfer with default settings
pub fn chamfer(source: &Mesh) -> Mesh {
    chamfer_with(source, &ChamferSettings::default())
}

/// Chamfer `source`
///
/// The source needs positions and edges; without them a copy is returned.
/// Edges not shared by exactly two polygons get no hexagon.
pub fn chamfer_with(source: &Mesh, settings: &ChamferSettings) -> Mesh {
    let Some(positions) = source.point_positions() else {
        log::warn!("chamfer: {} has no positions, copying", source.name);
        return copy(source);
    };
    if source.edge_count() == 0 {
        log::warn!("chamfer: {} has no edges, copying", source.name);
        return copy(source);
    }

    let polygon_normals: Vec<Vec3> = source
        .polygon_ids()
        .map(|polygon_id| source.compute_polygon_normal(polygon_id))
        .collect();
    let polygon_centroids: Vec<Vec3> = source
        .polygon_ids()
        .map(|polygon_id| polygon_centroid(&source.polygon_positions(polygon_id)))
        .collect();

    let planes = edge_planes(
        source,
        positions,
        &polygon_normals,
        &polygon_centroids,
        settings.bevel_ratio,
    );
    let vertex_positions = moved_point_positions(source, positions, &planes);

    let mut op = GeometryOperation::new(source, format!("chamfer({})", source.name));
    op.make_points_from_points();
    for old_point_id in source.point_ids() {
        let Some(new_point_id) = op.point_new(old_point_id) else {
            continue;
        };
        let corners = source.point_corners(old_point_id);
        let weight = 1.0 / corners.len().max(1) as f32;
        for &old_corner_id in corners {
            op.add_point_corner_source(new_point_id, weight, old_corner_id);
        }
    }

    // Shrunk polygons
    let mut corner_inset: Vec<Option<PointId>> = vec![None; source.corner_count()];
    let mut new_positions: Vec<(PointId, Vec3)> = Vec::new();
    for old_polygon_id in source.polygon_ids() {
        let new_polygon_id = op.make_new_polygon_from_polygon(old_polygon_id);
        let centroid = polygon_centroids[old_polygon_id.index()];
        let face_plane =
            Plane::from_point_normal(&centroid, &polygon_normals[old_polygon_id.index()]);
        let corner_count = source.polygon_corners(old_polygon_id).len();

        for n in source.corner_neighborhoods(old_polygon_id) {
            let (Some(lhs_edge), Some(rhs_edge)) = (
                source.find_edge(n.prev_point_id, n.point_id),
                source.find_edge(n.point_id, n.next_point_id),
            ) else {
                log::warn!("chamfer: {} has no edges around it", n.corner_id);
                continue;
            };

            let inset = op.destination.make_point();
            op.add_point_source(inset, 0.5, n.point_id);
            op.add_point_corner_source(inset, 0.5, n.corner_id);
            op.add_polygon_centroid(inset, 0.5 / corner_count as f32, old_polygon_id);

            let position = match (&planes[lhs_edge.index()], &planes[rhs_edge.index()]) {
                (Some(lhs_plane), Some(rhs_plane)) => {
                    intersect_three_planes(&face_plane, lhs_plane, rhs_plane)
                }
                _ => None,
            }
            .unwrap_or_else(|| {
                log::debug!("chamfer: no plane crossing for {}", n.corner_id);
                (centroid + vertex_positions[n.point_id.index()]) * 0.5
            });
            new_positions.push((inset, position));
            corner_inset[n.corner_id.index()] = Some(inset);

            let new_corner_id = op.destination.make_polygon_corner(new_polygon_id, inset);
            op.add_corner_source(new_corner_id, 1.0, n.corner_id);
        }
    }

    // Edge hexagons
    for edge_id in source.edge_ids() {
        let edge_polygons = source.edge_polygons(edge_id);
        if edge_polygons.len() != 2 {
            log::warn!(
                "chamfer: {} has {} polygons, no hexagon made",
                edge_id,
                edge_polygons.len()
            );
            continue;
        }
        let edge = source.edge(edge_id);
        let (lo, hi) = (edge.a, edge.b);
        let (f0, f1) = if half_edge(source, edge_polygons[0], lo, hi).is_some() {
            (edge_polygons[0], edge_polygons[1])
        } else {
            (edge_polygons[1], edge_polygons[0])
        };
        let (Some(h0), Some(h1)) = (
            half_edge(source, f0, lo, hi),
            half_edge(source, f1, hi, lo),
        ) else {
            log::warn!("chamfer: polygons of {} disagree on its direction", edge_id);
            continue;
        };
        let inset = |corner_id: CornerId| corner_inset[corner_id.index()];
        let ring = [
            op.point_new(lo),
            inset(h1.next_corner_id),
            inset(h1.corner_id),
            op.point_new(hi),
            inset(h0.next_corner_id),
            inset(h0.corner_id),
        ];
        let Some(ring) = ring.into_iter().collect::<Option<Vec<PointId>>>() else {
            log::warn!("chamfer: missing points for {}", edge_id);
            continue;
        };

        let new_polygon_id = op.destination.make_polygon();
        op.add_polygon_source(new_polygon_id, 0.5, f0);
        op.add_polygon_source(new_polygon_id, 0.5, f1);
        for new_point_id in ring {
            op.make_new_corner_from_point(new_polygon_id, new_point_id);
        }
    }

    op.interpolate_mesh_attributes();

    new_positions.extend(
        source
            .point_ids()
            .filter_map(|p| op.point_new(p).map(|n| (n, vertex_positions[p.index()]))),
    );
    match op
        .destination
        .point_attributes_mut()
        .find_mut::<Vec3>(&AttributeKey::named(names::POSITION))
    {
        Some(destination_positions) => {
            for (point_id, position) in new_positions {
                destination_positions.put(point_id, position);
            }
        }
        None => log::error!("chamfer: destination has no positions"),
    }

    op.post_processing();
    op.finish()
}

/// Neighborhood of the corner of `polygon_id` starting half-edge `from -> to`
fn half_edge(
    source: &Mesh,
    polygon_id: PolygonId,
    from: PointId,
    to: PointId,
) -> Option<CornerNeighborhood> {
    source
        .corner_neighborhoods(polygon_id)
        .find(|n| n.point_id == from && n.next_point_id == to)
}

/// Plane of every edge, `None` when an endpoint has no position
fn edge_planes(
    source: &Mesh,
    positions: &PropertyMap<PointId, Vec3>,
    polygon_normals: &[Vec3],
    polygon_centroids: &[Vec3],
    bevel_ratio: f32,
) -> Vec<Option<Plane>> {
    let mut planes = Vec::with_capacity(source.edge_count());
    let mut min_heights = vec![f32::MAX; source.point_count()];

    for edge_id in source.edge_ids() {
        let edge = source.edge(edge_id);
        let edge_polygons = source.edge_polygons(edge_id);
        let normal_sum: Vec3 = edge_polygons
            .iter()
            .map(|p| polygon_normals[p.index()])
            .sum();
        let normal = normal_sum.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::y);
        let (Some(a), Some(b)) = (positions.try_get(edge.a), positions.try_get(edge.b)) else {
            log::debug!("chamfer: {} has an endpoint without position", edge_id);
            planes.push(None);
            continue;
        };
        let midpoint = (a + b) * 0.5;
        planes.push(Some(Plane::from_point_normal(&midpoint, &normal)));

        if let [lhs, rhs] = edge_polygons {
            if let Some(height) = line_point_distance(
                &polygon_centroids[lhs.index()],
                &polygon_centroids[rhs.index()],
                &midpoint,
            ) {
                for point_id in [edge.a, edge.b] {
                    let slot = &mut min_heights[point_id.index()];
                    *slot = slot.min(height);
                }
            }
        }
    }

    for (i, slot) in planes.iter_mut().enumerate() {
        let edge = source.edge(EdgeId::from_index(i));
        let height = min_heights[edge.a.index()].min(min_heights[edge.b.index()]);
        if let Some(plane) = slot.filter(|_| height < f32::MAX) {
            *slot = Some(plane.pushed_inward(bevel_ratio * height));
        }
    }
    planes
}

/// Where the edge planes around each point meet
///
/// For every corner, the planes of its two ring edges meet in a line; the
/// point is placed at the mean parameter where the point's other edge
/// planes cross that line, averaged over its corners. Points for which no
/// corner yields a crossing stay in place.
fn moved_point_positions(
    source: &Mesh,
    positions: &PropertyMap<PointId, Vec3>,
    planes: &[Option<Plane>],
) -> Vec<Vec3> {
    let mut sums = vec![Vec3::zeros(); source.point_count()];
    let mut counts = vec![0usize; source.point_count()];

    for polygon_id in source.polygon_ids() {
        for n in source.corner_neighborhoods(polygon_id) {
            let (Some(lhs_edge), Some(rhs_edge)) = (
                source.find_edge(n.prev_point_id, n.point_id),
                source.find_edge(n.point_id, n.next_point_id),
            ) else {
                continue;
            };
            let (Some(lhs_plane), Some(rhs_plane)) =
                (&planes[lhs_edge.index()], &planes[rhs_edge.index()])
            else {
                continue;
            };
            let Some((origin, direction)) = intersect_two_planes(lhs_plane, rhs_plane) else {
                continue;
            };

            let ts: Vec<f32> = source
                .point_edges(n.point_id)
                .iter()
                .filter(|&&e| e != lhs_edge && e != rhs_edge)
                .filter_map(|e| planes[e.index()].as_ref())
                .filter_map(|plane| intersect_plane(plane, &origin, &direction))
                .collect();
            if ts.is_empty() {
                continue;
            }
            let t = ts.iter().sum::<f32>() / ts.len() as f32;
            sums[n.point_id.index()] += origin + direction * t;
            counts[n.point_id.index()] += 1;
        }
    }

    source
        .point_ids()
        .map(|point_id| {
            let i = point_id.index();
            if counts[i] > 0 {
                sums[i] / counts[i] as f32
            } else {
                positions.try_get(point_id).unwrap_or_default()
            }
        })
        .collect()
}
