//! In-place weld: merge coincident points, then drop duplicate, opposite
//! and degenerate polygons

use crate::config::WeldSettings;
use crate::mesh::types::{Corner, Point, Polygon};
use crate::mesh::{CornerId, EntityId, Mesh, PointId, PolygonId, Vec3};
use crate::remapper::Remapper;
use serde::Serialize;
use std::cmp::Ordering;

/// What a weld changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeldReport {
    /// Points merged onto another point
    pub merged_points: usize,
    /// Polygons dropped as duplicates of another polygon
    pub merged_polygons: usize,
    /// Polygons dropped as degenerate or as one of an opposite pair
    pub eliminated_polygons: usize,
    /// Corners dropped with their polygons or as repeated ring points
    pub removed_corners: usize,
}

impl WeldReport {
    /// True when the weld left the mesh unchanged
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Weld `mesh` in place
///
/// 1. Points closer than `max_point_distance` are merged; the surviving
///    point keeps its own attribute values.
/// 2. Repeated consecutive points are removed from every ring, and rings
///    left with fewer than three distinct points are eliminated.
/// 3. Of two polygons with the same ring, the second is merged away; two
///    polygons with the same ring in opposite orders are both eliminated.
/// 4. Polygons and corners are compacted and connectivity, normals and
///    centroids are rebuilt.
///
/// Points that lose all their corners are kept.
pub fn weld(mesh: &mut Mesh, settings: &WeldSettings) -> WeldReport {
    let mut report = WeldReport::default();
    let Some(position_map) = mesh.point_positions() else {
        log::warn!("weld: {} has no positions", mesh.name);
        return report;
    };
    let positions: Vec<Option<Vec3>> = mesh.point_ids().map(|p| position_map.try_get(p)).collect();
    let extent = mesh
        .bounding_box()
        .map(|bounding_box| bounding_box.size())
        .unwrap_or_else(Vec3::zeros);
    let corner_count_before = mesh.corner_count();

    let point_remapper = find_point_merges(&positions, &extent, settings.max_point_distance);
    report.merged_points = point_remapper.merge.len();
    apply_point_remap(mesh, &point_remapper);

    let mut polygon_remapper = Remapper::<PolygonId>::new(mesh.polygon_count());
    let mut removed = vec![false; mesh.polygon_count()];
    let rings = normalize_rings(mesh, &mut polygon_remapper, &mut removed);
    find_polygon_merges(&rings, &mut polygon_remapper, &mut removed);
    report.merged_polygons = polygon_remapper.merge.len();
    report.eliminated_polygons = polygon_remapper.eliminate.len();

    polygon_remapper.reorder_to_drop_merge_duplicates_and_eliminated();
    if log::log_enabled!(log::Level::Trace) {
        polygon_remapper.dump();
    }
    polygon_remapper.update_secondary_new_from_old();
    polygon_remapper.trim();

    compact_polygons_and_corners(mesh, &polygon_remapper);
    report.removed_corners = corner_count_before - mesh.corner_count();

    mesh.build_connectivity();
    mesh.compute_polygon_normals();
    mesh.compute_polygon_centroids();
    mesh.compute_point_normals();

    log::info!(
        "weld {}: {} points merged, {} polygons merged, {} eliminated, {} corners removed",
        mesh.name,
        report.merged_points,
        report.merged_polygons,
        report.eliminated_polygons,
        report.removed_corners
    );
    report
}

/// Sort points along the bounding box axes, widest first, and merge every
/// point within `max_distance` of an earlier unmerged point
fn find_point_merges(
    positions: &[Option<Vec3>],
    extent: &Vec3,
    max_distance: f32,
) -> Remapper<PointId> {
    let mut remapper = Remapper::<PointId>::new(positions.len());

    let mut ids: Vec<(PointId, Vec3)> = positions
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.map(|p| (PointId::from_index(i), p)))
        .collect();
    if ids.is_empty() {
        return remapper;
    }
    let mut axes = [0usize, 1, 2];
    axes.sort_by(|&a, &b| extent[b].total_cmp(&extent[a]));

    ids.sort_by(|(a_id, a), (b_id, b)| {
        axes.iter()
            .map(|&k| a[k].total_cmp(&b[k]))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
            .then(a_id.cmp(b_id))
    });

    let major = axes[0];
    let mut merged = vec![false; positions.len()];
    for (i, &(primary, p)) in ids.iter().enumerate() {
        if merged[primary.index()] {
            continue;
        }
        for &(secondary, q) in &ids[i + 1..] {
            if q[major] - p[major] > max_distance {
                break;
            }
            if merged[secondary.index()] {
                continue;
            }
            if (q - p).norm() <= max_distance {
                remapper.merge.insert(primary, secondary);
                merged[secondary.index()] = true;
            }
        }
    }

    remapper.reorder_to_drop_merge_duplicates_and_eliminated();
    if log::log_enabled!(log::Level::Trace) {
        remapper.dump();
    }
    remapper.update_secondary_new_from_old();
    remapper.trim();
    remapper
}

/// Drop merged-away points and move every corner onto the survivors
///
/// Each survivor takes over the corner reservations of the points merged
/// onto it.
fn apply_point_remap(mesh: &mut Mesh, remapper: &Remapper<PointId>) {
    if remapper.merge.is_empty() {
        return;
    }
    let old_points = std::mem::take(&mut mesh.points);
    mesh.points = (0..remapper.new_size)
        .map(|new_index| {
            let new_id = PointId::from_index(new_index);
            let mut reserved = old_points[remapper.old_id(new_id).index()].reserved_corner_count;
            remapper.for_each_primary_new(new_id, |_, _, _, secondary_old| {
                reserved += old_points[secondary_old.index()].reserved_corner_count;
            });
            Point {
                reserved_corner_count: reserved,
                ..Point::default()
            }
        })
        .collect();

    for corner in &mut mesh.corners {
        corner.point_id = remapper.new_id(corner.point_id);
    }
    mesh.point_attributes.remap_keys(remapper.kept_old_ids());
}

/// Remove repeated consecutive ring points, eliminate rings with fewer
/// than three distinct points and rotate the rest to start at their
/// smallest point
///
/// Returns the point ring of every polygon (empty when eliminated).
fn normalize_rings(
    mesh: &mut Mesh,
    remapper: &mut Remapper<PolygonId>,
    removed: &mut [bool],
) -> Vec<Vec<PointId>> {
    let mut rings = Vec::with_capacity(mesh.polygons.len());
    for polygon_index in 0..mesh.polygons.len() {
        let polygon = mesh.polygons[polygon_index];
        let range = polygon.corner_range();
        let ring = &mesh.polygon_corners[range.clone()];
        let n = ring.len();
        let point_of = |c: CornerId| mesh.corners[c.index()].point_id;

        let mut kept: Vec<CornerId> = (0..n)
            .filter(|&i| point_of(ring[i]) != point_of(ring[(i + 1) % n]))
            .map(|i| ring[i])
            .collect();

        let mut distinct: Vec<PointId> = kept.iter().map(|&c| point_of(c)).collect();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() < 3 {
            let polygon_id = PolygonId::from_index(polygon_index);
            log::debug!("weld: eliminating degenerate {}", polygon_id);
            remapper.eliminate.push(polygon_id);
            removed[polygon_index] = true;
            rings.push(Vec::new());
            continue;
        }

        let mut points: Vec<PointId> = kept.iter().map(|&c| point_of(c)).collect();
        let start = canonical_start(&points);
        kept.rotate_left(start);
        points.rotate_left(start);

        mesh.polygon_corners[range.start..range.start + kept.len()].copy_from_slice(&kept);
        mesh.polygons[polygon_index].corner_count = kept.len() as u32;
        rings.push(points);
    }
    rings
}

/// Rotation that makes `points` lexicographically smallest
///
/// Rings that repeat their smallest point have several candidate starts;
/// comparing whole rotations picks one of them deterministically.
fn canonical_start(points: &[PointId]) -> usize {
    let Some(&smallest) = points.iter().min() else {
        return 0;
    };
    let rotation = |start: usize| points[start..].iter().chain(&points[..start]);
    (0..points.len())
        .filter(|&i| points[i] == smallest)
        .min_by(|&lhs, &rhs| rotation(lhs).cmp(rotation(rhs)))
        .unwrap_or(0)
}

/// Same ring in the same order, both in canonical rotation
fn same_ring(lhs: &[PointId], rhs: &[PointId]) -> bool {
    lhs == rhs
}

/// Same ring in opposite order, both in canonical rotation
fn opposite_ring(lhs: &[PointId], rhs: &[PointId]) -> bool {
    if lhs.len() < 3 || rhs.len() != lhs.len() {
        return false;
    }
    let mut reversed = rhs.to_vec();
    reversed.reverse();
    let start = canonical_start(&reversed);
    reversed.rotate_left(start);
    lhs == reversed.as_slice()
}

fn find_polygon_merges(
    rings: &[Vec<PointId>],
    remapper: &mut Remapper<PolygonId>,
    removed: &mut [bool],
) {
    let mut order: Vec<usize> = (0..rings.len()).filter(|&i| !removed[i]).collect();
    order.sort_by_key(|&i| (rings[i][0], rings[i].len(), i));

    for (position, &left) in order.iter().enumerate() {
        if removed[left] {
            continue;
        }
        let candidates: Vec<usize> = order[position + 1..]
            .iter()
            .copied()
            .take_while(|&right| rings[right][0] == rings[left][0])
            .filter(|&right| !removed[right] && rings[right].len() == rings[left].len())
            .collect();

        // Opposite pairs cancel before duplicates are merged, so a merge
        // never survives into an eliminated polygon
        if let Some(&right) = candidates
            .iter()
            .find(|&&right| opposite_ring(&rings[left], &rings[right]))
        {
            remapper.eliminate.push(PolygonId::from_index(left));
            remapper.eliminate.push(PolygonId::from_index(right));
            removed[left] = true;
            removed[right] = true;
            continue;
        }
        for right in candidates {
            if same_ring(&rings[left], &rings[right]) {
                remapper
                    .merge
                    .insert(PolygonId::from_index(left), PolygonId::from_index(right));
                removed[right] = true;
            }
        }
    }
}

/// Keep only surviving polygons and the corners their rings use
fn compact_polygons_and_corners(mesh: &mut Mesh, polygon_remapper: &Remapper<PolygonId>) {
    let old_polygons = std::mem::take(&mut mesh.polygons);
    let old_polygon_corners = std::mem::take(&mut mesh.polygon_corners);
    let old_corners = std::mem::take(&mut mesh.corners);

    let mut corner_remapper = Remapper::<CornerId>::new(old_corners.len());
    let mut used = vec![false; old_corners.len()];
    for &old_polygon_id in polygon_remapper.kept_old_ids() {
        let range = old_polygons[old_polygon_id.index()].corner_range();
        for &corner_id in &old_polygon_corners[range] {
            corner_remapper.use_old(corner_id);
            used[corner_id.index()] = true;
        }
    }

    // Dropped corners give back their point's reservation
    for (corner, &kept) in old_corners.iter().zip(&used) {
        if kept {
            continue;
        }
        let point = &mut mesh.points[corner.point_id.index()];
        point.reserved_corner_count = point.reserved_corner_count.saturating_sub(1);
    }
    corner_remapper.reorder_to_drop_unused();
    corner_remapper.trim();

    mesh.corners = corner_remapper
        .kept_old_ids()
        .iter()
        .map(|&old_corner_id| {
            let old = old_corners[old_corner_id.index()];
            Corner {
                point_id: old.point_id,
                polygon_id: polygon_remapper.new_id(old.polygon_id),
            }
        })
        .collect();

    mesh.polygon_corners = Vec::with_capacity(mesh.corners.len());
    mesh.polygons = Vec::with_capacity(polygon_remapper.new_size);
    for &old_polygon_id in polygon_remapper.kept_old_ids() {
        let first = mesh.polygon_corners.len() as u32;
        let range = old_polygons[old_polygon_id.index()].corner_range();
        mesh.polygon_corners.extend(
            old_polygon_corners[range]
                .iter()
                .map(|&old_corner_id| corner_remapper.new_id(old_corner_id)),
        );
        mesh.polygons.push(Polygon {
            first_polygon_corner_id: first,
            corner_count: mesh.polygon_corners.len() as u32 - first,
        });
    }

    mesh.polygon_attributes
        .remap_keys(polygon_remapper.kept_old_ids());
    mesh.corner_attributes
        .remap_keys(corner_remapper.kept_old_ids());
    if !mesh.edge_attributes.is_empty() {
        log::debug!(
            "weld: dropping {} edge attribute maps",
            mesh.edge_attributes.len()
        );
        mesh.edge_attributes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::AttributeRegistry;
    use crate::shapes::make_cube;
    use std::sync::Arc;

    fn empty_mesh() -> Mesh {
        Mesh::with_name("soup", Arc::new(AttributeRegistry::standard()))
    }

    fn triangle(mesh: &mut Mesh, points: [(f32, f32, f32); 3]) {
        let ids: Vec<PointId> = points
            .iter()
            .map(|&(x, y, z)| mesh.make_point_with_position(x, y, z))
            .collect();
        mesh.make_polygon_from_points(&ids);
    }

    /// Every polygon of `mesh` with its own copies of the points
    fn explode(mesh: &Mesh) -> Mesh {
        let mut soup = empty_mesh();
        for polygon_id in mesh.polygon_ids() {
            let ids: Vec<PointId> = mesh
                .polygon_positions(polygon_id)
                .iter()
                .map(|p| soup.make_point_with_position(p.x, p.y, p.z))
                .collect();
            soup.make_polygon_from_points(&ids);
        }
        soup.build_connectivity();
        soup
    }

    #[test]
    fn test_weld_triangle_soup() {
        let mut mesh = empty_mesh();
        triangle(&mut mesh, [(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (1.0, 1.0, 0.0)]);
        triangle(&mut mesh, [(0.0, 0.0, 0.0), (1.0, 1.0, 0.0005), (0.0, 1.0, 0.0)]);
        mesh.build_connectivity();
        assert_eq!(mesh.edge_count(), 6);

        let report = weld(&mut mesh, &WeldSettings::default());
        assert_eq!(report.merged_points, 2);
        assert_eq!(report.merged_polygons, 0);
        assert_eq!(mesh.point_count(), 4);
        assert_eq!(mesh.polygon_count(), 2);
        assert_eq!(mesh.edge_count(), 5);
        assert!(mesh.sanity_check());
    }

    #[test]
    fn test_distance_is_linear() {
        let mut mesh = empty_mesh();
        triangle(&mut mesh, [(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0)]);
        triangle(&mut mesh, [(0.0, 0.0, 0.03), (1.0, 0.0, 0.05), (0.0, 1.0, 0.5)]);
        mesh.build_connectivity();

        let report = weld(&mut mesh, &WeldSettings::new(0.04));
        assert_eq!(report.merged_points, 1);
        assert_eq!(mesh.point_count(), 5);
    }

    #[test]
    fn test_opposite_polygons_are_eliminated() {
        let mut mesh = empty_mesh();
        let a = [(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0)];
        triangle(&mut mesh, a);
        triangle(&mut mesh, [a[0], a[2], a[1]]);
        triangle(&mut mesh, [(5.0, 0.0, 0.0), (6.0, 0.0, 0.0), (5.0, 1.0, 0.0)]);
        mesh.build_connectivity();

        let report = weld(&mut mesh, &WeldSettings::default());
        assert_eq!(report.eliminated_polygons, 2);
        assert_eq!(mesh.polygon_count(), 1);
        assert_eq!(mesh.corner_count(), 3);
        // Points of the eliminated pair stay behind without corners
        assert_eq!(mesh.point_count(), 6);
        for corner_id in mesh.corner_ids() {
            assert_eq!(mesh.corner(corner_id).polygon_id, PolygonId(0));
        }
        assert!(mesh.sanity_check());
    }

    #[test]
    fn test_duplicate_polygons_are_merged() {
        let mut mesh = empty_mesh();
        let a = [(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0)];
        triangle(&mut mesh, a);
        triangle(&mut mesh, [a[1], a[2], a[0]]);
        mesh.build_connectivity();

        let report = weld(&mut mesh, &WeldSettings::default());
        assert_eq!(report.merged_points, 3);
        assert_eq!(report.merged_polygons, 1);
        assert_eq!(mesh.polygon_count(), 1);
        assert_eq!(mesh.corner_count(), 3);
        assert_eq!(report.removed_corners, 3);
    }

    #[test]
    fn test_collapsed_corners() {
        let mut mesh = empty_mesh();
        let p: Vec<PointId> = [(0.0, 0.0), (1.0, 0.0), (1.0, 0.0005), (0.0, 1.0)]
            .iter()
            .map(|&(x, y)| mesh.make_point_with_position(x, y, 0.0))
            .collect();
        mesh.make_polygon_from_points(&p);
        triangle(&mut mesh, [(3.0, 0.0, 0.0), (3.0, 0.0, 0.0), (4.0, 0.0, 0.0)]);
        mesh.build_connectivity();

        let report = weld(&mut mesh, &WeldSettings::default());
        assert_eq!(report.merged_points, 2);
        assert_eq!(report.eliminated_polygons, 1);
        assert_eq!(mesh.polygon_count(), 1);
        assert_eq!(mesh.polygon(PolygonId(0)).corner_count, 3);
        assert_eq!(report.removed_corners, 1 + 3);
    }

    #[test]
    fn test_canonical_start_breaks_ties_on_whole_ring() {
        let ring = [PointId(3), PointId(0), PointId(5), PointId(0), PointId(2)];
        assert_eq!(canonical_start(&ring), 3);
        assert_eq!(canonical_start(&[PointId(4), PointId(1), PointId(2)]), 1);
        assert_eq!(canonical_start(&[]), 0);
    }

    #[test]
    fn test_rings_with_repeated_point_merge() {
        let mut mesh = empty_mesh();
        let [a, b, c, d, e] = [
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (-1.0, 0.0),
            (-1.0, -1.0),
        ]
        .map(|(x, y)| mesh.make_point_with_position(x, y, 0.0));
        mesh.make_polygon_from_points(&[a, b, c, a, d, e]);
        mesh.make_polygon_from_points(&[a, d, e, a, b, c]);
        mesh.build_connectivity();

        let report = weld(&mut mesh, &WeldSettings::default());
        assert_eq!(report.merged_polygons, 1);
        assert_eq!(report.eliminated_polygons, 0);
        assert_eq!(mesh.polygon_count(), 1);
        assert_eq!(mesh.polygon_points(PolygonId(0)), vec![a, b, c, a, d, e]);
    }

    #[test]
    fn test_opposite_pair_cancels_before_merge() {
        let mut mesh = empty_mesh();
        let [a, b, c] = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]
            .map(|(x, y)| mesh.make_point_with_position(x, y, 0.0));
        mesh.make_polygon_from_points(&[a, b, c]);
        mesh.make_polygon_from_points(&[b, c, a]);
        mesh.make_polygon_from_points(&[a, c, b]);
        mesh.build_connectivity();

        let report = weld(&mut mesh, &WeldSettings::default());
        assert_eq!(report.eliminated_polygons, 2);
        assert_eq!(report.merged_polygons, 0);
        assert_eq!(mesh.polygon_count(), 1);
        assert_eq!(mesh.corner_count(), 3);
        assert!(mesh.sanity_check());
    }

    #[test]
    fn test_reservations_match_surviving_corners() {
        let mut mesh = explode(&make_cube(1.0));
        triangle(&mut mesh, [(3.0, 0.0, 0.0), (3.0, 0.0, 0.0), (4.0, 0.0, 0.0)]);
        let far = [(5.0, 0.0, 0.0), (6.0, 0.0, 0.0), (5.0, 1.0, 0.0)];
        triangle(&mut mesh, far);
        triangle(&mut mesh, [far[0], far[2], far[1]]);

        let report = weld(&mut mesh, &WeldSettings::default());
        assert_eq!(report.eliminated_polygons, 3);
        assert_eq!(mesh.polygon_count(), 6);
        for point_id in mesh.point_ids() {
            let point = mesh.point(point_id);
            assert_eq!(
                point.reserved_corner_count,
                point.corner_count,
                "{}",
                point_id
            );
            assert_eq!(
                point.corner_count as usize,
                mesh.point_corners(point_id).len()
            );
        }
        assert!(mesh.sanity_check());
    }

    #[test]
    fn test_weld_exploded_cube_is_idempotent() {
        let mut mesh = explode(&make_cube(1.0));
        assert_eq!(mesh.point_count(), 24);

        let report = weld(&mut mesh, &WeldSettings::default());
        assert_eq!(report.merged_points, 16);
        let info = mesh.info();
        assert_eq!(info.point_count, 8);
        assert_eq!(info.polygon_count, 6);
        assert_eq!(info.edge_count, 12);
        assert_eq!(info.boundary_edge_count, 0);
        assert!(info.volume > 0.0);

        let again = weld(&mut mesh, &WeldSettings::default());
        assert!(again.is_empty());
        assert_eq!(mesh.point_count(), 8);
        assert_eq!(mesh.polygon_count(), 6);
    }
}
