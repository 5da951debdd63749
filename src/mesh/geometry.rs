//! Geometric helpers for polygons, planes and lines

use crate::mesh::types::Vec3;

/// Tolerance for parallel / coplanar tests on unit vectors
const PARALLEL_EPSILON: f32 = 1e-6;

/// Compute the normal of a polygon with Newell's method
///
/// Works for non-planar and concave polygons. Returns `None` when the
/// polygon has no area (fewer than three distinct points, or collinear).
pub fn polygon_normal(points: &[Vec3]) -> Option<Vec3> {
    newell_sum(points).try_normalize(1e-12)
}

/// Area of a (planar) polygon
pub fn polygon_area(points: &[Vec3]) -> f32 {
    0.5 * newell_sum(points).norm()
}

fn newell_sum(points: &[Vec3]) -> Vec3 {
    let n = points.len();
    let mut sum = Vec3::zeros();
    for i in 0..n {
        let current = points[i];
        let next = points[(i + 1) % n];
        sum.x += (current.y - next.y) * (current.z + next.z);
        sum.y += (current.z - next.z) * (current.x + next.x);
        sum.z += (current.x - next.x) * (current.y + next.y);
    }
    sum
}

/// Compute the centroid (vertex average) of a polygon
pub fn polygon_centroid(points: &[Vec3]) -> Vec3 {
    if points.is_empty() {
        return Vec3::zeros();
    }
    points.iter().fold(Vec3::zeros(), |sum, p| sum + p) / points.len() as f32
}

/// Plane `normal . x + d = 0` with a unit normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    /// Plane through `point` with the given unit normal
    pub fn from_point_normal(point: &Vec3, normal: &Vec3) -> Self {
        Self {
            normal: *normal,
            d: -normal.dot(point),
        }
    }

    /// Signed distance from the plane; positive on the side the normal points to
    pub fn signed_distance(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }

    /// Same plane moved by `distance` against its normal
    pub fn pushed_inward(&self, distance: f32) -> Self {
        Self {
            normal: self.normal,
            d: self.d + distance,
        }
    }
}

/// Intersection point of three planes, `None` when any two are parallel
pub fn intersect_three_planes(a: &Plane, b: &Plane, c: &Plane) -> Option<Vec3> {
    let bxc = b.normal.cross(&c.normal);
    let cxa = c.normal.cross(&a.normal);
    let axb = a.normal.cross(&b.normal);
    let denominator = a.normal.dot(&bxc);
    if denominator.abs() < PARALLEL_EPSILON {
        return None;
    }
    Some((bxc * -a.d + cxa * -b.d + axb * -c.d) / denominator)
}

/// Intersection line of two planes as `(origin, unit direction)`
pub fn intersect_two_planes(p1: &Plane, p2: &Plane) -> Option<(Vec3, Vec3)> {
    let dot = p1.normal.dot(&p2.normal);
    if dot.abs() >= 1.0 - PARALLEL_EPSILON {
        return None;
    }
    let inv_det = 1.0 / (1.0 - dot * dot);
    let c0 = (-p1.d + dot * p2.d) * inv_det;
    let c1 = (-p2.d + dot * p1.d) * inv_det;
    let origin = p1.normal * c0 + p2.normal * c1;
    let direction = p1.normal.cross(&p2.normal).try_normalize(1e-12)?;
    Some((origin, direction))
}

/// Ray parameter where `origin + t * direction` meets the plane
///
/// A ray lying in the plane yields `Some(0.0)`; a parallel ray off the
/// plane yields `None`.
pub fn intersect_plane(plane: &Plane, origin: &Vec3, direction: &Vec3) -> Option<f32> {
    let denominator = direction.dot(&plane.normal);
    if denominator.abs() <= PARALLEL_EPSILON {
        return if plane.signed_distance(origin).abs() <= PARALLEL_EPSILON {
            Some(0.0)
        } else {
            None
        };
    }
    Some(-(origin.dot(&plane.normal) + plane.d) / denominator)
}

/// Closest point to `q` on the infinite line through `p0` and `p1`
pub fn closest_point_on_line(p0: &Vec3, p1: &Vec3, q: &Vec3) -> Option<Vec3> {
    let u = p1 - p0;
    let length_squared = u.dot(&u);
    if length_squared < f32::EPSILON {
        return None;
    }
    let t = u.dot(&(q - p0)) / length_squared;
    Some(p0 + u * t)
}

/// Distance from `q` to the infinite line through `p0` and `p1`
pub fn line_point_distance(p0: &Vec3, p1: &Vec3, q: &Vec3) -> Option<f32> {
    closest_point_on_line(p0, p1, q).map(|c| (q - c).norm())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_square() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_polygon_normal_counter_clockwise() {
        let normal = polygon_normal(&unit_square()).unwrap();
        assert_relative_eq!(normal, Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-6);

        let mut reversed = unit_square();
        reversed.reverse();
        let normal = polygon_normal(&reversed).unwrap();
        assert_relative_eq!(normal, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_polygon_has_no_normal() {
        let collinear = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
        ];
        assert!(polygon_normal(&collinear).is_none());
        assert_relative_eq!(polygon_area(&collinear), 0.0);
    }

    #[test]
    fn test_area_and_centroid() {
        assert_relative_eq!(polygon_area(&unit_square()), 1.0, epsilon = 1e-6);
        assert_relative_eq!(
            polygon_centroid(&unit_square()),
            Vec3::new(0.5, 0.5, 0.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_three_planes() {
        let x = Plane::from_point_normal(&Vec3::new(1.0, 0.0, 0.0), &Vec3::x());
        let y = Plane::from_point_normal(&Vec3::new(0.0, 2.0, 0.0), &Vec3::y());
        let z = Plane::from_point_normal(&Vec3::new(0.0, 0.0, 3.0), &Vec3::z());
        let p = intersect_three_planes(&x, &y, &z).unwrap();
        assert_relative_eq!(p, Vec3::new(1.0, 2.0, 3.0), epsilon = 1e-5);

        let x2 = Plane::from_point_normal(&Vec3::new(5.0, 0.0, 0.0), &Vec3::x());
        assert!(intersect_three_planes(&x, &x2, &z).is_none());
    }

    #[test]
    fn test_two_planes_and_ray() {
        let x = Plane::from_point_normal(&Vec3::new(1.0, 0.0, 0.0), &Vec3::x());
        let y = Plane::from_point_normal(&Vec3::new(0.0, 2.0, 0.0), &Vec3::y());
        let (origin, direction) = intersect_two_planes(&x, &y).unwrap();
        assert_relative_eq!(x.signed_distance(&origin), 0.0, epsilon = 1e-5);
        assert_relative_eq!(y.signed_distance(&origin), 0.0, epsilon = 1e-5);
        assert_relative_eq!(direction.z.abs(), 1.0, epsilon = 1e-6);

        let z = Plane::from_point_normal(&Vec3::new(0.0, 0.0, 3.0), &Vec3::z());
        let t = intersect_plane(&z, &origin, &direction).unwrap();
        assert_relative_eq!((origin + direction * t).z, 3.0, epsilon = 1e-5);

        assert!(intersect_plane(&x, &Vec3::zeros(), &Vec3::y()).is_none());
        assert_eq!(
            intersect_plane(&x, &Vec3::new(1.0, 0.0, 0.0), &Vec3::y()),
            Some(0.0)
        );
    }

    #[test]
    fn test_pushed_inward() {
        let plane = Plane::from_point_normal(&Vec3::new(0.0, 0.0, 1.0), &Vec3::z());
        let pushed = plane.pushed_inward(0.25);
        assert_relative_eq!(pushed.signed_distance(&Vec3::new(0.0, 0.0, 0.75)), 0.0);
    }

    #[test]
    fn test_line_point_distance() {
        let d = line_point_distance(
            &Vec3::new(0.0, 0.0, 0.0),
            &Vec3::new(2.0, 0.0, 0.0),
            &Vec3::new(1.0, 3.0, 0.0),
        )
        .unwrap();
        assert_relative_eq!(d, 3.0, epsilon = 1e-6);
        assert!(line_point_distance(&Vec3::zeros(), &Vec3::zeros(), &Vec3::x()).is_none());
    }
}
