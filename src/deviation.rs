//! Point-to-segment projection.
//!
//! Callers choose the reference: live feedback passes the two trial anchors,
//! scoring may pass either the anchor chord or every guide segment in turn.

use crate::geometry::Point3;
use crate::path::GuidePath;

/// Clamped projection parameter of `point` onto `start..end`, in `[0, 1]`.
///
/// A zero-length segment yields 0.
pub fn projection_parameter(point: Point3, start: Point3, end: Point3) -> f64 {
    let segment = end - start;
    let length_sq = segment.length_squared();
    if length_sq == 0.0 {
        return 0.0;
    }
    ((point - start).dot(segment) / length_sq).clamp(0.0, 1.0)
}

/// Closest point to `point` on the segment `start..end`.
pub fn closest_point(point: Point3, start: Point3, end: Point3) -> Point3 {
    let t = projection_parameter(point, start, end);
    start.lerp(end, t)
}

/// Distance from `point` to the segment `start..end`.
pub fn distance(point: Point3, start: Point3, end: Point3) -> f64 {
    point.distance_to(closest_point(point, start, end))
}

/// Distance from `point` to the nearest segment of the guide polyline.
pub fn distance_to_polyline(point: Point3, path: &GuidePath) -> f64 {
    path.segments()
        .map(|(a, b)| distance(point, a, b))
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{generate, TrialKind};

    const EPS: f64 = 1e-12;

    #[test]
    fn test_projection_inside_segment() {
        let a = Point3::ZERO;
        let b = Point3::new(2.0, 0.0, 0.0);
        let p = Point3::new(0.5, 1.0, 0.0);

        assert!((projection_parameter(p, a, b) - 0.25).abs() < EPS);
        assert!(closest_point(p, a, b).approx_eq(Point3::new(0.5, 0.0, 0.0), EPS));
        assert!((distance(p, a, b) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_projection_clamps_to_endpoints() {
        let a = Point3::ZERO;
        let b = Point3::new(1.0, 0.0, 0.0);

        let before = Point3::new(-3.0, 4.0, 0.0);
        assert_eq!(projection_parameter(before, a, b), 0.0);
        assert!((distance(before, a, b) - 5.0).abs() < EPS);

        let after = Point3::new(4.0, 0.0, 4.0);
        assert_eq!(projection_parameter(after, a, b), 1.0);
        assert!((distance(after, a, b) - 5.0).abs() < EPS);
    }

    #[test]
    fn test_zero_length_segment() {
        let a = Point3::new(1.0, 2.0, 3.0);
        let p = Point3::new(1.0, 2.0, 5.0);

        assert_eq!(projection_parameter(p, a, a), 0.0);
        assert_eq!(closest_point(p, a, a), a);
        assert_eq!(distance(p, a, a), p.distance_to(a));
    }

    #[test]
    fn test_swapping_endpoints() {
        let a = Point3::new(0.1, -0.2, 0.4);
        let b = Point3::new(1.3, 0.8, -0.6);
        let p = Point3::new(0.7, 0.9, 0.2);

        let t = projection_parameter(p, a, b);
        let t_rev = projection_parameter(p, b, a);
        assert!((t + t_rev - 1.0).abs() < 1e-9);
        assert!((distance(p, a, b) - distance(p, b, a)).abs() < 1e-12);
    }

    #[test]
    fn test_point_on_segment_has_zero_distance() {
        let a = Point3::new(0.0, 1.0, 0.0);
        let b = Point3::new(0.0, 1.0, 1.0);
        assert!(distance(Point3::new(0.0, 1.0, 0.3), a, b) < EPS);
    }

    #[test]
    fn test_polyline_distance_follows_shape() {
        let path = generate(
            Point3::ZERO,
            Point3::new(1.0, 0.0, 0.0),
            TrialKind::ZigZag {
                amplitude: 0.1,
                frequency_cycles: 1,
            },
            0.01,
            200,
        );
        // apex of the single arch sits at z = 0.1 above the chord midpoint
        let apex = Point3::new(0.5, 0.0, 0.1);
        assert!(distance_to_polyline(apex, &path) < 1e-3);
        assert!((distance(apex, path.start(), path.end()) - 0.1).abs() < EPS);
    }
}
