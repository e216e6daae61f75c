use crate::geometry::{Anchors, Point3};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Above this |direction · up| the reference up axis is swapped out.
const UP_PARALLEL_THRESHOLD: f64 = 0.99;

/// Shape of a trial's ideal path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, strum_macros::Display)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrialKind {
    Straight,
    ZigZag { amplitude: f64, frequency_cycles: u32 },
}

/// Resolution settings shared by every generated guide path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathConfig {
    pub spacing: f64,
    pub max_points: usize,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            spacing: 0.01,
            max_points: 200,
        }
    }
}

/// Ordered guide points running from the start anchor to the end anchor.
///
/// Always holds at least two points; the first is the start anchor and the
/// last is the end anchor, bit for bit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point3>", into = "Vec<Point3>")]
pub struct GuidePath {
    points: Vec<Point3>,
}

impl TryFrom<Vec<Point3>> for GuidePath {
    type Error = String;

    fn try_from(points: Vec<Point3>) -> Result<Self, Self::Error> {
        if points.len() >= 2 {
            Ok(Self { points })
        } else {
            Err(format!(
                "guide path needs at least 2 points, got {}",
                points.len()
            ))
        }
    }
}

impl From<GuidePath> for Vec<Point3> {
    fn from(path: GuidePath) -> Self {
        path.points
    }
}

impl GuidePath {
    /// Wraps an existing point list, e.g. one read back from an export.
    pub fn from_points(points: Vec<Point3>) -> Option<Self> {
        Self::try_from(points).ok()
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start(&self) -> Point3 {
        self.points[0]
    }

    pub fn end(&self) -> Point3 {
        self.points[self.points.len() - 1]
    }

    pub fn anchors(&self) -> Anchors {
        Anchors::new(self.start(), self.end())
    }

    /// True when both anchors coincide; such a trial cannot be traced.
    pub fn is_degenerate(&self) -> bool {
        self.start() == self.end()
    }

    /// Consecutive point pairs making up the polyline.
    pub fn segments(&self) -> impl Iterator<Item = (Point3, Point3)> + '_ {
        self.points.iter().copied().tuple_windows()
    }

    pub fn polyline_length(&self) -> f64 {
        self.segments().map(|(a, b)| a.distance_to(b)).sum()
    }
}

/// Number of intervals between guide points for a line of `length` meters.
///
/// Uses `floor`, so a length that is a whole multiple of `spacing` can land
/// one interval short through float rounding (0.3 / 0.1 is 2.999..., giving
/// 3 points rather than 4). Endpoints stay exact either way.
fn dot_count(length: f64, spacing: f64, max_points: usize) -> usize {
    let cap = max_points.saturating_sub(1);
    let by_spacing = if spacing > 0.0 {
        (length / spacing).floor()
    } else {
        f64::INFINITY
    };
    let count = if by_spacing >= cap as f64 {
        cap
    } else {
        by_spacing as usize
    };
    count.max(1)
}

/// Unit vector perpendicular to `direction`, used as the zig-zag offset axis.
fn right_vector(direction: Point3) -> Point3 {
    let up = if direction.dot(Point3::UNIT_Y).abs() > UP_PARALLEL_THRESHOLD {
        Point3::UNIT_Z
    } else {
        Point3::UNIT_Y
    };
    direction.cross(up).normalized().unwrap_or(Point3::UNIT_X)
}

/// Builds the guide path between two anchors.
///
/// The number of intervals is `min(max_points - 1, floor(length / spacing))`,
/// never less than one. Coincident anchors produce the degenerate path
/// `[start, end]`.
pub fn generate(
    start: Point3,
    end: Point3,
    kind: TrialKind,
    spacing: f64,
    max_points: usize,
) -> GuidePath {
    let delta = end - start;
    let length = delta.length();
    let Some(direction) = delta.normalized() else {
        log::debug!("degenerate guide path at {:?}", start);
        return GuidePath {
            points: vec![start, end],
        };
    };

    let count = dot_count(length, spacing, max_points);
    let right = match kind {
        TrialKind::Straight => Point3::ZERO,
        TrialKind::ZigZag { .. } => right_vector(direction),
    };

    let points = (0..=count)
        .map(|i| {
            if i == 0 {
                return start;
            }
            if i == count {
                return end;
            }
            let t = i as f64 / count as f64;
            let base = start + direction * (length * t);
            match kind {
                TrialKind::Straight => base,
                TrialKind::ZigZag {
                    amplitude,
                    frequency_cycles,
                } => {
                    let phase = i as f64 * frequency_cycles as f64 * PI / count as f64;
                    base + right * (amplitude * phase.sin())
                }
            }
        })
        .collect();

    GuidePath { points }
}

/// Convenience wrapper taking the anchor pair and shared resolution settings.
pub fn generate_for(anchors: Anchors, kind: TrialKind, config: &PathConfig) -> GuidePath {
    generate(
        anchors.start,
        anchors.end,
        kind,
        config.spacing,
        config.max_points,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZIGZAG: TrialKind = TrialKind::ZigZag {
        amplitude: 0.05,
        frequency_cycles: 4,
    };

    #[test]
    fn test_straight_quarter_spacing() {
        let path = generate(
            Point3::ZERO,
            Point3::new(1.0, 0.0, 0.0),
            TrialKind::Straight,
            0.25,
            100,
        );

        let expected = [0.0, 0.25, 0.5, 0.75, 1.0];
        assert_eq!(path.len(), expected.len());
        for (p, x) in path.points().iter().zip(expected) {
            assert!(p.approx_eq(Point3::new(x, 0.0, 0.0), 1e-12));
        }
    }

    #[test]
    fn test_endpoints_are_exact() {
        let start = Point3::new(0.123, -0.456, 0.789);
        let end = Point3::new(-0.31, 0.07, 1.93);
        for spacing in [0.001, 0.013, 0.3, 5.0] {
            for kind in [TrialKind::Straight, ZIGZAG] {
                let path = generate(start, end, kind, spacing, 150);
                assert_eq!(path.start(), start);
                assert_eq!(path.end(), end);
            }
        }
    }

    #[test]
    fn test_point_count_is_capped() {
        let path = generate(
            Point3::ZERO,
            Point3::new(10.0, 0.0, 0.0),
            TrialKind::Straight,
            0.001,
            50,
        );
        assert_eq!(path.len(), 50);
    }

    #[test]
    fn test_short_line_keeps_both_anchors() {
        let path = generate(
            Point3::ZERO,
            Point3::new(0.005, 0.0, 0.0),
            TrialKind::Straight,
            0.01,
            50,
        );
        assert_eq!(path.points(), &[Point3::ZERO, Point3::new(0.005, 0.0, 0.0)]);
    }

    #[test]
    fn test_degenerate_path() {
        let p = Point3::new(1.0, 1.0, 1.0);
        let path = generate(p, p, ZIGZAG, 0.01, 100);
        assert_eq!(path.points(), &[p, p]);
        assert!(path.is_degenerate());
    }

    #[test]
    fn test_zigzag_offsets_perpendicular_and_bounded() {
        let start = Point3::ZERO;
        let end = Point3::new(1.0, 0.0, 0.0);
        let path = generate(start, end, ZIGZAG, 0.01, 200);

        assert_eq!(path.len(), 101);
        for p in path.points() {
            // horizontal line with world up: offsets run along z
            assert!(p.y.abs() < 1e-12);
            assert!(p.z.abs() <= 0.05 + 1e-12);
        }
        let peak = path
            .points()
            .iter()
            .map(|p| p.z.abs())
            .fold(0.0_f64, f64::max);
        assert!((peak - 0.05).abs() < 1e-3);
    }

    #[test]
    fn test_zigzag_vertical_line_uses_alternate_up() {
        let start = Point3::ZERO;
        let end = Point3::new(0.0, 1.0, 0.0);
        let path = generate(start, end, ZIGZAG, 0.01, 200);

        assert_eq!(path.start(), start);
        assert_eq!(path.end(), end);
        assert!(path.points().iter().all(|p| p.x.is_finite() && p.z == 0.0));
        assert!(path.points().iter().any(|p| p.x.abs() > 0.01));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = Point3::new(0.1, 0.2, 0.3);
        let b = Point3::new(0.9, 0.4, -0.3);
        assert_eq!(
            generate(a, b, ZIGZAG, 0.02, 80),
            generate(a, b, ZIGZAG, 0.02, 80)
        );
    }

    #[test]
    fn test_from_points_requires_two() {
        assert!(GuidePath::from_points(vec![Point3::ZERO]).is_none());
        assert!(GuidePath::from_points(vec![Point3::ZERO, Point3::UNIT_X]).is_some());
    }

    #[test]
    fn test_polyline_length_straight() {
        let path = generate(
            Point3::ZERO,
            Point3::new(0.0, 0.0, 2.0),
            TrialKind::Straight,
            0.1,
            100,
        );
        assert!((path.polyline_length() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_kind_display_and_serde() {
        assert_eq!(TrialKind::Straight.to_string(), "straight");
        assert_eq!(ZIGZAG.to_string(), "zig_zag");

        let json = serde_json::to_string(&ZIGZAG).unwrap();
        assert_eq!(
            json,
            r#"{"type":"zig_zag","amplitude":0.05,"frequency_cycles":4}"#
        );
        let back: TrialKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ZIGZAG);
    }

    #[test]
    fn test_guide_serde_rejects_short_paths() {
        assert!(serde_json::from_str::<GuidePath>("[]").is_err());
        assert!(serde_json::from_str::<GuidePath>(r#"[{"x":0.0,"y":0.0,"z":0.0}]"#).is_err());

        let path = generate(Point3::ZERO, Point3::UNIT_X, TrialKind::Straight, 0.5, 10);
        let json = serde_json::to_string(&path).unwrap();
        assert!(json.starts_with('['));
        let back: GuidePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn test_floor_resolution_on_inexact_ratio() {
        let path = generate(
            Point3::ZERO,
            Point3::new(0.3, 0.0, 0.0),
            TrialKind::Straight,
            0.1,
            100,
        );
        assert_eq!(path.len(), 3);
        assert_eq!(path.end(), Point3::new(0.3, 0.0, 0.0));
    }
}
