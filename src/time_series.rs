use crate::geometry::Point3;
use serde::{Deserialize, Serialize};

/// A fingertip sample; `t` is seconds of active tracing since the attempt began.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedPoint {
    pub position: Point3,
    pub t: f64,
}

impl TimedPoint {
    pub fn new(position: Point3, t: f64) -> Self {
        Self { position, t }
    }
}

impl From<(Point3, f64)> for TimedPoint {
    fn from(v: (Point3, f64)) -> Self {
        TimedPoint {
            position: v.0,
            t: v.1,
        }
    }
}

impl From<TimedPoint> for (Point3, f64) {
    fn from(p: TimedPoint) -> Self {
        (p.position, p.t)
    }
}
