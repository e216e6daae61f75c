use crate::deviation;
use crate::path::GuidePath;
use crate::time_series::TimedPoint;
use crate::util::{max, mean, std_dev};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Reference line that per-sample deviation is measured against
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviationReference {
    /// Straight line between the two anchors, whatever the trial kind
    #[default]
    Chord,
    /// The generated guide polyline itself
    Shape,
}

/// Summary statistics of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Score {
    pub path_length: f64,
    pub max_deviation: f64,
    pub average_deviation: f64,
    pub deviation_std_dev: f64,
    pub duration_secs: f64,
    pub sample_count: usize,
}

/// Distance travelled along consecutive samples; timestamps are ignored.
pub fn path_length(trace: &[TimedPoint]) -> f64 {
    trace
        .iter()
        .tuple_windows()
        .map(|(a, b)| a.position.distance_to(b.position))
        .sum()
}

/// Deviation of every sample from the chosen reference.
pub fn deviations(
    trace: &[TimedPoint],
    ideal: &GuidePath,
    reference: DeviationReference,
) -> Vec<f64> {
    let (start, end) = (ideal.start(), ideal.end());
    trace
        .iter()
        .map(|sample| match reference {
            DeviationReference::Chord => deviation::distance(sample.position, start, end),
            DeviationReference::Shape => deviation::distance_to_polyline(sample.position, ideal),
        })
        .collect()
}

/// Scores a flattened trace against the chord of `ideal`.
pub fn score(trace: &[TimedPoint], ideal: &GuidePath) -> Score {
    score_with(trace, ideal, DeviationReference::Chord)
}

pub fn score_with(
    trace: &[TimedPoint],
    ideal: &GuidePath,
    reference: DeviationReference,
) -> Score {
    let devs = deviations(trace, ideal, reference);

    Score {
        path_length: path_length(trace),
        max_deviation: max(&devs).unwrap_or(0.0),
        average_deviation: mean(&devs).unwrap_or(0.0),
        deviation_std_dev: std_dev(&devs).unwrap_or(0.0),
        duration_secs: trace.last().map_or(0.0, |p| p.t),
        sample_count: trace.len(),
    }
}
