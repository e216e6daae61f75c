use crate::clock::Clock;
use crate::geometry::Point3;
use crate::time_series::TimedPoint;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderStatus {
    Idle,
    Tracing,
    Paused,
    Finalized,
}

impl Default for RecorderStatus {
    fn default() -> Self {
        RecorderStatus::Idle
    }
}

/// What happened to a sample handed to [`TraceRecorder::add_sample`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    Recorded(TimedPoint),
    /// Closer than the dedup threshold to the previous sample of the segment
    Duplicate,
    /// Recorder is not tracing
    Ignored,
    /// Per-attempt sample cap already reached
    CapReached,
}

/// One continuous start→stop interval of samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceSegment {
    pub points: Vec<TimedPoint>,
}

/// All segments of one attempt, in capture order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub segments: Vec<TraceSegment>,
}

impl Trace {
    pub fn sample_count(&self) -> usize {
        self.segments.iter().map(|s| s.points.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }

    /// Every sample, segments concatenated in order
    pub fn flatten(&self) -> Vec<TimedPoint> {
        self.segments
            .iter()
            .flat_map(|s| s.points.iter().copied())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecorderConfig {
    /// Samples nearer than this to their predecessor are dropped; 0 disables
    pub min_sample_distance: f64,
    pub max_samples: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            min_sample_distance: 0.001,
            max_samples: 20_000,
        }
    }
}

/// Captures the fingertip trace of a single attempt.
///
/// Elapsed time counts only time spent in `Tracing`: after a stop, the next
/// start rebases the clock so the first new sample continues from where the
/// previous segment left off.
#[derive(Debug)]
pub struct TraceRecorder<C: Clock> {
    clock: C,
    config: RecorderConfig,
    status: RecorderStatus,
    trace: Trace,
    /// Clock reading that corresponds to elapsed 0 for the open segment
    baseline: f64,
    /// Active tracing time accumulated by closed segments
    cumulative_secs: f64,
    sample_count: usize,
    cap_warned: bool,
}

impl<C: Clock> TraceRecorder<C> {
    pub fn new(clock: C, config: RecorderConfig) -> Self {
        Self {
            clock,
            config,
            status: RecorderStatus::Idle,
            trace: Trace::default(),
            baseline: 0.0,
            cumulative_secs: 0.0,
            sample_count: 0,
            cap_warned: false,
        }
    }

    pub fn status(&self) -> RecorderStatus {
        self.status
    }

    pub fn is_tracing(&self) -> bool {
        self.status == RecorderStatus::Tracing
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Opens a new segment. Returns false (and changes nothing) unless idle or paused.
    pub fn start(&mut self) -> bool {
        match self.status {
            RecorderStatus::Idle | RecorderStatus::Paused => {
                self.baseline = self.clock.now_secs() - self.cumulative_secs;
                self.trace.segments.push(TraceSegment::default());
                self.status = RecorderStatus::Tracing;
                log::debug!(
                    "tracing started, segment {} at {:.3}s",
                    self.trace.segments.len(),
                    self.cumulative_secs
                );
                true
            }
            status => {
                log::debug!("start ignored while {:?}", status);
                false
            }
        }
    }

    /// Closes the open segment and pauses. Returns false unless tracing.
    pub fn stop(&mut self) -> bool {
        if self.status != RecorderStatus::Tracing {
            log::debug!("stop ignored while {:?}", self.status);
            return false;
        }
        self.cumulative_secs = self.elapsed_secs();
        if self
            .trace
            .segments
            .last()
            .is_some_and(|s| s.points.is_empty())
        {
            self.trace.segments.pop();
        }
        self.status = RecorderStatus::Paused;
        log::debug!("tracing paused at {:.3}s", self.cumulative_secs);
        true
    }

    /// Active tracing time of this attempt so far.
    pub fn elapsed_secs(&self) -> f64 {
        match self.status {
            RecorderStatus::Tracing => {
                (self.clock.now_secs() - self.baseline).max(self.cumulative_secs)
            }
            _ => self.cumulative_secs,
        }
    }

    pub fn add_sample(&mut self, position: Point3) -> SampleOutcome {
        if self.status != RecorderStatus::Tracing {
            return SampleOutcome::Ignored;
        }
        if self.sample_count >= self.config.max_samples {
            if !self.cap_warned {
                log::warn!(
                    "sample cap of {} reached, dropping further samples",
                    self.config.max_samples
                );
                self.cap_warned = true;
            }
            return SampleOutcome::CapReached;
        }

        let t = self.elapsed_secs();
        let Some(segment) = self.trace.segments.last_mut() else {
            return SampleOutcome::Ignored;
        };
        if let Some(prev) = segment.points.last() {
            if prev.position.distance_to(position) < self.config.min_sample_distance {
                return SampleOutcome::Duplicate;
            }
        }

        let sample = TimedPoint::new(position, t);
        segment.points.push(sample);
        self.sample_count += 1;
        SampleOutcome::Recorded(sample)
    }

    /// Ends the attempt and hands back its trace. Tracing is stopped first.
    pub fn finalize(&mut self) -> Trace {
        if self.status == RecorderStatus::Tracing {
            self.stop();
        }
        if self.status != RecorderStatus::Finalized {
            log::debug!(
                "attempt finalized with {} samples in {} segments",
                self.sample_count,
                self.trace.segments.len()
            );
        }
        self.status = RecorderStatus::Finalized;
        self.trace.clone()
    }

    /// Drops everything and returns to `Idle`.
    pub fn reset(&mut self) {
        self.status = RecorderStatus::Idle;
        self.trace = Trace::default();
        self.baseline = 0.0;
        self.cumulative_secs = 0.0;
        self.sample_count = 0;
        self.cap_warned = false;
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn flatten(&self) -> Vec<TimedPoint> {
        self.trace.flatten()
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use assert_matches::assert_matches;

    fn recorder(min_distance: f64) -> (ManualClock, TraceRecorder<ManualClock>) {
        let clock = ManualClock::new(100.0);
        let rec = TraceRecorder::new(
            clock.clone(),
            RecorderConfig {
                min_sample_distance: min_distance,
                max_samples: 1000,
            },
        );
        (clock, rec)
    }

    fn px(x: f64) -> Point3 {
        Point3::new(x, 0.0, 0.0)
    }

    #[test]
    fn test_new_recorder_is_idle() {
        let (_clock, rec) = recorder(0.0);
        assert_eq!(rec.status(), RecorderStatus::Idle);
        assert_eq!(rec.elapsed_secs(), 0.0);
        assert!(rec.trace().is_empty());
    }

    #[test]
    fn test_samples_ignored_unless_tracing() {
        let (_clock, mut rec) = recorder(0.0);
        assert_eq!(rec.add_sample(px(0.1)), SampleOutcome::Ignored);

        rec.start();
        rec.stop();
        assert_eq!(rec.add_sample(px(0.1)), SampleOutcome::Ignored);
        assert_eq!(rec.sample_count(), 0);
    }

    #[test]
    fn test_elapsed_time_relative_to_attempt() {
        let (clock, mut rec) = recorder(0.0);
        rec.start();
        clock.advance(0.5);

        assert_matches!(rec.add_sample(px(0.1)), SampleOutcome::Recorded(s) if s.t == 0.5);
    }

    #[test]
    fn test_elapsed_time_continuous_across_pause() {
        let (clock, mut rec) = recorder(0.0);
        rec.start();
        clock.advance(1.0);
        rec.add_sample(px(0.1));
        clock.advance(1.0);
        rec.add_sample(px(0.2));
        assert!(rec.stop());
        assert_eq!(rec.elapsed_secs(), 2.0);

        // pause time does not count
        clock.advance(30.0);
        assert_eq!(rec.elapsed_secs(), 2.0);

        assert!(rec.start());
        clock.advance(0.5);
        rec.add_sample(px(0.3));

        let flat = rec.flatten();
        let times: Vec<f64> = flat.iter().map(|p| p.t).collect();
        assert_eq!(times, vec![1.0, 2.0, 2.5]);
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(rec.trace().segments.len(), 2);
    }

    #[test]
    fn test_start_while_tracing_is_noop() {
        let (clock, mut rec) = recorder(0.0);
        assert!(rec.start());
        clock.advance(1.0);
        assert!(!rec.start());
        assert_eq!(rec.trace().segments.len(), 1);
        assert_eq!(rec.elapsed_secs(), 1.0);
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let (_clock, mut rec) = recorder(0.0);
        assert!(!rec.stop());
        assert_eq!(rec.status(), RecorderStatus::Idle);
    }

    #[test]
    fn test_dedup_drops_close_samples() {
        let (_clock, mut rec) = recorder(0.01);
        rec.start();
        assert_matches!(rec.add_sample(px(0.0)), SampleOutcome::Recorded(_));
        assert_eq!(rec.add_sample(px(0.005)), SampleOutcome::Duplicate);
        assert_matches!(rec.add_sample(px(0.02)), SampleOutcome::Recorded(_));
        assert_eq!(rec.sample_count(), 2);
    }

    #[test]
    fn test_dedup_only_within_segment() {
        let (_clock, mut rec) = recorder(0.01);
        rec.start();
        rec.add_sample(px(0.0));
        rec.stop();
        rec.start();
        assert_matches!(rec.add_sample(px(0.0)), SampleOutcome::Recorded(_));
    }

    #[test]
    fn test_zero_threshold_keeps_identical_samples() {
        let (_clock, mut rec) = recorder(0.0);
        rec.start();
        rec.add_sample(px(0.0));
        assert_matches!(rec.add_sample(px(0.0)), SampleOutcome::Recorded(_));
    }

    #[test]
    fn test_sample_cap() {
        let clock = ManualClock::new(0.0);
        let mut rec = TraceRecorder::new(
            clock,
            RecorderConfig {
                min_sample_distance: 0.0,
                max_samples: 2,
            },
        );
        rec.start();
        rec.add_sample(px(0.0));
        rec.add_sample(px(0.1));
        assert_eq!(rec.add_sample(px(0.2)), SampleOutcome::CapReached);
        assert_eq!(rec.flatten().len(), 2);
    }

    #[test]
    fn test_empty_segments_are_discarded() {
        let (_clock, mut rec) = recorder(0.0);
        rec.start();
        rec.stop();
        rec.start();
        rec.add_sample(px(0.1));
        rec.stop();
        assert_eq!(rec.trace().segments.len(), 1);
    }

    #[test]
    fn test_finalize_stops_and_freezes() {
        let (clock, mut rec) = recorder(0.0);
        rec.start();
        rec.add_sample(px(0.1));
        clock.advance(1.0);
        rec.add_sample(px(0.2));

        let trace = rec.finalize();
        assert_eq!(rec.status(), RecorderStatus::Finalized);
        assert_eq!(trace.sample_count(), 2);

        assert!(!rec.start());
        assert_eq!(rec.add_sample(px(0.3)), SampleOutcome::Ignored);
        assert_eq!(rec.finalize(), trace);
    }

    #[test]
    fn test_reset_clears_everything() {
        let (clock, mut rec) = recorder(0.0);
        rec.start();
        clock.advance(3.0);
        rec.add_sample(px(0.1));
        rec.finalize();

        rec.reset();
        assert_eq!(rec.status(), RecorderStatus::Idle);
        assert!(rec.trace().is_empty());
        assert_eq!(rec.elapsed_secs(), 0.0);

        rec.start();
        clock.advance(0.25);
        assert_matches!(rec.add_sample(px(0.1)), SampleOutcome::Recorded(s) if s.t == 0.25);
    }
}
