//! Synthetic sessions and replay files.
//!
//! Both produce a stream of [`TimedEvent`]s that [`play`] feeds into an
//! [`Engine`] driven by a [`ManualClock`], so recorded timestamps come from
//! the event stream rather than the wall clock.

use std::io::{Read, Write};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, ManualClock};
use crate::engine::Engine;
use crate::geometry::{Anchors, Point3};
use crate::path::GuidePath;
use crate::runtime::SessionEvent;
use crate::trial::TrialEvent;
use crate::{Error, Result};

/// Session event stamped with the clock time at which it happens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent {
    pub t: f64,
    pub event: SessionEvent,
}

impl TimedEvent {
    pub fn new(t: f64, event: SessionEvent) -> Self {
        Self { t, event }
    }
}

/// Feeds `events` into `engine`, moving `clock` to each event's time first.
///
/// Stops after the session completes; later events are dropped.
pub fn play<I>(engine: &mut Engine<ManualClock>, clock: &ManualClock, events: I) -> Result<Vec<TrialEvent>>
where
    I: IntoIterator<Item = TimedEvent>,
{
    let mut emitted = Vec::new();
    for timed in events {
        clock.set(timed.t);
        let events = engine.handle(timed.event)?;
        let done = events.contains(&TrialEvent::SessionComplete);
        emitted.extend(events);
        if done {
            break;
        }
    }
    Ok(emitted)
}

/// Point at `fraction` of the guide's arc length
pub fn point_along(guide: &GuidePath, fraction: f64) -> Point3 {
    let total = guide.polyline_length();
    if total <= 0.0 {
        return guide.start();
    }
    let mut remaining = fraction.clamp(0.0, 1.0) * total;
    for (a, b) in guide.segments() {
        let len = a.distance_to(b);
        if remaining <= len && len > 0.0 {
            return a.lerp(b, remaining / len);
        }
        remaining -= len;
    }
    guide.end()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub seed: u64,
    pub anchors: Anchors,
    pub samples_per_attempt: usize,
    /// Seconds between samples
    pub sample_interval: f64,
    /// Per-axis noise bound, meters
    pub jitter: f64,
    /// Lift the finger halfway through each attempt for this long
    pub pause_secs: Option<f64>,
    /// Idle time between attempts
    pub attempt_gap: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            anchors: Anchors::new(Point3::new(-0.2, 1.2, -0.4), Point3::new(0.2, 1.2, -0.4)),
            samples_per_attempt: 60,
            sample_interval: 1.0 / 30.0,
            jitter: 0.004,
            pause_secs: None,
            attempt_gap: 2.0,
        }
    }
}

/// Everything a simulated run produced
#[derive(Debug, Clone, Default)]
pub struct SimulatedSession {
    pub events: Vec<TimedEvent>,
    pub trial_events: Vec<TrialEvent>,
}

/// Seeded generator of fingertip traces that follow a guide path
#[derive(Debug)]
pub struct Simulator {
    rng: StdRng,
    config: SimulationConfig,
}

impl Simulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    // mean of three uniforms, bell-shaped in [-1, 1]
    fn noise(&mut self) -> f64 {
        (0..3).map(|_| self.rng.gen_range(-1.0f64..1.0)).sum::<f64>() / 3.0
    }

    fn jitter(&mut self) -> Point3 {
        let j = self.config.jitter;
        Point3::new(self.noise() * j, self.noise() * j, self.noise() * j)
    }

    /// Events for one attempt along `guide`, starting at time `t0`.
    pub fn attempt_events(&mut self, guide: &GuidePath, t0: f64) -> Vec<TimedEvent> {
        let n = self.config.samples_per_attempt.max(2);
        let dt = self.config.sample_interval;
        let mut events = vec![
            TimedEvent::new(t0, SessionEvent::Anchors(self.config.anchors)),
            TimedEvent::new(t0, SessionEvent::StartTracing),
        ];

        let mut offset = 0.0;
        let mut t = t0;
        for i in 0..n {
            t = t0 + i as f64 * dt + offset;
            if i == n / 2 {
                if let Some(pause) = self.config.pause_secs {
                    events.push(TimedEvent::new(t, SessionEvent::StopTracing));
                    offset += pause;
                    t += pause;
                    events.push(TimedEvent::new(t, SessionEvent::StartTracing));
                }
            }
            let position = point_along(guide, i as f64 / (n - 1) as f64) + self.jitter();
            events.push(TimedEvent::new(t, SessionEvent::Sample(position)));
        }
        events.push(TimedEvent::new(t + dt, SessionEvent::FinishAttempt));
        events
    }

    /// Runs attempts against `engine` until its session is complete.
    pub fn run_session(
        &mut self,
        engine: &mut Engine<ManualClock>,
        clock: &ManualClock,
    ) -> Result<SimulatedSession> {
        if self.config.anchors.is_degenerate() {
            return Err(Error::Config("simulation anchors coincide".into()));
        }

        let mut session = SimulatedSession::default();
        let mut t = clock.now_secs();
        while !engine.machine().is_session_complete() {
            let guide = engine.machine().guide_for(self.config.anchors);
            let events = self.attempt_events(&guide, t);
            t = events.last().map_or(t, |e| e.t) + self.config.attempt_gap;
            session
                .trial_events
                .extend(play(engine, clock, events.iter().copied())?);
            session.events.extend(events);
        }
        log::info!(
            "simulated {} attempts from seed {}",
            engine.store().total_attempts(),
            self.config.seed
        );
        Ok(session)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ReplayKind {
    AnchorStart,
    AnchorEnd,
    Start,
    Stop,
    Sample,
    Finish,
    Discard,
}

/// One line of a replay file: `t,event,x,y,z`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReplayRow {
    t: f64,
    event: ReplayKind,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
}

impl ReplayRow {
    fn bare(t: f64, event: ReplayKind) -> Self {
        Self {
            t,
            event,
            x: None,
            y: None,
            z: None,
        }
    }

    fn at(t: f64, event: ReplayKind, p: Point3) -> Self {
        Self {
            t,
            event,
            x: Some(p.x),
            y: Some(p.y),
            z: Some(p.z),
        }
    }

    fn position(&self) -> Option<Point3> {
        Some(Point3::new(self.x?, self.y?, self.z?))
    }
}

/// Parses a replay CSV into timed events.
pub fn read_replay<R: Read>(reader: R) -> Result<Vec<TimedEvent>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut events = Vec::new();
    let mut pending_start = None;

    for (i, row) in rdr.deserialize::<ReplayRow>().enumerate() {
        let row = row?;
        // header is line 1
        let line = i + 2;
        let position = || {
            row.position()
                .ok_or_else(|| Error::Parse(format!("line {line}: {:?} needs x, y and z", row.event)))
        };
        let event = match row.event {
            ReplayKind::AnchorStart => {
                pending_start = Some(position()?);
                continue;
            }
            ReplayKind::AnchorEnd => {
                let start = pending_start.take().ok_or_else(|| {
                    Error::Parse(format!("line {line}: anchor_end without anchor_start"))
                })?;
                SessionEvent::Anchors(Anchors::new(start, position()?))
            }
            ReplayKind::Start => SessionEvent::StartTracing,
            ReplayKind::Stop => SessionEvent::StopTracing,
            ReplayKind::Sample => SessionEvent::Sample(position()?),
            ReplayKind::Finish => SessionEvent::FinishAttempt,
            ReplayKind::Discard => SessionEvent::DiscardAttempt,
        };
        events.push(TimedEvent::new(row.t, event));
    }
    log::debug!("read {} replay events", events.len());
    Ok(events)
}

/// Writes events in the replay CSV format. Ticks are skipped.
pub fn write_replay<W: Write>(events: &[TimedEvent], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for &TimedEvent { t, event } in events {
        match event {
            SessionEvent::Anchors(a) => {
                wtr.serialize(ReplayRow::at(t, ReplayKind::AnchorStart, a.start))?;
                wtr.serialize(ReplayRow::at(t, ReplayKind::AnchorEnd, a.end))?;
            }
            SessionEvent::StartTracing => wtr.serialize(ReplayRow::bare(t, ReplayKind::Start))?,
            SessionEvent::StopTracing => wtr.serialize(ReplayRow::bare(t, ReplayKind::Stop))?,
            SessionEvent::Sample(p) => wtr.serialize(ReplayRow::at(t, ReplayKind::Sample, p))?,
            SessionEvent::FinishAttempt => wtr.serialize(ReplayRow::bare(t, ReplayKind::Finish))?,
            SessionEvent::DiscardAttempt => {
                wtr.serialize(ReplayRow::bare(t, ReplayKind::Discard))?
            }
            SessionEvent::Tick => {}
        }
    }
    wtr.flush()?;
    Ok(())
}
