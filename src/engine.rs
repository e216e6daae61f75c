use crate::clock::Clock;
use crate::config::Config;
use crate::deviation;
use crate::geometry::{Anchors, Point3};
use crate::path::GuidePath;
use crate::recorder::{RecorderStatus, SampleOutcome, TraceRecorder};
use crate::runtime::SessionEvent;
use crate::session::SessionStore;
use crate::trial::{TrialEvent, TrialStateMachine};
use crate::{Error, Result};

/// Per-sample feedback for the rendering side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveFeedback {
    /// Distance to the straight line between the anchors
    pub deviation: f64,
    /// Projection parameter along that line, 0 at start and 1 at end
    pub progress: f64,
    pub on_path: bool,
    pub sample: SampleOutcome,
}

/// Single-owner facade wiring the recorder to the trial state machine.
///
/// The surrounding application supplies anchors and fingertip samples and
/// reads back the guide path and live feedback.
#[derive(Debug)]
pub struct Engine<C: Clock> {
    machine: TrialStateMachine,
    recorder: TraceRecorder<C>,
    anchors: Option<Anchors>,
    guide: Option<GuidePath>,
    on_path_tolerance: f64,
    last_feedback: Option<LiveFeedback>,
}

impl<C: Clock> Engine<C> {
    pub fn new(config: &Config, clock: C) -> Result<Self> {
        config.validate()?;
        let machine = TrialStateMachine::new(
            config.trials()?,
            config.path_config(),
            config.deviation_reference,
        )?;
        Ok(Self {
            machine,
            recorder: TraceRecorder::new(clock, config.recorder_config()),
            anchors: None,
            guide: None,
            on_path_tolerance: config.on_path_tolerance,
            last_feedback: None,
        })
    }

    pub fn machine(&self) -> &TrialStateMachine {
        &self.machine
    }

    pub fn recorder(&self) -> &TraceRecorder<C> {
        &self.recorder
    }

    pub fn store(&self) -> &SessionStore {
        self.machine.store()
    }

    pub fn into_store(self) -> SessionStore {
        self.machine.into_store()
    }

    pub fn anchors(&self) -> Option<Anchors> {
        self.anchors
    }

    /// Guide path of the current trial, once anchors are known
    pub fn guide(&self) -> Option<&GuidePath> {
        self.guide.as_ref()
    }

    pub fn last_feedback(&self) -> Option<LiveFeedback> {
        self.last_feedback
    }

    fn attempt_in_progress(&self) -> bool {
        matches!(
            self.recorder.status(),
            RecorderStatus::Tracing | RecorderStatus::Paused
        )
    }

    /// Sets the anchors for the upcoming attempt and regenerates the guide.
    ///
    /// Anchors stay fixed while an attempt is in progress; returns false if
    /// they were rejected for that reason.
    pub fn set_anchors(&mut self, anchors: Anchors) -> bool {
        if self.attempt_in_progress() {
            log::warn!("anchors changed mid-attempt, keeping the current ones");
            return false;
        }
        if anchors.is_degenerate() {
            log::warn!("anchors coincide at {:?}; trial cannot be traced", anchors.start);
        }
        self.anchors = Some(anchors);
        self.guide = Some(self.machine.guide_for(anchors));
        true
    }

    pub fn start_tracing(&mut self) -> bool {
        if self.machine.is_session_complete() {
            log::debug!("session complete, ignoring start");
            return false;
        }
        match &self.guide {
            Some(guide) if !guide.is_degenerate() => self.recorder.start(),
            Some(_) => {
                log::warn!("cannot trace a degenerate guide path");
                false
            }
            None => {
                log::debug!("no anchors yet, ignoring start");
                false
            }
        }
    }

    pub fn stop_tracing(&mut self) -> bool {
        self.recorder.stop()
    }

    /// Feeds one fingertip position; recorded only while tracing.
    pub fn on_sample(&mut self, position: Point3) -> Option<LiveFeedback> {
        let anchors = self.anchors?;
        let deviation = deviation::distance(position, anchors.start, anchors.end);
        let feedback = LiveFeedback {
            deviation,
            progress: deviation::projection_parameter(position, anchors.start, anchors.end),
            on_path: deviation <= self.on_path_tolerance,
            sample: self.recorder.add_sample(position),
        };
        self.last_feedback = Some(feedback);
        Some(feedback)
    }

    /// Finalizes the current attempt, scores and stores it, and moves to the
    /// next trial as soon as the current one has all its attempts.
    pub fn finish_attempt(&mut self) -> Result<Vec<TrialEvent>> {
        let anchors = self.anchors.ok_or(Error::NoAnchors)?;
        if self.machine.is_session_complete() {
            return Err(Error::SessionComplete);
        }
        let trace = self.recorder.finalize();
        if trace.is_empty() {
            log::warn!("recording an attempt without samples");
        }

        let mut events = self.machine.record_attempt(&trace, anchors)?;
        self.recorder.reset();
        if let Some(changed) = self.machine.advance() {
            events.push(changed);
        }
        for event in &events {
            self.on_trial_event(*event);
        }
        Ok(events)
    }

    /// Throws away the attempt in progress without recording it.
    pub fn discard_attempt(&mut self) {
        log::debug!(
            "discarding attempt with {} samples",
            self.recorder.sample_count()
        );
        self.recorder.reset();
    }

    fn on_trial_event(&mut self, event: TrialEvent) {
        if let TrialEvent::TrialChanged { to, .. } = event {
            self.recorder.reset();
            self.guide = self.anchors.map(|a| self.machine.guide_for(a));
            log::debug!(
                "trial {} ready, guide with {} points",
                to,
                self.guide.as_ref().map_or(0, GuidePath::len)
            );
        }
    }

    /// Applies one event from the sensing side.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<TrialEvent>> {
        match event {
            SessionEvent::Anchors(anchors) => {
                self.set_anchors(anchors);
            }
            SessionEvent::StartTracing => {
                self.start_tracing();
            }
            SessionEvent::StopTracing => {
                self.stop_tracing();
            }
            SessionEvent::Sample(position) => {
                self.on_sample(position);
            }
            SessionEvent::FinishAttempt => return self.finish_attempt(),
            SessionEvent::DiscardAttempt => self.discard_attempt(),
            SessionEvent::Tick => {}
        }
        Ok(Vec::new())
    }
}
