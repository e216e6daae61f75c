use crate::geometry::Anchors;
use crate::path::{self, GuidePath, PathConfig, TrialKind};
use crate::recorder::Trace;
use crate::score::{self, DeviationReference};
use crate::session::{SessionState, SessionStore, TraceAttempt};
use crate::{Error, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One task variant of the protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialDefinition {
    pub name: String,
    pub kind: TrialKind,
    pub required_attempts: u32,
}

impl TrialDefinition {
    pub fn new(name: impl Into<String>, kind: TrialKind, required_attempts: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            required_attempts,
        }
    }
}

/// Notifications emitted by the state machine.
///
/// The machine never touches recorders or renderers itself; whoever drives it
/// reacts to `TrialChanged` by resetting its recorder and regenerating the
/// live guide path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialEvent {
    AttemptRecorded { trial: usize, attempt: u32 },
    TrialComplete { trial: usize },
    TrialChanged { from: usize, to: usize },
    SessionComplete,
}

/// Sequences the configured trials and their repetitions
#[derive(Debug, Clone)]
pub struct TrialStateMachine {
    definitions: Vec<TrialDefinition>,
    path_config: PathConfig,
    reference: DeviationReference,
    state: SessionState,
    store: SessionStore,
}

impl TrialStateMachine {
    pub fn new(
        definitions: Vec<TrialDefinition>,
        path_config: PathConfig,
        reference: DeviationReference,
    ) -> Result<Self> {
        if definitions.is_empty() {
            return Err(Error::Config("at least one trial is required".into()));
        }
        if let Some(d) = definitions.iter().find(|d| d.required_attempts == 0) {
            return Err(Error::Config(format!(
                "trial '{}' requires zero attempts",
                d.name
            )));
        }
        let store = SessionStore::new(&definitions);
        Ok(Self {
            definitions,
            path_config,
            reference,
            state: SessionState::default(),
            store,
        })
    }

    pub fn definitions(&self) -> &[TrialDefinition] {
        &self.definitions
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn into_store(self) -> SessionStore {
        self.store
    }

    pub fn path_config(&self) -> &PathConfig {
        &self.path_config
    }

    pub fn current_trial_index(&self) -> usize {
        self.state.current_trial
    }

    pub fn current_trial(&self) -> &TrialDefinition {
        &self.definitions[self.state.current_trial]
    }

    pub fn current_attempt(&self) -> u32 {
        self.state.current_attempt
    }

    pub fn is_trial_complete(&self, trial_index: usize) -> bool {
        match self.definitions.get(trial_index) {
            Some(def) => self.store.attempt_count(trial_index) >= def.required_attempts as usize,
            None => false,
        }
    }

    pub fn can_advance(&self) -> bool {
        self.is_trial_complete(self.state.current_trial)
    }

    fn is_last_trial(&self) -> bool {
        self.state.current_trial + 1 >= self.definitions.len()
    }

    pub fn is_session_complete(&self) -> bool {
        self.is_last_trial() && self.can_advance()
    }

    /// `(attempts recorded, attempts required)` for every trial, in order
    pub fn progress(&self) -> Vec<(usize, u32)> {
        self.definitions
            .iter()
            .enumerate()
            .map(|(i, d)| (self.store.attempt_count(i), d.required_attempts))
            .collect()
    }

    /// Moves to the next trial once the current one is complete.
    ///
    /// Returns `None` when the current trial still needs attempts or when it
    /// is already the last trial.
    pub fn advance(&mut self) -> Option<TrialEvent> {
        if !self.can_advance() || self.is_last_trial() {
            return None;
        }
        let from = self.state.current_trial;
        self.state.current_trial += 1;
        self.state.current_attempt = 1;
        log::info!(
            "advancing from trial '{}' to '{}'",
            self.definitions[from].name,
            self.current_trial().name
        );
        Some(TrialEvent::TrialChanged {
            from,
            to: self.state.current_trial,
        })
    }

    /// Guide path of the current trial for the given anchors
    pub fn guide_for(&self, anchors: Anchors) -> GuidePath {
        path::generate_for(anchors, self.current_trial().kind, &self.path_config)
    }

    pub fn record_attempt(&mut self, trace: &Trace, anchors: Anchors) -> Result<Vec<TrialEvent>> {
        self.record_attempt_at(trace, anchors, Local::now())
    }

    /// Scores and stores one finalized attempt.
    ///
    /// If the current trial was already complete the machine first advances,
    /// so the attempt lands in the next trial as attempt 1.
    pub fn record_attempt_at(
        &mut self,
        trace: &Trace,
        anchors: Anchors,
        recorded_at: DateTime<Local>,
    ) -> Result<Vec<TrialEvent>> {
        if self.is_session_complete() {
            return Err(Error::SessionComplete);
        }

        let mut events = Vec::new();
        if let Some(changed) = self.advance() {
            events.push(changed);
        }

        let trial = self.state.current_trial;
        let attempt_number = self.state.current_attempt;
        let required = self.definitions[trial].required_attempts;

        let guide = self.guide_for(anchors);
        let points = trace.flatten();
        let score = score::score_with(&points, &guide, self.reference);

        self.store.append(
            trial,
            TraceAttempt {
                attempt_number,
                recorded_at,
                anchors,
                guide,
                points,
                score,
            },
        )?;
        log::info!(
            "trial '{}' attempt {}/{}: length {:.3} m, max deviation {:.4} m, mean deviation {:.4} m",
            self.definitions[trial].name,
            attempt_number,
            required,
            score.path_length,
            score.max_deviation,
            score.average_deviation
        );
        events.push(TrialEvent::AttemptRecorded {
            trial,
            attempt: attempt_number,
        });

        if attempt_number < required {
            self.state.current_attempt += 1;
        } else {
            self.state.current_attempt = 1;
            events.push(TrialEvent::TrialComplete { trial });
            if self.is_last_trial() {
                log::info!("all {} trials complete", self.definitions.len());
                events.push(TrialEvent::SessionComplete);
            }
        }

        Ok(events)
    }
}
