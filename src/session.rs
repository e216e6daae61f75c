use crate::geometry::Anchors;
use crate::path::{GuidePath, TrialKind};
use crate::score::Score;
use crate::time_series::TimedPoint;
use crate::trial::TrialDefinition;
use crate::{Error, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Progress counters of a running session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub current_trial: usize,
    /// 1-based number the next attempt in the current trial will get
    pub current_attempt: u32,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            current_trial: 0,
            current_attempt: 1,
        }
    }
}

/// One finalized trace-and-score cycle. Never modified once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceAttempt {
    pub attempt_number: u32,
    pub recorded_at: DateTime<Local>,
    pub anchors: Anchors,
    pub guide: GuidePath,
    pub points: Vec<TimedPoint>,
    pub score: Score,
}

/// Attempts of one trial, in recorded order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialLog {
    pub name: String,
    pub kind: TrialKind,
    pub required_attempts: u32,
    pub attempts: Vec<TraceAttempt>,
}

/// Append-only record of every finalized attempt, keyed by trial index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStore {
    trials: Vec<TrialLog>,
}

impl SessionStore {
    pub fn new(definitions: &[TrialDefinition]) -> Self {
        let trials = definitions
            .iter()
            .map(|d| TrialLog {
                name: d.name.clone(),
                kind: d.kind,
                required_attempts: d.required_attempts,
                attempts: Vec::new(),
            })
            .collect();
        Self { trials }
    }

    pub fn append(&mut self, trial_index: usize, attempt: TraceAttempt) -> Result<&TraceAttempt> {
        let log = self
            .trials
            .get_mut(trial_index)
            .ok_or(Error::UnknownTrial(trial_index))?;
        log.attempts.push(attempt);
        Ok(&log.attempts[log.attempts.len() - 1])
    }

    pub fn trials(&self) -> &[TrialLog] {
        &self.trials
    }

    pub fn attempts(&self, trial_index: usize) -> &[TraceAttempt] {
        self.trials
            .get(trial_index)
            .map(|log| log.attempts.as_slice())
            .unwrap_or(&[])
    }

    pub fn attempt_count(&self, trial_index: usize) -> usize {
        self.attempts(trial_index).len()
    }

    pub fn total_attempts(&self) -> usize {
        self.trials.iter().map(|t| t.attempts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_attempts() == 0
    }
}
