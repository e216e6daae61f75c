//! Path-tracing assessment engine.
//!
//! A person traces, with a fingertip, an ideal path suspended between two
//! anchor points; the engine generates that path, measures live deviation,
//! records the traced motion across pauses, sequences trials and attempts,
//! and exports the results.
//!
//! Rendering, hand tracking and anchor acquisition stay outside: the caller
//! feeds fingertip samples and anchors in, and reads guide paths, live
//! deviation and finished session data out. See [`engine::Engine`].

// Library surface for the CLI and integration tests.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod deviation;
pub mod engine;
pub mod export;
pub mod geometry;
pub mod history;
pub mod path;
pub mod recorder;
pub mod runtime;
pub mod score;
pub mod session;
pub mod simulate;
pub mod time_series;
pub mod trial;
pub mod util;

pub use engine::{Engine, LiveFeedback};
pub use geometry::{Anchors, Point3};
pub use path::{GuidePath, TrialKind};
pub use recorder::{Trace, TraceRecorder};
pub use session::{SessionStore, TraceAttempt};
pub use trial::{TrialDefinition, TrialEvent, TrialStateMachine};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session already complete")]
    SessionComplete,

    #[error("No anchors set for the current attempt")]
    NoAnchors,

    #[error("Unknown trial index {0}")]
    UnknownTrial(usize),

    #[error("Unknown protocol '{0}'")]
    UnknownProtocol(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
