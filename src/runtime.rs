use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::clock::Clock;
use crate::engine::Engine;
use crate::geometry::{Anchors, Point3};
use crate::trial::TrialEvent;
use crate::Result;

/// Input from the sensing side, consumed by the engine
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SessionEvent {
    Anchors(Anchors),
    StartTracing,
    StopTracing,
    Sample(Point3),
    FinishAttempt,
    DiscardAttempt,
    Tick,
}

/// Source of session events (hand tracker, replay file, tests)
pub trait SessionEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> std::result::Result<SessionEvent, RecvTimeoutError>;
}

/// Event source fed through an mpsc channel from a producer thread
pub struct ChannelEventSource {
    rx: Receiver<SessionEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<SessionEvent>) -> Self {
        Self { rx }
    }

    /// Creates a connected sender/source pair.
    pub fn pair() -> (Sender<SessionEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }
}

impl SessionEventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> std::result::Result<SessionEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Pulls events one at a time and hands them to an [`Engine`]
pub struct Runner<E: SessionEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: SessionEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Next event, `Tick` on timeout, `None` once the source hung up
    pub fn next_event(&self) -> Option<SessionEvent> {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout) => Some(SessionEvent::Tick),
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Blocks up to one tick interval; both timeout and hangup yield `Tick`.
    pub fn step(&self) -> SessionEvent {
        self.next_event().unwrap_or(SessionEvent::Tick)
    }

    /// Feeds events into `engine` until the session completes or the source
    /// disconnects. Returns every trial event emitted along the way.
    pub fn drive<C: Clock>(&self, engine: &mut Engine<C>) -> Result<Vec<TrialEvent>> {
        let mut emitted = Vec::new();
        while let Some(event) = self.next_event() {
            let events = engine.handle(event)?;
            let done = events.contains(&TrialEvent::SessionComplete);
            emitted.extend(events);
            if done {
                log::info!("session complete");
                break;
            }
        }
        Ok(emitted)
    }
}
