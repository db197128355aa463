// Engine events for shell notification
// Defines the event payloads and the sink trait the shell implements.
// A sink backed by a posting context (UI dispatcher, channel) decides on
// which thread the shell observes the event; the engine only guarantees the
// call never happens on an audio callback.

use std::sync::mpsc::{self, Receiver, Sender};

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::ErrorKind;

/// Event names as constants so shells can key UI routing off them.
pub mod event_names {
    pub const STATE_CHANGED: &str = "state_changed";
    pub const ENGINE_ERROR: &str = "engine_error";
    pub const ENGINE_WARNING: &str = "engine_warning";
    pub const DEVICE_DISCONNECTED: &str = "device_disconnected";
}

/// Events emitted by the engine controller.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The engine entered or left the Running state.
    StateChanged { running: bool },
    /// A fatal error stopped the session.
    Error { kind: ErrorKind, message: String },
    /// A non-fatal condition worth surfacing (for example, the pro-audio
    /// scheduling class was unavailable).
    Warning { message: String },
    /// A configured endpoint disappeared while Running.
    DeviceDisconnected { device_id: String },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::StateChanged { .. } => event_names::STATE_CHANGED,
            EngineEvent::Error { .. } => event_names::ENGINE_ERROR,
            EngineEvent::Warning { .. } => event_names::ENGINE_WARNING,
            EngineEvent::DeviceDisconnected { .. } => event_names::DEVICE_DISCONNECTED,
        }
    }
}

/// Receives engine events. Implementations must be cheap and non-blocking;
/// they are called from management threads, never from audio callbacks.
pub trait EventSink: Send + Sync {
    fn post(&self, event: EngineEvent);
}

/// Sink that forwards events into an mpsc channel, for shells that poll and
/// for tests.
pub struct ChannelSink {
    sender: Mutex<Sender<EngineEvent>>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<EngineEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender: Mutex::new(sender),
            },
            receiver,
        )
    }
}

impl EventSink for ChannelSink {
    fn post(&self, event: EngineEvent) {
        // A dropped receiver just means the shell went away.
        let _ = self.sender.lock().send(event);
    }
}

/// Sink that discards everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn post(&self, _event: EngineEvent) {}
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
