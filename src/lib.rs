//! Low-latency microphone transparency engine.
//!
//! Captures from a microphone and renders onto a playback device through a
//! lock-free ring, reconciling the two devices' independent sample clocks
//! with a single-frame-per-period drift policy. The host audio API sits
//! behind a backend trait so the engine core stays deterministic under
//! test.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sidetone::{ChannelSink, Engine, EngineConfig};
//!
//! let (sink, events) = ChannelSink::new();
//! let engine = Engine::new(Arc::new(sink));
//! engine.initialize(EngineConfig::default())?;
//! engine.start()?;
//! // ... render `events`, poll `engine.status()` ...
//! engine.stop()?;
//! engine.uninitialize()?;
//! # Ok::<(), sidetone::EngineError>(())
//! ```

pub mod capture;
pub mod config;
pub mod constants;
pub mod device;
pub mod drift;
pub mod engine;
pub mod error;
pub mod events;
pub mod format;
pub mod host;
pub mod monitor;
pub mod playback;
pub mod ring;
pub mod rt;
pub mod status;

pub use config::{EngineConfig, PerformanceProfile, ShareMode};
pub use device::{DeviceInfo, Direction};
pub use engine::{BackendFactory, Engine, EngineState};
pub use error::{EngineError, ErrorKind};
pub use events::{ChannelSink, EngineEvent, EventSink, NullSink};
pub use status::EngineStatus;
