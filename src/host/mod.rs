//! Host audio abstraction.
//!
//! The engine core never talks to a concrete audio API. It consumes the
//! [`HostBackend`] trait: enumerate and resolve endpoints, open a duplex
//! pair wired to the two workers, start capture before playback, stop in
//! the mirrored order, close. The production implementation is
//! [`cpal_backend::CpalBackend`]; tests drive the engine with a scripted
//! mock.
//!
//! Host streams are generally not `Send`, so a backend lives its whole life
//! on the dedicated stream thread in [`stream_thread`] and the controller
//! talks to it through command channels.

pub mod cpal_backend;
pub mod stream_thread;

use std::sync::Arc;

use crate::capture::CaptureWorker;
use crate::config::{PerformanceProfile, ShareMode};
use crate::device::{DeviceInfo, Direction};
use crate::error::EngineError;
use crate::playback::PlaybackWorker;
use crate::status::EngineShared;

/// Stream parameters negotiated by the controller and honored by the
/// backend when opening devices.
#[derive(Debug, Clone)]
pub struct StreamSpec {
    /// Internal processing rate (Hz); also the playback device rate.
    pub sample_rate: u32,
    pub channels: u16,
    /// Requested playback period in frames. The capture period scales by
    /// the decimation factor so both sides advance in lockstep.
    pub period_frames: u32,
    pub share_mode: ShareMode,
    pub performance_profile: PerformanceProfile,
    /// Forbid a host-inserted sample-rate converter.
    pub bypass_os_resampler: bool,
}

/// Everything a backend needs to open one duplex session. The workers move
/// into the device callbacks; `shared` is retained for error-callback fault
/// reporting.
pub struct OpenRequest {
    pub spec: StreamSpec,
    pub capture_device: DeviceInfo,
    pub playback_device: DeviceInfo,
    /// Rate to open the capture device at. Differs from `spec.sample_rate`
    /// when the engine decimates from the device's native rate.
    pub capture_rate: u32,
    pub capture: CaptureWorker,
    pub playback: PlaybackWorker,
    pub shared: Arc<EngineShared>,
}

/// Contract with the host audio service. Implementations are single-owner
/// and live on the stream thread; none of the methods are called
/// concurrently.
pub trait HostBackend {
    /// Enumerate endpoints for one direction, default first.
    fn list_devices(&self, direction: Direction) -> Result<Vec<DeviceInfo>, EngineError>;

    /// Resolve an opaque id (or the system default for `None`) to a device
    /// description with its native parameters.
    fn resolve(&self, direction: Direction, selector: Option<&str>)
        -> Result<DeviceInfo, EngineError>;

    /// Open both devices and wire the workers into their callbacks. Streams
    /// are built but not started.
    fn open(&mut self, request: OpenRequest) -> Result<(), EngineError>;

    /// Start streaming: capture first so the producer is live before the
    /// consumer draws.
    fn start(&mut self) -> Result<(), EngineError>;

    /// Stop streaming: playback first so the consumer never waits on a
    /// silenced producer.
    fn stop(&mut self) -> Result<(), EngineError>;

    /// Tear both streams down. Idempotent.
    fn close(&mut self);
}

impl HostBackend for Box<dyn HostBackend> {
    fn list_devices(&self, direction: Direction) -> Result<Vec<DeviceInfo>, EngineError> {
        (**self).list_devices(direction)
    }

    fn resolve(
        &self,
        direction: Direction,
        selector: Option<&str>,
    ) -> Result<DeviceInfo, EngineError> {
        (**self).resolve(direction, selector)
    }

    fn open(&mut self, request: OpenRequest) -> Result<(), EngineError> {
        (**self).open(request)
    }

    fn start(&mut self) -> Result<(), EngineError> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        (**self).stop()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
