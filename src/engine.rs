//! Engine controller.
//!
//! Owns the lifecycle state machine, builds and tears down the duplex
//! session, and mediates every shell interaction. All operations are
//! serialized on one management mutex; audio callbacks never touch it.
//! Events are collected under the lock and posted after it is released so
//! a sink is free to call back into the engine.
//!
//! The controller reacts to the device monitor from short-lived detached
//! threads, mirroring how a device-change notification handler schedules
//! work instead of acting inside the notification itself. That keeps the
//! monitor thread joinable at any time.

use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::capture::CaptureWorker;
use crate::config::EngineConfig;
use crate::constants::{DEVICE_SETTLE_MS, DEVICE_STOP_TIMEOUT_MS, PREFILL_RATIO};
use crate::device::{DeviceInfo, Direction};
use crate::error::{EngineError, ErrorKind};
use crate::events::{EngineEvent, EventSink};
use crate::format::{self, Decimator};
use crate::host::cpal_backend::CpalBackend;
use crate::host::stream_thread::StreamThreadHandle;
use crate::host::{HostBackend, OpenRequest, StreamSpec};
use crate::monitor::{DeviceMonitorHandle, MonitorEvent};
use crate::playback::PlaybackWorker;
use crate::ring::ElasticRing;
use crate::status::{self, EngineShared, EngineStatus};

/// Lifecycle states. Transitions are serialized on the controller mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
    Faulted,
}

/// Constructor for the host backend, invoked on the stream thread.
pub type BackendFactory =
    Arc<dyn Fn() -> Result<Box<dyn HostBackend>, EngineError> + Send + Sync>;

pub struct Engine {
    weak: Weak<Engine>,
    shared: Arc<EngineShared>,
    sink: Arc<dyn EventSink>,
    factory: BackendFactory,
    inner: Mutex<Controller>,
}

struct Controller {
    state: EngineState,
    config: Option<EngineConfig>,
    ring: Option<Arc<ElasticRing>>,
    host: Option<StreamThreadHandle>,
    monitor: Option<DeviceMonitorHandle>,
    capture_device: Option<DeviceInfo>,
    playback_device: Option<DeviceInfo>,
    last_error: Option<ErrorKind>,
    /// True while the shell wants the engine running; drives the automatic
    /// restart when a configured endpoint reappears.
    reconnect: bool,
}

impl Engine {
    /// Engine backed by the platform audio host.
    pub fn new(sink: Arc<dyn EventSink>) -> Arc<Self> {
        Self::with_backend(
            Arc::new(|| {
                CpalBackend::new().map(|backend| Box::new(backend) as Box<dyn HostBackend>)
            }),
            sink,
        )
    }

    /// Engine with a caller-supplied backend. Each initialize cycle invokes
    /// the factory once, on the stream thread.
    pub fn with_backend(factory: BackendFactory, sink: Arc<dyn EventSink>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            shared: Arc::new(EngineShared::new(1.0)),
            sink,
            factory,
            inner: Mutex::new(Controller {
                state: EngineState::Uninitialized,
                config: None,
                ring: None,
                host: None,
                monitor: None,
                capture_device: None,
                playback_device: None,
                last_error: None,
                reconnect: false,
            }),
        })
    }

    /// Resolve devices, allocate the ring, open (but do not start) both
    /// streams. On failure everything is rolled back to Uninitialized.
    pub fn initialize(&self, config: EngineConfig) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        if inner.state != EngineState::Uninitialized {
            return Err(EngineError::InvalidState { state: inner.state });
        }
        match self.open_session(&mut inner, config) {
            Ok(()) => {
                inner.state = EngineState::Initialized;
                inner.last_error = None;
                log::info!("engine initialized");
                Ok(())
            }
            Err(err) => {
                inner.monitor = None;
                inner.host = None;
                inner.ring = None;
                inner.config = None;
                inner.capture_device = None;
                inner.playback_device = None;
                inner.last_error = Some(err.kind());
                log::warn!("initialize failed: {err}");
                Err(err)
            }
        }
    }

    fn open_session(
        &self,
        inner: &mut Controller,
        config: EngineConfig,
    ) -> Result<(), EngineError> {
        config.validate()?;

        let factory = Arc::clone(&self.factory);
        let host = StreamThreadHandle::spawn(move || factory())?;

        let capture_device = host.resolve(Direction::Capture, config.input_device.clone())?;
        let playback_device = host.resolve(Direction::Playback, config.output_device.clone())?;

        // With the host resampler bypassed, the capture device runs at its
        // native rate and the engine decimates by an integer factor. A
        // non-integer ratio would drift beyond the compensator's range, so
        // it is refused outright.
        let (capture_rate, factor) = if config.bypass_os_resampler {
            match format::decimation_factor(capture_device.sample_rate, config.sample_rate) {
                Some(factor) => (capture_device.sample_rate, factor),
                None => {
                    return Err(EngineError::InvalidArgument(format!(
                        "capture device rate {} Hz has no integer ratio to internal rate {} Hz",
                        capture_device.sample_rate, config.sample_rate
                    )))
                }
            }
        } else {
            (config.sample_rate, 1)
        };

        let channels = config.channels as usize;
        let ring = Arc::new(ElasticRing::new(
            config.ring_capacity_frames as usize,
            channels,
        )?);

        self.shared.set_volume(config.volume);
        self.shared.set_running(false);

        let decimator = (factor > 1).then(|| Decimator::new(factor, channels));
        let capture = CaptureWorker::new(
            Arc::clone(&ring),
            Arc::clone(&self.shared),
            channels,
            decimator,
            config.period_frames * factor,
            capture_rate,
        );
        let playback = PlaybackWorker::new(
            Arc::clone(&ring),
            Arc::clone(&self.shared),
            channels,
            config.period_frames,
            config.sample_rate,
        );

        host.open(OpenRequest {
            spec: StreamSpec {
                sample_rate: config.sample_rate,
                channels: config.channels,
                period_frames: config.period_frames,
                share_mode: config.share_mode,
                performance_profile: config.performance_profile,
                bypass_os_resampler: config.bypass_os_resampler,
            },
            capture_device: capture_device.clone(),
            playback_device: playback_device.clone(),
            capture_rate,
            capture,
            playback,
            shared: Arc::clone(&self.shared),
        })?;

        let lister = host.device_lister();
        let enumerate = move || {
            let mut devices = lister.list(Direction::Capture).unwrap_or_default();
            devices.extend(lister.list(Direction::Playback).unwrap_or_default());
            devices
        };
        let weak = self.weak.clone();
        let monitor_sink = move |event: MonitorEvent| {
            let Some(engine) = weak.upgrade() else { return };
            match event {
                MonitorEvent::Poll => engine.handle_poll(),
                MonitorEvent::DeviceRemoved(info) => {
                    thread::spawn(move || engine.handle_device_removed(info));
                }
                MonitorEvent::DeviceAdded(info) => {
                    thread::spawn(move || engine.handle_device_added(info));
                }
            }
        };
        let monitor = DeviceMonitorHandle::spawn(
            Duration::from_millis(config.monitor_poll_ms),
            enumerate,
            monitor_sink,
        );

        inner.host = Some(host);
        inner.ring = Some(ring);
        inner.monitor = Some(monitor);
        inner.capture_device = Some(capture_device);
        inner.playback_device = Some(playback_device);
        inner.config = Some(config);
        Ok(())
    }

    /// Pre-fill the ring and start streaming, capture before playback.
    /// Legal from Initialized and Stopped.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();
        let result = {
            let mut inner = self.inner.lock();
            if inner.state != EngineState::Initialized && inner.state != EngineState::Stopped {
                return Err(EngineError::InvalidState { state: inner.state });
            }
            {
                let ring = match inner.ring.as_ref() {
                    Some(ring) => ring,
                    None => return Err(EngineError::InvalidState { state: inner.state }),
                };
                // Residual samples from the previous run are discarded and
                // replaced by the symmetric silence margin.
                ring.reset();
                ring.prefill_silence((ring.capacity() as f32 * PREFILL_RATIO) as usize);
            }
            self.shared.reset_counters();
            self.shared.set_running(true);

            let start_result = match inner.host.as_ref() {
                Some(host) => host.start(),
                None => Err(EngineError::InvalidState { state: inner.state }),
            };
            match start_result {
                Ok(()) => {
                    inner.state = EngineState::Running;
                    inner.reconnect = true;
                    events.push(EngineEvent::StateChanged { running: true });
                    log::info!("engine running");
                    Ok(())
                }
                Err(err) => {
                    self.shared.set_running(false);
                    if let Some(host) = inner.host.as_ref() {
                        let _ = host
                            .stop_with_deadline(Duration::from_millis(DEVICE_STOP_TIMEOUT_MS));
                    }
                    inner.last_error = Some(err.kind());
                    events.push(EngineEvent::Error {
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                    log::warn!("start failed: {err}");
                    Err(err)
                }
            }
        };
        self.post_events(events);
        result
    }

    /// Stop streaming, playback before capture. Legal from Running only.
    /// Explicitly stopping also clears the reconnect intent.
    pub fn stop(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();
        let result = {
            let mut inner = self.inner.lock();
            if inner.state != EngineState::Running {
                return Err(EngineError::InvalidState { state: inner.state });
            }
            inner.reconnect = false;
            self.stop_streams(&mut inner, &mut events)
        };
        self.post_events(events);
        result
    }

    fn stop_streams(
        &self,
        inner: &mut Controller,
        events: &mut Vec<EngineEvent>,
    ) -> Result<(), EngineError> {
        self.shared.set_running(false);
        let stop_result = match inner.host.as_ref() {
            Some(host) => {
                host.stop_with_deadline(Duration::from_millis(DEVICE_STOP_TIMEOUT_MS))
            }
            None => Ok(()),
        };
        match stop_result {
            Ok(()) => {
                inner.state = EngineState::Stopped;
                events.push(EngineEvent::StateChanged { running: false });
                log::info!("engine stopped");
                Ok(())
            }
            Err(err) => {
                inner.state = EngineState::Faulted;
                inner.last_error = Some(err.kind());
                events.push(EngineEvent::Error {
                    kind: err.kind(),
                    message: err.to_string(),
                });
                events.push(EngineEvent::StateChanged { running: false });
                log::error!("stop failed, engine faulted: {err}");
                Err(err)
            }
        }
    }

    /// Tear down devices, the monitor and the ring. Legal from every state
    /// except Uninitialized.
    pub fn uninitialize(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();
        let (monitor, host) = {
            let mut inner = self.inner.lock();
            if inner.state == EngineState::Uninitialized {
                return Err(EngineError::InvalidState { state: inner.state });
            }
            if inner.state == EngineState::Running {
                self.shared.set_running(false);
                if let Some(host) = inner.host.as_ref() {
                    let _ =
                        host.stop_with_deadline(Duration::from_millis(DEVICE_STOP_TIMEOUT_MS));
                }
                events.push(EngineEvent::StateChanged { running: false });
            }
            inner.state = EngineState::Uninitialized;
            inner.reconnect = false;
            inner.config = None;
            inner.ring = None;
            inner.capture_device = None;
            inner.playback_device = None;
            (inner.monitor.take(), inner.host.take())
        };
        // Join the monitor before the stream thread goes away so its
        // enumerator never races teardown.
        drop(monitor);
        if let Some(host) = host {
            let _ = host.close();
        }
        log::info!("engine uninitialized");
        self.post_events(events);
        Ok(())
    }

    /// Clamp and store the gain. Takes effect on the next capture callback;
    /// legal in any state.
    pub fn set_volume(&self, volume: f32) {
        self.shared.set_volume(volume);
    }

    pub fn state(&self) -> EngineState {
        self.inner.lock().state
    }

    /// Compose a status snapshot. Callable from any thread in any state.
    pub fn status(&self) -> EngineStatus {
        let inner = self.inner.lock();
        let (period_frames, sample_rate) = inner
            .config
            .as_ref()
            .map(|c| (c.period_frames, c.sample_rate))
            .unwrap_or((0, 0));
        let (fill_frames, capacity) = inner
            .ring
            .as_ref()
            .map(|r| (r.available_read(), r.capacity()))
            .unwrap_or((0, 0));
        let fill_level = if capacity > 0 {
            fill_frames as f32 / capacity as f32
        } else {
            0.0
        };
        EngineStatus {
            running: self.shared.is_running(),
            fill_level,
            round_trip_latency_ms: status::round_trip_latency_ms(
                fill_frames,
                period_frames,
                sample_rate,
            ),
            capture_latency_ms: status::leg_latency_ms(period_frames, sample_rate),
            playback_latency_ms: status::leg_latency_ms(period_frames, sample_rate),
            underruns: self.shared.underruns(),
            overruns: self.shared.overruns(),
            drift_corrections: self.shared.drift_corrections(),
            input_peak: self.shared.input_peak(),
            output_peak: self.shared.output_peak(),
            volume: self.shared.volume(),
            last_error: inner.last_error,
        }
    }

    /// Enumerate endpoints. Uses the live session's host when one exists,
    /// otherwise a transient backend.
    pub fn list_devices(&self, direction: Direction) -> Result<Vec<DeviceInfo>, EngineError> {
        let inner = self.inner.lock();
        match inner.host.as_ref() {
            Some(host) => host.list_devices(direction),
            None => {
                drop(inner);
                (self.factory)()?.list_devices(direction)
            }
        }
    }

    /// Management heartbeat, on the monitor thread. Cheap checks only;
    /// anything that needs the controller mutex is dispatched to a detached
    /// thread so the monitor stays joinable.
    fn handle_poll(&self) {
        if self.shared.take_rt_warning() {
            log::warn!("pro-audio scheduling class unavailable; continuing at normal priority");
            self.sink.post(EngineEvent::Warning {
                message: "pro-audio thread priority unavailable; latency may degrade under load"
                    .into(),
            });
        }
        if let Some(kind) = self.shared.take_fault() {
            if let Some(engine) = self.weak.upgrade() {
                thread::spawn(move || {
                    engine.fault(kind, "the host reported a stream error".into());
                });
            }
        }
    }

    /// A callback-side fault: stop everything, mark Faulted, surface the
    /// error. Stale faults arriving after a stop are ignored.
    fn fault(&self, kind: ErrorKind, message: String) {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            if inner.state != EngineState::Running {
                return;
            }
            self.shared.set_running(false);
            if let Some(host) = inner.host.as_ref() {
                let _ = host.stop_with_deadline(Duration::from_millis(DEVICE_STOP_TIMEOUT_MS));
            }
            inner.state = EngineState::Faulted;
            inner.last_error = Some(kind);
            events.push(EngineEvent::Error {
                kind,
                message: message.clone(),
            });
            events.push(EngineEvent::StateChanged { running: false });
            log::error!("engine faulted: {message}");
        }
        self.post_events(events);
    }

    /// A device vanished. If it is one of ours and we are Running, the
    /// session stops but keeps its reconnect intent.
    fn handle_device_removed(&self, info: DeviceInfo) {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            if inner.state != EngineState::Running || !self.is_configured_endpoint(&inner, &info)
            {
                return;
            }
            log::warn!("configured endpoint \"{}\" disconnected, stopping", info.id);
            self.shared.set_running(false);
            if let Some(host) = inner.host.as_ref() {
                let _ = host.stop_with_deadline(Duration::from_millis(DEVICE_STOP_TIMEOUT_MS));
            }
            inner.state = EngineState::Stopped;
            events.push(EngineEvent::StateChanged { running: false });
            events.push(EngineEvent::DeviceDisconnected { device_id: info.id });
        }
        self.post_events(events);
    }

    /// A device appeared. If it is a configured endpoint, we are Stopped
    /// and the shell still wants the engine running, restart after letting
    /// the host finish bringing the endpoint up.
    fn handle_device_added(&self, info: DeviceInfo) {
        {
            let inner = self.inner.lock();
            if inner.state != EngineState::Stopped
                || !inner.reconnect
                || !self.is_configured_endpoint(&inner, &info)
            {
                return;
            }
        }
        log::info!(
            "configured endpoint \"{}\" reattached, restarting in {} ms",
            info.id,
            DEVICE_SETTLE_MS
        );
        thread::sleep(Duration::from_millis(DEVICE_SETTLE_MS));
        if let Err(err) = self.start() {
            log::warn!("restart after device reattach failed: {err}");
        }
    }

    fn is_configured_endpoint(&self, inner: &Controller, info: &DeviceInfo) -> bool {
        let matches = |d: &Option<DeviceInfo>| d.as_ref().map(|d| d.id == info.id).unwrap_or(false);
        matches(&inner.capture_device) || matches(&inner.playback_device)
    }

    fn post_events(&self, events: Vec<EngineEvent>) {
        for event in events {
            log::debug!("emitting event {}", event.name());
            self.sink.post(event);
        }
    }

    #[allow(dead_code)]
    pub(crate) fn shared_handle(&self) -> &Arc<EngineShared> {
        &self.shared
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
