// cpal-based duplex host backend
// This code interacts with hardware; unit coverage comes from the mock
// backend in the engine tests, and the enumeration paths are exercised by
// serialized smoke tests that tolerate machines without audio devices.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Stream;

use crate::capture::CaptureWorker;
use crate::config::ShareMode;
use crate::device::{self, DeviceInfo, Direction};
use crate::error::{EngineError, ErrorKind};
use crate::format::NativeSample;
use crate::playback::PlaybackWorker;
use crate::status::EngineShared;

use super::{HostBackend, OpenRequest};

pub struct CpalBackend {
    host: cpal::Host,
    capture_stream: Option<Stream>,
    playback_stream: Option<Stream>,
    capture_id: String,
    playback_id: String,
}

impl CpalBackend {
    pub fn new() -> Result<Self, EngineError> {
        Ok(Self {
            host: cpal::default_host(),
            capture_stream: None,
            playback_stream: None,
            capture_id: String::new(),
            playback_id: String::new(),
        })
    }
}

/// Enumerate endpoints without an engine session, for shells that populate
/// a device picker before initializing.
pub fn list_devices(direction: Direction) -> Result<Vec<DeviceInfo>, EngineError> {
    let backend = CpalBackend::new()?;
    HostBackend::list_devices(&backend, direction)
}

impl HostBackend for CpalBackend {
    fn list_devices(&self, direction: Direction) -> Result<Vec<DeviceInfo>, EngineError> {
        let default_name = match direction {
            Direction::Capture => self.host.default_input_device(),
            Direction::Playback => self.host.default_output_device(),
        }
        .and_then(|d| d.name().ok());

        let devices: Vec<cpal::Device> = match direction {
            Direction::Capture => self
                .host
                .input_devices()
                .map_err(|e| EngineError::HostInitFailed(e.to_string()))?
                .collect(),
            Direction::Playback => self
                .host
                .output_devices()
                .map_err(|e| EngineError::HostInitFailed(e.to_string()))?
                .collect(),
        };

        let mut infos: Vec<DeviceInfo> = devices
            .iter()
            .filter_map(|d| device_info(d, direction, default_name.as_deref()))
            .collect();
        device::sort_default_first(&mut infos);
        Ok(infos)
    }

    fn resolve(
        &self,
        direction: Direction,
        selector: Option<&str>,
    ) -> Result<DeviceInfo, EngineError> {
        let devices = self.list_devices(direction)?;
        match selector {
            Some(id) => devices
                .into_iter()
                .find(|d| d.id == id)
                .ok_or_else(|| EngineError::DeviceOpenFailed {
                    direction,
                    device: id.to_string(),
                    reason: "device not present".into(),
                }),
            None => device::default_device(&devices)
                .cloned()
                .ok_or_else(|| EngineError::DeviceOpenFailed {
                    direction,
                    device: "(default)".into(),
                    reason: "no device available".into(),
                }),
        }
    }

    fn open(&mut self, request: OpenRequest) -> Result<(), EngineError> {
        self.close();
        let OpenRequest {
            spec,
            capture_device,
            playback_device,
            capture_rate,
            capture,
            playback,
            shared,
        } = request;

        if spec.share_mode == ShareMode::Exclusive {
            // cpal exposes no exclusive-mode control on any host.
            log::warn!("exclusive mode requested; host only offers shared mode, continuing");
        }
        log::info!(
            "opening duplex pair: capture \"{}\" at {} Hz, playback \"{}\" at {} Hz, period {} frames ({:?})",
            capture_device.id,
            capture_rate,
            playback_device.id,
            spec.sample_rate,
            spec.period_frames,
            spec.performance_profile,
        );

        // The capture period scales with the decimation factor so one
        // capture callback produces roughly one playback period of internal
        // frames.
        let factor = (capture_rate / spec.sample_rate).max(1);
        let capture_period = spec.period_frames * factor;

        let in_device = find_device(&self.host, Direction::Capture, &capture_device.id)?;
        let out_device = find_device(&self.host, Direction::Playback, &playback_device.id)?;

        let in_format = in_device
            .default_input_config()
            .map_err(|e| open_failed(Direction::Capture, &capture_device.id, &e.to_string()))?
            .sample_format();
        let in_config = cpal::StreamConfig {
            channels: spec.channels,
            sample_rate: cpal::SampleRate(capture_rate),
            buffer_size: cpal::BufferSize::Fixed(capture_period),
        };
        let capture_stream = match in_format {
            cpal::SampleFormat::F32 => {
                build_capture::<f32>(&in_device, &in_config, capture, &shared, &capture_device.id)?
            }
            cpal::SampleFormat::I16 => {
                build_capture::<i16>(&in_device, &in_config, capture, &shared, &capture_device.id)?
            }
            cpal::SampleFormat::I32 => {
                build_capture::<i32>(&in_device, &in_config, capture, &shared, &capture_device.id)?
            }
            cpal::SampleFormat::U8 => {
                build_capture::<u8>(&in_device, &in_config, capture, &shared, &capture_device.id)?
            }
            other => {
                return Err(open_failed(
                    Direction::Capture,
                    &capture_device.id,
                    &format!("unsupported sample format {other:?}"),
                ))
            }
        };

        let out_format = out_device
            .default_output_config()
            .map_err(|e| open_failed(Direction::Playback, &playback_device.id, &e.to_string()))?
            .sample_format();
        let out_config = cpal::StreamConfig {
            channels: spec.channels,
            sample_rate: cpal::SampleRate(spec.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(spec.period_frames),
        };
        let playback_stream = match out_format {
            cpal::SampleFormat::F32 => build_playback::<f32>(
                &out_device,
                &out_config,
                playback,
                &shared,
                &playback_device.id,
            )?,
            cpal::SampleFormat::I16 => build_playback::<i16>(
                &out_device,
                &out_config,
                playback,
                &shared,
                &playback_device.id,
            )?,
            cpal::SampleFormat::I32 => build_playback::<i32>(
                &out_device,
                &out_config,
                playback,
                &shared,
                &playback_device.id,
            )?,
            cpal::SampleFormat::U8 => build_playback::<u8>(
                &out_device,
                &out_config,
                playback,
                &shared,
                &playback_device.id,
            )?,
            other => {
                return Err(open_failed(
                    Direction::Playback,
                    &playback_device.id,
                    &format!("unsupported sample format {other:?}"),
                ))
            }
        };

        self.capture_stream = Some(capture_stream);
        self.playback_stream = Some(playback_stream);
        self.capture_id = capture_device.id;
        self.playback_id = playback_device.id;
        Ok(())
    }

    fn start(&mut self) -> Result<(), EngineError> {
        let capture = self
            .capture_stream
            .as_ref()
            .ok_or_else(|| start_failed(Direction::Capture, &self.capture_id, "no open stream"))?;
        let playback = self.playback_stream.as_ref().ok_or_else(|| {
            start_failed(Direction::Playback, &self.playback_id, "no open stream")
        })?;

        capture
            .play()
            .map_err(|e| start_failed(Direction::Capture, &self.capture_id, &e.to_string()))?;
        if let Err(e) = playback.play() {
            let _ = capture.pause();
            return Err(start_failed(
                Direction::Playback,
                &self.playback_id,
                &e.to_string(),
            ));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        let mut first_error = None;
        if let Some(playback) = self.playback_stream.as_ref() {
            if let Err(e) = playback.pause() {
                first_error = Some(EngineError::DeviceLost(format!(
                    "playback \"{}\" refused to stop: {e}",
                    self.playback_id
                )));
            }
        }
        if let Some(capture) = self.capture_stream.as_ref() {
            if let Err(e) = capture.pause() {
                first_error.get_or_insert(EngineError::DeviceLost(format!(
                    "capture \"{}\" refused to stop: {e}",
                    self.capture_id
                )));
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        // Dropping a stream tears it down.
        self.playback_stream = None;
        self.capture_stream = None;
    }
}

fn device_info(
    device: &cpal::Device,
    direction: Direction,
    default_name: Option<&str>,
) -> Option<DeviceInfo> {
    let name = device.name().ok()?;
    let config = match direction {
        Direction::Capture => device.default_input_config(),
        Direction::Playback => device.default_output_config(),
    }
    .ok()?;
    Some(DeviceInfo {
        is_default: Some(name.as_str()) == default_name,
        id: name.clone(),
        name,
        sample_rate: config.sample_rate().0,
        channels: config.channels(),
    })
}

fn find_device(
    host: &cpal::Host,
    direction: Direction,
    id: &str,
) -> Result<cpal::Device, EngineError> {
    let mut devices = match direction {
        Direction::Capture => host.input_devices(),
        Direction::Playback => host.output_devices(),
    }
    .map_err(|e| EngineError::HostInitFailed(e.to_string()))?;

    devices
        .find(|d| d.name().map(|n| n == id).unwrap_or(false))
        .ok_or_else(|| open_failed(direction, id, "device not present"))
}

fn build_capture<S>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut worker: CaptureWorker,
    shared: &Arc<EngineShared>,
    id: &str,
) -> Result<Stream, EngineError>
where
    S: NativeSample + cpal::SizedSample,
{
    let shared = Arc::clone(shared);
    // Stream errors arrive on the audio thread; flag them for the
    // management tick instead of logging here.
    let err_fn = move |_err: cpal::StreamError| {
        shared.raise_fault(ErrorKind::DeviceLost);
    };
    device
        .build_input_stream(
            config,
            move |data: &[S], _: &cpal::InputCallbackInfo| {
                worker.write_block(data);
            },
            err_fn,
            None,
        )
        .map_err(|e| open_failed(Direction::Capture, id, &e.to_string()))
}

fn build_playback<S>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut worker: PlaybackWorker,
    shared: &Arc<EngineShared>,
    id: &str,
) -> Result<Stream, EngineError>
where
    S: NativeSample + cpal::SizedSample,
{
    let shared = Arc::clone(shared);
    let err_fn = move |_err: cpal::StreamError| {
        shared.raise_fault(ErrorKind::DeviceLost);
    };
    device
        .build_output_stream(
            config,
            move |data: &mut [S], _: &cpal::OutputCallbackInfo| {
                worker.read_block(data);
            },
            err_fn,
            None,
        )
        .map_err(|e| open_failed(Direction::Playback, id, &e.to_string()))
}

fn open_failed(direction: Direction, device: &str, reason: &str) -> EngineError {
    EngineError::DeviceOpenFailed {
        direction,
        device: device.to_string(),
        reason: reason.to_string(),
    }
}

fn start_failed(direction: Direction, device: &str, reason: &str) -> EngineError {
    EngineError::DeviceStartFailed {
        direction,
        device: device.to_string(),
        reason: reason.to_string(),
    }
}
