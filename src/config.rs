//! Engine session configuration.
//!
//! The shell supplies an [`EngineConfig`] at `initialize`; it is immutable
//! for the life of the session. Changing anything requires a full
//! stop / uninitialize / initialize cycle. The types serialize so the shell
//! can persist them as an opaque blob.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CHANNELS, DEFAULT_MONITOR_POLL_MS, DEFAULT_PERIOD_FRAMES, DEFAULT_RING_FRAMES,
    DEFAULT_SAMPLE_RATE, MAX_CHANNELS,
};
use crate::error::EngineError;

/// Host sharing mode for both devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareMode {
    /// Coexist with other audio applications behind the host mixer.
    Shared,
    /// Sole access to the device; lower latency, blocks other clients.
    Exclusive,
}

/// Latency hint forwarded to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceProfile {
    LowLatency,
    Conservative,
}

/// Configuration for one duplex session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Capture endpoint id; `None` selects the system default.
    pub input_device: Option<String>,
    /// Playback endpoint id; `None` selects the system default.
    pub output_device: Option<String>,
    /// Internal processing rate (Hz).
    pub sample_rate: u32,
    /// Internal channel count (1 or 2).
    pub channels: u16,
    /// Requested period size in frames. The host may impose a larger floor.
    pub period_frames: u32,
    /// Host sharing mode.
    pub share_mode: ShareMode,
    /// Latency hint forwarded to the host.
    pub performance_profile: PerformanceProfile,
    /// Ring capacity in frames, rounded up to the next power of two.
    pub ring_capacity_frames: u32,
    /// Initial gain in [0, 1], applied by the capture side.
    pub volume: f32,
    /// Forbid the host from inserting a sample-rate converter. Required for
    /// the sub-10 ms shared-mode fast path; rate mismatches are then handled
    /// by integer decimation or refused.
    pub bypass_os_resampler: bool,
    /// Device-monitor polling interval (ms).
    pub monitor_poll_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            period_frames: DEFAULT_PERIOD_FRAMES,
            share_mode: ShareMode::Shared,
            performance_profile: PerformanceProfile::LowLatency,
            ring_capacity_frames: DEFAULT_RING_FRAMES,
            volume: 1.0,
            bypass_os_resampler: true,
            monitor_poll_ms: DEFAULT_MONITOR_POLL_MS,
        }
    }
}

impl EngineConfig {
    /// Check field-level contracts. Cross-device constraints (rate ratios,
    /// channel negotiation) are checked during `initialize` once the
    /// endpoints are resolved.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.sample_rate == 0 {
            return Err(EngineError::InvalidArgument(
                "sample_rate must be non-zero".into(),
            ));
        }
        if self.channels == 0 || self.channels as usize > MAX_CHANNELS {
            return Err(EngineError::InvalidArgument(format!(
                "unsupported channel count {} (supported: 1..={})",
                self.channels, MAX_CHANNELS
            )));
        }
        if self.period_frames == 0 {
            return Err(EngineError::InvalidArgument(
                "period_frames must be non-zero".into(),
            ));
        }
        if self.ring_capacity_frames == 0 {
            return Err(EngineError::InvalidArgument(
                "ring_capacity_frames must be non-zero".into(),
            ));
        }
        if !self.volume.is_finite() || !(0.0..=1.0).contains(&self.volume) {
            return Err(EngineError::InvalidArgument(format!(
                "volume {} outside [0, 1]",
                self.volume
            )));
        }
        if self.monitor_poll_ms == 0 {
            return Err(EngineError::InvalidArgument(
                "monitor_poll_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
