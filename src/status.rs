//! Shared engine state and the read-only status surface.
//!
//! [`EngineShared`] is the stable-address record both audio callbacks touch:
//! the running flag, the volume gain, the counters and the peak gauges, all
//! plain atomics. It lives in one `Arc` for the life of a session so
//! callbacks never chase re-allocated state across initialize cycles.
//! [`EngineStatus`] is the snapshot the controller assembles on demand.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use serde::Serialize;

use crate::error::ErrorKind;

pub struct EngineShared {
    running: AtomicBool,
    /// Gain in [0, 1], stored as f32 bits. There is no AtomicF32, so the
    /// bits are transported through an AtomicU32.
    volume_bits: AtomicU32,
    underruns: AtomicU64,
    overruns: AtomicU64,
    drift_corrections: AtomicU64,
    input_peak_bits: AtomicU32,
    output_peak_bits: AtomicU32,
    /// ErrorKind code raised from a callback context, zero when clear.
    /// First fault wins; surfaced by the next management tick.
    fault_code: AtomicU8,
    /// Set when a worker failed to enter the pro-audio scheduling class,
    /// pending a one-shot warning event.
    rt_warning: AtomicBool,
}

impl EngineShared {
    pub fn new(volume: f32) -> Self {
        Self {
            running: AtomicBool::new(false),
            volume_bits: AtomicU32::new(volume.clamp(0.0, 1.0).to_bits()),
            underruns: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            drift_corrections: AtomicU64::new(0),
            input_peak_bits: AtomicU32::new(0.0f32.to_bits()),
            output_peak_bits: AtomicU32::new(0.0f32.to_bits()),
            fault_code: AtomicU8::new(0),
            rt_warning: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Read once per capture callback. Relaxed is enough; a value stale by
    /// one callback is acceptable.
    #[inline]
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume_bits
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn add_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_overruns(&self, dropped_frames: u64) {
        self.overruns.fetch_add(dropped_frames, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_drift_correction(&self) {
        self.drift_corrections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn drift_corrections(&self) -> u64 {
        self.drift_corrections.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_input_peak(&self, peak: f32) {
        self.input_peak_bits.store(peak.to_bits(), Ordering::Relaxed);
    }

    pub fn input_peak(&self) -> f32 {
        f32::from_bits(self.input_peak_bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_output_peak(&self, peak: f32) {
        self.output_peak_bits.store(peak.to_bits(), Ordering::Relaxed);
    }

    pub fn output_peak(&self) -> f32 {
        f32::from_bits(self.output_peak_bits.load(Ordering::Relaxed))
    }

    /// Raise a fault from a callback context. The first fault sticks until
    /// the management thread takes it.
    pub fn raise_fault(&self, kind: ErrorKind) {
        let _ = self.fault_code.compare_exchange(
            0,
            kind.code(),
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
    }

    /// Consume a pending fault, if any.
    pub fn take_fault(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(self.fault_code.swap(0, Ordering::AcqRel))
    }

    pub fn flag_rt_warning(&self) {
        self.rt_warning.store(true, Ordering::Release);
    }

    /// Consume the pending priority warning, if any.
    pub fn take_rt_warning(&self) -> bool {
        self.rt_warning.swap(false, Ordering::AcqRel)
    }

    /// Clear counters, gauges and any stale fault for a fresh run.
    pub fn reset_counters(&self) {
        self.underruns.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
        self.drift_corrections.store(0, Ordering::Relaxed);
        self.input_peak_bits.store(0.0f32.to_bits(), Ordering::Relaxed);
        self.output_peak_bits.store(0.0f32.to_bits(), Ordering::Relaxed);
        self.fault_code.store(0, Ordering::Relaxed);
    }
}

/// Read-only snapshot assembled on demand by the controller.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EngineStatus {
    pub running: bool,
    /// Ring occupancy in [0, 1].
    pub fill_level: f32,
    /// Estimated microphone-to-headphone latency.
    pub round_trip_latency_ms: f32,
    pub capture_latency_ms: f32,
    pub playback_latency_ms: f32,
    pub underruns: u64,
    /// Frames dropped because the producer outran the consumer.
    pub overruns: u64,
    pub drift_corrections: u64,
    /// Instantaneous post-gain input peak.
    pub input_peak: f32,
    pub output_peak: f32,
    pub volume: f32,
    pub last_error: Option<ErrorKind>,
}

/// Round-trip latency estimate: the buffered frames plus one period, over
/// the sample rate.
pub fn round_trip_latency_ms(fill_frames: usize, period_frames: u32, sample_rate: u32) -> f32 {
    if sample_rate == 0 {
        return 0.0;
    }
    (fill_frames as f32 + period_frames as f32) * 1000.0 / sample_rate as f32
}

/// Per-leg latency is one period on that device.
pub fn leg_latency_ms(period_frames: u32, sample_rate: u32) -> f32 {
    if sample_rate == 0 {
        return 0.0;
    }
    period_frames as f32 * 1000.0 / sample_rate as f32
}

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
