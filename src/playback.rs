//! Playback worker: the consumer half of the duplex session.
//!
//! Runs entirely inside the playback device's callback. Each invocation
//! observes ring occupancy, applies the drift compensator's selection, reads
//! through contiguous regions into the host block, and pads any tail from
//! the last-frame register. No allocation, no locks, no I/O. The callback
//! tolerates a variable frame count between invocations.

use std::sync::Arc;

use crate::constants::MAX_CHANNELS;
use crate::drift::{DriftAction, DriftCompensator};
use crate::format::NativeSample;
use crate::ring::ElasticRing;
use crate::rt::{self, RtGuard};
use crate::status::EngineShared;

pub struct PlaybackWorker {
    ring: Arc<ElasticRing>,
    shared: Arc<EngineShared>,
    channels: usize,
    drift: DriftCompensator,
    period_frames: u32,
    sample_rate: u32,
    rt_guard: Option<RtGuard>,
    rt_attempted: bool,
}

impl PlaybackWorker {
    pub fn new(
        ring: Arc<ElasticRing>,
        shared: Arc<EngineShared>,
        channels: usize,
        period_frames: u32,
        sample_rate: u32,
    ) -> Self {
        debug_assert_eq!(ring.channels(), channels);
        Self {
            ring,
            shared,
            channels,
            drift: DriftCompensator::new(channels),
            period_frames,
            sample_rate,
            rt_guard: None,
            rt_attempted: false,
        }
    }

    /// Per-callback entry point. `output` is one interleaved host block.
    pub fn read_block<S: NativeSample>(&mut self, output: &mut [S]) {
        if !self.shared.is_running() {
            for sample in output.iter_mut() {
                *sample = S::from_internal(0.0);
            }
            self.drift.reset();
            self.demote_if_promoted();
            return;
        }
        self.ensure_realtime();

        let channels = self.channels;
        let requested = output.len() / channels;
        if requested == 0 {
            return;
        }

        let available = self.ring.available_read();
        let mut target = requested;
        match self.drift.select(available, requested, self.ring.capacity()) {
            DriftAction::Pass => {}
            DriftAction::Stretch => {
                // Withhold one frame so the ring drains slower; the output
                // tail is padded below.
                target = requested.saturating_sub(1);
                self.shared.add_drift_correction();
            }
            DriftAction::Compress => {
                self.ring.skip_read(1);
                self.shared.add_drift_correction();
            }
        }

        if available < requested {
            self.shared.add_underrun();
        }

        let take = target.min(available);
        let mut peak = 0.0f32;
        let mut trailing = [0.0f32; MAX_CHANNELS];
        let mut out_pos = 0usize;
        let mut remaining = take;
        while remaining > 0 {
            let (region, got) = self.ring.acquire_read(remaining);
            if got == 0 {
                break;
            }
            let n = got * channels;
            for (dst, &value) in output[out_pos..out_pos + n].iter_mut().zip(&region[..n]) {
                peak = peak.max(value.abs());
                *dst = S::from_internal(value);
            }
            trailing[..channels].copy_from_slice(&region[n - channels..n]);
            self.ring.commit_read(got);
            out_pos += n;
            remaining -= got;
        }
        if out_pos > 0 {
            self.drift.remember(&trailing[..channels]);
        }

        // Short read (stretch or starvation): replicate the last frame over
        // the tail instead of emitting silence.
        if out_pos < output.len() {
            let register = self.drift.last_frame();
            for frame in output[out_pos..].chunks_mut(channels) {
                for (dst, &value) in frame.iter_mut().zip(register) {
                    peak = peak.max(value.abs());
                    *dst = S::from_internal(value);
                }
            }
        }

        self.shared.set_output_peak(peak);
    }

    fn ensure_realtime(&mut self) {
        if self.rt_attempted {
            return;
        }
        self.rt_attempted = true;
        match rt::promote(self.period_frames, self.sample_rate) {
            Ok(guard) => self.rt_guard = Some(guard),
            Err(_) => self.shared.flag_rt_warning(),
        }
    }

    fn demote_if_promoted(&mut self) {
        if let Some(guard) = self.rt_guard.take() {
            guard.demote();
        }
        self.rt_attempted = false;
    }

    #[allow(dead_code)]
    pub(crate) fn ring_handle(&self) -> &Arc<ElasticRing> {
        &self.ring
    }
}

#[cfg(test)]
#[path = "playback_test.rs"]
mod tests;
