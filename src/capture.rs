//! Capture worker: the producer half of the duplex session.
//!
//! Runs entirely inside the capture device's callback. Each invocation
//! normalizes the host block to internal f32 with the current gain fused
//! into the same pass, then writes it to the ring through contiguous
//! acquire/commit regions. No allocation, no locks, no I/O.

use std::sync::Arc;

use crate::format::{Decimator, NativeSample};
use crate::ring::ElasticRing;
use crate::rt::{self, RtGuard};
use crate::status::EngineShared;

pub struct CaptureWorker {
    ring: Arc<ElasticRing>,
    shared: Arc<EngineShared>,
    channels: usize,
    /// Present when the device's native rate is an integer multiple of the
    /// internal rate.
    decimator: Option<Decimator>,
    /// Period and rate of this worker's device, used to size the pro-audio
    /// promotion request.
    period_frames: u32,
    sample_rate: u32,
    rt_guard: Option<RtGuard>,
    rt_attempted: bool,
}

impl CaptureWorker {
    pub fn new(
        ring: Arc<ElasticRing>,
        shared: Arc<EngineShared>,
        channels: usize,
        decimator: Option<Decimator>,
        period_frames: u32,
        sample_rate: u32,
    ) -> Self {
        debug_assert_eq!(ring.channels(), channels);
        Self {
            ring,
            shared,
            channels,
            decimator,
            period_frames,
            sample_rate,
            rt_guard: None,
            rt_attempted: false,
        }
    }

    /// Per-callback entry point. `input` is one interleaved host block; its
    /// frame count is free to vary between invocations.
    pub fn write_block<S: NativeSample>(&mut self, input: &[S]) {
        if !self.shared.is_running() {
            self.demote_if_promoted();
            return;
        }
        self.ensure_realtime();

        let channels = self.channels;
        let frames_in = input.len() / channels;
        if frames_in == 0 {
            return;
        }
        let gain = self.shared.volume();

        let peak = if self.decimator.is_some() {
            self.write_decimated(input, gain)
        } else {
            self.write_direct(input, gain)
        };
        self.shared.set_input_peak(peak);
    }

    /// Common path: normalize straight into the ring.
    fn write_direct<S: NativeSample>(&mut self, input: &[S], gain: f32) -> f32 {
        let channels = self.channels;
        let frames_in = input.len() / channels;

        let writable = self.ring.available_write();
        let take = frames_in.min(writable);
        if take < frames_in {
            // Producer outran the consumer; drop the tail and account for it.
            self.shared.add_overruns((frames_in - take) as u64);
        }

        let mut peak = 0.0f32;
        let mut src = &input[..take * channels];
        let mut remaining = take;
        while remaining > 0 {
            let (region, got) = self.ring.acquire_write(remaining);
            if got == 0 {
                break;
            }
            let n = got * channels;
            for (dst, sample) in region[..n].iter_mut().zip(&src[..n]) {
                let value = sample.to_internal() * gain;
                peak = peak.max(value.abs());
                *dst = value;
            }
            self.ring.commit_write(got);
            src = &src[n..];
            remaining -= got;
        }
        peak
    }

    /// Decimating path: accumulate K-frame means, emitting one ring frame
    /// per window. Scratch frames are fixed-size stack arrays.
    fn write_decimated<S: NativeSample>(&mut self, input: &[S], gain: f32) -> f32 {
        let channels = self.channels;
        let Some(decimator) = self.decimator.as_mut() else {
            return 0.0;
        };

        let mut peak = 0.0f32;
        let mut dropped = 0u64;
        let mut scratch = [0.0f32; crate::constants::MAX_CHANNELS];

        for frame in input.chunks_exact(channels) {
            for (dst, sample) in scratch.iter_mut().zip(frame) {
                let value = sample.to_internal() * gain;
                peak = peak.max(value.abs());
                *dst = value;
            }
            if let Some(out) = decimator.push_frame(&scratch[..channels]) {
                let (region, got) = self.ring.acquire_write(1);
                if got == 1 {
                    region[..channels].copy_from_slice(out);
                    self.ring.commit_write(1);
                } else {
                    dropped += 1;
                }
            }
        }
        if dropped > 0 {
            self.shared.add_overruns(dropped);
        }
        peak
    }

    /// First-callback promotion into the pro-audio scheduling class.
    /// Attempted once per run; failure raises the warning flag for the
    /// management tick to surface.
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

    /// Revert the promotion once the stop flag is observed, so the next run
    /// can promote again.
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
#[path = "capture_test.rs"]
mod tests;
