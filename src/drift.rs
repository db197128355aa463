//! Drift compensation policy.
//!
//! The capture and playback devices run on independent sample clocks. The
//! playback callback observes ring occupancy each period and the compensator
//! picks one of three actions, moving at most one frame per period:
//!
//! - below the low water mark it withholds one frame and pads the output
//!   tail from the last-frame register (stretch),
//! - inside the band it reads exactly what was requested (pass),
//! - above the high water mark it discards one frame before reading
//!   (compress).
//!
//! One frame per period bounds pitch perturbation to `1 / period_frames`
//! (about 0.8% at 128-frame periods) while still tracking crystal drift of
//! several hundred ppm with margin.

use crate::constants::{DRIFT_HIGH_WATER, DRIFT_LOW_WATER, MAX_CHANNELS};

/// Per-period correction selected from the ring occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftAction {
    /// Read exactly the requested frame count.
    Pass,
    /// Withhold one frame; the deficit is padded by replicating the
    /// most-recently-read frame.
    Stretch,
    /// Discard one frame before the read.
    Compress,
}

/// Consumer-side drift state: the policy thresholds plus the last-frame
/// register used as the replication source during stretch events. The
/// register starts as silence and is sized at construction so the hot path
/// never allocates.
pub struct DriftCompensator {
    channels: usize,
    last_frame: [f32; MAX_CHANNELS],
}

impl DriftCompensator {
    pub fn new(channels: usize) -> Self {
        debug_assert!(channels >= 1 && channels <= MAX_CHANNELS);
        Self {
            channels,
            last_frame: [0.0; MAX_CHANNELS],
        }
    }

    /// Select the correction for one callback given the current occupancy.
    /// Compress additionally requires enough readable frames that the
    /// discard cannot itself starve the read.
    pub fn select(&self, available: usize, requested: usize, capacity: usize) -> DriftAction {
        if capacity == 0 || requested == 0 {
            return DriftAction::Pass;
        }
        let fill = available as f32 / capacity as f32;
        if fill < DRIFT_LOW_WATER {
            DriftAction::Stretch
        } else if fill > DRIFT_HIGH_WATER && available > requested + 1 {
            DriftAction::Compress
        } else {
            DriftAction::Pass
        }
    }

    /// Record the trailing frame of a completed read.
    #[inline]
    pub fn remember(&mut self, frame: &[f32]) {
        debug_assert_eq!(frame.len(), self.channels);
        self.last_frame[..self.channels].copy_from_slice(frame);
    }

    /// The replication source for stretch padding.
    #[inline]
    pub fn last_frame(&self) -> &[f32] {
        &self.last_frame[..self.channels]
    }

    /// Clear the register back to silence.
    pub fn reset(&mut self) {
        self.last_frame = [0.0; MAX_CHANNELS];
    }
}

#[cfg(test)]
#[path = "drift_test.rs"]
mod tests;
