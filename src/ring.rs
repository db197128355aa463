//! Lock-free ring buffer carrying interleaved f32 frames between the two
//! audio threads.
//!
//! Single producer (capture callback), single consumer (playback callback).
//! The write and read indices are monotonically nondecreasing 64-bit frame
//! counters masked to the power-of-two capacity at access time, so occupancy
//! is always `write - read` with no wrap-around ambiguity. Index advances
//! are published with release ordering and observed with acquire ordering;
//! that pair is the only happens-before edge the hot path relies on.
//!
//! `acquire_*` hands out a contiguous region truncated at the linear end of
//! storage, letting callers copy with plain slice operations and no modular
//! arithmetic. A wrapped request is served by a second acquire.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::EngineError;

pub struct ElasticRing {
    storage: Box<[UnsafeCell<f32>]>,
    /// Capacity in frames, always a power of two.
    capacity: u64,
    mask: u64,
    channels: usize,
    /// Total frames ever committed by the producer.
    write_index: AtomicU64,
    /// Total frames ever consumed (committed or skipped) by the consumer.
    read_index: AtomicU64,
}

// SAFETY: the ring is designed for one producer thread and one consumer
// thread. Storage cells between the read and write indices are owned by the
// consumer, cells outside that window by the producer, and ownership is
// transferred only through the release/acquire index pair.
unsafe impl Send for ElasticRing {}
unsafe impl Sync for ElasticRing {}

impl ElasticRing {
    /// Allocate a ring for `capacity_frames` interleaved frames, rounded up
    /// to the next power of two. Fails with `OutOfMemory` instead of
    /// aborting if the reservation cannot be satisfied.
    pub fn new(capacity_frames: usize, channels: usize) -> Result<Self, EngineError> {
        debug_assert!(channels > 0);
        let capacity = capacity_frames.max(1).next_power_of_two();
        let samples = capacity.checked_mul(channels).ok_or_else(|| {
            EngineError::OutOfMemory(format!("ring capacity {capacity} frames overflows"))
        })?;

        let mut storage = Vec::new();
        storage.try_reserve_exact(samples).map_err(|_| {
            EngineError::OutOfMemory(format!("ring allocation of {samples} samples failed"))
        })?;
        storage.resize_with(samples, || UnsafeCell::new(0.0));

        Ok(Self {
            storage: storage.into_boxed_slice(),
            capacity: capacity as u64,
            mask: capacity as u64 - 1,
            channels,
            write_index: AtomicU64::new(0),
            read_index: AtomicU64::new(0),
        })
    }

    /// Capacity in frames.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frames currently readable. Occupancy is `write - read`, in
    /// `[0, capacity]` by construction.
    pub fn available_read(&self) -> usize {
        let write = self.write_index.load(Ordering::Acquire);
        let read = self.read_index.load(Ordering::Acquire);
        (write - read) as usize
    }

    /// Frames currently writable.
    pub fn available_write(&self) -> usize {
        self.capacity as usize - self.available_read()
    }

    /// Occupancy as a ratio in [0, 1].
    pub fn fill_ratio(&self) -> f32 {
        self.available_read() as f32 / self.capacity as f32
    }

    /// Producer side: borrow a contiguous writable region of up to `frames`
    /// frames. The returned length is `min(frames, available_write)` further
    /// truncated at the linear end of storage; commit and re-acquire for a
    /// wrapped remainder. The region is invisible to the consumer until
    /// [`commit_write`](Self::commit_write).
    pub fn acquire_write(&self, frames: usize) -> (&mut [f32], usize) {
        let write = self.write_index.load(Ordering::Relaxed);
        let read = self.read_index.load(Ordering::Acquire);
        let free = (self.capacity - (write - read)) as usize;
        let offset = (write & self.mask) as usize;
        let linear = self.capacity as usize - offset;
        let take = frames.min(free).min(linear);

        // SAFETY: the region [offset, offset + take) is outside the
        // readable window, so only the producer can touch it, and
        // UnsafeCell<f32> is layout-compatible with f32.
        let slice = unsafe {
            std::slice::from_raw_parts_mut(
                self.storage.as_ptr().add(offset * self.channels) as *mut f32,
                take * self.channels,
            )
        };
        (slice, take)
    }

    /// Producer side: publish `frames` previously acquired frames.
    pub fn commit_write(&self, frames: usize) {
        let write = self.write_index.load(Ordering::Relaxed);
        self.write_index
            .store(write + frames as u64, Ordering::Release);
    }

    /// Consumer side: borrow a contiguous readable region of up to `frames`
    /// frames, truncated at the linear end of storage the same way as
    /// [`acquire_write`](Self::acquire_write).
    pub fn acquire_read(&self, frames: usize) -> (&[f32], usize) {
        let write = self.write_index.load(Ordering::Acquire);
        let read = self.read_index.load(Ordering::Relaxed);
        let filled = (write - read) as usize;
        let offset = (read & self.mask) as usize;
        let linear = self.capacity as usize - offset;
        let take = frames.min(filled).min(linear);

        // SAFETY: the region [offset, offset + take) is inside the readable
        // window, which the producer will not touch until the consumer
        // commits past it.
        let slice = unsafe {
            std::slice::from_raw_parts(
                self.storage.as_ptr().add(offset * self.channels) as *const f32,
                take * self.channels,
            )
        };
        (slice, take)
    }

    /// Consumer side: release `frames` previously acquired frames.
    pub fn commit_read(&self, frames: usize) {
        let read = self.read_index.load(Ordering::Relaxed);
        self.read_index
            .store(read + frames as u64, Ordering::Release);
    }

    /// Consumer side: discard `frames` readable frames without looking at
    /// them. Used by the drift compensator's compress action.
    pub fn skip_read(&self, frames: usize) {
        debug_assert!(frames <= self.available_read());
        self.commit_read(frames);
    }

    /// Drop all readable frames by advancing the read index to the write
    /// index. Only legal while both workers are quiescent.
    pub fn reset(&self) {
        let write = self.write_index.load(Ordering::Acquire);
        self.read_index.store(write, Ordering::Release);
    }

    /// Write up to `frames` frames of silence through the producer API.
    /// Only legal while both workers are quiescent; used to establish the
    /// symmetric margin before streams start.
    pub fn prefill_silence(&self, frames: usize) {
        let mut remaining = frames.min(self.available_write());
        while remaining > 0 {
            let (slice, got) = self.acquire_write(remaining);
            if got == 0 {
                break;
            }
            slice.fill(0.0);
            self.commit_write(got);
            remaining -= got;
        }
    }
}

#[cfg(test)]
#[path = "ring_test.rs"]
mod tests;
