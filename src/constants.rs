//! Centralized constants for the streaming engine.
//!
//! All engine tuning values live here with documentation explaining their
//! purpose and constraints, instead of being scattered through the worker
//! and controller code.

// =============================================================================
// SAMPLE RATE AND FRAMING
// =============================================================================

/// Internal processing rate (Hz) used when the configuration leaves it unset.
///
/// 48 kHz is the shared-mode mix rate on every mainstream desktop host, so
/// defaulting to it avoids a resampler stage on the common path.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Internal channel count when unset. Mono (1) is also supported.
pub const DEFAULT_CHANNELS: u16 = 2;

/// Requested period size in frames for the low-latency profile.
///
/// 128 frames is ~2.7 ms at 48 kHz. The host may impose a larger floor;
/// callbacks never assume a fixed quantum.
pub const DEFAULT_PERIOD_FRAMES: u32 = 128;

/// Period size recommended for the conservative profile (~5.3 ms at 48 kHz).
#[allow(dead_code)]
pub const CONSERVATIVE_PERIOD_FRAMES: u32 = 256;

/// Maximum internal channel count. Worker scratch frames are fixed-size
/// stack arrays of this length so callbacks never allocate.
pub const MAX_CHANNELS: usize = 2;

// =============================================================================
// RING BUFFER
// =============================================================================

/// Default ring capacity in frames (rounded up to a power of two if a
/// configuration requests something else). ~42 ms at 48 kHz.
pub const DEFAULT_RING_FRAMES: u32 = 2048;

/// Fraction of the ring pre-filled with silence at stream start, leaving
/// symmetric margins against both underflow and overflow on the first
/// periods.
pub const PREFILL_RATIO: f32 = 0.5;

// =============================================================================
// DRIFT COMPENSATION
// =============================================================================

/// Fill ratio below which the consumer withholds one frame per period
/// (stretch region).
pub const DRIFT_LOW_WATER: f32 = 0.25;

/// Fill ratio above which the consumer discards one frame per period
/// (compress region).
pub const DRIFT_HIGH_WATER: f32 = 0.75;

// =============================================================================
// DEVICE LIFECYCLE
// =============================================================================

/// How long to wait for both devices to acknowledge a stop request before
/// declaring the session faulted. Must stay comfortably above the worst
/// observed shared-mode teardown time.
pub const DEVICE_STOP_TIMEOUT_MS: u64 = 2_500;

/// Settling delay before restarting after a configured endpoint reappears.
/// Hosts finalize a newly attached endpoint asynchronously; starting sooner
/// races that initialization.
pub const DEVICE_SETTLE_MS: u64 = 500;

/// Default device-monitor polling interval (ms).
pub const DEFAULT_MONITOR_POLL_MS: u64 = 1_000;
