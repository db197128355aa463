// Engine error types
// One enum for propagation, plus a Copy kind mirror for the status and
// event surfaces where payloads must stay cheap to clone.

use serde::Serialize;
use thiserror::Error;

use crate::device::Direction;
use crate::engine::EngineState;

/// Errors returned by controller operations or surfaced through events.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Caller violated a contract (bad config value, unsupported channel
    /// count, non-integer sample-rate ratio, out-of-range volume).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation is not legal in the current engine state.
    #[error("operation not legal in engine state {state:?}")]
    InvalidState { state: EngineState },

    /// The host audio subsystem itself failed to come up.
    #[error("host audio subsystem failed to initialize: {0}")]
    HostInitFailed(String),

    /// A specific device could not be opened (missing, busy, or format
    /// negotiation failed).
    #[error("failed to open {direction:?} device \"{device}\": {reason}")]
    DeviceOpenFailed {
        direction: Direction,
        device: String,
        reason: String,
    },

    /// The device opened but its stream would not start.
    #[error("failed to start {direction:?} device \"{device}\": {reason}")]
    DeviceStartFailed {
        direction: Direction,
        device: String,
        reason: String,
    },

    /// Ring buffer or device allocation failed.
    #[error("allocation failed: {0}")]
    OutOfMemory(String),

    /// A running device disappeared or stopped responding.
    #[error("device lost: {0}")]
    DeviceLost(String),
}

impl EngineError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            EngineError::InvalidState { .. } => ErrorKind::InvalidState,
            EngineError::HostInitFailed(_) => ErrorKind::HostInitFailed,
            EngineError::DeviceOpenFailed { .. } => ErrorKind::DeviceOpenFailed,
            EngineError::DeviceStartFailed { .. } => ErrorKind::DeviceStartFailed,
            EngineError::OutOfMemory(_) => ErrorKind::OutOfMemory,
            EngineError::DeviceLost(_) => ErrorKind::DeviceLost,
        }
    }
}

/// Cheap, copyable error classification carried in events and status
/// snapshots. Also the payload of the callback-side fault cell, so it has a
/// stable small integer encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    InvalidState,
    HostInitFailed,
    DeviceOpenFailed,
    DeviceStartFailed,
    OutOfMemory,
    DeviceLost,
}

impl ErrorKind {
    /// Non-zero wire code for the atomic fault cell. Zero means "no fault".
    pub(crate) fn code(self) -> u8 {
        match self {
            ErrorKind::InvalidArgument => 1,
            ErrorKind::InvalidState => 2,
            ErrorKind::HostInitFailed => 3,
            ErrorKind::DeviceOpenFailed => 4,
            ErrorKind::DeviceStartFailed => 5,
            ErrorKind::OutOfMemory => 6,
            ErrorKind::DeviceLost => 7,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ErrorKind::InvalidArgument),
            2 => Some(ErrorKind::InvalidState),
            3 => Some(ErrorKind::HostInitFailed),
            4 => Some(ErrorKind::DeviceOpenFailed),
            5 => Some(ErrorKind::DeviceStartFailed),
            6 => Some(ErrorKind::OutOfMemory),
            7 => Some(ErrorKind::DeviceLost),
            _ => None,
        }
    }
}
