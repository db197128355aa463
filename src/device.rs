// Audio device description types
// Device identifiers are opaque host-assigned strings; everything else on
// DeviceInfo is informational and immutable after enumeration.

use serde::{Deserialize, Serialize};

/// Which side of the duplex session a device serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Capture,
    Playback,
}

/// An enumerated audio endpoint with its native parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceInfo {
    /// Opaque host-assigned identifier, stable for the life of the endpoint.
    pub id: String,
    /// Human-readable name of the device.
    pub name: String,
    /// Whether this is the system default for its direction.
    pub is_default: bool,
    /// Native sample rate of the endpoint (Hz).
    pub sample_rate: u32,
    /// Native channel count of the endpoint.
    pub channels: u16,
}

/// Sort a device list so the default endpoint comes first.
pub fn sort_default_first(devices: &mut [DeviceInfo]) {
    devices.sort_by(|a, b| b.is_default.cmp(&a.is_default));
}

/// Pick the default endpoint from a list, falling back to the first entry.
pub fn default_device(devices: &[DeviceInfo]) -> Option<&DeviceInfo> {
    devices.iter().find(|d| d.is_default).or_else(|| devices.first())
}

#[cfg(test)]
#[path = "device_test.rs"]
mod tests;
