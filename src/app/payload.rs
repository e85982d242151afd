//! JSON records published over the transport.

use serde::Serialize;

use crate::sensors::Sample;

/// Sensor channel payload:
/// `{"created_at": "...", "temperature": 21.5, "humidity": 48.2}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorPayload {
    pub created_at: String,
    pub temperature: f32,
    pub humidity: f32,
}

impl SensorPayload {
    pub fn new(created_at: String, sample: Sample) -> Self {
        Self {
            created_at,
            temperature: sample.temperature,
            humidity: sample.humidity,
        }
    }
}

/// Station link details reported alongside device info.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkInfo {
    pub ip: heapless::String<16>,
    pub rssi: i8,
    pub mac: heapless::String<18>,
}

/// Why the chip last came out of reset, in the numeric form the dashboard
/// already understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    PowerOn,
    Watchdog,
    Other,
}

impl ResetReason {
    pub fn code(self) -> u8 {
        match self {
            Self::PowerOn => 0,
            Self::Watchdog => 1,
            Self::Other => 9,
        }
    }
}

impl Serialize for ResetReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Flash usage: the whole chip, with the log partition's free space as the
/// only free space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageSnapshot {
    pub total: u32,
    pub free: u32,
}

impl StorageSnapshot {
    pub fn used(&self) -> u32 {
        self.total.saturating_sub(self.free)
    }

    pub fn usage_percent(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.used() as f32 / self.total as f32 * 100.0
        }
    }
}

/// Device channel payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub unique_id: heapless::String<16>,
    pub platform: &'static str,
    pub firmware_version: &'static str,
    pub cpu_frequency_mhz: Option<u32>,
    pub total_storage_bytes: u32,
    pub used_storage_bytes: u32,
    pub free_storage_bytes: u32,
    pub storage_usage_percent: f32,
    pub total_memory_bytes: u32,
    pub used_memory_bytes: u32,
    pub free_memory_bytes: u32,
    pub memory_usage_percent: f32,
    pub min_free_memory_bytes: u32,
    pub uptime_seconds: u64,
    pub reset_reason: ResetReason,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkInfo>,
    pub created_at: String,
}
