//! System configuration parameters
//!
//! All tunable parameters for the ThermoNode firmware.  [`SystemConfig`]
//! carries the acquisition and supervision thresholds; [`NetworkConfig`]
//! carries credentials and broker coordinates baked in at build time.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectivityError, Error, Result};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Sensor ---
    /// Read attempts per sampling cycle
    pub sensor_read_attempts: u32,
    /// Delay between failed read attempts (milliseconds)
    pub sensor_retry_delay_ms: u32,
    /// Max per-cycle change (°C or %RH) before a sample counts as an anomaly
    pub anomaly_threshold: f32,
    /// Anomalies tolerated in a row before the next one is force-accepted
    pub max_anomaly_count: u32,

    // --- Supervision ---
    /// Consecutive failed cycles that escalate to a device restart
    pub max_consecutive_errors: u32,
    /// Log aggregate statistics every N cycles
    pub summary_interval_cycles: u32,
    /// Delay before a restart so the log sink can flush (milliseconds)
    pub restart_grace_ms: u32,

    // --- Timing ---
    /// Sampling period while the network is up (seconds)
    pub sample_interval_secs: u32,
    /// Shortened wait while the network is down (seconds)
    pub fast_retry_interval_secs: u32,

    // --- Watchdog ---
    pub watchdog_enabled: bool,
    /// Hardware watchdog timeout (milliseconds)
    pub watchdog_timeout_ms: u32,
    /// Longest uninterrupted sleep between feeds (milliseconds)
    pub watchdog_feed_interval_ms: u32,

    // --- Connectivity ---
    /// WiFi association timeout (seconds)
    pub wifi_connect_timeout_secs: u32,
    /// MQTT connect attempts per cycle
    pub mqtt_connect_retries: u32,
    pub sensor_topic: heapless::String<64>,
    pub device_info_topic: heapless::String<64>,

    // --- Time ---
    /// Fixed offset from UTC applied to published timestamps (seconds)
    pub timezone_offset_secs: i32,
    /// Longest wait for SNTP, at boot and after each reconnect while unsynced (seconds)
    pub time_sync_timeout_secs: u32,

    // --- Logging ---
    pub log_file_path: heapless::String<64>,
    /// File size that triggers trimming of the oldest lines (bytes)
    pub log_max_bytes: u32,

    // --- Health ---
    pub health: HealthThresholds,
}

/// Limits used by [`FailureTracker::check_health`](crate::health::FailureTracker::check_health).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Consecutive failed cycles reported as an issue
    pub loop_consecutive_limit: u32,
    /// Cycles observed before the success rate is judged
    pub loop_min_samples: u32,
    /// Minimum acceptable cycle success rate (%)
    pub loop_min_success_rate: f32,
    /// Free heap below which the device is unhealthy (bytes)
    pub low_memory_bytes: u32,
    /// Attempts observed before a link success rate is judged
    pub link_min_attempts: u32,
    /// Minimum acceptable WiFi / MQTT success rate (%)
    pub link_min_success_rate: f32,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            loop_consecutive_limit: 3,
            loop_min_samples: 10,
            loop_min_success_rate: 80.0,
            low_memory_bytes: 10 * 1024,
            link_min_attempts: 5,
            link_min_success_rate: 90.0,
        }
    }
}

/// Copy `s` into a fixed-capacity string, truncating on a char boundary.
fn fixed<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Sensor
            sensor_read_attempts: 3,
            sensor_retry_delay_ms: 2000,
            anomaly_threshold: 3.0,
            max_anomaly_count: 3,

            // Supervision
            max_consecutive_errors: 5,
            summary_interval_cycles: 10,
            restart_grace_ms: 2000,

            // Timing
            sample_interval_secs: 300,   // 5 min
            fast_retry_interval_secs: 4,

            // Watchdog
            watchdog_enabled: false,
            watchdog_timeout_ms: 8000,
            watchdog_feed_interval_ms: 7000,

            // Connectivity
            wifi_connect_timeout_secs: 30,
            mqtt_connect_retries: 3,
            sensor_topic: fixed("thermonode/sensor"),
            device_info_topic: fixed("thermonode/device_info"),

            // Time
            timezone_offset_secs: 8 * 3600, // UTC+8
            time_sync_timeout_secs: 15,

            // Logging
            log_file_path: fixed("/spiffs/thermonode.log"),
            log_max_bytes: 20 * 1024,

            health: HealthThresholds::default(),
        }
    }
}

impl SystemConfig {
    /// Reject values the supervisor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sensor_read_attempts == 0 {
            return Err(Error::Config("sensor_read_attempts must be at least 1"));
        }
        if self.anomaly_threshold.is_nan() || self.anomaly_threshold <= 0.0 {
            return Err(Error::Config("anomaly_threshold must be positive"));
        }
        if self.max_consecutive_errors == 0 {
            return Err(Error::Config("max_consecutive_errors must be at least 1"));
        }
        if self.summary_interval_cycles == 0 {
            return Err(Error::Config("summary_interval_cycles must be at least 1"));
        }
        if self.sample_interval_secs == 0 || self.fast_retry_interval_secs == 0 {
            return Err(Error::Config("sleep intervals must be non-zero"));
        }
        if self.watchdog_feed_interval_ms == 0 {
            return Err(Error::Config("watchdog_feed_interval_ms must be non-zero"));
        }
        if self.watchdog_enabled && self.watchdog_feed_interval_ms >= self.watchdog_timeout_ms {
            return Err(Error::Config("watchdog feed interval must be shorter than its timeout"));
        }
        if self.mqtt_connect_retries == 0 {
            return Err(Error::Config("mqtt_connect_retries must be at least 1"));
        }
        if self.sensor_topic.is_empty() || self.device_info_topic.is_empty() {
            return Err(Error::Config("MQTT topics must not be empty"));
        }
        if self.timezone_offset_secs.abs() >= 24 * 3600 {
            return Err(Error::Config("timezone offset must be within one day"));
        }
        Ok(())
    }

    pub fn sensor_retry_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.sensor_retry_delay_ms))
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.sample_interval_secs))
    }

    pub fn fast_retry_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.fast_retry_interval_secs))
    }

    pub fn watchdog_feed_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.watchdog_feed_interval_ms))
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.watchdog_timeout_ms))
    }

    pub fn wifi_connect_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.wifi_connect_timeout_secs))
    }

    pub fn time_sync_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.time_sync_timeout_secs))
    }

    pub fn restart_grace(&self) -> Duration {
        Duration::from_millis(u64::from(self.restart_grace_ms))
    }
}

// ───────────────────────────────────────────────────────────────
// Network credentials
// ───────────────────────────────────────────────────────────────

/// WiFi and MQTT coordinates.
#[derive(Debug, Clone, Default)]
pub struct NetworkConfig {
    pub wifi_ssid: heapless::String<32>,
    pub wifi_password: heapless::String<64>,
    /// Broker URL, e.g. `mqtt://192.168.1.10:1883`
    pub mqtt_url: heapless::String<128>,
    pub mqtt_client_id: heapless::String<32>,
    pub mqtt_user: heapless::String<64>,
    pub mqtt_password: heapless::String<64>,
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> core::result::Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> core::result::Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

impl NetworkConfig {
    /// Build from explicit values, validating the WiFi credentials.
    pub fn new(
        ssid: &str,
        password: &str,
        mqtt_url: &str,
        client_id: &str,
    ) -> core::result::Result<Self, ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut cfg = Self::default();
        cfg.wifi_ssid.push_str(ssid).map_err(|_| ConnectivityError::InvalidSsid)?;
        cfg.wifi_password
            .push_str(password)
            .map_err(|_| ConnectivityError::InvalidPassword)?;
        cfg.mqtt_url = fixed(mqtt_url);
        cfg.mqtt_client_id = fixed(client_id);
        Ok(cfg)
    }

    /// Attach broker credentials.
    pub fn with_mqtt_credentials(mut self, user: &str, password: &str) -> Self {
        self.mqtt_user = fixed(user);
        self.mqtt_password = fixed(password);
        self
    }

    /// Use `client_id` unless one was configured.
    pub fn with_default_client_id(mut self, client_id: &str) -> Self {
        if self.mqtt_client_id.is_empty() {
            self.mqtt_client_id = fixed(client_id);
        }
        self
    }

    /// Read the `THERMONODE_*` variables captured at compile time.
    pub fn from_build_env() -> core::result::Result<Self, ConnectivityError> {
        let ssid = option_env!("THERMONODE_WIFI_SSID").ok_or(ConnectivityError::NoCredentials)?;
        let password = option_env!("THERMONODE_WIFI_PASSWORD").unwrap_or("");
        let url = option_env!("THERMONODE_MQTT_URL").unwrap_or("mqtt://192.168.1.10:1883");
        // Empty means "derive from the board", see `with_default_client_id`.
        let client_id = option_env!("THERMONODE_MQTT_CLIENT_ID").unwrap_or("");
        Ok(Self::new(ssid, password, url, client_id)?.with_mqtt_credentials(
            option_env!("THERMONODE_MQTT_USER").unwrap_or(""),
            option_env!("THERMONODE_MQTT_PASSWORD").unwrap_or(""),
        ))
    }
}
