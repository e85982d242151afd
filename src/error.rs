//! Unified error types for the ThermoNode firmware.
//!
//! Every collaborator call returns one of the typed errors below.  They are
//! all `Copy` so the supervisor can stash the last failure of a cycle in its
//! report without allocating.  Only [`FatalCondition`] ever leaves the
//! supervisory loop; everything else is absorbed into a cycle outcome.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// The sensor could not be read or returned implausible data.
    Sensor(SensorError),
    /// WiFi or MQTT was unavailable.
    Connectivity(ConnectivityError),
    /// A supervisory cycle did not complete.
    Loop(LoopFailure),
    /// The consecutive-failure threshold was crossed.
    Fatal(FatalCondition),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Connectivity(e) => write!(f, "connectivity: {e}"),
            Self::Loop(e) => write!(f, "loop: {e}"),
            Self::Fatal(e) => write!(f, "fatal: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// Transducer-level failures reported by the sensor driver.
/// Retried locally by the reader, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFault {
    /// The sensor did not answer the start signal, or a bit never ended.
    Timeout,
    /// The 5th frame byte did not match the sum of the first four.
    ChecksumMismatch,
    /// The GPIO driver returned an error.
    PinIo,
    /// The driver was released and can no longer measure.
    Released,
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "sensor timeout"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
            Self::PinIo => write!(f, "GPIO I/O error"),
            Self::Released => write!(f, "sensor released"),
        }
    }
}

/// A reading arrived but lies outside the sensor's physical range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationError {
    pub temperature: f32,
    pub humidity: f32,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reading out of range: temperature={:.1}\u{00b0}C humidity={:.1}%",
            self.temperature, self.humidity
        )
    }
}

/// Why a single read attempt failed.  Both variants are retried identically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorError {
    Fault(SensorFault),
    Validation(ValidationError),
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault(e) => write!(f, "{e}"),
            Self::Validation(e) => write!(f, "{e}"),
        }
    }
}

impl From<SensorFault> for SensorError {
    fn from(e: SensorFault) -> Self {
        Self::Fault(e)
    }
}

impl From<ValidationError> for SensorError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Connectivity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    /// The station did not associate within the connect timeout.
    WifiTimeout,
    /// The WiFi driver rejected a start/configure/connect call.
    WifiDriver,
    /// Every MQTT connect attempt failed.
    TransportConnectFailed,
    /// Publish called while no broker session is open.
    TransportNotConnected,
    /// The MQTT client refused or dropped the publish.
    PublishFailed,
    /// The payload could not be serialised.
    Encode,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::WifiTimeout => write!(f, "WiFi connect timed out"),
            Self::WifiDriver => write!(f, "WiFi driver error"),
            Self::TransportConnectFailed => write!(f, "MQTT connect failed"),
            Self::TransportNotConnected => write!(f, "MQTT not connected"),
            Self::PublishFailed => write!(f, "MQTT publish failed"),
            Self::Encode => write!(f, "payload encoding failed"),
        }
    }
}

impl std::error::Error for ConnectivityError {}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Connectivity(e)
    }
}

// ---------------------------------------------------------------------------
// Loop-level signals
// ---------------------------------------------------------------------------

/// The stage at which a supervisory cycle failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopFailure {
    Wifi(ConnectivityError),
    TransportConnect(ConnectivityError),
    SensorRead(SensorError),
    Publish(ConnectivityError),
}

impl fmt::Display for LoopFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wifi(e) => write!(f, "wifi reconnect failed ({e})"),
            Self::TransportConnect(e) => write!(f, "transport connect failed ({e})"),
            Self::SensorRead(e) => write!(f, "sensor read failed ({e})"),
            Self::Publish(e) => write!(f, "sensor publish failed ({e})"),
        }
    }
}

impl From<LoopFailure> for Error {
    fn from(e: LoopFailure) -> Self {
        Self::Loop(e)
    }
}

/// Consecutive failed cycles reached the restart threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatalCondition {
    pub consecutive_failures: u32,
    pub threshold: u32,
}

impl fmt::Display for FatalCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} consecutive failed cycles (threshold {})",
            self.consecutive_failures, self.threshold
        )
    }
}

impl From<FatalCondition> for Error {
    fn from(e: FatalCondition) -> Self {
        Self::Fatal(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
