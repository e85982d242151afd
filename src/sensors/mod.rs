//! Sensor subsystem: the DHT22 driver, the anomaly filter, and the
//! retrying [`SensorReader`](reader::SensorReader) that ties them together.
//!
//! ```text
//!   Dht22 ──▶ SensorPort ──▶ SensorReader ──▶ AnomalyFilter ──▶ Sample
//! ```

pub mod anomaly;
pub mod dht22;
pub mod reader;

use serde::Serialize;

use crate::error::ValidationError;

/// Lowest temperature the DHT22 is specified for, in °C.
pub const TEMPERATURE_MIN_C: f32 = -40.0;
/// Highest temperature the DHT22 is specified for, in °C.
pub const TEMPERATURE_MAX_C: f32 = 80.0;
pub const HUMIDITY_MIN_PCT: f32 = 0.0;
pub const HUMIDITY_MAX_PCT: f32 = 100.0;

/// One temperature/humidity measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Relative humidity, percent.
    pub humidity: f32,
}

impl Sample {
    pub const fn new(temperature: f32, humidity: f32) -> Self {
        Self { temperature, humidity }
    }

    /// Reject readings outside the transducer's physical range.
    ///
    /// NaN fails every range check, so it is rejected too.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let temp_ok = (TEMPERATURE_MIN_C..=TEMPERATURE_MAX_C).contains(&self.temperature);
        let hum_ok = (HUMIDITY_MIN_PCT..=HUMIDITY_MAX_PCT).contains(&self.humidity);
        if temp_ok && hum_ok {
            Ok(())
        } else {
            Err(ValidationError {
                temperature: self.temperature,
                humidity: self.humidity,
            })
        }
    }

    pub fn temperature_fahrenheit(&self) -> f32 {
        to_fahrenheit(self.temperature)
    }
}

pub fn to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}
