//! Bounded, retrying sensor reads.
//!
//! Each [`SensorReader::read`] call makes up to `max_attempts` measurements.
//! Before every attempt the watchdog is fed and the indicator cleared; a good
//! attempt is range-checked, run through the [`AnomalyFilter`] and reported
//! as [`ReadOutcome::Accepted`] with the filter's output (which is the prior
//! stable value when a spike was rejected).

use std::time::Instant;

use core::time::Duration;
use log::{debug, error, info, warn};

use super::Sample;
use super::anomaly::AnomalyFilter;
use crate::app::ports::{Delay, IndicatorPort, KeepAlive, SensorPort};
use crate::error::{SensorError, SensorFault};

/// What one `read()` produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadOutcome {
    Accepted(Sample),
    /// Every attempt failed; carries the last cause.
    Failed(SensorError),
}

impl ReadOutcome {
    pub fn sample(&self) -> Option<Sample> {
        match self {
            Self::Accepted(s) => Some(*s),
            Self::Failed(_) => None,
        }
    }
}

/// Snapshot for periodic summaries.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SensorStats {
    pub total_reads: u32,
    pub errors: u32,
    pub anomalies: u32,
    pub consecutive_anomalies: u32,
    /// Percent of attempts that produced a valid reading.
    pub success_rate: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct LastReading {
    pub sample: Sample,
    pub taken_at: Instant,
}

pub struct SensorReader<S: SensorPort, I: IndicatorPort> {
    sensor: S,
    indicator: I,
    filter: AnomalyFilter,
    total_reads: u32,
    successes: u32,
    errors: u32,
    last: Option<LastReading>,
}

impl<S: SensorPort, I: IndicatorPort> SensorReader<S, I> {
    pub fn new(sensor: S, indicator: I, filter: AnomalyFilter) -> Self {
        Self {
            sensor,
            indicator,
            filter,
            total_reads: 0,
            successes: 0,
            errors: 0,
            last: None,
        }
    }

    pub fn read(
        &mut self,
        max_attempts: u32,
        retry_delay: Duration,
        delay: &mut dyn Delay,
        keepalive: &mut dyn KeepAlive,
    ) -> ReadOutcome {
        self.total_reads += 1;

        let mut last_error = SensorError::Fault(SensorFault::Timeout);
        if max_attempts == 0 {
            warn!("Sensor: read requested with zero attempts");
            return ReadOutcome::Failed(last_error);
        }

        for attempt in 1..=max_attempts {
            keepalive.feed();
            self.indicator.set(false);

            match self.attempt() {
                Ok(raw) => {
                    let verdict = self.filter.evaluate(raw);
                    let out = verdict.output;
                    self.successes += 1;
                    self.indicator.set(true);
                    self.last = Some(LastReading {
                        sample: out,
                        taken_at: Instant::now(),
                    });
                    info!(
                        "Sensor: {:.1}\u{00b0}C ({:.1}\u{00b0}F) {:.1}%RH{}",
                        out.temperature,
                        out.temperature_fahrenheit(),
                        out.humidity,
                        if verdict.accepted { "" } else { " (held)" }
                    );
                    return ReadOutcome::Accepted(out);
                }
                Err(e) => {
                    self.errors += 1;
                    last_error = e;
                    if attempt < max_attempts {
                        warn!("Sensor: attempt {}/{} failed: {}", attempt, max_attempts, e);
                        delay.sleep(retry_delay);
                    } else {
                        error!("Sensor: attempt {}/{} failed: {}", attempt, max_attempts, e);
                    }
                }
            }
        }

        ReadOutcome::Failed(last_error)
    }

    fn attempt(&mut self) -> Result<Sample, SensorError> {
        let raw = self.sensor.measure()?;
        debug!("Sensor: raw {:.1}\u{00b0}C {:.1}%", raw.temperature, raw.humidity);
        raw.validate()?;
        Ok(raw)
    }

    pub fn statistics(&self) -> SensorStats {
        let attempts = self.successes + self.errors;
        let success_rate = if attempts == 0 {
            0.0
        } else {
            self.successes as f32 / attempts as f32 * 100.0
        };
        SensorStats {
            total_reads: self.total_reads,
            errors: self.errors,
            anomalies: self.filter.total_anomalies(),
            consecutive_anomalies: self.filter.consecutive_anomalies(),
            success_rate,
        }
    }

    pub fn reset_statistics(&mut self) {
        self.total_reads = 0;
        self.successes = 0;
        self.errors = 0;
        self.filter.reset_statistics();
        info!("Sensor: statistics reset");
    }

    pub fn last_reading(&self) -> Option<LastReading> {
        self.last
    }

    pub fn filter(&self) -> &AnomalyFilter {
        &self.filter
    }

    /// Turn the indicator off and hand the bus back.
    pub fn release(&mut self) {
        self.indicator.set(false);
        self.sensor.release();
        info!("Sensor: released");
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }
}
