//! Spike rejection for the (temperature, humidity) series.
//!
//! A sample that jumps more than `threshold` away from the last accepted
//! sample on either axis is an anomaly.  Anomalies are rejected (the caller
//! gets the previous stable value back) until more than `max_anomaly_count`
//! of them arrive in a row, at which point the run is treated as a real
//! environmental change and the raw sample is forced through.

use log::{info, warn};

use super::Sample;

/// Mutable state owned by the filter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterState {
    pub last_accepted: Option<Sample>,
    pub consecutive_anomalies: u32,
    pub total_anomalies: u32,
}

/// Result of feeding one raw sample through the filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterVerdict {
    /// `false` only when the sample was rejected as a spike.
    pub accepted: bool,
    /// The value downstream consumers should use.
    pub output: Sample,
}

#[derive(Debug, Clone)]
pub struct AnomalyFilter {
    threshold: f32,
    max_anomaly_count: u32,
    state: FilterState,
}

impl AnomalyFilter {
    pub fn new(threshold: f32, max_anomaly_count: u32) -> Self {
        Self {
            threshold,
            max_anomaly_count,
            state: FilterState::default(),
        }
    }

    pub fn evaluate(&mut self, raw: Sample) -> FilterVerdict {
        let Some(last) = self.state.last_accepted else {
            self.state.last_accepted = Some(raw);
            return FilterVerdict { accepted: true, output: raw };
        };

        let dt = (raw.temperature - last.temperature).abs();
        let dh = (raw.humidity - last.humidity).abs();

        if dt > self.threshold || dh > self.threshold {
            self.state.consecutive_anomalies += 1;
            self.state.total_anomalies += 1;
            warn!(
                "Anomaly: dT={:.1} dH={:.1} (threshold {:.1}, {} in a row)",
                dt, dh, self.threshold, self.state.consecutive_anomalies
            );

            if self.state.consecutive_anomalies > self.max_anomaly_count {
                info!(
                    "Anomaly: {} consecutive deviations, accepting {:.1}\u{00b0}C {:.1}% as genuine",
                    self.state.consecutive_anomalies, raw.temperature, raw.humidity
                );
                self.state.consecutive_anomalies = 0;
                self.state.last_accepted = Some(raw);
                return FilterVerdict { accepted: true, output: raw };
            }

            info!(
                "Anomaly: rejected, holding {:.1}\u{00b0}C {:.1}%",
                last.temperature, last.humidity
            );
            return FilterVerdict { accepted: false, output: last };
        }

        if self.state.consecutive_anomalies > 0 {
            info!("Anomaly: readings back within threshold");
        }
        self.state.consecutive_anomalies = 0;
        self.state.last_accepted = Some(raw);
        FilterVerdict { accepted: true, output: raw }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn last_accepted(&self) -> Option<Sample> {
        self.state.last_accepted
    }

    pub fn consecutive_anomalies(&self) -> u32 {
        self.state.consecutive_anomalies
    }

    pub fn total_anomalies(&self) -> u32 {
        self.state.total_anomalies
    }

    /// Clear the counters but keep the reference sample.
    pub fn reset_statistics(&mut self) {
        self.state.consecutive_anomalies = 0;
        self.state.total_anomalies = 0;
    }

    /// Forget everything, including the reference sample.
    pub fn reset(&mut self) {
        self.state = FilterState::default();
    }
}
