//! Failure tracking and the aggregate health verdict.
//!
//! The tracker keeps one set of counters per [`Domain`].  The loop domain's
//! consecutive-failure count is what the supervisor compares against the
//! restart threshold; the rest feed the periodic health check.
//!
//! ## Counter lifecycle
//!
//! 1. `record_failure` bumps `consecutive` and `total_failures` and raises
//!    `max_consecutive` if the streak is a new record.
//! 2. `record_success` bumps `total_successes` and zeroes `consecutive`.
//! 3. Only `reset()` ever lowers `max_consecutive`.

use core::fmt;

use log::info;

use crate::config::HealthThresholds;

/// Health issues reported at most once each.
pub const MAX_HEALTH_ISSUES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Wifi,
    Transport,
    Sensor,
    Loop,
}

impl Domain {
    pub const ALL: [Domain; 4] = [Domain::Wifi, Domain::Transport, Domain::Sensor, Domain::Loop];

    const fn index(self) -> usize {
        match self {
            Self::Wifi => 0,
            Self::Transport => 1,
            Self::Sensor => 2,
            Self::Loop => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Wifi => "wifi",
            Self::Transport => "mqtt",
            Self::Sensor => "sensor",
            Self::Loop => "loop",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct FailureCounters {
    pub consecutive: u32,
    pub total_failures: u32,
    pub total_successes: u32,
    pub max_consecutive: u32,
}

impl FailureCounters {
    pub fn attempts(&self) -> u32 {
        self.total_failures + self.total_successes
    }

    /// Percent successful; 0.0 before any event.
    pub fn success_rate(&self) -> f32 {
        match self.attempts() {
            0 => 0.0,
            n => self.total_successes as f32 / n as f32 * 100.0,
        }
    }
}

/// One reason the device is considered unhealthy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HealthIssue {
    ConsecutiveLoopFailures(u32),
    LowLoopSuccessRate(f32),
    LowMemory { free_bytes: u32 },
    LowWifiSuccessRate(f32),
    LowTransportSuccessRate(f32),
}

impl fmt::Display for HealthIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConsecutiveLoopFailures(n) => write!(f, "high consecutive errors: {n}"),
            Self::LowLoopSuccessRate(r) => write!(f, "low loop success rate: {r:.1}%"),
            Self::LowMemory { free_bytes } => write!(f, "low memory: {free_bytes} bytes free"),
            Self::LowWifiSuccessRate(r) => write!(f, "poor WiFi reliability: {r:.1}%"),
            Self::LowTransportSuccessRate(r) => write!(f, "poor MQTT reliability: {r:.1}%"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub healthy: bool,
    /// Every applicable issue, in check order.
    pub issues: heapless::Vec<HealthIssue, MAX_HEALTH_ISSUES>,
}

#[derive(Debug, Clone)]
pub struct FailureTracker {
    counters: [FailureCounters; 4],
    thresholds: HealthThresholds,
}

impl FailureTracker {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self {
            counters: [FailureCounters::default(); 4],
            thresholds,
        }
    }

    pub fn record_success(&mut self, domain: Domain) {
        let c = &mut self.counters[domain.index()];
        c.total_successes = c.total_successes.saturating_add(1);
        c.consecutive = 0;
    }

    pub fn record_failure(&mut self, domain: Domain) {
        let c = &mut self.counters[domain.index()];
        c.total_failures = c.total_failures.saturating_add(1);
        c.consecutive = c.consecutive.saturating_add(1);
        c.max_consecutive = c.max_consecutive.max(c.consecutive);
    }

    pub fn counters(&self, domain: Domain) -> FailureCounters {
        self.counters[domain.index()]
    }

    pub fn consecutive_failures(&self, domain: Domain) -> u32 {
        self.counters(domain).consecutive
    }

    pub fn max_consecutive_failures(&self, domain: Domain) -> u32 {
        self.counters(domain).max_consecutive
    }

    pub fn success_rate(&self, domain: Domain) -> f32 {
        self.counters(domain).success_rate()
    }

    pub fn attempts(&self, domain: Domain) -> u32 {
        self.counters(domain).attempts()
    }

    pub fn reset(&mut self) {
        self.counters = [FailureCounters::default(); 4];
        info!("Health: counters reset");
    }

    pub fn check_health(&self, free_memory_bytes: u32) -> HealthReport {
        let t = &self.thresholds;
        let mut issues: heapless::Vec<HealthIssue, MAX_HEALTH_ISSUES> = heapless::Vec::new();
        // Capacity equals the number of checks below, so pushes cannot fail.
        let mut push = |issue| {
            let _ = issues.push(issue);
        };

        let loop_streak = self.consecutive_failures(Domain::Loop);
        if loop_streak >= t.loop_consecutive_limit {
            push(HealthIssue::ConsecutiveLoopFailures(loop_streak));
        }

        let loop_rate = self.success_rate(Domain::Loop);
        if self.attempts(Domain::Loop) > t.loop_min_samples && loop_rate < t.loop_min_success_rate {
            push(HealthIssue::LowLoopSuccessRate(loop_rate));
        }

        if free_memory_bytes < t.low_memory_bytes {
            push(HealthIssue::LowMemory { free_bytes: free_memory_bytes });
        }

        let wifi_rate = self.success_rate(Domain::Wifi);
        if self.attempts(Domain::Wifi) > t.link_min_attempts && wifi_rate < t.link_min_success_rate {
            push(HealthIssue::LowWifiSuccessRate(wifi_rate));
        }

        let mqtt_rate = self.success_rate(Domain::Transport);
        if self.attempts(Domain::Transport) > t.link_min_attempts
            && mqtt_rate < t.link_min_success_rate
        {
            push(HealthIssue::LowTransportSuccessRate(mqtt_rate));
        }

        HealthReport {
            healthy: issues.is_empty(),
            issues,
        }
    }
}
