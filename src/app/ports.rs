//! Port traits: the hexagonal boundary between the supervisory core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SupervisoryLoop (domain)
//! ```
//!
//! Adapters (DHT22 driver, WiFi, MQTT, watchdog, clock) implement these
//! traits.  The [`SupervisoryLoop`](super::supervisor::SupervisoryLoop) owns
//! one of each through a [`Platform`] bundle, so the domain core never
//! touches hardware directly and every collaborator can be mocked.

use core::time::Duration;

use crate::error::{ConnectivityError, SensorFault};
use crate::sensors::Sample;

use super::events::SupervisorEvent;
use super::payload::{DeviceInfo, NetworkInfo, StorageSnapshot};

// ───────────────────────────────────────────────────────────────
// Keepalive capability (watchdog)
// ───────────────────────────────────────────────────────────────

/// The right to service the hardware watchdog.
///
/// Passed by `&mut` into any operation that may block longer than the
/// watchdog timeout.  A disabled watchdog is a no-op implementation.
pub trait KeepAlive {
    fn feed(&mut self);

    /// Number of feeds so far, for periodic summaries.
    fn feeds(&self) -> u64 {
        0
    }
}

/// A keepalive that does nothing.  Used when no watchdog is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeepAlive;

impl KeepAlive for NoKeepAlive {
    fn feed(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// Sensor + indicator (driven adapters: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// A single temperature/humidity transducer.
pub trait SensorPort {
    /// Take one raw measurement.  No range checking happens here.
    fn measure(&mut self) -> Result<Sample, SensorFault>;

    /// Give the bus back.  Later `measure` calls may fail with
    /// [`SensorFault::Released`].
    fn release(&mut self) {}
}

/// Liveness cue toggled around each read attempt (an LED on the board).
pub trait IndicatorPort {
    fn set(&mut self, on: bool);
}

/// No indicator fitted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl IndicatorPort for NoIndicator {
    fn set(&mut self, _on: bool) {}
}

// ───────────────────────────────────────────────────────────────
// Network + transport
// ───────────────────────────────────────────────────────────────

/// WiFi station link.
pub trait NetworkPort {
    fn is_connected(&self) -> bool;

    /// Associate and wait up to `timeout` for an IP, feeding `keepalive`
    /// while waiting.
    fn connect(
        &mut self,
        timeout: Duration,
        keepalive: &mut dyn KeepAlive,
    ) -> Result<(), ConnectivityError>;

    fn disconnect(&mut self);

    /// IP/RSSI/MAC while connected.
    fn network_info(&self) -> Option<NetworkInfo>;
}

/// Counters kept by the pub/sub transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TransportStats {
    pub connects: u32,
    pub publishes: u32,
    pub errors: u32,
}

/// MQTT (or any pub/sub) client.  Sessions are short: connect, publish,
/// disconnect, once per cycle.
pub trait TransportPort {
    /// Open a broker session, trying up to `retries` times and feeding
    /// `keepalive` before each attempt.
    fn connect(
        &mut self,
        retries: u32,
        keepalive: &mut dyn KeepAlive,
    ) -> Result<(), ConnectivityError>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ConnectivityError>;

    fn disconnect(&mut self);

    fn statistics(&self) -> TransportStats;
}

// ───────────────────────────────────────────────────────────────
// Clock, system info, delay
// ───────────────────────────────────────────────────────────────

pub trait ClockPort {
    /// Wall-clock time as ISO-8601 with the configured fixed offset,
    /// e.g. `2026-01-04T09:49:41+08:00`.
    fn now_iso8601(&self) -> String;

    /// Seconds since boot.
    fn uptime_secs(&self) -> u64;

    /// `true` once the wall clock has been set from a time source.
    fn is_synced(&self) -> bool;

    /// Start time sync (or keep polling one already running) and wait up to
    /// `timeout` for it, feeding `keepalive` while waiting.
    fn sync(&mut self, timeout: Duration, keepalive: &mut dyn KeepAlive) -> bool;
}

pub trait SystemInfoPort {
    fn free_memory_bytes(&mut self) -> u32;

    /// Flash usage, including the log partition.
    fn storage(&mut self) -> StorageSnapshot;

    /// Point-in-time device record for the secondary publish.  Network info
    /// and timestamp are filled in by the caller.
    fn device_info(&mut self) -> DeviceInfo;
}

/// Blocking sleep.  Every wait in the core goes through this so tests can
/// record waits instead of sleeping.
pub trait Delay {
    fn sleep(&mut self, duration: Duration);
}

// ───────────────────────────────────────────────────────────────
// Event sink (domain → logging)
// ───────────────────────────────────────────────────────────────

/// The supervisor emits structured [`SupervisorEvent`]s through this port.
/// Adapters decide where they go (serial log, log file, test recorder).
pub trait EventSink {
    fn emit(&mut self, event: &SupervisorEvent);
}

// ───────────────────────────────────────────────────────────────
// Platform bundle
// ───────────────────────────────────────────────────────────────

/// Names the concrete adapter type for every collaborator the supervisor
/// owns.  Firmware and tests each provide one zero-sized implementation.
pub trait Platform {
    type Network: NetworkPort;
    type Transport: TransportPort;
    type Sensor: SensorPort;
    type Indicator: IndicatorPort;
    type Watchdog: KeepAlive;
    type Clock: ClockPort;
    type System: SystemInfoPort;
    type Sleep: Delay;
}

/// The collaborators themselves, moved into
/// [`SupervisoryLoop::new`](super::supervisor::SupervisoryLoop::new).
pub struct Board<P: Platform> {
    pub network: P::Network,
    pub transport: P::Transport,
    pub sensor: P::Sensor,
    pub indicator: P::Indicator,
    pub watchdog: P::Watchdog,
    pub clock: P::Clock,
    pub system: P::System,
    pub delay: P::Sleep,
}
