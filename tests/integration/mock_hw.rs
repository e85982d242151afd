//! Mock adapters for integration tests.
//!
//! Every collaborator records what the supervisor asked of it so tests can
//! assert on call order, sleeps and published payloads without touching real
//! GPIO, WiFi or a broker.  Calls that matter for ordering go to a shared
//! [`CallLog`].

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use thermonode::app::events::SupervisorEvent;
use thermonode::app::payload::{DeviceInfo, NetworkInfo, ResetReason, StorageSnapshot};
use thermonode::app::ports::{
    Board, ClockPort, Delay, EventSink, IndicatorPort, KeepAlive, NetworkPort, Platform,
    SensorPort, SystemInfoPort, TransportPort, TransportStats,
};
use thermonode::app::supervisor::StopSignal;
use thermonode::error::{ConnectivityError, SensorFault};
use thermonode::sensors::Sample;

pub type CallLog = Rc<RefCell<Vec<&'static str>>>;

pub fn call_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

// ── Network ───────────────────────────────────────────────────

pub struct MockNetwork {
    pub connected: bool,
    /// Results for upcoming connect calls; `Ok(())` once exhausted.
    pub connect_script: VecDeque<Result<(), ConnectivityError>>,
    /// Used instead of `Ok(())` when the script runs out.
    pub connect_fallback: Result<(), ConnectivityError>,
    pub connect_calls: u32,
    pub log: CallLog,
}

impl MockNetwork {
    pub fn up(log: &CallLog) -> Self {
        Self {
            connected: true,
            connect_script: VecDeque::new(),
            connect_fallback: Ok(()),
            connect_calls: 0,
            log: log.clone(),
        }
    }

    pub fn down(log: &CallLog, fallback: Result<(), ConnectivityError>) -> Self {
        Self {
            connected: false,
            connect_fallback: fallback,
            ..Self::up(log)
        }
    }
}

impl NetworkPort for MockNetwork {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(
        &mut self,
        _timeout: Duration,
        keepalive: &mut dyn KeepAlive,
    ) -> Result<(), ConnectivityError> {
        keepalive.feed();
        self.connect_calls += 1;
        self.log.borrow_mut().push("network.connect");
        let result = self.connect_script.pop_front().unwrap_or(self.connect_fallback);
        self.connected = result.is_ok();
        result
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.log.borrow_mut().push("network.disconnect");
    }

    fn network_info(&self) -> Option<NetworkInfo> {
        if !self.connected {
            return None;
        }
        let mut ip = heapless::String::new();
        let _ = ip.push_str("10.0.0.7");
        Some(NetworkInfo {
            ip,
            rssi: -55,
            mac: heapless::String::new(),
        })
    }
}

// ── Transport ─────────────────────────────────────────────────

pub struct MockTransport {
    pub session_open: bool,
    /// Refuse this many upcoming connect calls.
    pub refuse_connects: u32,
    /// Fail this many upcoming publishes.
    pub fail_publishes: u32,
    pub published: Vec<(String, Vec<u8>)>,
    pub stats: TransportStats,
    pub log: CallLog,
}

impl MockTransport {
    pub fn new(log: &CallLog) -> Self {
        Self {
            session_open: false,
            refuse_connects: 0,
            fail_publishes: 0,
            published: Vec::new(),
            stats: TransportStats::default(),
            log: log.clone(),
        }
    }

    pub fn published_on(&self, topic: &str) -> Vec<serde_json::Value> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, bytes)| serde_json::from_slice(bytes).unwrap())
            .collect()
    }
}

impl TransportPort for MockTransport {
    fn connect(
        &mut self,
        _retries: u32,
        keepalive: &mut dyn KeepAlive,
    ) -> Result<(), ConnectivityError> {
        keepalive.feed();
        self.log.borrow_mut().push("transport.connect");
        if self.refuse_connects > 0 {
            self.refuse_connects -= 1;
            self.stats.errors += 1;
            return Err(ConnectivityError::TransportConnectFailed);
        }
        self.session_open = true;
        self.stats.connects += 1;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ConnectivityError> {
        if !self.session_open {
            return Err(ConnectivityError::TransportNotConnected);
        }
        if self.fail_publishes > 0 {
            self.fail_publishes -= 1;
            self.stats.errors += 1;
            return Err(ConnectivityError::PublishFailed);
        }
        self.published.push((topic.to_string(), payload.to_vec()));
        self.stats.publishes += 1;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.session_open = false;
        self.log.borrow_mut().push("transport.disconnect");
    }

    fn statistics(&self) -> TransportStats {
        self.stats
    }
}

// ── Sensor + indicator ────────────────────────────────────────

pub struct ScriptedSensor {
    pub script: VecDeque<Result<Sample, SensorFault>>,
    /// Returned once the script is exhausted.
    pub fallback: Result<Sample, SensorFault>,
    pub measures: u32,
    pub released: bool,
    pub log: CallLog,
}

impl ScriptedSensor {
    pub fn steady(log: &CallLog, sample: Sample) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: Ok(sample),
            measures: 0,
            released: false,
            log: log.clone(),
        }
    }

    pub fn failing(log: &CallLog, fault: SensorFault) -> Self {
        Self {
            fallback: Err(fault),
            ..Self::steady(log, Sample::new(0.0, 0.0))
        }
    }

    pub fn scripted(log: &CallLog, script: Vec<Result<Sample, SensorFault>>) -> Self {
        Self {
            script: script.into(),
            fallback: Err(SensorFault::Timeout),
            ..Self::steady(log, Sample::new(0.0, 0.0))
        }
    }
}

impl SensorPort for ScriptedSensor {
    fn measure(&mut self) -> Result<Sample, SensorFault> {
        self.measures += 1;
        if self.released {
            return Err(SensorFault::Released);
        }
        self.script.pop_front().unwrap_or(self.fallback)
    }

    fn release(&mut self) {
        self.released = true;
        self.log.borrow_mut().push("sensor.release");
    }
}

#[derive(Debug, Default)]
pub struct MockIndicator {
    pub states: Vec<bool>,
}

impl IndicatorPort for MockIndicator {
    fn set(&mut self, on: bool) {
        self.states.push(on);
    }
}

// ── Watchdog, clock, system ───────────────────────────────────

#[derive(Debug, Default)]
pub struct CountingWatchdog {
    pub feeds: u64,
}

impl KeepAlive for CountingWatchdog {
    fn feed(&mut self) {
        self.feeds += 1;
    }

    fn feeds(&self) -> u64 {
        self.feeds
    }
}

pub const FIXED_TIMESTAMP: &str = "2026-01-04T09:49:41+08:00";
/// What an unsynced clock reports.
pub const EPOCH_TIMESTAMP: &str = "1970-01-01T08:00:00+08:00";

pub struct FixedClock {
    pub uptime: u64,
    pub synced: bool,
    pub sync_calls: u32,
}

impl FixedClock {
    pub fn synced() -> Self {
        Self {
            uptime: 3_725,
            synced: true,
            sync_calls: 0,
        }
    }

    pub fn unsynced() -> Self {
        Self {
            synced: false,
            ..Self::synced()
        }
    }
}

impl ClockPort for FixedClock {
    fn now_iso8601(&self) -> String {
        if self.synced { FIXED_TIMESTAMP } else { EPOCH_TIMESTAMP }.to_string()
    }

    fn uptime_secs(&self) -> u64 {
        self.uptime
    }

    fn is_synced(&self) -> bool {
        self.synced
    }

    fn sync(&mut self, _timeout: Duration, keepalive: &mut dyn KeepAlive) -> bool {
        keepalive.feed();
        self.sync_calls += 1;
        self.synced = true;
        true
    }
}

pub struct MockSystem {
    pub free: u32,
}

/// 4 MiB flash with 1 MiB left in the log partition.
pub const MOCK_FLASH: StorageSnapshot = StorageSnapshot {
    total: 4 * 1024 * 1024,
    free: 1024 * 1024,
};

impl SystemInfoPort for MockSystem {
    fn free_memory_bytes(&mut self) -> u32 {
        self.free
    }

    fn storage(&mut self) -> StorageSnapshot {
        MOCK_FLASH
    }

    fn device_info(&mut self) -> DeviceInfo {
        let mut unique_id = heapless::String::new();
        let _ = unique_id.push_str("0A0B0C0D0E0F");
        DeviceInfo {
            unique_id,
            platform: "host",
            firmware_version: "test",
            cpu_frequency_mhz: Some(240),
            total_storage_bytes: MOCK_FLASH.total,
            used_storage_bytes: MOCK_FLASH.used(),
            free_storage_bytes: MOCK_FLASH.free,
            storage_usage_percent: MOCK_FLASH.usage_percent(),
            total_memory_bytes: 300_000,
            used_memory_bytes: 300_000 - self.free.min(300_000),
            free_memory_bytes: self.free,
            memory_usage_percent: 0.0,
            min_free_memory_bytes: self.free,
            uptime_seconds: 0,
            reset_reason: ResetReason::PowerOn,
            network: None,
            created_at: String::new(),
        }
    }
}

// ── Delay ─────────────────────────────────────────────────────

/// Records sleeps instead of sleeping.  Optionally raises a stop signal
/// once a given number of sleeps has happened.
#[derive(Default)]
pub struct RecordingDelay {
    pub sleeps: Vec<Duration>,
    pub stop_after: Option<(usize, StopSignal)>,
}

impl RecordingDelay {
    pub fn total(&self) -> Duration {
        self.sleeps.iter().sum()
    }
}

impl Delay for RecordingDelay {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
        if let Some((after, stop)) = &self.stop_after {
            if self.sleeps.len() >= *after {
                stop.raise();
            }
        }
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<SupervisorEvent>,
}

impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&SupervisorEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &SupervisorEvent) {
        self.events.push(event.clone());
    }
}

// ── Platform bundle ───────────────────────────────────────────

pub struct MockPlatform;

impl Platform for MockPlatform {
    type Network = MockNetwork;
    type Transport = MockTransport;
    type Sensor = ScriptedSensor;
    type Indicator = MockIndicator;
    type Watchdog = CountingWatchdog;
    type Clock = FixedClock;
    type System = MockSystem;
    type Sleep = RecordingDelay;
}

/// A healthy board: network up, broker accepting, sensor steady at
/// 21.5 °C / 48 %.
pub fn healthy_board(log: &CallLog) -> Board<MockPlatform> {
    Board {
        network: MockNetwork::up(log),
        transport: MockTransport::new(log),
        sensor: ScriptedSensor::steady(log, Sample::new(21.5, 48.0)),
        indicator: MockIndicator::default(),
        watchdog: CountingWatchdog::default(),
        clock: FixedClock::synced(),
        system: MockSystem { free: 200_000 },
        delay: RecordingDelay::default(),
    }
}
