//! The supervisory loop: the hexagonal core.
//!
//! [`SupervisoryLoop`] owns every collaborator (network, transport, sensor,
//! watchdog, clock) and runs one acquisition cycle after another until an
//! interrupt or a restart escalation.
//!
//! ```text
//!  CycleStart ─▶ EnsureConnectivity ─▶ (ReconnectWifi) ─▶ ConnectTransport
//!      ▲                                                        │
//!      │                                                        ▼
//!    Sleep ◀── EvaluateResult ◀── DisconnectTransport ◀──── Publish
//!                   │
//!                   └──▶ Restart   (consecutive failures ≥ threshold)
//! ```
//!
//! Every failure is absorbed into the cycle report; only a
//! [`FatalCondition`] ends the loop.  The watchdog is fed at cycle start,
//! before each sensor attempt, during every blocking connect, around each
//! publish and after every sleep chunk.

use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn};

use crate::config::SystemConfig;
use crate::diagnostics::{MemoryWatermark, StatusReport};
use crate::error::{ConnectivityError, FatalCondition, LoopFailure};
use crate::health::{Domain, FailureTracker};
use crate::sensors::Sample;
use crate::sensors::anomaly::AnomalyFilter;
use crate::sensors::reader::{ReadOutcome, SensorReader};

use super::events::SupervisorEvent;
use super::payload::SensorPayload;
use super::ports::{
    Board, ClockPort, Delay, EventSink, KeepAlive, NetworkPort, Platform, SystemInfoPort,
    TransportPort,
};

const MIN_SLEEP_CHUNK: Duration = Duration::from_millis(1);

// ───────────────────────────────────────────────────────────────
// Cycle states and outcomes
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    CycleStart,
    EnsureConnectivity,
    ReconnectWifi,
    ConnectTransport,
    Publish,
    DisconnectTransport,
    EvaluateResult,
    Sleep,
    Restart,
}

/// What the loop does after a cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NextStep {
    Sleep(Duration),
    Restart(FatalCondition),
}

/// Outcome of one [`SupervisoryLoop::run_cycle`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub success: bool,
    pub network_up: bool,
    /// First failure of the cycle, if any.
    pub failure: Option<LoopFailure>,
    /// Sample delivered to the broker this cycle.
    pub published: Option<Sample>,
    pub next: NextStep,
}

/// Why [`SupervisoryLoop::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The consecutive-failure threshold was reached; the caller must reset
    /// the device.
    Restart(FatalCondition),
    /// The stop signal was raised.
    Interrupted,
}

/// Cooperative stop request shared with whatever raises the interrupt
/// (a button ISR on hardware, a test thread on the host).
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ───────────────────────────────────────────────────────────────
// SupervisoryLoop
// ───────────────────────────────────────────────────────────────

pub struct SupervisoryLoop<P: Platform> {
    config: SystemConfig,
    network: P::Network,
    transport: P::Transport,
    reader: SensorReader<P::Sensor, P::Indicator>,
    watchdog: P::Watchdog,
    clock: P::Clock,
    system: P::System,
    delay: P::Sleep,
    tracker: FailureTracker,
    memory: MemoryWatermark,
    stop: StopSignal,
    state: CycleState,
    cycle: u64,
    /// Set when a restart was requested; cleared by the next good cycle.
    escalated: bool,
    released: bool,
}

impl<P: Platform> SupervisoryLoop<P> {
    /// Take ownership of every collaborator.  Nothing is touched until
    /// [`run`](Self::run) or [`run_cycle`](Self::run_cycle).
    pub fn new(config: SystemConfig, board: Board<P>, stop: StopSignal) -> Self {
        let filter = AnomalyFilter::new(config.anomaly_threshold, config.max_anomaly_count);
        let tracker = FailureTracker::new(config.health);
        Self {
            reader: SensorReader::new(board.sensor, board.indicator, filter),
            network: board.network,
            transport: board.transport,
            watchdog: board.watchdog,
            clock: board.clock,
            system: board.system,
            delay: board.delay,
            tracker,
            memory: MemoryWatermark::default(),
            stop,
            state: CycleState::CycleStart,
            cycle: 0,
            escalated: false,
            released: false,
            config,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Run cycles until interrupted or escalated, then release every
    /// collaborator.
    pub fn run(&mut self, sink: &mut impl EventSink) -> LoopExit {
        info!(
            "Supervisor: starting (sample every {}s, watchdog {})",
            self.config.sample_interval_secs,
            if self.config.watchdog_enabled { "enabled" } else { "disabled" }
        );
        sink.emit(&SupervisorEvent::Started {
            watchdog_enabled: self.config.watchdog_enabled,
        });

        let exit = loop {
            if self.stop.is_raised() {
                info!("Supervisor: stop requested");
                break LoopExit::Interrupted;
            }

            let report = self.run_cycle(sink);
            match report.next {
                NextStep::Restart(fatal) => {
                    error!("Supervisor: {}, restarting in {:?}", fatal, self.config.restart_grace());
                    sink.emit(&SupervisorEvent::RestartEscalation(fatal));
                    self.delay.sleep(self.config.restart_grace());
                    break LoopExit::Restart(fatal);
                }
                NextStep::Sleep(duration) => {
                    if !self.sleep_feeding(duration) {
                        info!("Supervisor: stop requested during sleep");
                        break LoopExit::Interrupted;
                    }
                }
            }
        };

        let report = self.status_report();
        info!("Supervisor: final statistics\n{}", report);
        sink.emit(&SupervisorEvent::Summary(report));
        self.release();
        sink.emit(&SupervisorEvent::Stopped { cycles: self.cycle });
        exit
    }

    /// Release collaborators in reverse acquisition order: transport,
    /// sensor, network.  Idempotent; also runs on drop.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        info!("Supervisor: releasing collaborators");
        self.transport.disconnect();
        self.reader.release();
        self.network.disconnect();
    }

    // ── One cycle ─────────────────────────────────────────────

    pub fn run_cycle(&mut self, sink: &mut impl EventSink) -> CycleReport {
        self.cycle += 1;
        self.enter(CycleState::CycleStart);
        self.watchdog.feed();
        debug!("Supervisor: cycle {} begins", self.cycle);

        let mut failure: Option<LoopFailure> = None;
        let mut published = None;

        self.enter(CycleState::EnsureConnectivity);
        let network_up = match self.ensure_connectivity(sink) {
            Ok(()) => true,
            Err(f) => {
                failure = Some(f);
                false
            }
        };

        if network_up && !self.clock.is_synced() {
            self.resync_clock();
        }

        if network_up {
            self.enter(CycleState::ConnectTransport);
            match self
                .transport
                .connect(self.config.mqtt_connect_retries, &mut self.watchdog)
            {
                Ok(()) => {
                    self.enter(CycleState::Publish);
                    match self.publish_sample() {
                        Ok(sample) => published = Some(sample),
                        Err(f) => failure = failure.or(Some(f)),
                    }
                    if let Err(e) = self.publish_device_info() {
                        warn!("Supervisor: device info publish failed: {}", e);
                    }

                    self.enter(CycleState::DisconnectTransport);
                    self.transport.disconnect();
                }
                Err(e) => {
                    error!("Supervisor: MQTT connect failed: {}", e);
                    self.tracker.record_failure(Domain::Transport);
                    failure = failure.or(Some(LoopFailure::TransportConnect(e)));
                }
            }
        }

        self.enter(CycleState::EvaluateResult);
        let next = self.evaluate(failure, published, network_up, sink);
        self.enter(match next {
            NextStep::Sleep(_) => CycleState::Sleep,
            NextStep::Restart(_) => CycleState::Restart,
        });

        CycleReport {
            cycle: self.cycle,
            success: failure.is_none(),
            network_up,
            failure,
            published,
            next,
        }
    }

    fn ensure_connectivity(&mut self, sink: &mut impl EventSink) -> Result<(), LoopFailure> {
        if self.network.is_connected() {
            return Ok(());
        }

        warn!("Supervisor: WiFi down, reconnecting");
        self.tracker.record_failure(Domain::Wifi);
        self.enter(CycleState::ReconnectWifi);
        self.watchdog.feed();

        match self
            .network
            .connect(self.config.wifi_connect_timeout(), &mut self.watchdog)
        {
            Ok(()) => {
                self.tracker.record_success(Domain::Wifi);
                info!("Supervisor: WiFi restored");
                sink.emit(&SupervisorEvent::NetworkRestored);
                Ok(())
            }
            Err(e) => {
                error!("Supervisor: WiFi reconnect failed: {}", e);
                if !self.config.watchdog_enabled {
                    info!(
                        "Supervisor: watchdog disabled, retrying in {}s",
                        self.config.fast_retry_interval_secs
                    );
                }
                Err(LoopFailure::Wifi(e))
            }
        }
    }

    /// The link may have been down at boot; timestamps stay at 1970 until
    /// time sync succeeds.  A miss does not fail the cycle.
    fn resync_clock(&mut self) {
        info!("Supervisor: wall clock unsynced, starting time sync");
        if !self
            .clock
            .sync(self.config.time_sync_timeout(), &mut self.watchdog)
        {
            warn!("Supervisor: time sync pending, retrying next cycle");
        }
    }

    fn publish_sample(&mut self) -> Result<Sample, LoopFailure> {
        let outcome = self.reader.read(
            self.config.sensor_read_attempts,
            self.config.sensor_retry_delay(),
            &mut self.delay,
            &mut self.watchdog,
        );
        let sample = match outcome {
            ReadOutcome::Accepted(sample) => {
                self.tracker.record_success(Domain::Sensor);
                sample
            }
            ReadOutcome::Failed(e) => {
                self.tracker.record_failure(Domain::Sensor);
                error!("Supervisor: sensor read failed: {}", e);
                return Err(LoopFailure::SensorRead(e));
            }
        };

        let payload = SensorPayload::new(self.clock.now_iso8601(), sample);
        let result = serde_json::to_vec(&payload)
            .map_err(|_| ConnectivityError::Encode)
            .and_then(|bytes| {
                self.watchdog.feed();
                let sent = self.transport.publish(&self.config.sensor_topic, &bytes);
                self.watchdog.feed();
                sent
            });

        match result {
            Ok(()) => {
                self.tracker.record_success(Domain::Transport);
                info!(
                    "Supervisor: published {:.1}\u{00b0}C {:.1}% to {}",
                    sample.temperature, sample.humidity, self.config.sensor_topic
                );
                Ok(sample)
            }
            Err(e) => {
                self.tracker.record_failure(Domain::Transport);
                error!("Supervisor: sensor publish failed: {}", e);
                Err(LoopFailure::Publish(e))
            }
        }
    }

    /// Best effort; the caller only logs a failure.
    fn publish_device_info(&mut self) -> Result<(), ConnectivityError> {
        let mut info = self.system.device_info();
        info.network = self.network.network_info();
        info.created_at = self.clock.now_iso8601();

        let bytes = serde_json::to_vec(&info).map_err(|_| ConnectivityError::Encode)?;
        self.watchdog.feed();
        let sent = self.transport.publish(&self.config.device_info_topic, &bytes);
        self.watchdog.feed();
        if sent.is_ok() {
            debug!("Supervisor: device info published");
        }
        sent
    }

    fn evaluate(
        &mut self,
        failure: Option<LoopFailure>,
        published: Option<Sample>,
        network_up: bool,
        sink: &mut impl EventSink,
    ) -> NextStep {
        let limit = self.config.max_consecutive_errors;

        match failure {
            None => {
                self.tracker.record_success(Domain::Loop);
                self.escalated = false;
            }
            Some(f) => {
                self.tracker.record_failure(Domain::Loop);
                let consecutive = self.tracker.consecutive_failures(Domain::Loop);
                warn!("Supervisor: cycle {} failed ({}/{}): {}", self.cycle, consecutive, limit, f);
                sink.emit(&SupervisorEvent::CycleFailed {
                    cycle: self.cycle,
                    failure: f,
                    consecutive,
                    limit,
                });
            }
        }

        if let Some(sample) = published {
            sink.emit(&SupervisorEvent::ReadingPublished { cycle: self.cycle, sample });
        }

        let interval = u64::from(self.config.summary_interval_cycles);
        if interval > 0 && self.cycle % interval == 0 {
            self.summarise(sink);
        }

        let consecutive = self.tracker.consecutive_failures(Domain::Loop);
        if consecutive >= limit && !self.escalated {
            self.escalated = true;
            return NextStep::Restart(FatalCondition {
                consecutive_failures: consecutive,
                threshold: limit,
            });
        }

        if network_up {
            NextStep::Sleep(self.config.sample_interval())
        } else {
            NextStep::Sleep(self.config.fast_retry_interval())
        }
    }

    fn summarise(&mut self, sink: &mut impl EventSink) {
        let report = self.status_report();
        info!("Supervisor: {}", report.summary());
        let health = self.tracker.check_health(report.free_memory_bytes);
        sink.emit(&SupervisorEvent::Summary(report));

        if !health.healthy {
            for issue in &health.issues {
                warn!("Health: {}", issue);
            }
            sink.emit(&SupervisorEvent::HealthDegraded(health));
        }
    }

    // ── Sleep ─────────────────────────────────────────────────

    /// Sleep `total` in chunks no longer than the watchdog feed interval,
    /// feeding after each chunk.  Returns `false` if the stop signal was
    /// raised.
    fn sleep_feeding(&mut self, total: Duration) -> bool {
        // A zero interval from an unvalidated config must still make progress.
        let chunk_max = self.config.watchdog_feed_interval().max(MIN_SLEEP_CHUNK);
        let mut remaining = total;
        debug!("Supervisor: sleeping {:?}", total);

        while !remaining.is_zero() {
            if self.stop.is_raised() {
                return false;
            }
            let chunk = remaining.min(chunk_max);
            self.delay.sleep(chunk);
            self.watchdog.feed();
            remaining -= chunk;
        }
        !self.stop.is_raised()
    }

    // ── Introspection ─────────────────────────────────────────

    fn enter(&mut self, next: CycleState) {
        if self.state != next {
            debug!("Supervisor: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    pub fn status_report(&mut self) -> StatusReport {
        let free = self.system.free_memory_bytes();
        self.memory.observe(free);
        StatusReport {
            cycles: self.cycle,
            uptime_secs: self.clock.uptime_secs(),
            wifi: self.tracker.counters(Domain::Wifi),
            transport: self.tracker.counters(Domain::Transport),
            sensor: self.tracker.counters(Domain::Sensor),
            loops: self.tracker.counters(Domain::Loop),
            sensor_stats: self.reader.statistics(),
            transport_stats: self.transport.statistics(),
            free_memory_bytes: free,
            memory: self.memory,
            storage: self.system.storage(),
            watchdog_feeds: self.watchdog.feeds(),
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    pub fn tracker(&self) -> &FailureTracker {
        &self.tracker
    }

    pub fn reader(&self) -> &SensorReader<P::Sensor, P::Indicator> {
        &self.reader
    }

    pub fn network(&self) -> &P::Network {
        &self.network
    }

    pub fn transport(&self) -> &P::Transport {
        &self.transport
    }

    pub fn clock(&self) -> &P::Clock {
        &self.clock
    }

    pub fn watchdog(&self) -> &P::Watchdog {
        &self.watchdog
    }

    pub fn delay(&self) -> &P::Sleep {
        &self.delay
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }
}

impl<P: Platform> Drop for SupervisoryLoop<P> {
    fn drop(&mut self) {
        self.release();
    }
}
