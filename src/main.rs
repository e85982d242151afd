//! ThermoNode firmware entry point.
//!
//! Hexagonal architecture around a single blocking supervisory loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Dht22 + StatusLed   WifiAdapter    MqttAdapter   Clock        │
//! │  (Sensor+Indicator)  (Network)      (Transport)   (SNTP)       │
//! │  Watchdog            SystemInfo     LogEventSink               │
//! │  (KeepAlive)         (heap, reset)  (serial + log file)        │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │          SupervisoryLoop (pure logic)                  │    │
//! │  │  SensorReader · AnomalyFilter · FailureTracker         │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::Ets;
use esp_idf_svc::hal::gpio::{AnyIOPin, AnyOutputPin, IOPin, InputOutput, Output, OutputPin, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use thermonode::adapters::clock::Clock;
use thermonode::adapters::log_sink::{LogEventSink, RotatingLogFile};
use thermonode::adapters::mqtt::MqttAdapter;
use thermonode::adapters::system_info::{self, SystemInfo};
use thermonode::adapters::wifi::WifiAdapter;
use thermonode::app::ports::{Board, ClockPort, NetworkPort, Platform};
use thermonode::app::supervisor::{LoopExit, StopSignal, SupervisoryLoop};
use thermonode::config::{NetworkConfig, SystemConfig};
use thermonode::diagnostics;
use thermonode::drivers::delay::ThreadDelay;
use thermonode::drivers::reset::{self, RestartPlan};
use thermonode::drivers::status_led::StatusLed;
use thermonode::drivers::stop_button::StopButton;
use thermonode::drivers::watchdog::Watchdog;
use thermonode::sensors::dht22::Dht22;

// ── Platform binding ──────────────────────────────────────────

struct EspPlatform;

impl Platform for EspPlatform {
    type Network = WifiAdapter;
    type Transport = MqttAdapter;
    type Sensor = Dht22<PinDriver<'static, AnyIOPin, InputOutput>, Ets>;
    type Indicator = StatusLed<PinDriver<'static, AnyOutputPin, Output>>;
    type Watchdog = Watchdog;
    type Clock = Clock;
    type System = SystemInfo;
    type Sleep = ThreadDelay;
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  ThermoNode v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");
    diagnostics::install_panic_handler();

    // ── 2. Configuration ──────────────────────────────────────
    let config = SystemConfig::default();
    config.validate()?;
    let mac = system_info::factory_mac();
    let net_config = NetworkConfig::from_build_env()?
        .with_default_client_id(&system_info::default_client_id(&mac));
    info!(
        "Device ID: {} (MQTT client id: {})",
        system_info::unique_id(&mac),
        net_config.mqtt_client_id
    );

    // ── 3. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let mut watchdog = Watchdog::new(config.watchdog_enabled, config.watchdog_timeout_ms);

    let dht_pin = PinDriver::input_output_od(peripherals.pins.gpio4.downgrade())?;
    let sensor = Dht22::new(dht_pin, Ets);
    let led_pin = PinDriver::output(peripherals.pins.gpio2.downgrade_output())?;
    let indicator = StatusLed::new(led_pin);

    let stop = StopSignal::new();
    let _stop_button = StopButton::new(peripherals.pins.gpio0.downgrade(), stop.clone())?;

    // ── 4. Network + time ─────────────────────────────────────
    let mut wifi = WifiAdapter::new(peripherals.modem, sys_loop, nvs, &net_config)?;
    if let Err(e) = wifi.connect(config.wifi_connect_timeout(), &mut watchdog) {
        // The supervisor retries on its fast-retry cadence.
        warn!("Boot: WiFi not up yet ({})", e);
    }

    let mut clock = Clock::new(config.timezone_offset_secs);
    if wifi.is_connected() {
        clock.sync(config.time_sync_timeout(), &mut watchdog);
    }

    // ── 5. Log sink ───────────────────────────────────────────
    let mut sink = if thermonode::adapters::log_sink::mount_log_partition(&config.log_file_path) {
        LogEventSink::with_file(RotatingLogFile::new(
            config.log_file_path.as_str(),
            config.log_max_bytes,
        ))
    } else {
        warn!("Boot: log partition unavailable, console logging only");
        LogEventSink::new()
    };

    // ── 6. Supervisory loop ───────────────────────────────────
    let board: Board<EspPlatform> = Board {
        network: wifi,
        transport: MqttAdapter::new(&net_config),
        sensor,
        indicator,
        watchdog,
        clock,
        system: SystemInfo::new(),
        delay: ThreadDelay,
    };
    let plan = RestartPlan::for_config(&config);
    let mut supervisor = SupervisoryLoop::new(config, board, stop);

    info!("System ready. Entering supervisory loop.");
    match supervisor.run(&mut sink) {
        // The supervisor (and its watchdog subscription) stays alive while
        // the restart plan runs.
        LoopExit::Restart(_) => reset::execute(plan),
        LoopExit::Interrupted => {
            info!("Stopped by button; idling until reset");
            drop(supervisor);
            Ok(())
        }
    }
}
