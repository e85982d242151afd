//! SupervisoryLoop integration tests against mock adapters.

use std::time::Duration;

use thermonode::app::events::SupervisorEvent;
use thermonode::app::supervisor::{LoopExit, NextStep, StopSignal, SupervisoryLoop};
use thermonode::config::SystemConfig;
use thermonode::error::{ConnectivityError, FatalCondition, LoopFailure, SensorError, SensorFault};
use thermonode::health::{Domain, HealthIssue};
use thermonode::sensors::Sample;

use crate::mock_hw::*;

fn supervisor(
    config: SystemConfig,
    board: thermonode::app::ports::Board<MockPlatform>,
) -> SupervisoryLoop<MockPlatform> {
    SupervisoryLoop::new(config, board, StopSignal::new())
}

// ── Single cycle ──────────────────────────────────────────────

#[test]
fn healthy_cycle_publishes_sensor_and_device_records() {
    let log = call_log();
    let config = SystemConfig::default();
    let mut sup = supervisor(config.clone(), healthy_board(&log));
    let mut sink = RecordingSink::default();

    let report = sup.run_cycle(&mut sink);

    assert!(report.success);
    assert!(report.network_up);
    assert_eq!(report.published, Some(Sample::new(21.5, 48.0)));
    assert_eq!(report.next, NextStep::Sleep(config.sample_interval()));

    let sensor = sup.transport().published_on(&config.sensor_topic);
    assert_eq!(sensor.len(), 1);
    assert_eq!(sensor[0]["created_at"], FIXED_TIMESTAMP);
    assert_eq!(sensor[0]["temperature"], 21.5);
    assert_eq!(sensor[0]["humidity"], 48.0);

    let device = sup.transport().published_on(&config.device_info_topic);
    assert_eq!(device.len(), 1);
    assert_eq!(device[0]["unique_id"], "0A0B0C0D0E0F");
    assert_eq!(device[0]["ip"], "10.0.0.7");
    assert_eq!(device[0]["total_storage_bytes"], MOCK_FLASH.total);
    assert_eq!(device[0]["used_storage_bytes"], MOCK_FLASH.used());
    assert_eq!(device[0]["free_storage_bytes"], MOCK_FLASH.free);
    assert_eq!(device[0]["storage_usage_percent"], 75.0);
    assert_eq!(device[0]["created_at"], FIXED_TIMESTAMP);

    assert!(!sup.transport().session_open, "session closed after cycle");
    assert_eq!(
        sink.count(|e| matches!(e, SupervisorEvent::ReadingPublished { cycle: 1, .. })),
        1
    );
}

#[test]
fn transport_session_is_opened_and_closed_each_cycle() {
    let log = call_log();
    let mut sup = supervisor(SystemConfig::default(), healthy_board(&log));
    let mut sink = RecordingSink::default();

    sup.run_cycle(&mut sink);
    sup.run_cycle(&mut sink);

    assert_eq!(
        *log.borrow(),
        vec![
            "transport.connect",
            "transport.disconnect",
            "transport.connect",
            "transport.disconnect"
        ]
    );
}

#[test]
fn watchdog_is_fed_throughout_a_cycle() {
    let log = call_log();
    let mut sup = supervisor(SystemConfig::default(), healthy_board(&log));
    let mut sink = RecordingSink::default();

    sup.run_cycle(&mut sink);

    // cycle start, transport connect, sensor attempt, two publishes.
    assert!(sup.watchdog().feeds >= 7, "feeds = {}", sup.watchdog().feeds);
}

// ── Failure paths ─────────────────────────────────────────────

#[test]
fn network_down_takes_fast_retry_and_skips_transport() {
    let log = call_log();
    let config = SystemConfig::default();
    let mut board = healthy_board(&log);
    board.network = MockNetwork::down(&log, Err(ConnectivityError::WifiTimeout));
    let mut sup = supervisor(config.clone(), board);
    let mut sink = RecordingSink::default();

    let report = sup.run_cycle(&mut sink);

    assert!(!report.success);
    assert!(!report.network_up);
    assert_eq!(report.failure, Some(LoopFailure::Wifi(ConnectivityError::WifiTimeout)));
    assert_eq!(report.next, NextStep::Sleep(config.fast_retry_interval()));
    assert_eq!(sup.transport().stats.connects, 0);
    assert_eq!(sup.reader().sensor().measures, 0);
    assert_eq!(sup.tracker().counters(Domain::Wifi).total_failures, 1);
}

#[test]
fn reconnected_network_continues_the_cycle() {
    let log = call_log();
    let mut board = healthy_board(&log);
    board.network = MockNetwork::down(&log, Ok(()));
    let mut sup = supervisor(SystemConfig::default(), board);
    let mut sink = RecordingSink::default();

    let report = sup.run_cycle(&mut sink);

    assert!(report.success);
    assert_eq!(sink.count(|e| matches!(e, SupervisorEvent::NetworkRestored)), 1);
    let wifi = sup.tracker().counters(Domain::Wifi);
    assert_eq!((wifi.total_failures, wifi.total_successes), (1, 1));
}

#[test]
fn clock_unsynced_at_boot_syncs_once_the_network_returns() {
    let log = call_log();
    let mut board = healthy_board(&log);
    board.clock = FixedClock::unsynced();
    board.network = MockNetwork::down(&log, Ok(()));
    board
        .network
        .connect_script
        .push_back(Err(ConnectivityError::WifiTimeout));
    let mut sup = supervisor(SystemConfig::default(), board);
    let mut sink = RecordingSink::default();

    // Access point still down: nothing to sync against.
    let first = sup.run_cycle(&mut sink);
    assert!(!first.network_up);
    assert_eq!(sup.clock().sync_calls, 0);

    // Link back: sync happens before anything is stamped.
    let second = sup.run_cycle(&mut sink);
    assert!(second.success);
    assert_eq!(sup.clock().sync_calls, 1);
    assert!(sup.clock().synced);
    let readings = sup.transport().published_on("thermonode/sensor");
    assert_eq!(readings[0]["created_at"], FIXED_TIMESTAMP);
    let devices = sup.transport().published_on("thermonode/device_info");
    assert_eq!(devices[0]["created_at"], FIXED_TIMESTAMP);

    sup.run_cycle(&mut sink);
    assert_eq!(sup.clock().sync_calls, 1, "no sync once the clock is set");
}

#[test]
fn synced_clock_is_left_alone() {
    let log = call_log();
    let mut sup = supervisor(SystemConfig::default(), healthy_board(&log));

    sup.run_cycle(&mut RecordingSink::default());

    assert_eq!(sup.clock().sync_calls, 0);
}

#[test]
fn broker_refusal_fails_before_reading_the_sensor() {
    let log = call_log();
    let mut board = healthy_board(&log);
    board.transport.refuse_connects = 1;
    let mut sup = supervisor(SystemConfig::default(), board);
    let mut sink = RecordingSink::default();

    let report = sup.run_cycle(&mut sink);

    assert_eq!(
        report.failure,
        Some(LoopFailure::TransportConnect(ConnectivityError::TransportConnectFailed))
    );
    assert_eq!(sup.reader().sensor().measures, 0);
    assert_eq!(sup.tracker().counters(Domain::Transport).total_failures, 1);
}

#[test]
fn sensor_failure_still_sends_device_record() {
    let log = call_log();
    let config = SystemConfig::default();
    let mut board = healthy_board(&log);
    board.sensor = ScriptedSensor::failing(&log, SensorFault::ChecksumMismatch);
    let mut sup = supervisor(config.clone(), board);
    let mut sink = RecordingSink::default();

    let report = sup.run_cycle(&mut sink);

    assert_eq!(
        report.failure,
        Some(LoopFailure::SensorRead(SensorError::Fault(SensorFault::ChecksumMismatch)))
    );
    assert_eq!(sup.reader().sensor().measures, config.sensor_read_attempts);
    assert!(sup.transport().published_on(&config.sensor_topic).is_empty());
    assert_eq!(sup.transport().published_on(&config.device_info_topic).len(), 1);
    assert_eq!(
        sup.delay().sleeps,
        vec![config.sensor_retry_delay(); (config.sensor_read_attempts - 1) as usize]
    );
    assert_eq!(
        sink.count(|e| matches!(
            e,
            SupervisorEvent::CycleFailed { consecutive: 1, limit: 5, .. }
        )),
        1
    );
}

#[test]
fn rejected_publish_fails_the_cycle() {
    let log = call_log();
    let mut board = healthy_board(&log);
    board.transport.fail_publishes = 1;
    let mut sup = supervisor(SystemConfig::default(), board);
    let mut sink = RecordingSink::default();

    let report = sup.run_cycle(&mut sink);

    assert_eq!(report.failure, Some(LoopFailure::Publish(ConnectivityError::PublishFailed)));
    assert_eq!(report.published, None);
    assert_eq!(sup.tracker().counters(Domain::Transport).total_failures, 1);
}

// ── Escalation ────────────────────────────────────────────────

#[test]
fn five_failed_cycles_escalate_exactly_once() {
    let log = call_log();
    let config = SystemConfig::default();
    let mut board = healthy_board(&log);
    board.sensor = ScriptedSensor::failing(&log, SensorFault::Timeout);
    let mut sup = supervisor(config.clone(), board);
    let mut sink = RecordingSink::default();

    let exit = sup.run(&mut sink);

    assert_eq!(
        exit,
        LoopExit::Restart(FatalCondition { consecutive_failures: 5, threshold: 5 })
    );
    assert_eq!(sup.cycles(), 5);
    assert_eq!(sink.count(|e| matches!(e, SupervisorEvent::RestartEscalation(_))), 1);
    assert_eq!(sink.count(|e| matches!(e, SupervisorEvent::CycleFailed { .. })), 5);
    assert_eq!(sup.delay().sleeps.last(), Some(&config.restart_grace()));
    assert!(matches!(sink.events.last(), Some(SupervisorEvent::Stopped { cycles: 5 })));
}

#[test]
fn escalation_latches_until_a_cycle_succeeds() {
    let log = call_log();
    let mut board = healthy_board(&log);
    let mut script: Vec<Result<Sample, SensorFault>> = Vec::new();
    // Seven failed cycles, three attempts each, then good readings.
    script.extend(std::iter::repeat(Err(SensorFault::Timeout)).take(21));
    board.sensor = ScriptedSensor::scripted(&log, script);
    board.sensor.fallback = Ok(Sample::new(20.0, 50.0));
    let mut sup = supervisor(SystemConfig::default(), board);
    let mut sink = RecordingSink::default();

    let restarts: Vec<u64> = (0..7)
        .map(|_| sup.run_cycle(&mut sink))
        .filter(|r| matches!(r.next, NextStep::Restart(_)))
        .map(|r| r.cycle)
        .collect();
    assert_eq!(restarts, vec![5]);

    assert!(sup.run_cycle(&mut sink).success);
    assert_eq!(sup.tracker().consecutive_failures(Domain::Loop), 0);
    assert_eq!(sup.tracker().max_consecutive_failures(Domain::Loop), 7);
}

// ── Sleep and stop ────────────────────────────────────────────

#[test]
fn sleep_is_chunked_to_the_feed_interval() {
    let log = call_log();
    let config = SystemConfig::default();
    let stop = StopSignal::new();
    let mut board = healthy_board(&log);
    // 300 s in 7 s chunks: 42 full chunks plus a 6 s remainder.
    board.delay.stop_after = Some((43, stop.clone()));
    let mut sup = SupervisoryLoop::new(config.clone(), board, stop);
    let mut sink = RecordingSink::default();

    let exit = sup.run(&mut sink);

    assert_eq!(exit, LoopExit::Interrupted);
    assert_eq!(sup.cycles(), 1);
    let sleeps = &sup.delay().sleeps;
    assert_eq!(sleeps.len(), 43);
    assert!(sleeps.iter().all(|d| *d <= config.watchdog_feed_interval()));
    assert_eq!(sup.delay().total(), config.sample_interval());
    assert!(sup.watchdog().feeds >= 43);
}

#[test]
fn zero_feed_interval_still_finishes_the_sleep() {
    let log = call_log();
    let config = SystemConfig {
        watchdog_feed_interval_ms: 0,
        sample_interval_secs: 1,
        ..SystemConfig::default()
    };
    let stop = StopSignal::new();
    let mut board = healthy_board(&log);
    board.delay.stop_after = Some((1_000, stop.clone()));
    let mut sup = SupervisoryLoop::new(config, board, stop);

    let exit = sup.run(&mut RecordingSink::default());

    assert_eq!(exit, LoopExit::Interrupted);
    let sleeps = &sup.delay().sleeps;
    assert_eq!(sleeps.len(), 1_000);
    assert!(sleeps.iter().all(|d| *d == Duration::from_millis(1)));
    assert_eq!(sup.delay().total(), Duration::from_secs(1));
}

#[test]
fn stop_before_first_cycle_releases_in_reverse_order() {
    let log = call_log();
    let stop = StopSignal::new();
    stop.raise();
    let mut sup = SupervisoryLoop::new(SystemConfig::default(), healthy_board(&log), stop);
    let mut sink = RecordingSink::default();

    assert_eq!(sup.run(&mut sink), LoopExit::Interrupted);
    assert_eq!(sup.cycles(), 0);
    assert_eq!(
        *log.borrow(),
        vec!["transport.disconnect", "sensor.release", "network.disconnect"]
    );

    drop(sup);
    assert_eq!(log.borrow().len(), 3, "release runs once");

    assert!(matches!(sink.events.first(), Some(SupervisorEvent::Started { watchdog_enabled: false })));
    assert!(matches!(sink.events.get(1), Some(SupervisorEvent::Summary(_))));
    assert!(matches!(sink.events.last(), Some(SupervisorEvent::Stopped { cycles: 0 })));
}

#[test]
fn dropping_an_unstarted_loop_releases_collaborators() {
    let log = call_log();
    let sup = supervisor(SystemConfig::default(), healthy_board(&log));
    drop(sup);
    assert_eq!(
        *log.borrow(),
        vec!["transport.disconnect", "sensor.release", "network.disconnect"]
    );
}

// ── Summaries and health ──────────────────────────────────────

#[test]
fn periodic_summary_reports_low_memory() {
    let log = call_log();
    let mut config = SystemConfig::default();
    config.summary_interval_cycles = 2;
    let mut board = healthy_board(&log);
    board.system.free = 4 * 1024;
    let mut sup = supervisor(config, board);
    let mut sink = RecordingSink::default();

    sup.run_cycle(&mut sink);
    assert_eq!(sink.count(|e| matches!(e, SupervisorEvent::Summary(_))), 0);
    sup.run_cycle(&mut sink);

    let summary = sink.events.iter().find_map(|e| match e {
        SupervisorEvent::Summary(r) => Some(r.clone()),
        _ => None,
    });
    let summary = summary.expect("summary after two cycles");
    assert_eq!(summary.cycles, 2);
    assert_eq!(summary.loops.total_successes, 2);
    assert_eq!(summary.uptime_secs, 3_725);
    assert_eq!(summary.transport_stats.publishes, 4);
    assert_eq!(summary.memory.min_free, Some(4 * 1024));
    assert_eq!(summary.storage, MOCK_FLASH);

    let health = sink.events.iter().find_map(|e| match e {
        SupervisorEvent::HealthDegraded(h) => Some(h.clone()),
        _ => None,
    });
    let health = health.expect("low memory is unhealthy");
    assert_eq!(
        health.issues.as_slice(),
        &[HealthIssue::LowMemory { free_bytes: 4 * 1024 }]
    );
}

#[test]
fn healthy_summary_raises_no_health_event() {
    let log = call_log();
    let mut config = SystemConfig::default();
    config.summary_interval_cycles = 1;
    let mut sup = supervisor(config, healthy_board(&log));
    let mut sink = RecordingSink::default();

    sup.run_cycle(&mut sink);

    assert_eq!(sink.count(|e| matches!(e, SupervisorEvent::Summary(_))), 1);
    assert_eq!(sink.count(|e| matches!(e, SupervisorEvent::HealthDegraded(_))), 0);
}

// ── Anomaly filtering through the loop ────────────────────────

#[test]
fn spike_is_held_at_the_previous_value() {
    let log = call_log();
    let config = SystemConfig::default();
    let mut board = healthy_board(&log);
    board.sensor = ScriptedSensor::scripted(
        &log,
        vec![Ok(Sample::new(20.0, 50.0)), Ok(Sample::new(30.0, 50.0))],
    );
    let mut sup = supervisor(config.clone(), board);
    let mut sink = RecordingSink::default();

    sup.run_cycle(&mut sink);
    let second = sup.run_cycle(&mut sink);

    assert_eq!(second.published, Some(Sample::new(20.0, 50.0)));
    let temps: Vec<f64> = sup
        .transport()
        .published_on(&config.sensor_topic)
        .iter()
        .map(|v| v["temperature"].as_f64().unwrap())
        .collect();
    assert_eq!(temps, vec![20.0, 20.0]);
    assert_eq!(sup.reader().statistics().anomalies, 1);
}

#[test]
fn fatal_condition_waits_out_the_grace_period() {
    let log = call_log();
    let mut config = SystemConfig::default();
    config.max_consecutive_errors = 1;
    config.restart_grace_ms = 500;
    let mut board = healthy_board(&log);
    board.transport.refuse_connects = u32::MAX;
    let mut sup = supervisor(config, board);
    let mut sink = RecordingSink::default();

    let exit = sup.run(&mut sink);

    assert_eq!(
        exit,
        LoopExit::Restart(FatalCondition { consecutive_failures: 1, threshold: 1 })
    );
    assert_eq!(sup.delay().sleeps, vec![Duration::from_millis(500)]);
}
