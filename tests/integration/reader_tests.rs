//! SensorReader retry and filtering behaviour through the public API.

use std::time::Duration;

use thermonode::error::{SensorError, SensorFault};
use thermonode::sensors::Sample;
use thermonode::sensors::anomaly::AnomalyFilter;
use thermonode::sensors::reader::{ReadOutcome, SensorReader};

use crate::mock_hw::*;

const RETRY: Duration = Duration::from_secs(2);

fn reader(sensor: ScriptedSensor) -> SensorReader<ScriptedSensor, MockIndicator> {
    SensorReader::new(sensor, MockIndicator::default(), AnomalyFilter::new(3.0, 3))
}

#[test]
fn two_failures_then_success_within_three_attempts() {
    let log = call_log();
    let mut r = reader(ScriptedSensor::scripted(
        &log,
        vec![
            Err(SensorFault::Timeout),
            Err(SensorFault::ChecksumMismatch),
            Ok(Sample::new(22.4, 41.0)),
        ],
    ));
    let mut delay = RecordingDelay::default();
    let mut wd = CountingWatchdog::default();

    let out = r.read(3, RETRY, &mut delay, &mut wd);

    assert_eq!(out, ReadOutcome::Accepted(Sample::new(22.4, 41.0)));
    let stats = r.statistics();
    assert_eq!(stats.errors, 2);
    assert_eq!(stats.total_reads, 1);
    assert_eq!(delay.sleeps, vec![RETRY, RETRY]);
    assert_eq!(wd.feeds, 3, "one feed per attempt");
    // Cleared before each attempt, lit after the good one.
    assert_eq!(r.indicator().states, vec![false, false, false, true]);
}

#[test]
fn always_failing_sensor_uses_every_attempt() {
    let log = call_log();
    let mut r = reader(ScriptedSensor::failing(&log, SensorFault::PinIo));
    let mut delay = RecordingDelay::default();
    let mut wd = CountingWatchdog::default();

    let out = r.read(4, RETRY, &mut delay, &mut wd);

    assert_eq!(out, ReadOutcome::Failed(SensorError::Fault(SensorFault::PinIo)));
    assert_eq!(r.sensor().measures, 4);
    assert_eq!(delay.sleeps, vec![RETRY; 3]);
    assert!(!r.indicator().states.contains(&true));
    assert!(r.last_reading().is_none());
}

#[test]
fn out_of_range_reading_is_a_validation_failure() {
    let log = call_log();
    let mut r = reader(ScriptedSensor::scripted(&log, vec![Ok(Sample::new(20.0, 140.0))]));

    let out = r.read(1, RETRY, &mut RecordingDelay::default(), &mut CountingWatchdog::default());

    assert!(matches!(out, ReadOutcome::Failed(SensorError::Validation(_))));
    assert!(r.filter().last_accepted().is_none(), "rejected input never reaches the filter");
}

#[test]
fn filter_sequence_holds_spikes_then_accepts_a_sustained_shift() {
    let log = call_log();
    let inputs = [(20.0, 50.0), (25.0, 50.0), (25.5, 50.0), (26.0, 50.0), (26.5, 50.0)];
    let mut r = reader(ScriptedSensor::scripted(
        &log,
        inputs.iter().map(|&(t, h)| Ok(Sample::new(t, h))).collect(),
    ));
    let mut delay = RecordingDelay::default();
    let mut wd = CountingWatchdog::default();

    let outputs: Vec<(f32, f32)> = inputs
        .iter()
        .map(|_| {
            let s = r.read(1, RETRY, &mut delay, &mut wd).sample().unwrap();
            (s.temperature, s.humidity)
        })
        .collect();

    assert_eq!(
        outputs,
        vec![(20.0, 50.0), (20.0, 50.0), (20.0, 50.0), (20.0, 50.0), (26.5, 50.0)]
    );
    let stats = r.statistics();
    assert_eq!(stats.anomalies, 4);
    assert_eq!(stats.consecutive_anomalies, 0);
    assert_eq!(r.last_reading().map(|l| l.sample), Some(Sample::new(26.5, 50.0)));
}

#[test]
fn statistics_reset_keeps_the_reference_sample() {
    let log = call_log();
    let mut r = reader(ScriptedSensor::scripted(
        &log,
        vec![Ok(Sample::new(20.0, 50.0)), Err(SensorFault::Timeout), Ok(Sample::new(35.0, 50.0))],
    ));
    let mut delay = RecordingDelay::default();
    let mut wd = CountingWatchdog::default();

    r.read(1, RETRY, &mut delay, &mut wd);
    r.read(2, RETRY, &mut delay, &mut wd);
    assert!(r.statistics().errors > 0);

    r.reset_statistics();
    let stats = r.statistics();
    assert_eq!((stats.total_reads, stats.errors, stats.anomalies), (0, 0, 0));
    assert_eq!(stats.success_rate, 0.0);
    assert_eq!(r.filter().last_accepted(), Some(Sample::new(20.0, 50.0)));
}

#[test]
fn released_sensor_stops_producing_samples() {
    let log = call_log();
    let mut r = reader(ScriptedSensor::steady(&log, Sample::new(20.0, 50.0)));

    r.release();

    let out = r.read(1, RETRY, &mut RecordingDelay::default(), &mut CountingWatchdog::default());
    assert_eq!(out, ReadOutcome::Failed(SensorError::Fault(SensorFault::Released)));
    assert_eq!(*log.borrow(), vec!["sensor.release"]);
    assert_eq!(r.indicator().states.first(), Some(&false));
}
