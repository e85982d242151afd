//! Fuzz target: `AnomalyFilter::evaluate`
//!
//! Feeds arbitrary sample sequences (including NaN and infinities) through
//! the filter.
//!
//! Invariants checked:
//! - No panics
//! - A rejected sample returns the previously accepted one unchanged
//! - The anomaly streak never exceeds the configured limit
//!
//! cargo fuzz run fuzz_anomaly_filter

#![no_main]

use libfuzzer_sys::fuzz_target;
use thermonode::sensors::Sample;
use thermonode::sensors::anomaly::AnomalyFilter;

fn bits(s: Option<Sample>) -> Option<(u32, u32)> {
    s.map(|s| (s.temperature.to_bits(), s.humidity.to_bits()))
}

fuzz_target!(|input: (u8, Vec<(f32, f32)>)| {
    let (max, readings) = input;
    let max = u32::from(max % 8);
    let mut filter = AnomalyFilter::new(3.0, max);

    for (t, h) in readings {
        let before = filter.last_accepted();
        let verdict = filter.evaluate(Sample::new(t, h));
        if !verdict.accepted {
            assert_eq!(bits(Some(verdict.output)), bits(before));
            assert_eq!(bits(filter.last_accepted()), bits(before));
        }
        assert!(filter.consecutive_anomalies() <= max);
    }
});
