//! Fuzz target: `dht22::decode_frame`
//!
//! Invariants checked:
//! - No panics under any 5-byte frame
//! - A frame decodes only when its checksum byte matches
//! - Decoded values stay inside the 16-bit tenths range of the wire format
//!
//! cargo fuzz run fuzz_dht_frame

#![no_main]

use libfuzzer_sys::fuzz_target;
use thermonode::sensors::dht22::decode_frame;

fuzz_target!(|data: [u8; 5]| {
    let sum = data[..4].iter().fold(0u8, |a, b| a.wrapping_add(*b));
    match decode_frame(data) {
        Ok(sample) => {
            assert_eq!(sum, data[4]);
            assert!(sample.humidity >= 0.0 && sample.humidity <= 6553.5);
            assert!(sample.temperature.abs() <= 3276.7);
        }
        Err(_) => assert_ne!(sum, data[4]),
    }
});
