//! DHT22 / AM2302 single-wire temperature and humidity sensor.
//!
//! The bus is one open-drain GPIO.  A read is:
//!
//! ```text
//!   host low ≥1 ms ─ host release ─ sensor low 80 µs ─ sensor high 80 µs
//!   ─ 40 × (low 50 µs, high 26-28 µs = 0 | high 70 µs = 1)
//! ```
//!
//! Bits are sampled 35 µs after each rising edge.  The 5-byte frame is
//! humidity ×10 (u16 BE), temperature ×10 (sign in bit 15), checksum.
//!
//! ## Dual-target design
//!
//! Generic over `embedded-hal` 1.0 pin and delay traits, so the same code
//! drives an ESP-IDF `PinDriver` on hardware and mock pins in tests.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use super::Sample;
use crate::app::ports::SensorPort;
use crate::error::SensorFault;

const START_LOW_MS: u32 = 2;
const RELEASE_US: u32 = 30;
const RESPONSE_TIMEOUT_US: u32 = 100;
const BIT_SAMPLE_US: u32 = 35;
const FRAME_LEN: usize = 5;

/// Decode a raw 5-byte frame into a sample.
pub fn decode_frame(frame: [u8; FRAME_LEN]) -> Result<Sample, SensorFault> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return Err(SensorFault::ChecksumMismatch);
    }

    let humidity = f32::from(u16::from_be_bytes([frame[0], frame[1]])) / 10.0;
    let magnitude = f32::from(u16::from_be_bytes([frame[2] & 0x7F, frame[3]])) / 10.0;
    let temperature = if frame[2] & 0x80 != 0 { -magnitude } else { magnitude };

    Ok(Sample::new(temperature, humidity))
}

pub struct Dht22<P, D> {
    pin: P,
    delay: D,
    released: bool,
}

impl<P, D> Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    /// The pin must be configured open-drain with a pull-up.
    pub fn new(mut pin: P, delay: D) -> Self {
        let _ = pin.set_high();
        Self { pin, delay, released: false }
    }

    fn read_frame(&mut self) -> Result<[u8; FRAME_LEN], SensorFault> {
        self.pin.set_low().map_err(|_| SensorFault::PinIo)?;
        self.delay.delay_ms(START_LOW_MS);
        self.pin.set_high().map_err(|_| SensorFault::PinIo)?;
        self.delay.delay_us(RELEASE_US);

        // Response: low 80 µs, high 80 µs, then the first bit's low phase.
        self.wait_for(false)?;
        self.wait_for(true)?;
        self.wait_for(false)?;

        let mut frame = [0u8; FRAME_LEN];
        for byte in &mut frame {
            for _ in 0..8 {
                self.wait_for(true)?;
                self.delay.delay_us(BIT_SAMPLE_US);
                let one = self.pin.is_high().map_err(|_| SensorFault::PinIo)?;
                *byte = (*byte << 1) | u8::from(one);
                if one {
                    self.wait_for(false)?;
                }
            }
        }
        Ok(frame)
    }

    fn wait_for(&mut self, high: bool) -> Result<(), SensorFault> {
        for _ in 0..RESPONSE_TIMEOUT_US {
            if self.pin.is_high().map_err(|_| SensorFault::PinIo)? == high {
                return Ok(());
            }
            self.delay.delay_us(1);
        }
        Err(SensorFault::Timeout)
    }
}

impl<P, D> SensorPort for Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    fn measure(&mut self) -> Result<Sample, SensorFault> {
        if self.released {
            return Err(SensorFault::Released);
        }
        let frame = self.read_frame()?;
        decode_frame(frame)
    }

    fn release(&mut self) {
        let _ = self.pin.set_high();
        self.released = true;
    }
}
