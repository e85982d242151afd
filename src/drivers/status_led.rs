//! Single-colour status LED.
//!
//! Cleared at the start of every sensor attempt and lit after a good one,
//! so a glance at the board shows whether reads are landing.
//!
//! Generic over an `embedded-hal` output pin: an ESP-IDF `PinDriver` on
//! hardware, a recording mock in tests.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::IndicatorPort;

pub struct StatusLed<P: OutputPin> {
    pin: P,
    lit: bool,
}

impl<P: OutputPin> StatusLed<P> {
    pub fn new(mut pin: P) -> Self {
        let _ = pin.set_low();
        Self { pin, lit: false }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

impl<P: OutputPin> IndicatorPort for StatusLed<P> {
    fn set(&mut self, on: bool) {
        let result = if on { self.pin.set_high() } else { self.pin.set_low() };
        match result {
            Ok(()) => self.lit = on,
            Err(_) => warn!("StatusLed: pin write failed"),
        }
    }
}
