//! On-board peripherals: watchdog, status LED, stop button, sleep and
//! restart.

pub mod delay;
pub mod reset;
pub mod status_led;
pub mod stop_button;
pub mod watchdog;
