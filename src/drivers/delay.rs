//! Blocking [`Delay`] for the supervisor.
//!
//! `std::thread::sleep` maps to `vTaskDelay` under ESP-IDF, so the same
//! implementation yields to other FreeRTOS tasks on hardware.

use core::time::Duration;

use crate::app::ports::Delay;

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
