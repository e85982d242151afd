//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API so the chip resets if the supervisory loop
//! stalls for longer than the configured timeout.  When the watchdog is
//! disabled in configuration the driver never subscribes and `feed()` only
//! counts.
//!
//! Implements [`KeepAlive`], the capability handed to every blocking call.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

use crate::app::ports::KeepAlive;

pub struct Watchdog {
    enabled: bool,
    timeout_ms: u32,
    feeds: u64,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Watchdog {
    /// Reconfigure the TWDT and subscribe the current task when `enabled`.
    pub fn new(enabled: bool, timeout_ms: u32) -> Self {
        if !enabled {
            info!("Watchdog: disabled by configuration");
        }

        #[cfg(target_os = "espidf")]
        {
            let subscribed = enabled && Self::subscribe(timeout_ms);
            Self {
                enabled,
                timeout_ms,
                feeds: 0,
                subscribed,
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            if enabled {
                info!("Watchdog(sim): {}ms timeout, no-op", timeout_ms);
            }
            Self {
                enabled,
                timeout_ms,
                feeds: 0,
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn subscribe(timeout_ms: u32) -> bool {
        unsafe {
            let cfg = esp_task_wdt_config_t {
                timeout_ms,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            let ret = esp_task_wdt_reconfigure(&cfg);
            if ret != ESP_OK {
                log::warn!(
                    "TWDT reconfigure returned {} (may already be configured)",
                    ret
                );
            }

            let ret = esp_task_wdt_add(core::ptr::null_mut());
            if ret == ESP_OK {
                info!("Watchdog: subscribed ({}ms timeout, panic on trigger)", timeout_ms);
                true
            } else {
                log::warn!("Watchdog: failed to subscribe ({})", ret);
                false
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }
}

impl KeepAlive for Watchdog {
    fn feed(&mut self) {
        self.feeds = self.feeds.wrapping_add(1);

        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }

    fn feeds(&self) -> u64 {
        self.feeds
    }
}

#[cfg(target_os = "espidf")]
impl Drop for Watchdog {
    fn drop(&mut self) {
        if self.subscribed {
            // SAFETY: removes the current task, which subscribed in `new`.
            let ret = unsafe { esp_task_wdt_delete(core::ptr::null_mut()) };
            if ret == ESP_OK {
                info!("Watchdog: unsubscribed");
            }
        }
    }
}
