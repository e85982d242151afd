//! Device restart after a restart escalation.
//!
//! With the watchdog enabled the loop simply stops feeding it and waits for
//! the hardware reset.  A software restart fires as a backstop once twice
//! the watchdog timeout has passed without one.  With the watchdog disabled
//! the device restarts immediately.

use core::time::Duration;

use log::{error, warn};

use crate::config::SystemConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPlan {
    /// Stop feeding and wait; restart in software after `backstop`.
    AwaitWatchdog { backstop: Duration },
    Immediate,
}

impl RestartPlan {
    pub fn for_config(config: &SystemConfig) -> Self {
        if config.watchdog_enabled {
            Self::AwaitWatchdog {
                backstop: config.watchdog_timeout() * 2,
            }
        } else {
            Self::Immediate
        }
    }
}

/// Carry out `plan`.  Never returns.
pub fn execute(plan: RestartPlan) -> ! {
    match plan {
        RestartPlan::AwaitWatchdog { backstop } => {
            warn!("Reset: no longer feeding watchdog, waiting up to {:?}", backstop);
            std::thread::sleep(backstop);
            error!("Reset: watchdog did not fire, restarting in software");
        }
        RestartPlan::Immediate => {
            warn!("Reset: restarting now");
        }
    }
    restart_device()
}

#[cfg(target_os = "espidf")]
fn restart_device() -> ! {
    esp_idf_svc::hal::reset::restart()
}

#[cfg(not(target_os = "espidf"))]
fn restart_device() -> ! {
    warn!("Reset(sim): exiting process");
    std::process::exit(1)
}
