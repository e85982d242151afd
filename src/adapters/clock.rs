//! Wall clock and uptime.
//!
//! Implements [`ClockPort`].  Timestamps are rendered with `chrono` in a
//! fixed timezone offset taken from configuration; there is no DST.
//!
//! - **`target_os = "espidf"`**: uptime from `esp_timer_get_time()`, wall
//!   time from the system clock once SNTP has synced.
//! - **all other targets**: `std::time::Instant` and the host clock.

use core::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use log::{info, warn};

use crate::app::ports::{ClockPort, KeepAlive};

/// Anything earlier means the clock was never set.
const EPOCH_2020: i64 = 1_577_836_800;

const SYNC_POLL: Duration = Duration::from_millis(500);

/// Render `unix_secs` as `YYYY-MM-DDTHH:MM:SS±HH:MM` in `offset`.
pub fn format_iso8601(unix_secs: i64, offset: FixedOffset) -> String {
    let utc = DateTime::<Utc>::from_timestamp(unix_secs, 0).unwrap_or_default();
    utc.with_timezone(&offset)
        .format("%Y-%m-%dT%H:%M:%S%:z")
        .to_string()
}

/// Out-of-range offsets fall back to UTC.
pub fn offset_from_secs(secs: i32) -> FixedOffset {
    FixedOffset::east_opt(secs).unwrap_or_else(|| {
        warn!("Clock: timezone offset {}s out of range, using UTC", secs);
        Utc.fix()
    })
}

pub struct Clock {
    offset: FixedOffset,
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(target_os = "espidf")]
    sntp: Option<esp_idf_svc::sntp::EspSntp<'static>>,
}

impl Clock {
    pub fn new(offset_secs: i32) -> Self {
        Self {
            offset: offset_from_secs(offset_secs),
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(target_os = "espidf")]
            sntp: None,
        }
    }

    pub fn unix_secs(&self) -> i64 {
        Utc::now().timestamp()
    }

    #[cfg(target_os = "espidf")]
    fn sntp_completed(&mut self) -> bool {
        use esp_idf_svc::sntp::{EspSntp, SyncStatus};

        if self.sntp.is_none() {
            match EspSntp::new_default() {
                Ok(s) => self.sntp = Some(s),
                Err(e) => {
                    warn!("Clock: SNTP start failed: {:?}", e);
                    return false;
                }
            }
        }
        self.sntp
            .as_ref()
            .is_some_and(|s| s.get_sync_status() == SyncStatus::Completed)
    }

    /// The host clock needs no sync.
    #[cfg(not(target_os = "espidf"))]
    fn sntp_completed(&mut self) -> bool {
        true
    }
}

impl ClockPort for Clock {
    fn now_iso8601(&self) -> String {
        format_iso8601(self.unix_secs(), self.offset)
    }

    #[cfg(target_os = "espidf")]
    fn uptime_secs(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    /// `true` once the wall clock holds a plausible date.
    fn is_synced(&self) -> bool {
        self.unix_secs() >= EPOCH_2020
    }

    /// SNTP is started once and keeps running in the background; later
    /// calls only wait for it.  On timeout the device keeps running on the
    /// unsynced system clock.
    fn sync(&mut self, timeout: Duration, keepalive: &mut dyn KeepAlive) -> bool {
        let started = std::time::Instant::now();
        let synced = loop {
            if self.sntp_completed() && self.is_synced() {
                break true;
            }
            if started.elapsed() >= timeout {
                break false;
            }
            keepalive.feed();
            std::thread::sleep(SYNC_POLL.min(timeout));
        };

        if synced {
            info!("Clock: synced, now {}", self.now_iso8601());
        } else {
            warn!("Clock: time sync timed out after {:?}, continuing with system clock", timeout);
        }
        synced
    }
}
