//! Runtime diagnostics: the periodic status report and the panic hook.
//!
//! The supervisor builds a [`StatusReport`] every `summary_interval_cycles`
//! and on exit.  Reports carry loop/link/sensor counters, heap watermarks
//! and watchdog feeds; adapters render them as log lines.

use core::fmt::{self, Write as _};

use serde::Serialize;

use crate::app::payload::StorageSnapshot;
use crate::app::ports::TransportStats;
use crate::health::{Domain, FailureCounters};
use crate::sensors::reader::SensorStats;

/// `93784` → `"1d 2h 3m 4s"`.  Zero units are left out; zero seconds reads
/// `"0s"`.
pub fn format_uptime(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::new();
    for (value, unit) in [(days, 'd'), (hours, 'h'), (minutes, 'm')] {
        if value > 0 {
            let _ = write!(out, "{value}{unit} ");
        }
    }
    if seconds > 0 || out.is_empty() {
        let _ = write!(out, "{seconds}s");
    }
    out.trim_end().to_string()
}

/// Lowest and highest free heap seen since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryWatermark {
    pub min_free: Option<u32>,
    pub max_free: Option<u32>,
}

impl MemoryWatermark {
    pub fn observe(&mut self, free: u32) {
        self.min_free = Some(self.min_free.map_or(free, |m| m.min(free)));
        self.max_free = Some(self.max_free.map_or(free, |m| m.max(free)));
    }
}

/// Aggregate statistics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub cycles: u64,
    pub uptime_secs: u64,
    pub wifi: FailureCounters,
    pub transport: FailureCounters,
    pub sensor: FailureCounters,
    pub loops: FailureCounters,
    pub sensor_stats: SensorStats,
    pub transport_stats: TransportStats,
    pub free_memory_bytes: u32,
    pub memory: MemoryWatermark,
    pub storage: StorageSnapshot,
    pub watchdog_feeds: u64,
}

impl StatusReport {
    pub fn counters(&self, domain: Domain) -> &FailureCounters {
        match domain {
            Domain::Wifi => &self.wifi,
            Domain::Transport => &self.transport,
            Domain::Sensor => &self.sensor,
            Domain::Loop => &self.loops,
        }
    }

    /// One-line form for routine summaries.
    pub fn summary(&self) -> String {
        format!(
            "uptime {} | cycles {} ({:.1}% ok) | free heap {} KB | consecutive failures {}",
            format_uptime(self.uptime_secs),
            self.cycles,
            self.loops.success_rate(),
            self.free_memory_bytes / 1024,
            self.loops.consecutive,
        )
    }
}

/// Multi-line detailed form.
impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "uptime: {} ({}s)", format_uptime(self.uptime_secs), self.uptime_secs)?;
        writeln!(
            f,
            "loops: {} ok / {} failed ({:.1}%), consecutive {}, worst streak {}",
            self.loops.total_successes,
            self.loops.total_failures,
            self.loops.success_rate(),
            self.loops.consecutive,
            self.loops.max_consecutive,
        )?;
        for domain in [Domain::Wifi, Domain::Transport, Domain::Sensor] {
            let c = self.counters(domain);
            writeln!(
                f,
                "{}: {} ok / {} failed ({:.1}%)",
                domain.name(),
                c.total_successes,
                c.total_failures,
                c.success_rate(),
            )?;
        }
        writeln!(
            f,
            "mqtt client: {} connects, {} publishes, {} errors",
            self.transport_stats.connects, self.transport_stats.publishes, self.transport_stats.errors,
        )?;
        writeln!(
            f,
            "sensor reader: {} reads, {} errors, {} anomalies ({:.1}%)",
            self.sensor_stats.total_reads,
            self.sensor_stats.errors,
            self.sensor_stats.anomalies,
            self.sensor_stats.success_rate,
        )?;
        writeln!(
            f,
            "heap: {} KB free (min {} KB, max {} KB)",
            self.free_memory_bytes / 1024,
            self.memory.min_free.unwrap_or(0) / 1024,
            self.memory.max_free.unwrap_or(0) / 1024,
        )?;
        writeln!(
            f,
            "storage: {} KB used of {} KB ({:.1}%)",
            self.storage.used() / 1024,
            self.storage.total / 1024,
            self.storage.usage_percent(),
        )?;
        write!(f, "watchdog feeds: {}", self.watchdog_feeds)
    }
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Install a panic hook that logs the reason (and uptime on hardware)
/// before the default handler aborts and the chip resets.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();

        log::error!("PANIC: {} at {}", reason, location);

        #[cfg(target_os = "espidf")]
        {
            // SAFETY: esp_timer_get_time reads the RTC counter; no allocation.
            let uptime = (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000_000;
            log::error!("PANIC after {}", format_uptime(uptime));
        }
    }));
}
