//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by turning supervisor events into log lines on
//! the serial console and, when a [`RotatingLogFile`] is attached, mirroring
//! the same lines into flash storage.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::app::events::SupervisorEvent;
use crate::app::ports::EventSink;

const TRIM_MARKER: &str = "--- log trimmed, oldest entries dropped ---";

/// Append-only text log that drops its oldest half once it outgrows
/// `max_bytes`.
pub struct RotatingLogFile {
    path: PathBuf,
    max_bytes: u64,
    trims: u32,
}

impl RotatingLogFile {
    pub fn new(path: impl Into<PathBuf>, max_bytes: u32) -> Self {
        Self {
            path: path.into(),
            max_bytes: u64::from(max_bytes),
            trims: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How many times the file has been trimmed.
    pub fn trims(&self) -> u32 {
        self.trims
    }

    /// Append one line, trimming first when the file is over size.  A file
    /// that cannot be trimmed is started over so logging never stalls.
    pub fn append(&mut self, line: &str) -> io::Result<()> {
        let size = match fs::metadata(&self.path) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };
        if size > self.max_bytes {
            if let Err(e) = self.trim() {
                warn!("LogFile: trim of {} failed ({}), truncating", self.path.display(), e);
                fs::write(&self.path, format!("{TRIM_MARKER}\n"))?;
                self.trims += 1;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)
    }

    /// Keep the newest half of the lines, headed by a marker line.
    ///
    /// Works on raw bytes: a reset in the middle of a write can leave a
    /// torn multi-byte character, which is replaced rather than rejected.
    pub fn trim(&mut self) -> io::Result<()> {
        let contents = fs::read(&self.path)?;
        let lines: Vec<&[u8]> = contents
            .split(|b| *b == b'\n')
            .filter(|l| !l.is_empty())
            .collect();
        let keep_from = lines.len() / 2;

        let mut out = Vec::with_capacity(contents.len() / 2 + TRIM_MARKER.len() + 1);
        out.extend_from_slice(TRIM_MARKER.as_bytes());
        out.push(b'\n');
        for line in &lines[keep_from..] {
            out.extend_from_slice(String::from_utf8_lossy(line).as_bytes());
            out.push(b'\n');
        }
        fs::write(&self.path, out)?;

        self.trims += 1;
        info!(
            "LogFile: trimmed {} to {} lines",
            self.path.display(),
            lines.len() - keep_from
        );
        Ok(())
    }
}

/// Make the directory holding `log_path` writable.  On hardware this
/// mounts the SPIFFS partition at that directory; failure means the sink
/// runs console-only.
#[cfg(target_os = "espidf")]
pub fn mount_log_partition(log_path: &str) -> bool {
    use esp_idf_svc::sys::{
        ESP_ERR_INVALID_STATE, ESP_OK, esp_vfs_spiffs_conf_t, esp_vfs_spiffs_register,
    };

    let Some(base) = Path::new(log_path).parent().and_then(Path::to_str) else {
        return false;
    };
    let Ok(base_path) = std::ffi::CString::new(base) else {
        return false;
    };
    let conf = esp_vfs_spiffs_conf_t {
        base_path: base_path.as_ptr(),
        partition_label: core::ptr::null(),
        max_files: 2,
        format_if_mount_failed: true,
    };
    // SAFETY: the driver copies `base_path` before returning.
    let ret = unsafe { esp_vfs_spiffs_register(&conf) };
    if ret == ESP_OK || ret == ESP_ERR_INVALID_STATE {
        info!("LogFile: partition mounted at {}", base);
        true
    } else {
        warn!("LogFile: SPIFFS mount at {} failed ({})", base, ret);
        false
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn mount_log_partition(log_path: &str) -> bool {
    match Path::new(log_path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir).is_ok(),
        _ => true,
    }
}

/// Adapter that logs every [`SupervisorEvent`] to the serial console and,
/// optionally, to a log file.
#[derive(Default)]
pub struct LogEventSink {
    file: Option<RotatingLogFile>,
    write_errors: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(file: RotatingLogFile) -> Self {
        Self {
            file: Some(file),
            write_errors: 0,
        }
    }

    pub fn file(&self) -> Option<&RotatingLogFile> {
        self.file.as_ref()
    }

    pub fn write_errors(&self) -> u32 {
        self.write_errors
    }

    fn mirror(&mut self, line: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        if let Err(e) = file.append(line) {
            self.write_errors += 1;
            // Only the first failure is worth a console line.
            if self.write_errors == 1 {
                warn!("LogFile: write to {} failed: {}", file.path().display(), e);
            }
        }
    }
}

/// One log line per event.
pub fn render(event: &SupervisorEvent) -> String {
    match event {
        SupervisorEvent::Started { watchdog_enabled } => {
            format!("START | watchdog={}", if *watchdog_enabled { "on" } else { "off" })
        }
        SupervisorEvent::ReadingPublished { cycle, sample } => format!(
            "READING | cycle={} | T={:.1}\u{00b0}C ({:.1}\u{00b0}F) | RH={:.1}%",
            cycle,
            sample.temperature,
            sample.temperature_fahrenheit(),
            sample.humidity,
        ),
        SupervisorEvent::CycleFailed { cycle, failure, consecutive, limit } => format!(
            "FAIL | cycle={} | {} | consecutive={}/{}",
            cycle, failure, consecutive, limit
        ),
        SupervisorEvent::NetworkRestored => "NET | wifi restored".to_string(),
        SupervisorEvent::Summary(report) => format!("SUMMARY | {}", report.summary()),
        SupervisorEvent::HealthDegraded(report) => {
            let issues: Vec<String> = report.issues.iter().map(|i| i.to_string()).collect();
            format!("HEALTH | degraded | {}", issues.join("; "))
        }
        SupervisorEvent::RestartEscalation(fatal) => format!("RESTART | {}", fatal),
        SupervisorEvent::Stopped { cycles } => format!("STOP | after {} cycles", cycles),
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &SupervisorEvent) {
        let line = render(event);
        match event {
            SupervisorEvent::CycleFailed { .. } | SupervisorEvent::HealthDegraded(_) => {
                warn!("{}", line)
            }
            SupervisorEvent::RestartEscalation(_) => error!("{}", line),
            SupervisorEvent::Summary(report) => {
                info!("{}", line);
                for detail in report.to_string().lines() {
                    info!("  {}", detail);
                }
            }
            _ => info!("{}", line),
        }
        self.mirror(&line);
    }
}
