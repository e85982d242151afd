//! Device identity, heap and flash information for the secondary publish.
//!
//! Implements [`SystemInfoPort`].
//!
//! - **`target_os = "espidf"`**: identity from the eFuse factory MAC, heap
//!   figures from `heap_caps_get_info`, low-water mark from
//!   `esp_get_minimum_free_heap_size`, flash from `esp_flash_get_size` and
//!   `esp_spiffs_info`, reset cause from `esp_reset_reason`.
//! - **all other targets**: a fixed MAC and synthetic values with a slow
//!   heap decay so the low-memory paths can be exercised.

use core::fmt::Write as _;

use crate::app::payload::{DeviceInfo, ResetReason, StorageSnapshot};
use crate::app::ports::SystemInfoPort;

const PLATFORM: &str = concat!("esp32-", env!("CARGO_PKG_NAME"));
const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub type MacAddress = [u8; 6];

/// Twelve uppercase hex digits.
pub type UniqueId = heapless::String<16>;

/// Factory MAC burned into eFuse.
#[cfg(target_os = "espidf")]
pub fn factory_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: writes exactly six bytes into `mac`.
    unsafe { esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr()) };
    mac
}

#[cfg(not(target_os = "espidf"))]
pub fn factory_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// The whole factory MAC as hex, stable across reboots and reflashes.
pub fn unique_id(mac: &MacAddress) -> UniqueId {
    let mut id = UniqueId::new();
    for b in mac {
        let _ = write!(id, "{b:02X}");
    }
    id
}

/// MQTT client id used when none is configured: `thermonode-` plus the
/// unique id, 23 characters, the MQTT 3.1 limit.
pub fn default_client_id(mac: &MacAddress) -> heapless::String<32> {
    let mut id = heapless::String::new();
    let _ = write!(id, "{}-{}", env!("CARGO_PKG_NAME"), unique_id(mac));
    id
}

/// Heap totals at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapSnapshot {
    pub total: u32,
    pub free: u32,
    pub min_free: u32,
}

impl HeapSnapshot {
    pub fn used(&self) -> u32 {
        self.total.saturating_sub(self.free)
    }

    pub fn usage_percent(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.used() as f32 / self.total as f32 * 100.0
        }
    }
}

pub struct SystemInfo {
    unique_id: UniqueId,
    reset_reason: ResetReason,
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    /// Simulation: bytes lost per minute of uptime.
    #[cfg(not(target_os = "espidf"))]
    sim_decay_per_min: u32,
}

impl SystemInfo {
    pub fn new() -> Self {
        let unique_id = unique_id(&factory_mac());
        let reset_reason = read_reset_reason();
        log::info!("System: device {} (reset reason {:?})", unique_id, reset_reason);
        Self {
            unique_id,
            reset_reason,
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            sim_decay_per_min: 512,
        }
    }

    pub fn reset_reason(&self) -> ResetReason {
        self.reset_reason
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    #[cfg(target_os = "espidf")]
    pub fn heap(&self) -> HeapSnapshot {
        use esp_idf_svc::sys::{
            MALLOC_CAP_DEFAULT, esp_get_minimum_free_heap_size, heap_caps_get_info,
            multi_heap_info_t,
        };

        let mut info: multi_heap_info_t = unsafe { core::mem::zeroed() };
        // SAFETY: heap_caps_get_info only writes into `info`.
        unsafe { heap_caps_get_info(&mut info, MALLOC_CAP_DEFAULT) };
        let free = info.total_free_bytes as u32;
        HeapSnapshot {
            total: free.saturating_add(info.total_allocated_bytes as u32),
            free,
            min_free: unsafe { esp_get_minimum_free_heap_size() },
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn heap(&self) -> HeapSnapshot {
        let total: u32 = 327_680;
        let base_free: u32 = 307_200;
        let minutes = (self.uptime_secs() / 60) as u32;
        let free = base_free.saturating_sub(minutes.saturating_mul(self.sim_decay_per_min));
        HeapSnapshot {
            total,
            free,
            min_free: (free as f32 * 0.85) as u32,
        }
    }

    /// Whole flash chip; only the log partition's free space counts as free.
    #[cfg(target_os = "espidf")]
    pub fn flash(&self) -> StorageSnapshot {
        use esp_idf_svc::sys::{ESP_OK, esp_flash_get_size, esp_spiffs_info};

        let mut chip: u32 = 0;
        // SAFETY: a null chip selects the default flash chip.
        if unsafe { esp_flash_get_size(core::ptr::null_mut(), &mut chip) } != ESP_OK {
            log::warn!("System: flash size unavailable");
            return StorageSnapshot::default();
        }
        let (mut part_total, mut part_used): (usize, usize) = (0, 0);
        // SAFETY: a null label selects the first SPIFFS partition.
        let ret = unsafe { esp_spiffs_info(core::ptr::null(), &mut part_total, &mut part_used) };
        let free = if ret == ESP_OK {
            part_total.saturating_sub(part_used) as u32
        } else {
            0
        };
        StorageSnapshot { total: chip, free }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn flash(&self) -> StorageSnapshot {
        StorageSnapshot {
            total: 4 * 1024 * 1024,
            free: 1_408 * 1024,
        }
    }

    #[cfg(target_os = "espidf")]
    fn uptime_secs(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    #[cfg(target_os = "espidf")]
    fn cpu_frequency_mhz(&self) -> Option<u32> {
        Some(esp_idf_svc::sys::CONFIG_ESP_DEFAULT_CPU_FREQ_MHZ)
    }

    #[cfg(not(target_os = "espidf"))]
    fn cpu_frequency_mhz(&self) -> Option<u32> {
        None
    }
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
#[allow(non_upper_case_globals)]
fn read_reset_reason() -> ResetReason {
    use esp_idf_svc::sys::{
        esp_reset_reason, esp_reset_reason_t_ESP_RST_INT_WDT, esp_reset_reason_t_ESP_RST_POWERON,
        esp_reset_reason_t_ESP_RST_TASK_WDT, esp_reset_reason_t_ESP_RST_WDT,
    };

    match unsafe { esp_reset_reason() } {
        esp_reset_reason_t_ESP_RST_POWERON => ResetReason::PowerOn,
        esp_reset_reason_t_ESP_RST_TASK_WDT
        | esp_reset_reason_t_ESP_RST_INT_WDT
        | esp_reset_reason_t_ESP_RST_WDT => ResetReason::Watchdog,
        _ => ResetReason::Other,
    }
}

#[cfg(not(target_os = "espidf"))]
fn read_reset_reason() -> ResetReason {
    ResetReason::PowerOn
}

impl SystemInfoPort for SystemInfo {
    fn free_memory_bytes(&mut self) -> u32 {
        self.heap().free
    }

    fn storage(&mut self) -> StorageSnapshot {
        self.flash()
    }

    fn device_info(&mut self) -> DeviceInfo {
        let heap = self.heap();
        let flash = self.flash();
        DeviceInfo {
            unique_id: self.unique_id.clone(),
            platform: PLATFORM,
            firmware_version: FIRMWARE_VERSION,
            cpu_frequency_mhz: self.cpu_frequency_mhz(),
            total_storage_bytes: flash.total,
            used_storage_bytes: flash.used(),
            free_storage_bytes: flash.free,
            storage_usage_percent: flash.usage_percent(),
            total_memory_bytes: heap.total,
            used_memory_bytes: heap.used(),
            free_memory_bytes: heap.free,
            memory_usage_percent: heap.usage_percent(),
            min_free_memory_bytes: heap.min_free,
            uptime_seconds: self.uptime_secs(),
            reset_reason: self.reset_reason,
            network: None,
            created_at: String::new(),
        }
    }
}
