//! WiFi station-mode adapter.
//!
//! Implements [`NetworkPort`]: the hexagonal boundary for network
//! connectivity.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via
//!   `esp_idf_svc::wifi::EspWifi`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## Connect policy
//!
//! `connect` starts the driver if needed, requests association, then polls
//! once a second for an IP until the timeout, feeding the watchdog on every
//! poll.  Failure leaves the driver disconnected; the supervisor decides
//! when to try again.

use core::time::Duration;

use log::{error, info, warn};

use crate::app::payload::NetworkInfo;
use crate::app::ports::{KeepAlive, NetworkPort};
use crate::config::NetworkConfig;
use crate::error::ConnectivityError;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

fn format_mac(mac: [u8; 6]) -> heapless::String<18> {
    use core::fmt::Write;
    let mut s = heapless::String::new();
    let _ = write!(
        s,
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    s
}

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    #[cfg(target_os = "espidf")]
    wifi: esp_idf_svc::wifi::EspWifi<'static>,
    /// Simulation: counts platform_connect() calls for deterministic failures.
    #[cfg(not(target_os = "espidf"))]
    sim_connect_counter: u32,
    /// Simulation: the link drops on the next `is_connected` check.
    #[cfg(not(target_os = "espidf"))]
    sim_link_lost: bool,
}

impl WifiAdapter {
    /// Build the driver and load the station configuration.  Does not
    /// connect.
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: esp_idf_svc::hal::modem::Modem,
        sys_loop: esp_idf_svc::eventloop::EspSystemEventLoop,
        nvs: esp_idf_svc::nvs::EspDefaultNvsPartition,
        config: &NetworkConfig,
    ) -> anyhow::Result<Self> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

        let mut wifi = EspWifi::new(modem, sys_loop, Some(nvs))?;
        let auth_method = if config.wifi_password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: config
                .wifi_ssid
                .as_str()
                .try_into()
                .map_err(|_| anyhow::anyhow!(ConnectivityError::InvalidSsid))?,
            password: config
                .wifi_password
                .as_str()
                .try_into()
                .map_err(|_| anyhow::anyhow!(ConnectivityError::InvalidPassword))?,
            auth_method,
            ..Default::default()
        }))?;

        Ok(Self {
            state: WifiState::Disconnected,
            ssid: config.wifi_ssid.clone(),
            wifi,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: config.wifi_ssid.clone(),
            sim_connect_counter: 0,
            sim_link_lost: false,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    /// Simulation: pretend the access point went away.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self) {
        self.sim_link_lost = true;
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(
        &mut self,
        timeout: Duration,
        keepalive: &mut dyn KeepAlive,
    ) -> Result<(), ConnectivityError> {
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|e| {
                error!("WiFi: start failed: {:?}", e);
                ConnectivityError::WifiDriver
            })?;
        }
        self.wifi.connect().map_err(|e| {
            error!("WiFi: connect request failed: {:?}", e);
            ConnectivityError::WifiDriver
        })?;

        let started = std::time::Instant::now();
        loop {
            keepalive.feed();
            if self.wifi.is_up().unwrap_or(false) {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                let _ = self.wifi.disconnect();
                return Err(ConnectivityError::WifiTimeout);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(
        &mut self,
        timeout: Duration,
        keepalive: &mut dyn KeepAlive,
    ) -> Result<(), ConnectivityError> {
        self.sim_connect_counter = self.sim_connect_counter.wrapping_add(1);
        keepalive.feed();
        // Every 10th attempt times out to exercise the reconnect path.
        if self.sim_connect_counter % 10 == 3 {
            warn!(
                "WiFi(sim): simulated timeout after {:?} (attempt {})",
                timeout, self.sim_connect_counter
            );
            return Err(ConnectivityError::WifiTimeout);
        }
        self.sim_link_lost = false;
        info!("WiFi(sim): connected to '{}' (attempt {})", self.ssid, self.sim_connect_counter);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        let _ = self.wifi.disconnect();
        let _ = self.wifi.stop();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        info!("WiFi(sim): disconnected");
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.state == WifiState::Connected && !self.sim_link_lost
    }

    #[cfg(target_os = "espidf")]
    fn platform_network_info(&self) -> Option<NetworkInfo> {
        use core::fmt::Write;
        use esp_idf_svc::sys::{ESP_OK, esp_wifi_sta_get_ap_info, wifi_ap_record_t};

        let netif = self.wifi.sta_netif();
        let ip_info = netif.get_ip_info().ok()?;
        let mac = netif.get_mac().ok()?;

        let mut ap_info: wifi_ap_record_t = unsafe { core::mem::zeroed() };
        let rssi = if unsafe { esp_wifi_sta_get_ap_info(&mut ap_info) } == ESP_OK {
            ap_info.rssi
        } else {
            0
        };

        let mut ip = heapless::String::new();
        let _ = write!(ip, "{}", ip_info.ip);
        Some(NetworkInfo {
            ip,
            rssi,
            mac: format_mac(mac),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_network_info(&self) -> Option<NetworkInfo> {
        let mut ip = heapless::String::new();
        let _ = ip.push_str("192.168.4.2");
        // Oscillate between -54 and -65 dBm across connects.
        let oscillation = ((self.sim_connect_counter % 12) as i8) - 6;
        Some(NetworkInfo {
            ip,
            rssi: -60_i8.saturating_add(oscillation),
            mac: format_mac(crate::adapters::system_info::factory_mac()),
        })
    }
}

// ───────────────────────────────────────────────────────────────
// NetworkPort
// ───────────────────────────────────────────────────────────────

impl NetworkPort for WifiAdapter {
    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn connect(
        &mut self,
        timeout: Duration,
        keepalive: &mut dyn KeepAlive,
    ) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }

        info!("WiFi: connecting to '{}' (timeout {:?})", self.ssid, timeout);
        self.state = WifiState::Connecting;

        match self.platform_connect(timeout, keepalive) {
            Ok(()) => {
                self.state = WifiState::Connected;
                let ip = self.platform_network_info().map(|n| n.ip);
                info!("WiFi: connected (ip={:?})", ip);
                Ok(())
            }
            Err(e) => {
                error!("WiFi: connection failed: {}", e);
                self.state = WifiState::Failed;
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = WifiState::Disconnected;
        info!("WiFi: disconnected");
    }

    fn network_info(&self) -> Option<NetworkInfo> {
        if self.is_connected() {
            self.platform_network_info()
        } else {
            None
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
