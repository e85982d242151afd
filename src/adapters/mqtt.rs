//! MQTT transport adapter.
//!
//! Implements [`TransportPort`] with one short broker session per cycle:
//! connect, publish sensor and device records, disconnect.
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`
//!   with an event callback that tracks the connected flag.
//! - **all other targets**: an in-memory broker that records publishes.

use core::time::Duration;

use log::{info, warn};

use crate::app::ports::{KeepAlive, TransportPort, TransportStats};
use crate::config::NetworkConfig;
use crate::error::ConnectivityError;

/// Pause between failed connect attempts.
const RETRY_BACKOFF: Duration = Duration::from_secs(2);
#[cfg(target_os = "espidf")]
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MqttAdapter {
    url: heapless::String<128>,
    client_id: heapless::String<32>,
    user: heapless::String<64>,
    password: heapless::String<64>,
    stats: TransportStats,
    retry_backoff: Duration,
    #[cfg(target_os = "espidf")]
    session: Option<EspSession>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

#[cfg(target_os = "espidf")]
struct EspSession {
    client: esp_idf_svc::mqtt::client::EspMqttClient<'static>,
    connected: std::sync::Arc<core::sync::atomic::AtomicBool>,
}

/// Host-side stand-in for the broker.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimBroker {
    pub connected: bool,
    /// Refuse this many upcoming connect attempts.
    pub refuse_connects: u32,
    /// Fail this many upcoming publishes.
    pub fail_publishes: u32,
    pub published: Vec<(String, Vec<u8>)>,
}

impl MqttAdapter {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            url: config.mqtt_url.clone(),
            client_id: config.mqtt_client_id.clone(),
            user: config.mqtt_user.clone(),
            password: config.mqtt_password.clone(),
            stats: TransportStats::default(),
            retry_backoff: RETRY_BACKOFF,
            #[cfg(target_os = "espidf")]
            session: None,
            #[cfg(not(target_os = "espidf"))]
            sim: SimBroker::default(),
        }
    }

    /// Override the pause between connect attempts.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&mut self) -> &mut SimBroker {
        &mut self.sim
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, keepalive: &mut dyn KeepAlive) -> Result<(), ConnectivityError> {
        use core::sync::atomic::{AtomicBool, Ordering};
        use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration};
        use std::sync::Arc;

        let connected = Arc::new(AtomicBool::new(false));
        let flag = connected.clone();

        let conf = MqttClientConfiguration {
            client_id: Some(self.client_id.as_str()),
            username: (!self.user.is_empty()).then_some(self.user.as_str()),
            password: (!self.password.is_empty()).then_some(self.password.as_str()),
            ..Default::default()
        };

        let client = EspMqttClient::new_cb(self.url.as_str(), &conf, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => flag.store(true, Ordering::Release),
                EventPayload::Disconnected => flag.store(false, Ordering::Release),
                _ => {}
            }
        })
        .map_err(|e| {
            warn!("MQTT: client init failed: {:?}", e);
            ConnectivityError::TransportConnectFailed
        })?;

        let started = std::time::Instant::now();
        while !connected.load(Ordering::Acquire) {
            if started.elapsed() >= CONNECT_TIMEOUT {
                return Err(ConnectivityError::TransportConnectFailed);
            }
            keepalive.feed();
            std::thread::sleep(Duration::from_millis(100));
        }

        self.session = Some(EspSession { client, connected });
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, keepalive: &mut dyn KeepAlive) -> Result<(), ConnectivityError> {
        keepalive.feed();
        if self.sim.refuse_connects > 0 {
            self.sim.refuse_connects -= 1;
            return Err(ConnectivityError::TransportConnectFailed);
        }
        self.sim.connected = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ConnectivityError> {
        use esp_idf_svc::mqtt::client::QoS;

        let session = self
            .session
            .as_mut()
            .ok_or(ConnectivityError::TransportNotConnected)?;
        session
            .client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: publish to {} failed: {:?}", topic, e);
                ConnectivityError::PublishFailed
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ConnectivityError> {
        if !self.sim.connected {
            return Err(ConnectivityError::TransportNotConnected);
        }
        if self.sim.fail_publishes > 0 {
            self.sim.fail_publishes -= 1;
            return Err(ConnectivityError::PublishFailed);
        }
        self.sim.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        // Dropping the client stops the ESP-IDF MQTT task.
        self.session = None;
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim.connected = false;
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.connected.load(core::sync::atomic::Ordering::Acquire))
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim.connected
    }
}

// ───────────────────────────────────────────────────────────────
// TransportPort
// ───────────────────────────────────────────────────────────────

impl TransportPort for MqttAdapter {
    fn connect(
        &mut self,
        retries: u32,
        keepalive: &mut dyn KeepAlive,
    ) -> Result<(), ConnectivityError> {
        let attempts = retries.max(1);
        for attempt in 1..=attempts {
            keepalive.feed();
            match self.platform_connect(keepalive) {
                Ok(()) => {
                    self.stats.connects += 1;
                    info!("MQTT: connected to {} as '{}'", self.url, self.client_id);
                    return Ok(());
                }
                Err(e) => {
                    self.stats.errors += 1;
                    warn!("MQTT: connect attempt {}/{} failed: {}", attempt, attempts, e);
                    if attempt < attempts {
                        std::thread::sleep(self.retry_backoff);
                        keepalive.feed();
                    }
                }
            }
        }
        Err(ConnectivityError::TransportConnectFailed)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ConnectivityError> {
        match self.platform_publish(topic, payload) {
            Ok(()) => {
                self.stats.publishes += 1;
                Ok(())
            }
            Err(e) => {
                self.stats.errors += 1;
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) {
        if self.platform_is_connected() {
            info!("MQTT: disconnecting");
        }
        self.platform_disconnect();
    }

    fn statistics(&self) -> TransportStats {
        self.stats
    }
}
