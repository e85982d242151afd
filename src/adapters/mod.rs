//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements     | Connects to                  |
//! |---------------|----------------|------------------------------|
//! | `clock`       | ClockPort      | System clock + SNTP          |
//! | `log_sink`    | EventSink      | Serial log + rotating file   |
//! | `mqtt`        | TransportPort  | ESP-IDF MQTT client          |
//! | `system_info` | SystemInfoPort | eFuse MAC, heap, flash, reset |
//! | `wifi`        | NetworkPort    | ESP-IDF WiFi STA             |

pub mod clock;
pub mod log_sink;
pub mod mqtt;
pub mod system_info;
pub mod wifi;
