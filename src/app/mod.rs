//! Application core: the supervisory loop and its boundary.
//!
//! The loop sequences connectivity, acquisition and publishing each cycle
//! and decides between "sleep and repeat" and "escalate to restart".  All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod events;
pub mod payload;
pub mod ports;
pub mod supervisor;
