//! ThermoNode firmware library.
//!
//! Exposes the supervisory core, sensor pipeline and adapters for
//! integration testing. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod health;

pub mod adapters;
pub mod drivers;
pub mod sensors;
