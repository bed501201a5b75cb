// src/lib.rs
//! Telemetry Monitor Library
//!
//! Reads distance and GPS telemetry from microcontrollers over serial, TCP
//! or HTTP, keeps the latest sample and bounded history, and renders it as
//! a terminal chart, a live web map and a KML track.

pub mod config;
pub mod display;
pub mod error;
pub mod monitor;
pub mod telemetry;
pub mod transport;
pub mod web;

// Re-export main types for convenience
pub use config::{MonitorConfig, SourceKind};
pub use error::{Result, TelemetryError};
pub use monitor::{IngestSettings, TelemetryMonitor};
pub use telemetry::{Fix, GpsSample, Protocol, Record, SharedState, TelemetryState};
pub use transport::TelemetrySource;
