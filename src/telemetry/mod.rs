// src/telemetry/mod.rs
//! Telemetry records, parsing and state

pub mod data;
pub mod geo;
pub mod history;
pub mod kml;
pub mod parser;
pub mod pipeline;

pub use data::{DistanceSample, Fix, GpsSample, Record, SharedState, TelemetryState};
pub use parser::{Protocol, RecordParser};
pub use pipeline::Pipeline;
