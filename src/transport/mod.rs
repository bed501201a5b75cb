// src/transport/mod.rs
//! I/O channels that yield telemetry lines

pub mod framing;
pub mod http;
pub mod reader;
pub mod serial;
pub mod tcp;

pub use framing::LineFramer;
pub use reader::ingest_reader;

use std::{fmt, time::Duration};

/// Where telemetry comes from
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetrySource {
    Serial { port: String, baudrate: u32 },
    TcpClient { host: String, port: u16 },
    TcpListen { addr: String },
    HttpPoll { url: String, interval: Duration },
    /// Devices call the web server's `/update` endpoint
    Push,
}

impl TelemetrySource {
    /// Short label shown next to the data
    pub fn label(&self) -> String {
        match self {
            TelemetrySource::Serial { port, .. } => format!("Serial {}", port),
            TelemetrySource::TcpClient { host, port } => format!("TCP {}:{}", host, port),
            TelemetrySource::TcpListen { addr } => format!("TCP listen {}", addr),
            TelemetrySource::HttpPoll { url, .. } => format!("HTTP {}", url),
            TelemetrySource::Push => "HTTP push".to_string(),
        }
    }
}

impl fmt::Display for TelemetrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
