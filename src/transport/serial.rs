// src/transport/serial.rs
//! Serial port helpers

use crate::error::{Result, TelemetryError};
use std::time::Duration;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::info;

pub const DEFAULT_BAUDRATE: u32 = 9600;

const OPEN_TIMEOUT: Duration = Duration::from_millis(1000);

/// Open `port` for async reading
pub fn open_serial(port: &str, baudrate: u32) -> Result<SerialStream> {
    info!("Connecting to {} at {} baud...", port, baudrate);

    tokio_serial::new(port, baudrate)
        .timeout(OPEN_TIMEOUT)
        .open_native_async()
        .map_err(|e| TelemetryError::Connection(format!("Failed to open serial port {}: {}", port, e)))
}

/// Open the port once and close it again
pub fn probe_serial(port: &str, baudrate: u32) -> Result<()> {
    let stream = open_serial(port, baudrate)?;
    drop(stream);
    Ok(())
}

/// List available serial ports
pub fn list_serial_ports() -> Result<()> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| TelemetryError::Other(format!("Failed to list serial ports: {}", e)))?;

    if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        println!("Available serial ports:");
        for port in ports {
            println!("  {} - {:?}", port.port_name, port.port_type);
        }
    }

    Ok(())
}
