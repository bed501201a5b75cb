// src/config.rs
//! Configuration management with file-based storage

use crate::{
    error::{Result, TelemetryError},
    telemetry::parser::{Protocol, DEFAULT_MAX_DISTANCE_CM},
    transport::{
        http::DEFAULT_POLL_INTERVAL,
        serial::DEFAULT_BAUDRATE,
        tcp::{DEFAULT_LISTEN_ADDR, DEFAULT_TCP_PORT},
        TelemetrySource,
    },
    web::server::DEFAULT_WEB_BIND,
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Transport selected in the config file or on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Serial,
    Tcp,
    Listen,
    Http,
    Push,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceKind::Serial => "serial",
            SourceKind::Tcp => "tcp",
            SourceKind::Listen => "listen",
            SourceKind::Http => "http",
            SourceKind::Push => "push",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub source_type: SourceKind,
    pub protocol: Protocol,
    pub serial_port: Option<String>,
    pub serial_baudrate: u32,
    pub tcp_host: Option<String>,
    pub tcp_port: u16,
    pub listen_addr: String,
    pub http_url: Option<String>,
    pub poll_interval_ms: u64,
    pub web_bind: String,
    pub kml_path: Option<PathBuf>,
    /// `null` keeps the whole path
    pub path_capacity: Option<usize>,
    /// `null` keeps every reading
    pub reading_capacity: Option<usize>,
    pub max_distance_cm: f64,
    pub safe_distance_cm: f64,
    pub low_threshold_cm: f64,
    pub high_threshold_cm: f64,
    pub refresh_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            source_type: SourceKind::Serial,
            protocol: Protocol::Distance,
            serial_port: None,
            serial_baudrate: DEFAULT_BAUDRATE,
            tcp_host: None,
            tcp_port: DEFAULT_TCP_PORT,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            http_url: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            web_bind: DEFAULT_WEB_BIND.to_string(),
            kml_path: None,
            path_capacity: Some(500),
            reading_capacity: Some(100),
            max_distance_cm: DEFAULT_MAX_DISTANCE_CM,
            safe_distance_cm: 15.0,
            low_threshold_cm: 25.0,
            high_threshold_cm: 100.0,
            refresh_ms: 100,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    /// Load from `path`, falling back to defaults when the file is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TelemetryError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TelemetryError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)?;

        std::fs::write(path, contents)
            .map_err(|e| TelemetryError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Config file path (`~/.config/telemetry-monitor/config.json`)
    pub fn get_config_path() -> Result<PathBuf> {
        #[cfg(windows)]
        let base = std::env::var("APPDATA")
            .map(PathBuf::from)
            .map_err(|_| TelemetryError::Config("APPDATA environment variable not set".to_string()))?;

        #[cfg(not(windows))]
        let base = std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".config"))
            .map_err(|_| TelemetryError::Config("HOME environment variable not set".to_string()))?;

        Ok(base.join("telemetry-monitor").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_distance_cm > 0.0) {
            return Err(TelemetryError::Config(format!(
                "max_distance_cm must be positive, got {}",
                self.max_distance_cm
            )));
        }
        if self.safe_distance_cm > self.low_threshold_cm {
            return Err(TelemetryError::Config(format!(
                "safe_distance_cm ({}) is above low_threshold_cm ({})",
                self.safe_distance_cm, self.low_threshold_cm
            )));
        }
        if self.low_threshold_cm > self.high_threshold_cm {
            return Err(TelemetryError::Config(format!(
                "low_threshold_cm ({}) is above high_threshold_cm ({})",
                self.low_threshold_cm, self.high_threshold_cm
            )));
        }
        if self.refresh_ms == 0 || self.poll_interval_ms == 0 {
            return Err(TelemetryError::Config("refresh and poll intervals must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Resolve the configured transport
    pub fn to_source(&self) -> Result<TelemetrySource> {
        match self.source_type {
            SourceKind::Serial => {
                let port = self
                    .serial_port
                    .clone()
                    .ok_or_else(|| TelemetryError::Config("no serial port configured".to_string()))?;
                Ok(TelemetrySource::Serial {
                    port,
                    baudrate: self.serial_baudrate,
                })
            }
            SourceKind::Tcp => {
                let host = self
                    .tcp_host
                    .clone()
                    .ok_or_else(|| TelemetryError::Config("no TCP host configured".to_string()))?;
                Ok(TelemetrySource::TcpClient {
                    host,
                    port: self.tcp_port,
                })
            }
            SourceKind::Listen => Ok(TelemetrySource::TcpListen {
                addr: self.listen_addr.clone(),
            }),
            SourceKind::Http => {
                let url = self
                    .http_url
                    .clone()
                    .ok_or_else(|| TelemetryError::Config("no HTTP URL configured".to_string()))?;
                Ok(TelemetrySource::HttpPoll {
                    url,
                    interval: self.poll_interval(),
                })
            }
            SourceKind::Push => Ok(TelemetrySource::Push),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    /// Update configuration with new source settings
    pub fn update_source(&mut self, source_type: SourceKind) {
        self.source_type = source_type;
    }

    /// Update serial port settings
    pub fn update_serial(&mut self, port: String, baudrate: u32) {
        self.source_type = SourceKind::Serial;
        self.serial_port = Some(port);
        self.serial_baudrate = baudrate;
    }

    /// Update TCP client settings
    pub fn update_tcp(&mut self, host: String, port: u16) {
        self.source_type = SourceKind::Tcp;
        self.tcp_host = Some(host);
        self.tcp_port = port;
    }

    /// Update TCP listen settings
    pub fn update_listen(&mut self, addr: String) {
        self.source_type = SourceKind::Listen;
        self.listen_addr = addr;
    }

    /// Update HTTP polling settings
    pub fn update_http(&mut self, url: String, interval_ms: u64) {
        self.source_type = SourceKind::Http;
        self.http_url = Some(url);
        self.poll_interval_ms = interval_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.source_type, SourceKind::Serial);
        assert_eq!(config.protocol, Protocol::Distance);
        assert_eq!(config.serial_baudrate, 9600);
        assert_eq!(config.path_capacity, Some(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_update_serial() {
        let mut config = MonitorConfig::default();
        config.update_tcp("192.168.137.199".to_string(), 80);
        config.update_serial("/dev/ttyUSB0".to_string(), 115200);
        assert_eq!(config.source_type, SourceKind::Serial);
        assert_eq!(config.serial_port, Some("/dev/ttyUSB0".to_string()));
        assert_eq!(config.serial_baudrate, 115200);
        assert_eq!(
            config.to_source().unwrap(),
            TelemetrySource::Serial {
                port: "/dev/ttyUSB0".to_string(),
                baudrate: 115200
            }
        );
    }

    #[test]
    fn test_source_requires_endpoint() {
        let mut config = MonitorConfig::default();
        assert!(matches!(config.to_source(), Err(TelemetryError::Config(_))));

        config.update_source(SourceKind::Http);
        assert!(config.to_source().is_err());
        config.update_http("http://192.168.1.100/gps".to_string(), 3000);
        assert_eq!(
            config.to_source().unwrap(),
            TelemetrySource::HttpPoll {
                url: "http://192.168.1.100/gps".to_string(),
                interval: Duration::from_secs(3)
            }
        );

        config.update_source(SourceKind::Push);
        assert_eq!(config.to_source().unwrap(), TelemetrySource::Push);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = MonitorConfig::default();
        config.update_listen("0.0.0.0:6000".to_string());
        config.protocol = Protocol::Labeled;
        config.path_capacity = None;
        config.kml_path = Some(PathBuf::from("live_path.kml"));
        config.save_to(&path).unwrap();

        let loaded = MonitorConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"source_type":"tcp","tcp_host":"10.0.0.2","path_capacity":null}"#).unwrap();

        let config = MonitorConfig::load_from(&path).unwrap();
        assert_eq!(config.source_type, SourceKind::Tcp);
        assert_eq!(config.tcp_port, 80);
        assert_eq!(config.path_capacity, None);
        assert_eq!(config.reading_capacity, Some(100));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"low_threshold_cm":120.0,"high_threshold_cm":100.0}"#).unwrap();
        assert!(matches!(MonitorConfig::load_from(&path), Err(TelemetryError::Config(_))));

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(MonitorConfig::load_from(&path), Err(TelemetryError::Config(_))));
    }

    #[test]
    fn test_safe_distance_must_not_exceed_low_threshold() {
        let mut config = MonitorConfig::default();
        config.safe_distance_cm = 30.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("safe_distance_cm"));

        config.safe_distance_cm = config.low_threshold_cm;
        assert!(config.validate().is_ok());
    }
}
