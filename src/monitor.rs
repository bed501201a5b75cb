// src/monitor.rs
//! Ingestion coordination

use crate::{
    config::MonitorConfig,
    error::Result,
    telemetry::{kml::KmlWriter, Pipeline, Protocol, RecordParser, SharedState, TelemetryState},
    transport::{http::HttpPoller, serial, tcp, TelemetrySource},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Parsing and storage settings applied to every source
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub protocol: Protocol,
    pub max_distance_cm: f64,
    pub path_capacity: Option<usize>,
    pub reading_capacity: Option<usize>,
    pub kml: Option<KmlWriter>,
}

impl IngestSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            protocol: config.protocol,
            max_distance_cm: config.max_distance_cm,
            path_capacity: config.path_capacity,
            reading_capacity: config.reading_capacity,
            kml: config.kml_path.clone().map(KmlWriter::new),
        }
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

/// Runs the background reader for one source and owns the shared state
#[derive(Debug, Clone)]
pub struct TelemetryMonitor {
    state: SharedState,
    running: Arc<AtomicBool>,
    settings: IngestSettings,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl TelemetryMonitor {
    pub fn new(settings: IngestSettings) -> Self {
        let state = SharedState::new(TelemetryState::new(settings.path_capacity, settings.reading_capacity));
        Self {
            state,
            running: Arc::new(AtomicBool::new(true)),
            settings,
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn kml_writer(&self) -> Option<KmlWriter> {
        self.settings.kml.clone()
    }

    fn pipeline(&self, source: &TelemetrySource) -> Pipeline {
        Pipeline::new(
            RecordParser::new(self.settings.protocol, self.settings.max_distance_cm),
            self.state.clone(),
            self.settings.kml.clone(),
        )
        .with_source(source.label())
    }

    /// Open `source` and start reading it in the background.
    /// Connection failures are returned; faults after that are only logged.
    pub async fn start(&self, source: TelemetrySource) -> Result<()> {
        if let Some(ref writer) = self.settings.kml {
            if let Err(e) = writer.ensure_exists() {
                warn!("Failed to create KML file {}: {}", writer.path().display(), e);
            }
        }

        let pipeline = self.pipeline(&source);
        let running = Arc::clone(&self.running);
        info!("Reading {} telemetry from {}", self.settings.protocol, source);

        let handle = match source {
            TelemetrySource::Serial { port, baudrate } => {
                let stream = serial::open_serial(&port, baudrate)?;
                info!("Connected successfully!");
                tokio::spawn(async move {
                    let mut pipeline = pipeline;
                    match crate::transport::ingest_reader(stream, &mut pipeline, &running).await {
                        Ok(lines) => info!("Serial port {} closed after {} lines", port, lines),
                        Err(e) => warn!("Error reading from serial port {}: {}", port, e),
                    }
                })
            }
            TelemetrySource::TcpClient { host, port } => {
                let stream = tcp::connect_tcp(&host, port).await?;
                tokio::spawn(tcp::run_client(stream, pipeline, running))
            }
            TelemetrySource::TcpListen { addr } => {
                let listener = tcp::bind_listener(&addr).await?;
                tokio::spawn(tcp::run_listener(listener, pipeline, running))
            }
            TelemetrySource::HttpPoll { url, interval } => {
                let poller = HttpPoller::new(url, interval)?;
                tokio::spawn(poller.run(pipeline, running))
            }
            TelemetrySource::Push => {
                info!("No background reader; waiting for devices to call /update");
                return Ok(());
            }
        };

        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handle);
        Ok(())
    }

    /// Stop the monitor and cancel background readers
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()));
        for task in tasks {
            task.abort();
        }
    }

    /// Check if the monitor is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Get a clone of the current telemetry state
    pub fn snapshot(&self) -> TelemetryState {
        self.state.snapshot()
    }
}

impl Default for TelemetryMonitor {
    fn default() -> Self {
        Self::new(IngestSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::{io::AsyncWriteExt, net::TcpListener};

    #[tokio::test]
    async fn test_tcp_client_source() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            conn.write_all(b"25\n3").await.unwrap();
            conn.write_all(b"0\nNo echo\n120\n").await.unwrap();
        });

        let monitor = TelemetryMonitor::default();
        monitor
            .start(TelemetrySource::TcpClient {
                host: "127.0.0.1".to_string(),
                port,
            })
            .await
            .unwrap();

        for _ in 0..100 {
            if monitor.state().read(|s| s.readings.len()) == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let snapshot = monitor.snapshot();
        let values: Vec<f64> = snapshot.readings.iter().map(|r| r.distance_cm).collect();
        assert_eq!(values, vec![25.0, 30.0, 120.0]);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.source.as_deref(), Some(&*format!("TCP 127.0.0.1:{}", port)));

        monitor.stop();
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_push_source_spawns_nothing() {
        let monitor = TelemetryMonitor::default();
        monitor.start(TelemetrySource::Push).await.unwrap();
        assert!(monitor.tasks.lock().unwrap().is_empty());
        assert!(monitor.is_running());
    }

    #[tokio::test]
    async fn test_serial_open_failure_is_returned() {
        let monitor = TelemetryMonitor::default();
        let result = monitor
            .start(TelemetrySource::Serial {
                port: "/dev/this-port-does-not-exist".to_string(),
                baudrate: 9600,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_kml_created_on_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live_path.kml");
        let mut settings = IngestSettings::default();
        settings.kml = Some(KmlWriter::new(&path));

        let monitor = TelemetryMonitor::new(settings);
        monitor.start(TelemetrySource::Push).await.unwrap();
        assert!(path.exists());
    }
}
