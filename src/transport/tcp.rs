// src/transport/tcp.rs
//! Raw TCP transports

use super::reader::ingest_reader;
use crate::{
    error::{Result, TelemetryError},
    telemetry::Pipeline,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

/// Default port of the ESP TCP bridge
pub const DEFAULT_TCP_PORT: u16 = 80;

/// Default address for devices that push readings to us
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5050";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Connect to a device streaming newline-delimited readings
pub async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream> {
    info!("Connecting to {}:{}...", host, port);

    match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            info!("Connected to {}:{}", host, port);
            Ok(stream)
        }
        Ok(Err(e)) => Err(TelemetryError::Connection(format!("Failed to connect to {}:{}: {}", host, port, e))),
        Err(_) => Err(TelemetryError::Connection(format!(
            "Timed out connecting to {}:{} after {:?}",
            host, port, CONNECT_TIMEOUT
        ))),
    }
}

/// Bind the listening socket for pushing devices
pub async fn bind_listener(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| TelemetryError::Connection(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Waiting for telemetry on {}", addr);
    Ok(listener)
}

/// Read a connected stream until the device goes away
pub async fn run_client(stream: TcpStream, mut pipeline: Pipeline, running: Arc<AtomicBool>) {
    match ingest_reader(stream, &mut pipeline, &running).await {
        Ok(lines) => info!("Device closed the connection after {} lines", lines),
        Err(e) => warn!("Error reading from TCP stream: {}", e),
    }
}

/// Accept devices one at a time and read each connection to EOF
pub async fn run_listener(listener: TcpListener, mut pipeline: Pipeline, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        let (conn, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };

        match ingest_reader(conn, &mut pipeline, &running).await {
            Ok(lines) => info!("{} sent {} lines", peer, lines),
            Err(e) => warn!("Error reading from {}: {}", peer, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{parser::DEFAULT_MAX_DISTANCE_CM, Protocol, RecordParser, SharedState};
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_listener_accepts_successive_devices() {
        let listener = bind_listener("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = SharedState::default();
        let pipeline = Pipeline::new(
            RecordParser::new(Protocol::Csv, DEFAULT_MAX_DISTANCE_CM),
            state.clone(),
            None,
        );
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(run_listener(listener, pipeline, Arc::clone(&running)));

        for payload in [&b"10.0,20.0"[..], &b"10.001,20.001\n"[..]] {
            let mut conn = TcpStream::connect(addr).await.unwrap();
            conn.write_all(payload).await.unwrap();
            conn.shutdown().await.unwrap();
        }

        // Wait for the second fix to land
        for _ in 0..100 {
            if state.read(|s| s.path.len()) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let snapshot = state.snapshot();
        assert_eq!(snapshot.path.len(), 2);
        assert!(snapshot.total_distance_m > 100.0);
        task.abort();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Grab a free port and close it again
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect_tcp("127.0.0.1", port).await.unwrap_err();
        assert!(matches!(err, TelemetryError::Connection(_)));
    }
}
