// src/web/mod.rs
//! Web map and push endpoint

pub mod handlers;
pub mod server;

use crate::telemetry::{kml::KmlWriter, SharedState};

pub use server::{router, run_server, serve};

/// State shared by all HTTP handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub state: SharedState,
    pub kml: Option<KmlWriter>,
    pub safe_distance_cm: f64,
}
