// src/web/handlers.rs
//! HTTP handlers for the live map

use super::AppState;
use crate::telemetry::{parser::checked_fix, pipeline::apply_record, Record, TelemetryState};
use axum::{
    extract::{Query, State},
    response::Html,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

const INDEX_HTML: &str = include_str!("index.html");

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub speed: f64,
    pub distance: f64,
    pub satellites: u32,
    pub altitude: Option<f64>,
    pub path: Vec<[f64; 2]>,
}

impl From<&TelemetryState> for LocationResponse {
    fn from(state: &TelemetryState) -> Self {
        let latest = state.latest.as_ref();
        Self {
            lat: latest.map(|s| s.latitude),
            lon: latest.map(|s| s.longitude),
            speed: latest.map_or(0.0, |s| s.speed_kmh),
            distance: state.total_distance_m,
            satellites: latest.map_or(0, |s| s.satellites),
            altitude: latest.and_then(|s| s.altitude),
            path: state.path_pairs(),
        }
    }
}

/// `GET /location` and `GET /coords`
pub async fn location(State(app): State<AppState>) -> Json<LocationResponse> {
    Json(app.state.read(|state| LocationResponse::from(state)))
}

#[derive(Debug, Serialize)]
pub struct ReadingPoint {
    pub index: u64,
    pub distance: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReadingsResponse {
    pub latest: Option<f64>,
    pub safe_distance: f64,
    pub readings: Vec<ReadingPoint>,
}

/// `GET /readings`
pub async fn readings(State(app): State<AppState>) -> Json<ReadingsResponse> {
    let response = app.state.read(|state| ReadingsResponse {
        latest: state.latest_reading().map(|r| r.distance_cm),
        safe_distance: app.safe_distance_cm,
        readings: state
            .readings
            .iter()
            .map(|r| ReadingPoint {
                index: r.index,
                distance: r.distance_cm,
                timestamp: r.timestamp,
            })
            .collect(),
    });
    Json(response)
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
}

/// `GET /update?lat=..&lon=..` pushed by Wi-Fi devices. Always answers `OK`.
pub async fn update(State(app): State<AppState>, Query(query): Query<UpdateQuery>) -> &'static str {
    let raw = format!(
        "lat={}&lon={}",
        query.lat.as_deref().unwrap_or(""),
        query.lon.as_deref().unwrap_or("")
    );

    let fix = match (query.lat.as_deref(), query.lon.as_deref()) {
        (Some(lat), Some(lon)) => match (lat.trim().parse::<f64>(), lon.trim().parse::<f64>()) {
            (Ok(lat), Ok(lon)) => checked_fix(lat, lon).ok(),
            _ => None,
        },
        _ => None,
    };

    app.state.update(|state| {
        state.add_raw_line(&raw);
        state.set_source("HTTP push");
    });

    match fix {
        Some(fix) => apply_record(&app.state, app.kml.as_ref(), Record::Fix(fix), Utc::now()),
        None => {
            debug!("Ignoring update {:?}", raw);
            app.state.update(|state| state.reject());
        }
    }

    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{Fix, SharedState};

    fn app() -> AppState {
        AppState {
            state: SharedState::default(),
            kml: None,
            safe_distance_cm: 15.0,
        }
    }

    fn query(lat: Option<&str>, lon: Option<&str>) -> Query<UpdateQuery> {
        Query(UpdateQuery {
            lat: lat.map(str::to_string),
            lon: lon.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_location_before_first_fix() {
        let Json(body) = location(State(app())).await;
        assert_eq!(body.lat, None);
        assert_eq!(body.lon, None);
        assert_eq!(body.speed, 0.0);
        assert_eq!(body.satellites, 0);
        assert!(body.path.is_empty());

        let json = serde_json::to_value(&body).unwrap();
        assert!(json["lat"].is_null());
        assert_eq!(json["path"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_location_with_path() {
        let app = app();
        app.state.update(|s| {
            s.apply_fix(Fix::new(1.0, 2.0), Utc::now());
            let mut fix = Fix::new(1.5, 2.5);
            fix.satellites = Some(7);
            s.apply_fix(fix, Utc::now());
        });

        let Json(body) = location(State(app)).await;
        assert_eq!(body.lat, Some(1.5));
        assert_eq!(body.satellites, 7);
        assert_eq!(body.path, vec![[1.0, 2.0], [1.5, 2.5]]);
        assert!(body.distance > 0.0);
    }

    #[tokio::test]
    async fn test_update_accepts_valid_fix() {
        let app = app();
        assert_eq!(update(State(app.clone()), query(Some("10.5"), Some("20.25"))).await, "OK");

        let state = app.state.snapshot();
        let latest = state.latest.unwrap();
        assert_eq!(latest.position(), (10.5, 20.25));
        assert_eq!(state.source.as_deref(), Some("HTTP push"));
    }

    #[tokio::test]
    async fn test_update_ignores_bad_input() {
        let app = app();
        update(State(app.clone()), query(Some("10.5"), None)).await;
        update(State(app.clone()), query(Some("north"), Some("20"))).await;
        update(State(app.clone()), query(Some("100"), Some("20"))).await;
        assert_eq!(update(State(app.clone()), query(None, None)).await, "OK");

        let state = app.state.snapshot();
        assert!(state.latest.is_none());
        assert_eq!(state.rejected, 4);
    }

    #[tokio::test]
    async fn test_readings() {
        let app = app();
        app.state.update(|s| {
            s.apply_distance(40.0, Utc::now());
            s.apply_distance(12.0, Utc::now());
        });

        let Json(body) = readings(State(app)).await;
        assert_eq!(body.latest, Some(12.0));
        assert_eq!(body.safe_distance, 15.0);
        assert_eq!(body.readings.len(), 2);
        assert_eq!(body.readings[1].index, 1);
    }

    #[tokio::test]
    async fn test_index_page_polls_location() {
        let Html(page) = index().await;
        assert!(page.contains("/location"));
        assert!(page.contains("leaflet"));
    }
}
