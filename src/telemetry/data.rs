// src/telemetry/data.rs
//! Telemetry samples and the shared monitor state

use super::{
    geo::{haversine_m, speed_kmh},
    history::History,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

/// Number of raw lines kept for display
const RAW_HISTORY_LEN: usize = 5;

/// Position fix as reported by the device
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: Option<f64>,
    pub altitude: Option<f64>,
    pub satellites: Option<u32>,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            speed_kmh: None,
            altitude: None,
            satellites: None,
        }
    }
}

/// One complete record decoded from the input stream
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Fix(Fix),
    Distance(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpsSample {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: f64,
    pub altitude: Option<f64>,
    pub satellites: u32,
    /// Meters travelled since the previous fix
    pub step_m: f64,
}

impl GpsSample {
    pub fn position(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceSample {
    pub timestamp: DateTime<Utc>,
    pub index: u64,
    pub distance_cm: f64,
}

#[derive(Debug, Clone)]
pub struct TelemetryState {
    pub latest: Option<GpsSample>,
    pub path: History<GpsSample>,
    pub total_distance_m: f64,
    pub readings: History<DistanceSample>,
    pub next_index: u64,
    pub timestamp: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub raw_history: Vec<String>,
    pub accepted: u64,
    pub rejected: u64,
}

impl TelemetryState {
    pub fn new(path_capacity: Option<usize>, reading_capacity: Option<usize>) -> Self {
        Self {
            latest: None,
            path: History::new(path_capacity),
            total_distance_m: 0.0,
            readings: History::new(reading_capacity),
            next_index: 0,
            timestamp: None,
            source: None,
            raw_history: Vec::new(),
            accepted: 0,
            rejected: 0,
        }
    }

    pub fn has_fix(&self) -> bool {
        self.latest.is_some()
    }

    /// Age of the last accepted record in seconds
    pub fn age_seconds(&self) -> Option<i64> {
        self.timestamp.map(|ts| Utc::now().signed_duration_since(ts).num_seconds())
    }

    /// Whether the last accepted record is younger than 10 seconds
    pub fn is_recent(&self) -> bool {
        self.age_seconds().map_or(false, |age| age < 10)
    }

    pub fn set_source(&mut self, source: &str) {
        self.source = Some(source.to_string());
    }

    /// Remember a raw input line (keeps the last few)
    pub fn add_raw_line(&mut self, line: &str) {
        self.raw_history.push(line.to_string());
        if self.raw_history.len() > RAW_HISTORY_LEN {
            self.raw_history.remove(0);
        }
    }

    /// Record a line that could not be used. Latest sample stays untouched.
    pub fn reject(&mut self) {
        self.rejected += 1;
    }

    pub fn apply(&mut self, record: Record, at: DateTime<Utc>) {
        match record {
            Record::Fix(fix) => {
                self.apply_fix(fix, at);
            }
            Record::Distance(cm) => {
                self.apply_distance(cm, at);
            }
        }
    }

    /// Append a position fix, deriving step distance and speed from the previous one
    pub fn apply_fix(&mut self, fix: Fix, at: DateTime<Utc>) -> &GpsSample {
        let (step_m, computed_speed) = match &self.latest {
            Some(prev) => {
                let step = haversine_m(prev.position(), (fix.latitude, fix.longitude));
                let dt = (at - prev.timestamp).num_milliseconds() as f64 / 1000.0;
                (step, speed_kmh(step, dt))
            }
            None => (0.0, 0.0),
        };

        if self.latest.is_some() {
            self.total_distance_m += step_m;
        } else {
            self.total_distance_m = 0.0;
        }

        let sample = GpsSample {
            timestamp: at,
            latitude: fix.latitude,
            longitude: fix.longitude,
            speed_kmh: fix.speed_kmh.unwrap_or(computed_speed),
            altitude: fix.altitude,
            satellites: fix.satellites.unwrap_or(0),
            step_m,
        };

        self.accepted += 1;
        self.timestamp = Some(at);
        self.path.push(sample.clone());
        self.latest.insert(sample)
    }

    pub fn apply_distance(&mut self, distance_cm: f64, at: DateTime<Utc>) -> DistanceSample {
        let sample = DistanceSample {
            timestamp: at,
            index: self.next_index,
            distance_cm,
        };
        self.next_index += 1;
        self.accepted += 1;
        self.timestamp = Some(at);
        self.readings.push(sample.clone());
        sample
    }

    pub fn latest_reading(&self) -> Option<&DistanceSample> {
        self.readings.last()
    }

    /// Path as `[lat, lon]` pairs, oldest first
    pub fn path_pairs(&self) -> Vec<[f64; 2]> {
        self.path.iter().map(|s| [s.latitude, s.longitude]).collect()
    }

    pub fn format_coordinate(coord: Option<f64>) -> String {
        match coord {
            Some(val) => format!("{:>12.6}°", val),
            None => "No fix".to_string(),
        }
    }

    pub fn format_value<T: std::fmt::Display>(value: Option<T>, unit: &str) -> String {
        match value {
            Some(val) => format!("{:>12} {}", val, unit),
            None => "Unknown".to_string(),
        }
    }
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Mutex-guarded state shared between the ingestion task and the renderers
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<TelemetryState>>,
}

impl SharedState {
    pub fn new(state: TelemetryState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TelemetryState> {
        // A panicked writer leaves plain data behind; keep serving it
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with exclusive access to the state
    pub fn update<R>(&self, f: impl FnOnce(&mut TelemetryState) -> R) -> R {
        f(&mut self.lock())
    }

    /// Read through a borrowed view without cloning the whole history
    pub fn read<R>(&self, f: impl FnOnce(&TelemetryState) -> R) -> R {
        f(&self.lock())
    }

    pub fn snapshot(&self) -> TelemetryState {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_speed_between_fixes_one_second_apart() {
        let mut state = TelemetryState::default();
        state.apply_fix(Fix::new(0.0, 0.0), t0());
        let sample = state.apply_fix(Fix::new(0.0, 1.0), t0() + Duration::seconds(1)).clone();

        let expected_m = haversine_m((0.0, 0.0), (0.0, 1.0));
        assert!((sample.step_m - expected_m).abs() < 1e-6);
        assert!((sample.speed_kmh - expected_m * 3.6).abs() < 1e-6);
        assert!((state.total_distance_m - expected_m).abs() < 1e-6);
        assert!(expected_m > 111_000.0 && expected_m < 111_400.0);
    }

    #[test]
    fn test_first_fix_resets_distance() {
        let mut state = TelemetryState::default();
        let first = state.apply_fix(Fix::new(10.0, 10.0), t0()).clone();
        assert_eq!(first.step_m, 0.0);
        assert_eq!(first.speed_kmh, 0.0);
        assert_eq!(state.total_distance_m, 0.0);
    }

    #[test]
    fn test_reported_speed_wins() {
        let mut state = TelemetryState::default();
        state.apply_fix(Fix::new(0.0, 0.0), t0());
        let mut fix = Fix::new(0.0, 0.001);
        fix.speed_kmh = Some(4.2);
        let sample = state.apply_fix(fix, t0() + Duration::seconds(5));
        assert_eq!(sample.speed_kmh, 4.2);
    }

    #[test]
    fn test_same_timestamp_counts_as_one_second() {
        let mut state = TelemetryState::default();
        state.apply_fix(Fix::new(0.0, 0.0), t0());
        let sample = state.apply_fix(Fix::new(0.0, 1.0), t0()).clone();
        assert!((sample.speed_kmh - sample.step_m * 3.6).abs() < 1e-6);
    }

    #[test]
    fn test_capped_path() {
        let mut state = TelemetryState::new(Some(3), Some(2));
        for i in 0..10 {
            state.apply_fix(Fix::new(0.0, i as f64 * 0.001), t0() + Duration::seconds(i));
            state.apply_distance(10.0 + i as f64, t0());
        }
        assert_eq!(state.path.len(), 3);
        assert_eq!(state.readings.len(), 2);
        assert_eq!(state.latest_reading().map(|r| r.index), Some(9));
        let last = state.path_pairs().last().copied().unwrap();
        assert!((last[1] - 0.009).abs() < 1e-12);
        // Total distance covers every step, not just the retained path
        assert!(state.total_distance_m > 900.0);
    }

    #[test]
    fn test_reject_does_not_touch_latest() {
        let mut state = TelemetryState::default();
        state.apply_fix(Fix::new(1.0, 2.0), t0());
        let before = state.latest.clone();
        state.reject();
        state.reject();
        assert_eq!(state.latest, before);
        assert_eq!(state.rejected, 2);
        assert_eq!(state.accepted, 1);
    }

    #[test]
    fn test_raw_history_keeps_last_five() {
        let mut state = TelemetryState::default();
        for i in 0..8 {
            state.add_raw_line(&format!("line {}", i));
        }
        assert_eq!(state.raw_history.len(), 5);
        assert_eq!(state.raw_history[0], "line 3");
        assert_eq!(state.raw_history.last().map(String::as_str), Some("line 7"));
    }

    #[test]
    fn test_shared_state_update_and_snapshot() {
        let shared = SharedState::default();
        let clone = shared.clone();
        clone.update(|s| s.apply_distance(55.0, t0()).index);
        let snapshot = shared.snapshot();
        assert_eq!(snapshot.readings.len(), 1);
        assert_eq!(shared.read(|s| s.next_index), 1);
    }
}
