// src/telemetry/parser.rs
//! Line protocol parsing
//!
//! Every transport yields newline-delimited text. Depending on the firmware on
//! the other end a line is a bare distance reading, a CSV fix, one line of a
//! labeled multi-line block, or a JSON object. [`RecordParser`] turns those
//! lines into [`Record`]s and reports anything it cannot use as a
//! [`ParseError`] so the caller can log it and keep reading.

use super::data::{Fix, Record};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default upper bound for ultrasonic distance readings (sensor max range)
pub const DEFAULT_MAX_DISTANCE_CM: f64 = 200.0;

/// Text layout produced by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// One distance reading in centimeters per line
    #[default]
    Distance,
    /// `lat,lon[,speed[,alt]]`
    Csv,
    /// `Latitude: ..` / `Longitude: ..` / `Satellites in use: ..` blocks
    Labeled,
    /// `{"lat": .., "lon": .., "satellites": ..}`
    Json,
}

impl Protocol {
    pub fn carries_position(&self) -> bool {
        !matches!(self, Protocol::Distance)
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Protocol::Distance => "distance",
            Protocol::Csv => "csv",
            Protocol::Labeled => "labeled",
            Protocol::Json => "json",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,

    #[error("invalid {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("expected 2 to 4 comma separated fields, got {0}")]
    FieldCount(usize),

    #[error("unexpected line: {0:?}")]
    Unexpected(String),

    #[error("invalid JSON: {0}")]
    Json(String),
}

/// Stateful parser for one input stream
#[derive(Debug, Clone)]
pub struct RecordParser {
    protocol: Protocol,
    max_distance_cm: f64,
    block: LabeledBlock,
}

impl RecordParser {
    pub fn new(protocol: Protocol, max_distance_cm: f64) -> Self {
        Self {
            protocol,
            max_distance_cm,
            block: LabeledBlock::default(),
        }
    }

    /// Feed one line. `Ok(None)` means the line was accepted but did not
    /// complete a record (a partial block, or a "no fix yet" JSON reply).
    pub fn feed(&mut self, line: &str) -> Result<Option<Record>, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        match self.protocol {
            Protocol::Distance => parse_distance(line, self.max_distance_cm).map(|d| Some(Record::Distance(d))),
            Protocol::Csv => parse_csv_fix(line).map(|fix| Some(Record::Fix(fix))),
            Protocol::Labeled => self.block.feed(line).map(|fix| fix.map(Record::Fix)),
            Protocol::Json => parse_json_fix(line).map(|fix| fix.map(Record::Fix)),
        }
    }
}

/// Parse a single distance reading. Zero means "no echo" on the sensor side.
pub fn parse_distance(line: &str, max_cm: f64) -> Result<f64, ParseError> {
    let value = parse_number("distance", line)?;
    if value <= 0.0 || value > max_cm {
        return Err(ParseError::OutOfRange { field: "distance", value });
    }
    Ok(value)
}

/// Parse `lat,lon[,speed[,alt]]`
pub fn parse_csv_fix(line: &str) -> Result<Fix, ParseError> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if !(2..=4).contains(&parts.len()) {
        return Err(ParseError::FieldCount(parts.len()));
    }

    let latitude = parse_coordinate("latitude", parts[0], 90.0)?;
    let longitude = parse_coordinate("longitude", parts[1], 180.0)?;
    let speed_kmh = parse_optional("speed", parts.get(2).copied())?;
    let altitude = parse_optional("altitude", parts.get(3).copied())?;

    Ok(Fix {
        latitude,
        longitude,
        speed_kmh,
        altitude,
        satellites: None,
    })
}

#[derive(Debug, Deserialize)]
struct JsonFix {
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    satellites: Option<u32>,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default, alias = "alt")]
    altitude: Option<f64>,
}

/// Parse a `{lat, lon, satellites}` object. Null coordinates mean the device
/// has no fix yet and yield `Ok(None)`.
pub fn parse_json_fix(line: &str) -> Result<Option<Fix>, ParseError> {
    let msg: JsonFix = serde_json::from_str(line).map_err(|e| ParseError::Json(e.to_string()))?;

    let (Some(lat), Some(lon)) = (msg.lat, msg.lon) else {
        return Ok(None);
    };

    Ok(Some(Fix {
        latitude: check_range("latitude", lat, 90.0)?,
        longitude: check_range("longitude", lon, 180.0)?,
        speed_kmh: msg.speed,
        altitude: msg.altitude,
        satellites: msg.satellites,
    }))
}

/// Build a fix from already-numeric coordinates, checking their ranges
pub fn checked_fix(latitude: f64, longitude: f64) -> Result<Fix, ParseError> {
    Ok(Fix::new(
        check_range("latitude", latitude, 90.0)?,
        check_range("longitude", longitude, 180.0)?,
    ))
}

/// Partial `Latitude:` / `Longitude:` / `Satellites in use:` block
#[derive(Debug, Clone, Default)]
struct LabeledBlock {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl LabeledBlock {
    fn feed(&mut self, line: &str) -> Result<Option<Fix>, ParseError> {
        if is_separator(line) {
            return Ok(self.complete(None));
        }

        let Some((label, value)) = line.split_once(':') else {
            return Err(ParseError::Unexpected(line.to_string()));
        };

        let result = match label.trim() {
            "Latitude" => {
                // A latitude line always opens a new block
                self.reset();
                parse_coordinate("latitude", value, 90.0).map(|lat| {
                    self.latitude = Some(lat);
                    None
                })
            }
            "Longitude" => {
                if self.latitude.is_none() {
                    Err(ParseError::Unexpected(line.to_string()))
                } else {
                    parse_coordinate("longitude", value, 180.0).map(|lon| {
                        self.longitude = Some(lon);
                        None
                    })
                }
            }
            "Satellites in use" => {
                if self.latitude.is_none() || self.longitude.is_none() {
                    return Ok(None);
                }
                value
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| ParseError::InvalidNumber {
                        field: "satellites",
                        value: value.trim().to_string(),
                    })
                    .map(|sats| self.complete(Some(sats)))
            }
            _ => return Err(ParseError::Unexpected(line.to_string())),
        };

        if result.is_err() {
            self.reset();
        }
        result
    }

    fn complete(&mut self, satellites: Option<u32>) -> Option<Fix> {
        let fix = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Fix {
                latitude,
                longitude,
                speed_kmh: None,
                altitude: None,
                satellites: Some(satellites.unwrap_or(0)),
            }),
            _ => None,
        };
        self.reset();
        fix
    }

    fn reset(&mut self) {
        self.latitude = None;
        self.longitude = None;
    }
}

fn is_separator(line: &str) -> bool {
    line.len() >= 3 && line.chars().all(|c| c == '-')
}

fn parse_number(field: &'static str, value: &str) -> Result<f64, ParseError> {
    let value = value.trim();
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParseError::InvalidNumber {
            field,
            value: value.to_string(),
        }),
    }
}

fn parse_optional(field: &'static str, value: Option<&str>) -> Result<Option<f64>, ParseError> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_number(field, v).map(Some),
        _ => Ok(None),
    }
}

fn parse_coordinate(field: &'static str, value: &str, limit: f64) -> Result<f64, ParseError> {
    parse_number(field, value).and_then(|v| check_range(field, v, limit))
}

fn check_range(field: &'static str, value: f64, limit: f64) -> Result<f64, ParseError> {
    if value.is_finite() && value.abs() <= limit {
        Ok(value)
    } else {
        Err(ParseError::OutOfRange { field, value })
    }
}
