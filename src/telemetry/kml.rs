// src/telemetry/kml.rs
//! Live path export as KML

use super::data::TelemetryState;
use crate::error::Result;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const DOCUMENT_NAME: &str = "Live GPS Path";

/// Render the travelled path and the current position as a KML document
pub fn render_kml(state: &TelemetryState) -> String {
    let mut kml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
"#);
    kml.push_str(&format!("    <name>{}</name>\n", escape_xml(DOCUMENT_NAME)));

    kml.push_str("    <Placemark>\n");
    kml.push_str("      <name>Path</name>\n");
    kml.push_str("      <LineString>\n");
    kml.push_str("        <tessellate>1</tessellate>\n");
    kml.push_str("        <coordinates>\n");
    for sample in state.path.iter() {
        kml.push_str(&format!(
            "          {},{},{}\n",
            sample.longitude,
            sample.latitude,
            sample.altitude.unwrap_or(0.0)
        ));
    }
    kml.push_str("        </coordinates>\n");
    kml.push_str("      </LineString>\n");
    kml.push_str("    </Placemark>\n");

    let (lat, lon, alt) = state
        .latest
        .as_ref()
        .map(|s| (s.latitude, s.longitude, s.altitude.unwrap_or(0.0)))
        .unwrap_or((0.0, 0.0, 0.0));

    kml.push_str("    <Placemark>\n");
    kml.push_str("      <name>Current Location</name>\n");
    if let Some(ref sample) = state.latest {
        kml.push_str(&format!(
            "      <TimeStamp><when>{}</when></TimeStamp>\n",
            sample.timestamp.to_rfc3339()
        ));
    }
    kml.push_str("      <Point>\n");
    kml.push_str(&format!("        <coordinates>{},{},{}</coordinates>\n", lon, lat, alt));
    kml.push_str("      </Point>\n");
    kml.push_str("    </Placemark>\n");

    kml.push_str("  </Document>\n</kml>\n");
    kml
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Regenerates a KML file on every position update.
///
/// Clones share one write lock. Each document carries the version of the
/// state it was rendered from and older versions never replace newer ones.
#[derive(Debug, Clone)]
pub struct KmlWriter {
    path: PathBuf,
    last_version: Arc<Mutex<Option<u64>>>,
}

impl KmlWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_version: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write an empty document if the file does not exist yet
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        self.write(&TelemetryState::default())
    }

    pub fn write(&self, state: &TelemetryState) -> Result<()> {
        self.write_rendered(&render_kml(state), state.accepted)?;
        Ok(())
    }

    /// Write a document rendered from state version `version`.
    /// Returns `false` when a newer document was already written.
    pub fn write_rendered(&self, content: &str, version: u64) -> Result<bool> {
        let mut last = self.last_version.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if matches!(*last, Some(written) if written > version) {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Readers only ever see a complete document
        let tmp = self.tmp_path();
        let mut file = File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp, &self.path)?;

        *last = Some(version);
        Ok(true)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
