// src/telemetry/pipeline.rs
//! Line -> record -> state update

use super::{
    data::{Record, SharedState},
    kml::{render_kml, KmlWriter},
    parser::RecordParser,
};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Owns the per-stream parser and pushes decoded records into the shared state
#[derive(Debug)]
pub struct Pipeline {
    parser: RecordParser,
    state: SharedState,
    kml: Option<KmlWriter>,
    source: String,
}

impl Pipeline {
    pub fn new(parser: RecordParser, state: SharedState, kml: Option<KmlWriter>) -> Self {
        Self {
            parser,
            state,
            kml,
            source: "unknown".to_string(),
        }
    }

    /// Label shown by the renderers for data coming through this pipeline
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Count input that never reached the parser as rejected
    pub fn discard(&self, reason: &str) {
        debug!("Discarding input: {}", reason);
        self.state.update(|state| state.reject());
    }

    /// Handle one framed line. Malformed lines are counted and dropped.
    pub fn handle_line(&mut self, line: &str) -> Option<Record> {
        let parsed = self.parser.feed(line);
        let source = &self.source;

        self.state.update(|state| {
            state.add_raw_line(line);
            state.set_source(source);
        });

        match parsed {
            Ok(Some(record)) => {
                apply_record(&self.state, self.kml.as_ref(), record.clone(), Utc::now());
                Some(record)
            }
            Ok(None) => None,
            Err(e) => {
                debug!("Discarding line {:?}: {}", line, e);
                self.state.update(|state| state.reject());
                None
            }
        }
    }
}

/// Apply a record and regenerate the KML file for position updates.
/// The document is rendered under the lock and written after releasing it.
pub fn apply_record(state: &SharedState, kml: Option<&KmlWriter>, record: Record, at: DateTime<Utc>) {
    let is_fix = matches!(record, Record::Fix(_));

    let document = state.update(|state| {
        state.apply(record, at);
        (is_fix && kml.is_some()).then(|| (render_kml(state), state.accepted))
    });

    if let (Some(writer), Some((document, version))) = (kml, document) {
        if let Err(e) = writer.write_rendered(&document, version) {
            warn!("Failed to write KML file {}: {}", writer.path().display(), e);
        }
    }
}
