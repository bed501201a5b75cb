// src/transport/framing.rs
//! Newline framing for chunked byte streams

use tracing::warn;

/// Longest partial line kept while waiting for a newline
const MAX_LINE_LEN: usize = 4096;

/// Reassembles newline-terminated lines from arbitrary read chunks.
///
/// Carriage returns and surrounding whitespace are trimmed, blank lines are
/// dropped and invalid UTF-8 is replaced rather than failing the stream.
/// A line longer than `MAX_LINE_LEN` is discarded up to its newline and
/// counted in [`LineFramer::take_dropped`].
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
    discarding: bool,
    dropped: usize,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed
    pub fn push(&mut self, mut chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        if self.discarding {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.discarding = false;
                    self.dropped += 1;
                    chunk = &chunk[pos + 1..];
                }
                None => return lines,
            }
        }

        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            if pos > MAX_LINE_LEN {
                warn!("Dropping {} byte line", pos);
                self.dropped += 1;
            } else if let Some(line) = decode(&raw[..pos]) {
                lines.push(line);
            }
        }

        if self.buffer.len() > MAX_LINE_LEN {
            warn!("Dropping {} bytes without a line terminator", self.buffer.len());
            self.buffer.clear();
            self.discarding = true;
        }

        lines
    }

    /// Flush the unterminated tail at end of stream
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        if std::mem::take(&mut self.discarding) {
            self.dropped += 1;
            return None;
        }
        decode(&raw)
    }

    /// Number of over-long lines discarded since the last call
    pub fn take_dropped(&mut self) -> usize {
        std::mem::take(&mut self.dropped)
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn decode(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
