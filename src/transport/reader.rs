// src/transport/reader.rs
//! Read loop shared by the stream transports

use super::framing::LineFramer;
use crate::telemetry::Pipeline;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 1024;

/// Pump `reader` into `pipeline` until EOF, a read error or shutdown.
/// Returns the number of lines handled.
pub async fn ingest_reader<R>(mut reader: R, pipeline: &mut Pipeline, running: &AtomicBool) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut framer = LineFramer::new();
    let mut chunk = [0u8; READ_CHUNK];
    let mut handled = 0u64;

    while running.load(Ordering::Relaxed) {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break; // EOF
        }
        for line in framer.push(&chunk[..n]) {
            pipeline.handle_line(&line);
            handled += 1;
        }
        handled += discard_dropped(&mut framer, pipeline);
    }

    if let Some(line) = framer.finish() {
        pipeline.handle_line(&line);
        handled += 1;
    }
    handled += discard_dropped(&mut framer, pipeline);

    Ok(handled)
}

fn discard_dropped(framer: &mut LineFramer, pipeline: &Pipeline) -> u64 {
    let dropped = framer.take_dropped();
    for _ in 0..dropped {
        pipeline.discard("line too long");
    }
    dropped as u64
}
