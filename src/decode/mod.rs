//! Default decoders turning captured files into lazy record streams.
//!
//! Nothing is read until a stream is polled, and only the record being decoded is held in
//! memory. Opening or reading a file fails through the stream itself.

mod lines;
mod trace_events;

use crate::prelude::*;
use doctor_shared::records::{ProcessStatSample, SystemInfo};
use futures::stream::BoxStream;
use std::path::{Path, PathBuf};

pub use lines::decode_lines;
pub use trace_events::{TraceEventSplitter, trace_events};

/// A lazy, ordered sequence of decoded records.
pub type RecordStream<T> = BoxStream<'static, Result<T>>;

/// Newline-delimited `ProcessStatSample` objects, blank lines are skipped.
pub fn process_stats(path: PathBuf) -> RecordStream<ProcessStatSample> {
    decode_lines(path, |line| {
        if line.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(line)?))
    })
}

pub async fn read_system_info(path: &Path) -> Result<SystemInfo> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&content)
        .with_context(|| format!("Failed to decode the system info in {}", path.display()))
}
