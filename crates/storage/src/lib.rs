//! Storage Layer
//!
//! Plain-text, append-only event log with one position record per frame in
//! which a sign is active.

mod event_log;

pub use event_log::{read_records, EventLog, PositionRecord};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Malformed record at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}
