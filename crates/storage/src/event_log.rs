//! Event Log Implementation

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::StorageError;

/// Position of the active sign in one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub frame_index: u64,
    pub label: u32,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// `<frame> <label> <left> <top> <right> <bottom>`
impl fmt::Display for PositionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.frame_index, self.label, self.left, self.top, self.right, self.bottom
        )
    }
}

impl FromStr for PositionRecord {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(format!("expected 6 fields, found {}", fields.len()));
        }
        let int = |i: usize| {
            fields[i]
                .parse::<i64>()
                .map_err(|e| format!("field {} ({:?}): {}", i, fields[i], e))
        };
        let narrow = |v: i64, i: usize| i32::try_from(v).map_err(|e| format!("field {}: {}", i, e));

        Ok(Self {
            frame_index: u64::try_from(int(0)?).map_err(|e| format!("frame index: {}", e))?,
            label: u32::try_from(int(1)?).map_err(|e| format!("label: {}", e))?,
            left: narrow(int(2)?, 2)?,
            top: narrow(int(3)?, 3)?,
            right: narrow(int(4)?, 4)?,
            bottom: narrow(int(5)?, 5)?,
        })
    }
}

/// Append-only event log file
pub struct EventLog {
    writer: BufWriter<File>,
    path: PathBuf,
    records_written: usize,
}

impl EventLog {
    /// Open (or create) the log for appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| io_error(&path, source))?;

        info!("Opened event log at {}", path.display());
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            records_written: 0,
        })
    }

    /// Append one record as a line
    pub fn append(&mut self, record: &PositionRecord) -> Result<(), StorageError> {
        writeln!(self.writer, "{}", record).map_err(|source| io_error(&self.path, source))?;
        self.records_written += 1;
        debug!("Event log record: {}", record);
        Ok(())
    }

    /// Flush buffered records to disk
    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.writer
            .flush()
            .map_err(|source| io_error(&self.path, source))
    }

    /// Records appended through this handle
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Read every record of a log file
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<PositionRecord>, StorageError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| io_error(path, source))?;

    let mut records = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| io_error(path, source))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = line
            .parse()
            .map_err(|reason| StorageError::Malformed { line: i + 1, reason })?;
        records.push(record);
    }
    Ok(records)
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}
