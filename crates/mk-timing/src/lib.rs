//! # mk-timing
//!
//! Append-only timing instrumentation for Mako.
//!
//! Measured calls append one JSON line of `{operation_name, duration,
//! timestamp}` to `performance.log`. The decorator-style instrumentation
//! of the original design becomes an explicit combinator here:
//! [`TimingLog::time`] wraps a closure, measures it, and logs the record.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while writing or reading the timing log.
#[derive(Debug, Error)]
pub enum TimingError {
    #[error("failed to open timing log at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// One measured call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingRecord {
    /// Name of the measured operation (e.g. "tool:git_push", "turn").
    pub operation_name: String,

    /// Wall-clock duration in seconds.
    pub duration: f64,

    /// When the operation finished.
    pub timestamp: DateTime<Utc>,
}

/// An append-only JSONL timing log.
///
/// Writes are flushed per record so a crash never loses measured calls.
/// The writer sits behind a mutex; instrumented call sites share one log.
pub struct TimingLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl TimingLog {
    /// Open (or create) a timing log at the given path. Always appends —
    /// existing records are never overwritten.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TimingError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| TimingError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    /// Append one record and flush.
    pub fn append(&self, record: &TimingRecord) -> Result<(), TimingError> {
        let json = serde_json::to_string(record)?;
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }

    /// Run `f`, measure it, and append a record under `operation_name`.
    ///
    /// The closure's value is returned untouched; a logging failure is not
    /// allowed to fail the measured call itself, so it is swallowed after
    /// the write attempt (the record is best-effort instrumentation).
    pub fn time<T>(&self, operation_name: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let value = f();
        let record = TimingRecord {
            operation_name: operation_name.to_string(),
            duration: start.elapsed().as_secs_f64(),
            timestamp: Utc::now(),
        };
        let _ = self.append(&record);
        value
    }

    /// Read all records from a log file, oldest first.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<TimingRecord>, TimingError> {
        let file = File::open(path.as_ref()).map_err(|source| TimingError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }

        Ok(records)
    }

    /// Return the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn time_appends_one_record_per_call() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("performance.log");
        let log = TimingLog::open(&log_path).unwrap();

        let value = log.time("tool:git_push", || 41 + 1);
        assert_eq!(value, 42);
        log.time("turn", || ());

        let records = TimingLog::read_all(&log_path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].operation_name, "tool:git_push");
        assert!(records[0].duration >= 0.0);
    }

    #[test]
    fn reopen_appends_instead_of_truncating() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("performance.log");

        {
            let log = TimingLog::open(&log_path).unwrap();
            log.time("first", || ());
        }
        {
            let log = TimingLog::open(&log_path).unwrap();
            log.time("second", || ());
        }

        let records = TimingLog::read_all(&log_path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].operation_name, "second");
    }

    #[test]
    fn read_all_skips_blank_lines() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("performance.log");
        let log = TimingLog::open(&log_path).unwrap();
        log.time("op", || ());
        std::fs::OpenOptions::new()
            .append(true)
            .open(&log_path)
            .unwrap()
            .write_all(b"\n\n")
            .unwrap();

        let records = TimingLog::read_all(&log_path).unwrap();
        assert_eq!(records.len(), 1);
    }
}
