//! Append-only telemetry log shared by the ingestion endpoint and the
//! resource aggregator.
//!
//! # Storage Format
//!
//! Newline-delimited JSON, one [`TelemetryRecord`] per line. A record is
//! fully encoded in memory before any byte reaches the file and is then
//! written with a single `write_all`. If that write fails the file is cut
//! back to its previous length, so readers never see a torn line.
//!
//! Appends are serialized through one writer lock. Waiting for the lock is
//! bounded by the configured write timeout; an append that cannot get the
//! lock in time fails with [`SinkWriteError::LockTimeout`]. The write
//! itself runs on the blocking pool while the lock is held and is not
//! bounded: a stalled disk delays later appends until their own lock wait
//! times out. Once started, a write finishes (or is rolled back) even if
//! the caller stops waiting for it.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::SinkWriteError;

/// Origin of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    ClientEvent,
    ResourceUsage,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientEvent => write!(f, "client_event"),
            Self::ResourceUsage => write!(f, "resource_usage"),
        }
    }
}

/// One immutable log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Wall-clock time assigned under the writer lock.
    pub timestamp: DateTime<Local>,
    pub kind: RecordKind,
    /// The payload's `type` discriminator, or `"unknown"`.
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Discriminator of an opaque payload.
pub fn payload_type(payload: &serde_json::Value) -> &str {
    payload
        .get("type")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown")
}

struct WriterState {
    file: File,
    len: u64,
    records: u64,
}

/// Shared append-only sink. Wrap in an `Arc` to share between tasks.
pub struct TelemetrySink {
    path: PathBuf,
    state: Arc<Mutex<WriterState>>,
    write_timeout: Duration,
}

impl TelemetrySink {
    /// Open (or create) the log at `path` for appending.
    pub fn open(path: impl Into<PathBuf>, write_timeout: Duration) -> Result<Self, SinkWriteError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let len = file.metadata()?.len();
        log::info!("Telemetry log {} opened at {} bytes", path.display(), len);
        Ok(Self {
            path,
            state: Arc::new(Mutex::new(WriterState {
                file,
                len,
                records: 0,
            })),
            write_timeout,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this handle since it was opened.
    pub async fn records_written(&self) -> u64 {
        self.state.lock().await.records
    }

    /// Append one record built from `payload`. Returns what was written.
    pub async fn append(
        &self,
        kind: RecordKind,
        payload: serde_json::Value,
    ) -> Result<TelemetryRecord, SinkWriteError> {
        let event_type = payload_type(&payload).to_string();
        let mut state =
            tokio::time::timeout(self.write_timeout, Arc::clone(&self.state).lock_owned())
                .await
                .map_err(|_| SinkWriteError::LockTimeout(self.write_timeout))?;

        let record = TelemetryRecord {
            timestamp: Local::now(),
            kind,
            event_type,
            payload,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_line(&mut state, &line, &path))
            .await
            .map_err(std::io::Error::other)??;
        Ok(record)
    }
}

/// Write one encoded line, cutting the file back on failure.
fn write_line(state: &mut WriterState, line: &[u8], path: &Path) -> std::io::Result<()> {
    if let Err(e) = state.file.write_all(line).and_then(|()| state.file.flush()) {
        let previous = state.len;
        if let Err(trunc) = state.file.set_len(previous) {
            log::error!("Failed to roll back partial record in {}: {trunc}", path.display());
        }
        return Err(e);
    }
    state.len += line.len() as u64;
    state.records += 1;
    Ok(())
}

/// Read every record from an NDJSON log. Blank lines are skipped.
pub fn read_records(path: &Path) -> std::io::Result<Vec<TelemetryRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{}:{}: {e}", path.display(), lineno + 1),
            )
        })?;
        out.push(record);
    }
    Ok(out)
}
