//! Error types shared across the collector and predictor halves.
//!
//! Each concern gets its own enum so callers can match on what actually
//! went wrong. Only per-process access failures are recovered locally (by
//! the aggregator); everything else propagates to the immediate caller.

use std::path::PathBuf;
use std::time::Duration;

/// Failures of the encode → infer → sample pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    /// No event in the request belongs to the vocabulary.
    #[error("no valid events: none of the submitted events are in the vocabulary")]
    EmptyInput,

    /// Sampling temperature was zero, negative or not a number.
    #[error("invalid temperature {0}: must be a finite value greater than zero")]
    InvalidTemperature(f64),

    /// Event and elapsed-time sequences are not index-aligned.
    #[error("event_sequence has {events} entries but time_sequence has {times}")]
    LengthMismatch { events: usize, times: usize },

    /// An elapsed time was negative or not finite.
    #[error("time_sequence[{index}] = {value} is not a finite non-negative number")]
    InvalidElapsedTime { index: usize, value: f64 },

    /// The inference function returned something unusable.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl PredictionError {
    /// Whether the caller can fix this by changing the request.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Inference(_))
    }
}

/// A single process could not be inspected.
#[derive(Debug, thiserror::Error)]
pub enum ProcessAccessError {
    /// The process exited between enumeration and inspection.
    #[error("process {pid} no longer exists")]
    Gone { pid: u32 },

    /// The OS refused access to the requested detail.
    #[error("access denied to process {pid}")]
    Denied { pid: u32 },

    #[error("failed to read process {pid}: {source}")]
    Io {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessAccessError {
    /// Map an I/O error from reading a per-process file.
    pub fn from_io(pid: u32, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::Gone { pid },
            std::io::ErrorKind::PermissionDenied => Self::Denied { pid },
            _ => Self::Io { pid, source: err },
        }
    }
}

/// The process table itself could not be listed.
#[derive(Debug, thiserror::Error)]
#[error("failed to enumerate processes: {0}")]
pub struct EnumerationError(#[from] pub std::io::Error);

/// An append to the telemetry log did not complete.
#[derive(Debug, thiserror::Error)]
pub enum SinkWriteError {
    #[error("telemetry log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode telemetry record: {0}")]
    Encode(#[from] serde_json::Error),

    /// Another writer held the log for longer than the write timeout.
    #[error("telemetry log busy: writer lock not acquired within {0:?}")]
    LockTimeout(Duration),
}

/// A startup artifact was missing or malformed.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactLoadError {
    #[error("cannot read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid artifact {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// One aggregation tick failed as a whole.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    #[error(transparent)]
    Sink(#[from] SinkWriteError),
}
