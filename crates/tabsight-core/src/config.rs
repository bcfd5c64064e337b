//! Runtime configuration for the collector and predictor services.

use std::path::PathBuf;
use std::time::Duration;

use crate::model::ModelKind;

/// Default ingestion port used by the browser extension.
pub const DEFAULT_COLLECTOR_PORT: u16 = 12005;
/// Default prediction port used by the browser extension.
pub const DEFAULT_PREDICTOR_PORT: u16 = 1100;
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Configuration for the telemetry collector.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Append-only NDJSON telemetry log.
    pub log_path: PathBuf,
    /// Case-insensitive substring matched against process names.
    pub target: String,
    /// Time between resource snapshots.
    pub interval: Duration,
    /// Upper bound on waiting for the log's writer lock.
    pub write_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("user_data.ndjson"),
            target: "chrome".to_string(),
            interval: Duration::from_secs(30),
            write_timeout: Duration::from_secs(2),
        }
    }
}

/// Configuration for the prediction service.
#[derive(Debug, Clone)]
pub struct PredictorConfig {
    /// Directory holding `vocabulary.json`, `scaler.json` and `model.json`.
    pub artifact_dir: PathBuf,
    pub model_kind: ModelKind,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("artifacts"),
            model_kind: ModelKind::default(),
        }
    }
}

/// Parse a human duration like `"30s"`, `"250ms"`, `"5m"` or `"1h"`.
/// A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration '{s}'"))?;
    let secs = match unit.trim() {
        "" | "s" => value,
        "ms" => value / 1000.0,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        other => return Err(format!("unknown duration unit '{other}' in '{s}'")),
    };
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration '{s}': {e}"))
}

/// [`parse_duration`] for sampling periods, where zero is meaningless.
pub fn parse_interval(s: &str) -> Result<Duration, String> {
    let interval = parse_duration(s)?;
    if interval.is_zero() {
        return Err(format!("interval '{}' must be greater than zero", s.trim()));
    }
    Ok(interval)
}
