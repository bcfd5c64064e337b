//! `tabsight tail`: show the most recent records of a telemetry log.

use std::path::Path;

use tabsight_core::{TelemetryRecord, read_records};

/// Print the last `count` records (optionally only those of `event_type`)
/// as one JSON object per line.
pub fn run(path: &Path, count: usize, event_type: Option<&str>) {
    let records = match read_records(path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to read {}: {e}", path.display());
            std::process::exit(1);
        }
    };

    for record in last_matching(&records, count, event_type) {
        match serde_json::to_string(record) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("Skipping unprintable record: {e}"),
        }
    }
}

fn last_matching<'a>(
    records: &'a [TelemetryRecord],
    count: usize,
    event_type: Option<&str>,
) -> Vec<&'a TelemetryRecord> {
    let matching: Vec<&TelemetryRecord> = records
        .iter()
        .filter(|r| event_type.is_none_or(|t| r.event_type == t))
        .collect();
    matching[matching.len().saturating_sub(count)..].to_vec()
}
