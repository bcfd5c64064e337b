//! `tabsight snapshot`: one resource snapshot, printed as JSON.

use std::time::Duration;

use tabsight_core::{ProcfsProbe, ResourceAggregator};

/// Take a baseline tick, wait `interval`, and print the second tick so CPU
/// and network deltas are populated.
pub fn run(target: &str, interval: Duration) {
    let mut aggregator = ResourceAggregator::new(ProcfsProbe::new(), target);

    if let Err(e) = aggregator.tick() {
        eprintln!("Failed to enumerate processes: {e}");
        std::process::exit(1);
    }
    std::thread::sleep(interval);

    let snapshot = match aggregator.tick() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to enumerate processes: {e}");
            std::process::exit(1);
        }
    };
    match serde_json::to_string_pretty(&snapshot.to_payload()) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to encode snapshot: {e}");
            std::process::exit(1);
        }
    }
}
