//! Take two resource snapshots of a target application and print them.
//!
//! Run: `cargo run --example snapshot -- firefox`

use std::time::Duration;

use tabsight_core::{ProcfsProbe, ResourceAggregator};

fn main() {
    let target = std::env::args().nth(1).unwrap_or_else(|| "chrome".to_string());
    let mut aggregator = ResourceAggregator::new(ProcfsProbe::new(), &target);

    // The first snapshot has no CPU or network baseline.
    for _ in 0..2 {
        match aggregator.tick() {
            Ok(s) => println!(
                "{target}: {} processes, {:.1} MiB, {:.1}% CPU, system CPU {:.1}%, net {:?}",
                s.process_count,
                s.aggregate_memory_bytes as f64 / (1024.0 * 1024.0),
                s.aggregate_cpu_percent,
                s.system_cpu_percent,
                s.net_status
            ),
            Err(e) => eprintln!("snapshot failed: {e}"),
        }
        std::thread::sleep(Duration::from_secs(1));
    }
}
