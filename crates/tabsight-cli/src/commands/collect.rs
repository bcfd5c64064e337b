//! `tabsight collect`: ingestion endpoint plus background resource sampler.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;

use tabsight_core::{
    CollectorConfig, ProcfsProbe, ResourceAggregator, TelemetrySink, procfs_available,
    run_periodic,
};

pub struct CollectCommandConfig<'a> {
    pub host: &'a str,
    pub port: u16,
    pub collector: CollectorConfig,
    pub sample_resources: bool,
}

/// Run the collect command until Ctrl+C.
pub fn run(cfg: CollectCommandConfig<'_>) {
    let CollectorConfig {
        log_path,
        target,
        interval,
        write_timeout,
    } = cfg.collector;

    let sink = match TelemetrySink::open(&log_path, write_timeout) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Failed to open {}: {e}", log_path.display());
            std::process::exit(1);
        }
    };

    let base = format!("http://{}:{}", cfg.host, cfg.port);
    println!("tabsight collector v{}", tabsight_core::VERSION);
    println!("   {base}");
    println!("   log: {}", log_path.display());
    println!();
    println!("   Endpoints:");
    println!("     POST /log      Append a client event");
    println!("     GET  /health   Records written since start");
    println!("     GET  /         API index");
    println!();

    let sample_resources = cfg.sample_resources && procfs_available(Path::new("/proc"));
    if cfg.sample_resources && !sample_resources {
        log::warn!("/proc is not readable here; resource sampling disabled");
    }

    let rt = super::runtime();
    rt.block_on(async {
        let (stop_tx, stop_rx) = watch::channel(false);

        let sampler = sample_resources.then(|| {
            log::info!("Sampling '{target}' every {interval:?}");
            let aggregator = ResourceAggregator::new(ProcfsProbe::new(), &target);
            tokio::spawn(run_periodic(aggregator, Arc::clone(&sink), interval, stop_rx))
        });

        let shutdown = async move {
            super::ctrl_c().await;
            let _ = stop_tx.send(true);
        };
        let router = tabsight_server::collector_router(Arc::clone(&sink));
        let served = tabsight_server::run_server(router, cfg.host, cfg.port, shutdown).await;

        // A failed bind drops the stop sender, which also ends the sampler.
        if let Some(handle) = sampler {
            if let Err(e) = handle.await {
                log::error!("Resource sampler task failed: {e}");
            }
        }
        if let Err(e) = served {
            eprintln!("Collector server failed on {base}: {e}");
            std::process::exit(1);
        }
        log::info!("{} records written this run", sink.records_written().await);
    });
}
