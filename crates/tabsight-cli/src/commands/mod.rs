pub mod collect;
pub mod predict;
pub mod predict_server;
pub mod snapshot;
pub mod tail;

/// Build a multi-threaded tokio runtime, exiting on failure.
pub fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {e}");
            std::process::exit(1);
        }
    }
}

/// Resolves on Ctrl+C. If the handler cannot be installed the future never
/// resolves, so the service keeps running until killed.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown requested");
}

/// Split a comma-separated list of event labels. Empty items are dropped.
pub fn parse_events(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a comma-separated list of elapsed seconds.
pub fn parse_times(s: &str) -> Result<Vec<f64>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| format!("'{t}' is not a number of seconds"))
        })
        .collect()
}
