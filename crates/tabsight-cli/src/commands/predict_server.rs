//! `tabsight predict-server`: serve next-event predictions over HTTP.

use std::sync::Arc;

use tabsight_core::{Predictor, PredictorConfig};
use tabsight_server::PredictorState;

/// Load artifacts, then serve until Ctrl+C. Artifact failures exit before
/// the port is bound.
pub fn run(host: &str, port: u16, config: &PredictorConfig, seed: Option<u64>) {
    let predictor = match Predictor::load(config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to load model artifacts: {e}");
            std::process::exit(1);
        }
    };

    let base = format!("http://{host}:{port}");
    println!("tabsight predictor v{}", tabsight_core::VERSION);
    println!("   {base}");
    println!(
        "   {} model, {} labels, window length {}",
        predictor.model_name(),
        predictor.vocabulary().len(),
        predictor.window_len()
    );
    println!();
    println!("   Endpoints:");
    println!("     POST /predict  Sample the next event");
    println!("     GET  /health   Model summary");
    println!("     GET  /         API index");
    println!();
    println!("   Example:");
    println!(
        "     curl -X POST {base}/predict -H 'content-type: application/json' \\\n       -d '{{\"event_sequence\": [\"{}\"], \"time_sequence\": [1.0]}}'",
        predictor.vocabulary().label_at(0).unwrap_or("tabCreated")
    );
    println!();

    let state = Arc::new(match seed {
        Some(seed) => PredictorState::with_seed(predictor, seed),
        None => PredictorState::new(predictor),
    });
    let router = tabsight_server::predictor_router(state);

    let rt = super::runtime();
    if let Err(e) = rt.block_on(tabsight_server::run_server(router, host, port, super::ctrl_c())) {
        eprintln!("Predictor server failed on {base}: {e}");
        std::process::exit(1);
    }
}
