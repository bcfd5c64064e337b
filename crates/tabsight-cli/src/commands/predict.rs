//! `tabsight predict`: one offline prediction from the command line.

use rand::SeedableRng;
use rand::rngs::StdRng;

use tabsight_core::{PredictionRequest, Predictor, PredictorConfig};

pub struct PredictCommandConfig<'a> {
    pub predictor: PredictorConfig,
    pub events: &'a str,
    pub times: &'a str,
    pub temperature: f64,
    pub seed: Option<u64>,
    pub show_distribution: bool,
}

/// Run the predict command.
pub fn run(cfg: PredictCommandConfig<'_>) {
    let predictor = match Predictor::load(&cfg.predictor) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to load model artifacts: {e}");
            std::process::exit(1);
        }
    };

    let times = match super::parse_times(cfg.times) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Invalid --times: {e}");
            std::process::exit(1);
        }
    };
    let mut request = PredictionRequest::new(super::parse_events(cfg.events), times);
    request.temperature = cfg.temperature;

    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let result = match predictor.predict(&request, &mut rng) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Prediction failed: {e}");
            std::process::exit(1);
        }
    };

    println!("{}", result.predicted_label);
    if cfg.show_distribution {
        println!();
        for (slot, p) in result.source_distribution.iter().enumerate() {
            let label = predictor.vocabulary().label_at(slot).unwrap_or("?");
            println!("  {label:<24} {p:.4}");
        }
    }
}
