//! Prediction orchestrator: encode → infer → sample → decode.

use std::sync::Arc;

use chrono::{Local, TimeZone};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::artifacts::{ArtifactPaths, TimeScaler, Vocabulary};
use crate::config::PredictorConfig;
use crate::encoder::WindowEncoder;
use crate::error::{ArtifactLoadError, PredictionError};
use crate::model::{SequenceModel, load_model};
use crate::sampler::sample_with_temperature;

/// How many trailing events the diagnostic dump shows.
pub const DIAGNOSTIC_HISTORY: usize = 15;

fn default_temperature() -> f64 {
    1.0
}

/// Raw prediction request as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    #[serde(default)]
    pub event_sequence: Vec<String>,
    #[serde(default)]
    pub time_sequence: Vec<f64>,
    /// Client clock in Unix milliseconds, used for logging only.
    #[serde(default)]
    pub timestamp_sequence: Vec<i64>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl PredictionRequest {
    pub fn new(events: Vec<String>, times: Vec<f64>) -> Self {
        Self {
            event_sequence: events,
            time_sequence: times,
            timestamp_sequence: Vec::new(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub predicted_label: String,
    /// Distribution returned by the model, before temperature reweighting.
    pub source_distribution: Vec<f64>,
}

/// Composes the encoder, a model and the sampler.
#[derive(Clone)]
pub struct Predictor {
    encoder: WindowEncoder,
    model: Arc<dyn SequenceModel>,
}

impl Predictor {
    /// Pair an encoder with a model. The model's window length wins; its
    /// output size must match the vocabulary.
    pub fn new(
        vocabulary: Arc<Vocabulary>,
        scaler: TimeScaler,
        model: Arc<dyn SequenceModel>,
    ) -> Result<Self, String> {
        if model.vocab_size() != vocabulary.len() {
            return Err(format!(
                "model '{}' has {} output slots but the vocabulary has {} labels",
                model.name(),
                model.vocab_size(),
                vocabulary.len()
            ));
        }
        if model.window_len() == 0 {
            return Err(format!("model '{}' has a zero window length", model.name()));
        }
        let encoder = WindowEncoder::new(vocabulary, scaler, model.window_len());
        Ok(Self { encoder, model })
    }

    /// Load all artifacts from `config.artifact_dir`. Any failure is fatal
    /// for the caller: a partially loaded predictor is never returned.
    pub fn load(config: &PredictorConfig) -> Result<Self, ArtifactLoadError> {
        let paths = ArtifactPaths::in_dir(&config.artifact_dir);
        let vocabulary = Arc::new(Vocabulary::load(&paths.vocabulary)?);
        let scaler = TimeScaler::load(&paths.scaler)?;
        let model: Arc<dyn SequenceModel> =
            load_model(&paths.model, config.model_kind, &vocabulary)?.into();
        log::info!(
            "Loaded {} model: {} labels, window length {}",
            model.name(),
            vocabulary.len(),
            model.window_len()
        );
        Self::new(vocabulary, scaler, model).map_err(|reason| ArtifactLoadError::Invalid {
            path: paths.model.clone(),
            reason,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        self.encoder.vocabulary()
    }

    pub fn window_len(&self) -> usize {
        self.encoder.window_len()
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Run one prediction using `rng` as the sampler's uniform source.
    pub fn predict<R: Rng>(
        &self,
        request: &PredictionRequest,
        rng: &mut R,
    ) -> Result<PredictionResult, PredictionError> {
        if log::log_enabled!(log::Level::Debug) {
            log_history(&request.event_sequence, &request.timestamp_sequence);
        }

        let window = self
            .encoder
            .encode(&request.event_sequence, &request.time_sequence)?;
        let distribution = self.model.predict(&window)?;
        if distribution.len() != self.vocabulary().len() {
            return Err(PredictionError::Inference(format!(
                "model returned {} probabilities for {} labels",
                distribution.len(),
                self.vocabulary().len()
            )));
        }

        let index = sample_with_temperature(&distribution, request.temperature, rng)?;
        let label = self.vocabulary().label_at(index).ok_or_else(|| {
            PredictionError::Inference(format!("sampled index {index} has no label"))
        })?;
        log::debug!(
            "Predicted '{label}' (slot {index}, p = {:.4}, temperature {})",
            distribution[index],
            request.temperature
        );

        Ok(PredictionResult {
            predicted_label: label.to_string(),
            source_distribution: distribution,
        })
    }
}

/// Dump the trailing events with their client timestamps as local time.
fn log_history(events: &[String], timestamps_ms: &[i64]) {
    let events = &events[events.len().saturating_sub(DIAGNOSTIC_HISTORY)..];
    let stamps = &timestamps_ms[timestamps_ms.len().saturating_sub(DIAGNOSTIC_HISTORY)..];
    log::debug!("=== Feeding model with last {} events: ===", events.len());
    for (event, &ms) in events.iter().zip(stamps) {
        log::debug!("{}  -  {event}", format_local_ms(ms));
    }
}

/// `YYYY-MM-DD HH:MM:SS` in local time, or the raw value if out of range.
pub fn format_local_ms(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("{ms}ms"),
    }
}
