//! Temperature sampling over a probability vector.
//!
//! `p_i' ∝ exp(ln(p_i + ε) / τ)`. Small τ sharpens toward arg-max, τ = 1
//! reproduces the input distribution, large τ flattens toward uniform.
//! The reweighting is done in the log domain and shifted by the maximum
//! before exponentiating so tiny temperatures do not overflow.

use rand::Rng;

use crate::error::PredictionError;

/// Floor added to every probability before taking the log.
pub const EPSILON: f64 = 1e-8;

/// Reweight `probs` by temperature and renormalize to sum to 1.
pub fn reweight(probs: &[f64], temperature: f64) -> Result<Vec<f64>, PredictionError> {
    if !(temperature.is_finite() && temperature > 0.0) {
        return Err(PredictionError::InvalidTemperature(temperature));
    }
    if probs.is_empty() {
        return Err(PredictionError::Inference(
            "empty probability vector".to_string(),
        ));
    }
    if let Some(p) = probs.iter().find(|p| !p.is_finite() || **p < 0.0) {
        return Err(PredictionError::Inference(format!(
            "probability {p} is negative or not finite"
        )));
    }

    let logits: Vec<f64> = probs
        .iter()
        .map(|p| (p + EPSILON).ln() / temperature)
        .collect();
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        // τ so small the logits left the representable range: take the
        // τ → 0 limit, split evenly over the arg-max ties.
        return Ok(argmax_limit(probs));
    }
    let weights: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = weights.iter().sum();
    Ok(weights.into_iter().map(|w| w / total).collect())
}

fn argmax_limit(probs: &[f64]) -> Vec<f64> {
    let top = probs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let ties = probs.iter().filter(|p| **p == top).count() as f64;
    probs
        .iter()
        .map(|p| if *p == top { 1.0 / ties } else { 0.0 })
        .collect()
}

/// Select an index from `probs` at `temperature`, given a uniform draw
/// `u` in `[0, 1)`. Pure: identical inputs always select the same index.
pub fn sample_index(probs: &[f64], temperature: f64, u: f64) -> Result<usize, PredictionError> {
    let weights = reweight(probs, temperature)?;
    let mut cumulative = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cumulative += w;
        if u < cumulative {
            return Ok(i);
        }
    }
    // Rounding can leave the cumulative sum a hair below 1.0.
    Ok(weights
        .iter()
        .rposition(|w| *w > 0.0)
        .unwrap_or(weights.len() - 1))
}

/// Draw one index using `rng` as the uniform source.
pub fn sample_with_temperature<R: Rng>(
    probs: &[f64],
    temperature: f64,
    rng: &mut R,
) -> Result<usize, PredictionError> {
    sample_index(probs, temperature, rng.random::<f64>())
}
