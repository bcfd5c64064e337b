//! Inference function contract and the bundled model kinds.
//!
//! Any [`SequenceModel`] with the vocabulary's size and a fixed window
//! length can be plugged into the predictor.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::artifacts::{Vocabulary, invalid, read_json};
use crate::encoder::EncodedWindow;
use crate::error::{ArtifactLoadError, PredictionError};

/// Opaque inference function: fixed-length window in, distribution out.
pub trait SequenceModel: Send + Sync {
    /// Number of entries the model expects in each input sequence.
    fn window_len(&self) -> usize;

    /// Number of slots in the returned distribution.
    fn vocab_size(&self) -> usize;

    /// Short identifier for health output and logs.
    fn name(&self) -> &str;

    /// Probability of each vocabulary slot being the next event.
    fn predict(&self, window: &EncodedWindow) -> Result<Vec<f64>, PredictionError>;
}

/// Which bundled model to load from `model.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// First-order transition table keyed on the latest event.
    #[default]
    Transition,
    /// Unigram prior, ignores the window contents.
    Frequency,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transition => write!(f, "transition"),
            Self::Frequency => write!(f, "frequency"),
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transition" => Ok(Self::Transition),
            "frequency" => Ok(Self::Frequency),
            other => Err(format!(
                "unknown model kind '{other}' (expected transition or frequency)"
            )),
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ModelFile {
    Transition {
        window_len: usize,
        matrix: Vec<Vec<f64>>,
    },
    Frequency {
        window_len: usize,
        weights: Vec<f64>,
    },
}

/// Load `model.json`, checking it is of `kind` and sized for `vocabulary`.
pub fn load_model(
    path: &Path,
    kind: ModelKind,
    vocabulary: &Vocabulary,
) -> Result<Box<dyn SequenceModel>, ArtifactLoadError> {
    let vocab_size = vocabulary.len();
    let file: ModelFile = read_json(path)?;
    let model: Box<dyn SequenceModel> = match (kind, file) {
        (ModelKind::Transition, ModelFile::Transition { window_len, matrix }) => Box::new(
            TransitionModel::new(window_len, matrix)
                .map_err(|r| invalid(path, r))?
                .with_code_slots(vocabulary.code_slots()),
        ),
        (ModelKind::Frequency, ModelFile::Frequency { window_len, weights }) => Box::new(
            FrequencyModel::new(window_len, weights).map_err(|r| invalid(path, r))?,
        ),
        (kind, _) => {
            return Err(invalid(path, format!("file does not hold a {kind} model")));
        }
    };
    if model.vocab_size() != vocab_size {
        return Err(invalid(
            path,
            format!(
                "model has {} output slots but the vocabulary has {vocab_size} labels",
                model.vocab_size()
            ),
        ));
    }
    Ok(model)
}

fn check_row(row: &[f64]) -> Result<(), String> {
    if row.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err("weights must be finite and non-negative".to_string());
    }
    if row.iter().sum::<f64>() <= 0.0 {
        return Err("each weight row needs at least one positive entry".to_string());
    }
    Ok(())
}

fn normalized(row: &[f64]) -> Vec<f64> {
    let total: f64 = row.iter().sum();
    row.iter().map(|w| w / total).collect()
}

// ---------------------------------------------------------------------------
// Transition model
// ---------------------------------------------------------------------------

/// `matrix[from][to]` weights, where `from` is the latest real event's
/// distribution slot. A window whose latest event has no row (e.g. the
/// code falls outside the table) gets the column-averaged prior.
#[derive(Debug, Clone)]
pub struct TransitionModel {
    window_len: usize,
    rows: Vec<Vec<f64>>,
    prior: Vec<f64>,
    slot_of_code: Vec<(u32, usize)>,
}

impl TransitionModel {
    pub fn new(window_len: usize, matrix: Vec<Vec<f64>>) -> Result<Self, String> {
        if window_len == 0 {
            return Err("window_len must be at least 1".to_string());
        }
        let k = matrix.len();
        if k == 0 {
            return Err("transition matrix is empty".to_string());
        }
        for (i, row) in matrix.iter().enumerate() {
            if row.len() != k {
                return Err(format!("row {i} has {} columns, expected {k}", row.len()));
            }
            check_row(row).map_err(|e| format!("row {i}: {e}"))?;
        }
        let rows: Vec<Vec<f64>> = matrix.iter().map(|r| normalized(r)).collect();
        let mut prior = vec![0.0; k];
        for row in &rows {
            for (p, w) in prior.iter_mut().zip(row) {
                *p += w / k as f64;
            }
        }
        Ok(Self {
            window_len,
            rows,
            prior,
            slot_of_code: Vec::new(),
        })
    }

    /// Map vocabulary codes to matrix rows. Without this, codes are used
    /// directly as row indices.
    pub fn with_code_slots(mut self, pairs: impl IntoIterator<Item = (u32, usize)>) -> Self {
        self.slot_of_code = pairs.into_iter().collect();
        self
    }

    fn row_for(&self, code: u32) -> Option<&[f64]> {
        let slot = if self.slot_of_code.is_empty() {
            code as usize
        } else {
            self.slot_of_code
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, s)| *s)?
        };
        self.rows.get(slot).map(Vec::as_slice)
    }
}

impl SequenceModel for TransitionModel {
    fn window_len(&self) -> usize {
        self.window_len
    }

    fn vocab_size(&self) -> usize {
        self.rows.len()
    }

    fn name(&self) -> &str {
        "transition"
    }

    fn predict(&self, window: &EncodedWindow) -> Result<Vec<f64>, PredictionError> {
        let row = window
            .real_codes()
            .last()
            .and_then(|&code| self.row_for(code))
            .unwrap_or(self.prior.as_slice());
        Ok(row.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Frequency model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FrequencyModel {
    window_len: usize,
    probs: Vec<f64>,
}

impl FrequencyModel {
    pub fn new(window_len: usize, weights: Vec<f64>) -> Result<Self, String> {
        if window_len == 0 {
            return Err("window_len must be at least 1".to_string());
        }
        if weights.is_empty() {
            return Err("weights are empty".to_string());
        }
        check_row(&weights)?;
        Ok(Self {
            window_len,
            probs: normalized(&weights),
        })
    }
}

impl SequenceModel for FrequencyModel {
    fn window_len(&self) -> usize {
        self.window_len
    }

    fn vocab_size(&self) -> usize {
        self.probs.len()
    }

    fn name(&self) -> &str {
        "frequency"
    }

    fn predict(&self, _window: &EncodedWindow) -> Result<Vec<f64>, PredictionError> {
        Ok(self.probs.clone())
    }
}
