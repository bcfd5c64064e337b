//! Offline-trained artifacts consumed read-only at startup.
//!
//! # Storage Format
//!
//! An artifact directory contains:
//! - `vocabulary.json`: closed label set with stable integer codes
//! - `scaler.json`: elapsed-time scaling transform
//! - `model.json`: inference model parameters (see [`crate::model`])

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ArtifactLoadError;

pub const VOCABULARY_FILE: &str = "vocabulary.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "model.json";

/// Read and deserialize a JSON artifact.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| ArtifactLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ArtifactLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn invalid(path: &Path, reason: impl Into<String>) -> ArtifactLoadError {
    ArtifactLoadError::Invalid {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum VocabularyFile {
    Classes { classes: Vec<String> },
    Codes { codes: BTreeMap<String, u32> },
}

/// Closed set of event labels with stable integer codes.
///
/// Probability slot `i` of a model distribution belongs to the label with
/// the `i`-th smallest code, so `[0, len)` indexes labels in code order.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    codes: HashMap<String, u32>,
    by_code: Vec<(u32, String)>,
}

impl Vocabulary {
    /// Build from explicit `(label, code)` pairs. Codes must be unique.
    pub fn from_codes<I, S>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut codes = HashMap::new();
        let mut by_code = Vec::new();
        for (label, code) in pairs {
            let label = label.into();
            if codes.insert(label.clone(), code).is_some() {
                return Err(format!("duplicate label '{label}'"));
            }
            by_code.push((code, label));
        }
        by_code.sort_by_key(|(code, _)| *code);
        if let Some(pair) = by_code.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(format!("code {} assigned to more than one label", pair[0].0));
        }
        if by_code.is_empty() {
            return Err("vocabulary is empty".to_string());
        }
        Ok(Self { codes, by_code })
    }

    /// Label-encoder style: each label's code is its position.
    pub fn from_classes<I, S>(classes: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_codes(classes.into_iter().zip(0u32..))
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactLoadError> {
        let file: VocabularyFile = read_json(path)?;
        let built = match file {
            VocabularyFile::Classes { classes } => Self::from_classes(classes),
            VocabularyFile::Codes { codes } => Self::from_codes(codes),
        };
        built.map_err(|reason| invalid(path, reason))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.codes.contains_key(label)
    }

    pub fn code(&self, label: &str) -> Option<u32> {
        self.codes.get(label).copied()
    }

    /// Label owning distribution slot `index`.
    pub fn label_at(&self, index: usize) -> Option<&str> {
        self.by_code.get(index).map(|(_, label)| label.as_str())
    }

    /// Number of labels (and distribution slots).
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// `(code, slot)` pairs in slot order.
    pub fn code_slots(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.by_code.iter().enumerate().map(|(slot, (code, _))| (*code, slot))
    }

    /// Labels in code order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.by_code.iter().map(|(_, label)| label.as_str())
    }
}

// ---------------------------------------------------------------------------
// Time scaler
// ---------------------------------------------------------------------------

/// Learned transform applied to elapsed seconds before inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeScaler {
    /// `(x - mean) / scale`
    Standard { mean: f64, scale: f64 },
    /// `(x - data_min) / (data_max - data_min)`
    MinMax { data_min: f64, data_max: f64 },
    Identity,
}

impl TimeScaler {
    pub fn load(path: &Path) -> Result<Self, ArtifactLoadError> {
        let scaler: Self = read_json(path)?;
        let finite = match &scaler {
            Self::Standard { mean, scale } => mean.is_finite() && scale.is_finite(),
            Self::MinMax { data_min, data_max } => data_min.is_finite() && data_max.is_finite(),
            Self::Identity => true,
        };
        if !finite {
            return Err(invalid(path, "scaler parameters must be finite"));
        }
        Ok(scaler)
    }

    pub fn transform(&self, x: f64) -> f64 {
        match *self {
            Self::Standard { mean, scale } => (x - mean) / nonzero(scale),
            Self::MinMax { data_min, data_max } => (x - data_min) / nonzero(data_max - data_min),
            Self::Identity => x,
        }
    }
}

// A constant feature has zero spread; scale by 1 instead of dividing by zero.
fn nonzero(v: f64) -> f64 {
    if v == 0.0 { 1.0 } else { v }
}

/// Artifact file paths inside an artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub vocabulary: PathBuf,
    pub scaler: PathBuf,
    pub model: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            vocabulary: dir.join(VOCABULARY_FILE),
            scaler: dir.join(SCALER_FILE),
            model: dir.join(MODEL_FILE),
        }
    }
}
