//! # tabsight-core
//!
//! Browser-usage telemetry and next-event prediction.
//!
//! Two independent halves share this crate:
//!
//! - **Collection.** A [`TelemetrySink`] appends client events and periodic
//!   [`ResourceSnapshot`]s to one NDJSON log. The [`ResourceAggregator`]
//!   sums memory and CPU of every process whose name contains a target
//!   string (e.g. `chrome`), reading `/proc` through a [`ProcessProbe`].
//! - **Prediction.** A [`Predictor`] encodes a raw event history into a
//!   fixed-length window, asks a [`SequenceModel`] for a probability
//!   distribution over the vocabulary, and draws one label with
//!   temperature-controlled sampling.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tabsight_core::{PredictionRequest, Predictor, PredictorConfig};
//!
//! let predictor = Predictor::load(&PredictorConfig::default()).unwrap();
//! let request = PredictionRequest::new(
//!     vec!["tabCreated".into(), "tabSwitched".into()],
//!     vec![0.0, 4.2],
//! );
//! let result = predictor.predict(&request, &mut rand::rng()).unwrap();
//! println!("next: {}", result.predicted_label);
//! ```
//!
//! ## Architecture
//!
//! Events → Encoder (filter, scale, pad) → Model → Sampler → Label
//!
//! Procfs → Aggregator → Sink ← Ingestion endpoint

pub mod aggregator;
pub mod artifacts;
pub mod config;
pub mod encoder;
pub mod error;
pub mod model;
pub mod predictor;
pub mod probe;
pub mod sampler;
pub mod sink;

pub use aggregator::{
    NetDeltaStatus, RESOURCE_USAGE_TYPE, ResourceAggregator, ResourceSnapshot, TargetMatcher,
    net_delta, run_periodic,
};
pub use artifacts::{ArtifactPaths, TimeScaler, Vocabulary};
pub use config::{
    CollectorConfig, DEFAULT_COLLECTOR_PORT, DEFAULT_HOST, DEFAULT_PREDICTOR_PORT,
    PredictorConfig, parse_duration, parse_interval,
};
pub use encoder::{EncodedWindow, PAD_CODE, PAD_TIME, WindowEncoder};
pub use error::{
    AggregateError, ArtifactLoadError, EnumerationError, PredictionError, ProcessAccessError,
    SinkWriteError,
};
pub use model::{FrequencyModel, ModelKind, SequenceModel, TransitionModel, load_model};
pub use predictor::{PredictionRequest, PredictionResult, Predictor};
pub use probe::{
    CpuTimes, MemoryMethod, MemoryReading, NetCounters, ProcessProbe, ProcfsProbe,
    SystemCounters, measure_memory, procfs_available,
};
pub use sampler::{reweight, sample_index, sample_with_temperature};
pub use sink::{RecordKind, TelemetryRecord, TelemetrySink, payload_type, read_records};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
