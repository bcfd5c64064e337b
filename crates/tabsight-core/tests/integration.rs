//! Integration tests for tabsight-core.
//!
//! These tests exercise the two pipelines end to end:
//! artifacts on disk → predictor → sampled label, and
//! probe → aggregator → sink → records on disk.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;
use tabsight_core::{
    ArtifactLoadError, ModelKind, PredictionError, PredictionRequest, Predictor, PredictorConfig,
    ProcfsProbe, RecordKind, ResourceAggregator, TelemetrySink, procfs_available, read_records,
};

fn write_artifacts(dir: &Path, model: serde_json::Value) {
    std::fs::write(
        dir.join("vocabulary.json"),
        json!({"codes": {"tabCreated": 1, "tabSwitched": 2, "tabClosed": 3}}).to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.join("scaler.json"),
        json!({"kind": "standard", "mean": 10.0, "scale": 5.0}).to_string(),
    )
    .unwrap();
    std::fs::write(dir.join("model.json"), model.to_string()).unwrap();
}

fn config(dir: &Path, kind: ModelKind) -> PredictorConfig {
    PredictorConfig {
        artifact_dir: dir.to_path_buf(),
        model_kind: kind,
    }
}

fn request(events: &[&str]) -> PredictionRequest {
    let times = (0..events.len()).map(|i| i as f64).collect();
    PredictionRequest::new(events.iter().map(|s| s.to_string()).collect(), times)
}

#[test]
fn transition_model_from_disk_follows_latest_event() {
    let tmp = tempfile::tempdir().unwrap();
    // After tabCreated the next event is always tabSwitched.
    write_artifacts(
        tmp.path(),
        json!({
            "kind": "transition",
            "window_len": 4,
            "matrix": [[0.0, 1.0, 0.0], [0.2, 0.2, 0.6], [1.0, 1.0, 1.0]]
        }),
    );
    let predictor = Predictor::load(&config(tmp.path(), ModelKind::Transition)).unwrap();
    assert_eq!(predictor.window_len(), 4);
    assert_eq!(predictor.model_name(), "transition");

    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..50 {
        let result = predictor
            .predict(&request(&["tabClosed", "tabCreated"]), &mut rng)
            .unwrap();
        assert_eq!(result.predicted_label, "tabSwitched");
    }
}

#[test]
fn unknown_events_are_dropped_before_inference() {
    let tmp = tempfile::tempdir().unwrap();
    write_artifacts(
        tmp.path(),
        json!({"kind": "frequency", "window_len": 3, "weights": [0.0, 0.0, 1.0]}),
    );
    let predictor = Predictor::load(&config(tmp.path(), ModelKind::Frequency)).unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    let result = predictor
        .predict(&request(&["bogus", "tabCreated", "alsoBogus"]), &mut rng)
        .unwrap();
    assert_eq!(result.predicted_label, "tabClosed");

    let err = predictor
        .predict(&request(&["bogus", "alsoBogus"]), &mut rng)
        .unwrap_err();
    assert!(matches!(err, PredictionError::EmptyInput));
}

#[test]
fn missing_or_mismatched_artifacts_fail_to_load() {
    let tmp = tempfile::tempdir().unwrap();
    let err = Predictor::load(&config(tmp.path(), ModelKind::Transition)).err().unwrap();
    assert!(matches!(err, ArtifactLoadError::Io { .. }));

    write_artifacts(
        tmp.path(),
        json!({"kind": "frequency", "window_len": 3, "weights": [1.0, 1.0, 1.0]}),
    );
    let err = Predictor::load(&config(tmp.path(), ModelKind::Transition)).err().unwrap();
    assert!(matches!(err, ArtifactLoadError::Invalid { .. }));

    write_artifacts(
        tmp.path(),
        json!({"kind": "frequency", "window_len": 3, "weights": [1.0, 1.0]}),
    );
    let err = Predictor::load(&config(tmp.path(), ModelKind::Frequency)).err().unwrap();
    assert!(matches!(err, ArtifactLoadError::Invalid { .. }));
}

#[tokio::test]
async fn client_events_and_snapshots_share_one_log() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("data").join("user_data.ndjson");
    let sink = Arc::new(TelemetrySink::open(&path, Duration::from_secs(1)).unwrap());

    sink.append(RecordKind::ClientEvent, json!({"type": "tabCreated", "tabId": 4}))
        .await
        .unwrap();
    if procfs_available(Path::new("/proc")) {
        let mut aggregator = ResourceAggregator::new(ProcfsProbe::new(), "tabsight-no-such-process");
        let snapshot = aggregator.emit(&sink).await.unwrap();
        assert_eq!(snapshot.process_count, 0);
    }
    sink.append(RecordKind::ClientEvent, json!({"no_type": true}))
        .await
        .unwrap();

    let records = read_records(&path).unwrap();
    assert_eq!(records.first().unwrap().event_type, "tabCreated");
    assert_eq!(records.last().unwrap().event_type, "unknown");
    assert_eq!(records.len() as u64, sink.records_written().await);
}
