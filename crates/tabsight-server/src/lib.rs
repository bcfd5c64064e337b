//! HTTP surfaces for tabsight.
//!
//! Two independent services, each with its own explicitly constructed
//! state:
//!
//! - the **collector** accepts client events on `POST /log` and appends
//!   them to the shared [`TelemetrySink`];
//! - the **predictor** answers `POST /predict` with a sampled next event.
//!
//! Client-correctable failures come back as `400 {"error": ...}`; server
//! faults as `5xx {"error": ...}`.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use tabsight_core::{
    PredictionError, PredictionRequest, Predictor, RecordKind, SinkWriteError, TelemetrySink,
};

// ---------------------------------------------------------------------------
// Shared response plumbing
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type Reply<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

trait JsonWithStatus<T> {
    fn with_status(self, status: StatusCode) -> (StatusCode, Json<T>);
}

impl<T> JsonWithStatus<T> for Json<T> {
    fn with_status(self, status: StatusCode) -> (StatusCode, Json<T>) {
        (status, self)
    }
}

fn error_reply(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    Json(ErrorResponse {
        error: error.into(),
    })
    .with_status(status)
}

fn bad_body(rejection: JsonRejection) -> (StatusCode, Json<ErrorResponse>) {
    log::warn!("Rejected request body: {}", rejection.body_text());
    error_reply(StatusCode::BAD_REQUEST, rejection.body_text())
}

fn prediction_status(err: &PredictionError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn sink_status(err: &SinkWriteError) -> StatusCode {
    match err {
        SinkWriteError::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// State of the ingestion service.
pub struct CollectorState {
    sink: Arc<TelemetrySink>,
}

impl CollectorState {
    pub fn new(sink: Arc<TelemetrySink>) -> Self {
        Self { sink }
    }
}

#[derive(Serialize)]
struct LogResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct CollectorHealth {
    status: &'static str,
    log_path: String,
    records_written: u64,
}

async fn handle_log(
    State(state): State<Arc<CollectorState>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Reply<LogResponse> {
    let Json(payload) = body.map_err(bad_body)?;
    match state.sink.append(RecordKind::ClientEvent, payload).await {
        Ok(record) => {
            log::debug!("Logged {} event", record.event_type);
            Ok(Json(LogResponse { status: "success" }))
        }
        Err(e) => {
            log::error!("Failed to log client event: {e}");
            Err(error_reply(sink_status(&e), e.to_string()))
        }
    }
}

async fn handle_collector_health(State(state): State<Arc<CollectorState>>) -> Json<CollectorHealth> {
    Json(CollectorHealth {
        status: "healthy",
        log_path: state.sink.path().display().to_string(),
        records_written: state.sink.records_written().await,
    })
}

async fn handle_collector_index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "tabsight collector",
        "version": tabsight_core::VERSION,
        "endpoints": {
            "/": "This API index",
            "/log": {
                "method": "POST",
                "description": "Append a client event (any JSON; `type` is recorded, default \"unknown\")",
            },
            "/health": "Health check",
        }
    }))
}

/// Build the ingestion router.
pub fn collector_router(sink: Arc<TelemetrySink>) -> Router {
    let state = Arc::new(CollectorState::new(sink));
    Router::new()
        .route("/", get(handle_collector_index))
        .route("/log", post(handle_log))
        .route("/health", get(handle_collector_health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Predictor
// ---------------------------------------------------------------------------

/// State of the prediction service: the loaded predictor and the random
/// source the sampler draws from.
pub struct PredictorState {
    predictor: Predictor,
    rng: Mutex<StdRng>,
}

impl PredictorState {
    /// Sampling seeded from the OS.
    pub fn new(predictor: Predictor) -> Self {
        Self {
            predictor,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic sampling, for reproducible runs.
    pub fn with_seed(predictor: Predictor, seed: u64) -> Self {
        Self {
            predictor,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[derive(Serialize)]
struct PredictResponse {
    predicted_event: String,
}

#[derive(Serialize)]
struct PredictorHealth {
    status: &'static str,
    model: String,
    vocabulary_size: usize,
    window_len: usize,
}

async fn handle_predict(
    State(state): State<Arc<PredictorState>>,
    body: Result<Json<PredictionRequest>, JsonRejection>,
) -> Reply<PredictResponse> {
    let Json(request) = body.map_err(bad_body)?;
    let result = {
        let mut rng = state.rng.lock().await;
        state.predictor.predict(&request, &mut *rng)
    };
    match result {
        Ok(r) => Ok(Json(PredictResponse {
            predicted_event: r.predicted_label,
        })),
        Err(e) => {
            let status = prediction_status(&e);
            if status.is_client_error() {
                log::warn!("Prediction rejected: {e}");
            } else {
                log::error!("Prediction failed: {e}");
            }
            Err(error_reply(status, e.to_string()))
        }
    }
}

async fn handle_predictor_health(State(state): State<Arc<PredictorState>>) -> Json<PredictorHealth> {
    let p = &state.predictor;
    Json(PredictorHealth {
        status: "healthy",
        model: p.model_name().to_string(),
        vocabulary_size: p.vocabulary().len(),
        window_len: p.window_len(),
    })
}

async fn handle_predictor_index(State(state): State<Arc<PredictorState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "tabsight predictor",
        "version": tabsight_core::VERSION,
        "model": state.predictor.model_name(),
        "endpoints": {
            "/": "This API index",
            "/predict": {
                "method": "POST",
                "description": "Sample the next event from a recent event history",
                "body": {
                    "event_sequence": "Event labels, oldest first",
                    "time_sequence": "Elapsed seconds, one per event",
                    "timestamp_sequence": "Client timestamps in ms (optional, logged only)",
                    "temperature": "Sampling temperature > 0 (default: 1.0)",
                }
            },
            "/health": "Model and vocabulary summary",
        }
    }))
}

/// Build the prediction router.
pub fn predictor_router(state: Arc<PredictorState>) -> Router {
    Router::new()
        .route("/", get(handle_predictor_index))
        .route("/predict", post(handle_predict))
        .route("/health", get(handle_predictor_health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Serving
// ---------------------------------------------------------------------------

/// Serve `router` on an already bound listener until `shutdown` resolves.
/// In-flight requests are allowed to finish.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Bind `host:port` and serve `router` until `shutdown` resolves.
pub async fn run_server<F>(router: Router, host: &str, port: u16, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    serve(listener, router, shutdown).await
}
