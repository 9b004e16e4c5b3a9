//! HTTP routes and handlers

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use peerhive_classifier::ModelState;
use peerhive_core::{Error, Prediction};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::state::AppState;

pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    // The front-end is served from a different origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Body of `POST /predict`
#[derive(Debug, Deserialize)]
struct PredictRequest {
    #[serde(default)]
    text: Option<String>,
}

/// Classify the submitted text into a zone
async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<Prediction>, AppError> {
    metrics::counter!("peerhive_requests_total").increment(1);

    // Checked before the body so a missing model answers the same for every input
    let classifier = state.model.classifier()?;

    let Json(req) = payload?;
    let text = req.text.unwrap_or_default();
    if text.is_empty() {
        return Err(Error::invalid_input("No text provided").into());
    }

    debug!("Classifying {} bytes of text", text.len());
    let start = Instant::now();

    let prediction = classifier
        .classify(&text)
        .await
        .map_err(AppError::Inference)?;

    metrics::histogram!("peerhive_inference_latency_us")
        .record(start.elapsed().as_micros() as f64);
    metrics::counter!("peerhive_predictions_total", "zone" => prediction.predicted_zone.as_str())
        .increment(1);

    Ok(Json(prediction))
}

async fn health_check(State(state): State<AppState>) -> Response {
    match state.model.as_ref() {
        ModelState::Loaded(classifier) => Json(json!({
            "status": "ok",
            "model_loaded": true,
            "model": classifier.name(),
        }))
        .into_response(),
        ModelState::Failed { reason } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "model_loaded": false,
                "reason": reason,
            })),
        )
            .into_response(),
    }
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

async fn fallback() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}

/// Error handling
#[derive(Debug)]
pub enum AppError {
    ModelNotLoaded,
    InvalidRequest(String),
    PayloadTooLarge,
    Inference(Error),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::ModelNotLoaded => "model_not_loaded",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::PayloadTooLarge => "payload_too_large",
            AppError::Inference(_) => "inference",
        }
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::ModelUnavailable(_) => AppError::ModelNotLoaded,
            Error::InvalidInput(msg) => AppError::InvalidRequest(msg),
            other => AppError::Inference(other),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::InvalidRequest(format!("Invalid JSON body: {}", rejection.body_text()))
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        metrics::counter!("peerhive_errors_total", "kind" => self.kind()).increment(1);

        let (status, message) = match self {
            AppError::ModelNotLoaded => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Model not loaded".to_string(),
            ),
            AppError::InvalidRequest(msg) => {
                warn!("Rejected request: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large".to_string(),
            ),
            AppError::Inference(err) => {
                error!("Inference failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Inference failed".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
