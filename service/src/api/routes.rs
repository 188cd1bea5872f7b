//! API routes
//!
//! - `POST /analyze` (alias `/functions/v1/analyze-content`)
//! - `GET /health`

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tracing::{debug, error, info_span, Instrument};

use super::dto::{AnalyzeRequest, ErrorResponse, HealthResponse};
use super::{CACHE_SOURCE_HEADER, REQUEST_ID_HEADER};
use crate::core::analysis::{AnalysisOutcome, ProgressUpdate};
use crate::core::{CoreError, CoreResult, RequestId};
use crate::AppState;

type AppStateArc = Arc<AppState>;

// ============================================================================
// Analysis Routes
// ============================================================================

pub fn analysis_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/functions/v1/analyze-content", post(analyze))
}

async fn analyze(State(state): State<AppStateArc>, body: Bytes) -> Response {
    let request_id: RequestId = ulid::Ulid::new().to_string();
    let span = info_span!("analyze", request_id = %request_id);

    let mut response = match run_analysis(&state, &body).instrument(span).await {
        Ok(outcome) => success_response(outcome),
        Err(e) => {
            error!("Request {} failed: {}", request_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::from(&e))).into_response()
        }
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn run_analysis(state: &AppState, body: &[u8]) -> CoreResult<AnalysisOutcome> {
    let request: AnalyzeRequest = serde_json::from_slice(body)
        .map_err(|e| CoreError::ValidationError(format!("Invalid request body: {}", e)))?;
    let submission = request.into_submission()?;

    let progress = |update: ProgressUpdate| debug!("Progress {}% ({:?})", update.percent, update.stage);
    state.orchestrator.run(&submission, &progress).await
}

fn success_response(outcome: AnalysisOutcome) -> Response {
    (
        StatusCode::OK,
        [(CACHE_SOURCE_HEADER, outcome.source.as_str())],
        Json(outcome.result),
    )
        .into_response()
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.model.clone(),
        shared_cache: state.shared_backend.clone(),
    })
}

// ============================================================================
// Tests
// ============================================================================
