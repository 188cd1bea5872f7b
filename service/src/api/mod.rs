//! HTTP Entry Point
//!
//! axum router exposing the analysis pipeline.

pub mod dto;
pub mod routes;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, Method};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Response header naming the tier a result came from
pub const CACHE_SOURCE_HEADER: &str = "x-truthgen-cache";

/// Response header carrying the per-request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Builds the router with CORS, body limit and tracing layers
pub fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
        .expose_headers([
            HeaderName::from_static(CACHE_SOURCE_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ]);

    Router::new()
        .merge(routes::analysis_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
