use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::models::SubmissionState;
use crate::services::AppState;

pub mod exam_sessions;
pub mod sse;

/// Liveness plus a breakdown of registered sessions by submission state.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (mut in_progress, mut submitting, mut submitted) = (0usize, 0usize, 0usize);
    for session in state.sessions() {
        match session.submission_state() {
            SubmissionState::InProgress => in_progress += 1,
            SubmissionState::Submitting => submitting += 1,
            SubmissionState::Submitted => submitted += 1,
        }
    }

    Json(json!({
        "status": "healthy",
        "service": "exam-engine",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": {
            "in_progress": in_progress,
            "submitting": submitting,
            "submitted": submitted,
        },
    }))
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Protects /metrics with HTTP Basic Auth (`username:password` from config)
pub async fn metrics_auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let encoded = auth_header
        .strip_prefix("Basic ")
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    if credentials != state.config.metrics_auth {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
