//! Liveness and readiness probes.

use axum::{extract::State, http::StatusCode};

use crate::state::AppState;

/// Liveness check. Returns "ok" whenever the process is serving requests.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness check.
///
/// The storefront owns no data, so it is ready when the backend answers a
/// cheap public read.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.api().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
