//! Prometheus metrics endpoint

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};

use crate::AppState;
use crate::metrics::{PROFILES_TOTAL, REGISTRY};

/// GET /metrics
///
/// Refreshes the stored-profile gauge, then renders the registry in
/// Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.db.count_profiles().await {
        Ok(count) => PROFILES_TOTAL.set(count),
        Err(error) => tracing::warn!(%error, "Failed to count stored profiles"),
    }

    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&REGISTRY.gather()) {
        Ok(metrics_text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type())],
            metrics_text,
        )
            .into_response(),
        Err(error) => {
            tracing::error!(%error, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// Create metrics router
pub fn metrics_router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics_handler))
}
