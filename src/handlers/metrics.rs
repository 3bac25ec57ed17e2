use axum::extract::State;
use axum::http::StatusCode;
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tracing::error;

use crate::metrics::ACTIVE_LIMITS;
use crate::state::AppState;

// prometheus text exposition of the default registry
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<String, StatusCode> {
    // live windows are counted at scrape time
    ACTIVE_LIMITS.set(state.limiter.active_limits() as f64);

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).map_err(|e| {
        error!("failed to encode metrics: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    String::from_utf8(buffer).map_err(|e| {
        error!("metrics output is not utf-8: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
