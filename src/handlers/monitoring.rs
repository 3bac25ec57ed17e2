use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::info;

use crate::models::{EndpointStats, MonitoringData};
use crate::state::AppState;

pub async fn monitoring_handler(State(state): State<Arc<AppState>>) -> Json<MonitoringData> {
    Json(state.limiter.get_monitoring_data())
}

pub async fn endpoint_stats_handler(
    State(state): State<Arc<AppState>>,
    Path(endpoint): Path<String>,
) -> Json<EndpointStats> {
    Json(state.limiter.get_endpoint_stats(&endpoint))
}

pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Path((endpoint, identifier)): Path<(String, String)>,
) -> StatusCode {
    state.limiter.reset_rate_limit(&identifier, &endpoint);
    StatusCode::NO_CONTENT
}

pub async fn clear_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    info!("clearing all rate limit state on request");
    state.limiter.clear_all();
    StatusCode::NO_CONTENT
}
