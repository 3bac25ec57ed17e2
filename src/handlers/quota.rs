use axum::Json;
use axum::extract::State;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::identity::ClientId;
use crate::models::RateLimitResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct QuotaStatus {
    pub identifier: String,
    pub quotas: BTreeMap<String, RateLimitResult>,
}

// Caller's standing on every configured endpoint, without spending quota
// (the quota-status guard itself still counts this request)
pub async fn quota_status_handler(
    State(state): State<Arc<AppState>>,
    ClientId(identifier): ClientId,
) -> Json<QuotaStatus> {
    let quotas = state
        .limiter
        .configured_endpoints()
        .into_iter()
        .map(|endpoint| {
            let info = state.limiter.get_rate_limit_info(&identifier, &endpoint);
            (endpoint, info)
        })
        .collect();

    Json(QuotaStatus { identifier, quotas })
}

pub async fn api_test_handler(ClientId(identifier): ClientId) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "identifier": identifier,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
