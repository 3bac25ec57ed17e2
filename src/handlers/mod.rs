mod health;
mod metrics;
mod monitoring;
mod quota;

use axum::Router;
use axum::routing::{delete, get, post};
use std::sync::Arc;

use crate::guard::with_rate_limit;
use crate::state::AppState;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use monitoring::{clear_handler, endpoint_stats_handler, monitoring_handler, reset_handler};
pub use quota::{api_test_handler, quota_status_handler};

// public routes, read-only apart from the quota the guards charge
pub fn router(state: Arc<AppState>) -> Router {
    let limiter = Arc::clone(&state.limiter);

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/rate-limit/monitoring", get(monitoring_handler))
        .route("/api/rate-limit/stats/{endpoint}", get(endpoint_stats_handler))
        // guarded routes
        .route(
            "/api/quota-status",
            with_rate_limit(get(quota_status_handler), &limiter, "quota-status"),
        )
        .route(
            "/api/test",
            with_rate_limit(get(api_test_handler), &limiter, "api-test"),
        )
        .with_state(state)
}

// reset/clear, only served on the loopback admin listener (--admin-port)
pub fn admin_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/rate-limit/clear", post(clear_handler))
        .route("/api/rate-limit/{endpoint}/{identifier}", delete(reset_handler))
        .with_state(state)
}
