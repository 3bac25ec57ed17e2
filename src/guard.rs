use axum::extract::{Request, State};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use std::sync::Arc;
use tracing::warn;

use crate::error::RateLimitError;
use crate::identity::client_identifier;
use crate::models::RateLimitResult;
use crate::rate_limit::RateLimiter;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

// Limiter plus the policy name one route is charged against
#[derive(Clone)]
pub struct GuardState {
    limiter: Arc<RateLimiter>,
    endpoint: Arc<str>,
}

impl GuardState {
    pub fn new(limiter: Arc<RateLimiter>, endpoint: &str) -> Self {
        Self {
            limiter,
            endpoint: Arc::from(endpoint),
        }
    }
}

// every request to route is charged to the endpoint policy before the handler runs
pub fn with_rate_limit<S>(
    route: MethodRouter<S>,
    limiter: &Arc<RateLimiter>,
    endpoint: &str,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    let guard = GuardState::new(Arc::clone(limiter), endpoint);
    route.route_layer(middleware::from_fn_with_state(guard, enforce_rate_limit))
}

pub async fn enforce_rate_limit(
    State(guard): State<GuardState>,
    request: Request,
    next: Next,
) -> Response {
    let identifier = client_identifier(request.headers(), request.extensions());
    let result = guard.limiter.check_rate_limit(&identifier, &guard.endpoint);

    if !result.allowed {
        warn!(
            identifier = %identifier,
            endpoint = %guard.endpoint,
            retry_after = result.retry_after.unwrap_or(0),
            "rate limit exceeded"
        );
        return RateLimitError::new(result).into_response();
    }

    let mut response = next.run(request).await;
    insert_rate_limit_headers(response.headers_mut(), &result);
    response
}

// No headers for unconfigured endpoints, there is no limit to report
pub fn insert_rate_limit_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    let Some(limit) = result.limit else {
        return;
    };

    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(result.remaining.max(0)));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_epoch_secs(result.reset_time)));
    if let Some(retry_after) = result.retry_after {
        headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
    }
}

// X-RateLimit-Reset is whole epoch seconds, rounded up
fn reset_epoch_secs(reset_time_ms: i64) -> i64 {
    reset_time_ms.div_euclid(1000) + i64::from(reset_time_ms.rem_euclid(1000) > 0)
}
