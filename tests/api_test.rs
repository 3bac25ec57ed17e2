// Integration tests for the guarded routes and the monitoring API.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    routing::get,
};
use quota_gateway::{
    RateLimitConfig, RateLimiter, SessionUser,
    handlers::{admin_router, router},
    state::AppState,
    with_rate_limit,
};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;

fn limiter_with(policies: &[(&str, RateLimitConfig)]) -> Arc<RateLimiter> {
    let limiter = Arc::new(RateLimiter::new());
    for (endpoint, config) in policies {
        limiter.configure_rate_limit(endpoint, config.clone()).unwrap();
    }
    limiter
}

fn test_app(limiter: &Arc<RateLimiter>) -> Router {
    router(Arc::new(AppState::new(Arc::clone(limiter))))
}

fn test_admin_app(limiter: &Arc<RateLimiter>) -> Router {
    admin_router(Arc::new(AppState::new(Arc::clone(limiter))))
}

fn get_from(uri: &str, client_ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", client_ip)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_guard_admits_quota_then_returns_429() {
    let limiter = limiter_with(&[(
        "api-test",
        RateLimitConfig::new(60_000, 3).with_message("API test rate limit exceeded."),
    )]);
    let app = test_app(&limiter);

    for expected_remaining in ["2", "1", "0"] {
        let response = app.clone().oneshot(get_from("/api/test", "10.0.0.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-ratelimit-limit"), Some("3"));
        assert_eq!(header(&response, "x-ratelimit-remaining"), Some(expected_remaining));
        assert!(header(&response, "x-ratelimit-reset").is_some());
        assert!(header(&response, "retry-after").is_none());
    }

    let response = app.clone().oneshot(get_from("/api/test", "10.0.0.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(&response, "x-ratelimit-remaining"), Some("0"));
    let retry_after: u64 = header(&response, "retry-after").unwrap().parse().unwrap();
    assert!(retry_after <= 60);

    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "API test rate limit exceeded.");
    assert_eq!(body["error"]["type"], "RATE_LIMIT_ERROR");
    assert_eq!(body["error"]["retryAfter"], retry_after);
    assert!(body["error"]["resetTime"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_denied_request_never_reaches_handler() {
    let limiter = limiter_with(&[("jobs-search", RateLimitConfig::new(60_000, 2))]);
    let calls = Arc::new(AtomicUsize::new(0));

    let counted = Arc::clone(&calls);
    let app: Router = Router::new().route(
        "/search",
        with_rate_limit(
            get(move || {
                let counted = Arc::clone(&counted);
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    "results"
                }
            }),
            &limiter,
            "jobs-search",
        ),
    );

    let mut statuses = Vec::new();
    for _ in 0..5 {
        let response = app.clone().oneshot(get_from("/search", "10.0.0.9")).await.unwrap();
        statuses.push(response.status());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        statuses,
        vec![
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );
    assert_eq!(limiter.get_endpoint_stats("jobs-search").blocked_requests, 3);
}

#[tokio::test]
async fn test_clients_are_limited_independently() {
    let limiter = limiter_with(&[("api-test", RateLimitConfig::new(60_000, 1))]);
    let app = test_app(&limiter);

    let first = app.clone().oneshot(get_from("/api/test", "10.0.0.1")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let again = app.clone().oneshot(get_from("/api/test", "10.0.0.1")).await.unwrap();
    assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);

    let other = app.clone().oneshot(get_from("/api/test", "10.0.0.2")).await.unwrap();
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_session_user_is_charged_instead_of_ip() {
    let limiter = limiter_with(&[("api-test", RateLimitConfig::new(60_000, 1))]);
    let app = test_app(&limiter);

    let mut request = get_from("/api/test", "10.0.0.1");
    request.extensions_mut().insert(SessionUser("alice".to_string()));
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["identifier"], "alice");

    // same IP, no session: separate quota
    let response = app.clone().oneshot(get_from("/api/test", "10.0.0.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(limiter.get_rate_limit_info("alice", "api-test").remaining, 0);
    assert_eq!(limiter.get_rate_limit_info("10.0.0.1", "api-test").remaining, 0);
}

#[tokio::test]
async fn test_request_without_identity_is_charged_to_unknown() {
    let limiter = limiter_with(&[("api-test", RateLimitConfig::new(60_000, 5))]);
    let app = test_app(&limiter);

    let request = Request::builder().uri("/api/test").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(json_body(response).await["identifier"], "unknown");
    assert_eq!(limiter.get_rate_limit_info("unknown", "api-test").remaining, 4);
}

#[tokio::test]
async fn test_unconfigured_endpoint_passes_through_without_headers() {
    let limiter = limiter_with(&[]);
    let app: Router = Router::new().route(
        "/open",
        with_rate_limit(get(|| async { "ok" }), &limiter, "not-registered"),
    );

    for _ in 0..20 {
        let response = app.clone().oneshot(get_from("/open", "10.0.0.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(header(&response, "x-ratelimit-limit").is_none());
    }
}

#[tokio::test]
async fn test_policy_status_code_overrides_429() {
    let limiter = limiter_with(&[(
        "api-test",
        RateLimitConfig::new(60_000, 1).with_status_code(503),
    )]);
    let app = test_app(&limiter);

    app.clone().oneshot(get_from("/api/test", "10.0.0.1")).await.unwrap();
    let response = app.clone().oneshot(get_from("/api/test", "10.0.0.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert_eq!(body["error"]["type"], "RATE_LIMIT_ERROR");
    assert!(body["message"].as_str().unwrap().starts_with("Too many requests"));
}

#[tokio::test]
async fn test_stats_and_monitoring_reflect_blocked_requests() {
    let limiter = limiter_with(&[("api-test", RateLimitConfig::new(60_000, 1))]);
    let app = test_app(&limiter);

    for _ in 0..3 {
        app.clone().oneshot(get_from("/api/test", "10.0.0.1")).await.unwrap();
    }

    let stats = app
        .clone()
        .oneshot(Request::builder().uri("/api/rate-limit/stats/api-test").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(stats.status(), StatusCode::OK);
    let stats = json_body(stats).await;
    assert_eq!(stats["endpoint"], "api-test");
    assert_eq!(stats["activeLimits"], 1);
    assert_eq!(stats["totalRequests"], 1);
    assert_eq!(stats["blockedRequests"], 2);
    assert_eq!(stats["config"]["maxRequests"], 1);

    let monitoring = app
        .clone()
        .oneshot(Request::builder().uri("/api/rate-limit/monitoring").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let monitoring = json_body(monitoring).await;
    assert_eq!(monitoring["activeLimits"], 1);
    assert_eq!(monitoring["blockedRequests"]["10.0.0.1:api-test"], 2);
    assert_eq!(monitoring["configs"]["api-test"]["windowMs"], 60_000);
    assert!(monitoring["timestamp"].is_string());
}

#[tokio::test]
async fn test_client_cannot_reset_its_own_quota_on_public_router() {
    let limiter = limiter_with(&[("api-test", RateLimitConfig::new(60_000, 1))]);
    let app = test_app(&limiter);

    let mut admitted = 0;
    for _ in 0..10 {
        let response = app.clone().oneshot(get_from("/api/test", "6.6.6.6")).await.unwrap();
        if response.status() == StatusCode::OK {
            admitted += 1;
        }

        let reset = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/rate-limit/api-test/6.6.6.6")
                    .header("x-forwarded-for", "6.6.6.6")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_ne!(reset.status(), StatusCode::NO_CONTENT);
    }
    assert_eq!(admitted, 1);

    let clear = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/rate-limit/clear")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_ne!(clear.status(), StatusCode::NO_CONTENT);
    assert_eq!(limiter.get_endpoint_stats("api-test").blocked_requests, 9);
}

#[tokio::test]
async fn test_admin_reset_restores_quota_but_keeps_blocked_count() {
    let limiter = limiter_with(&[("api-test", RateLimitConfig::new(60_000, 1))]);
    let app = test_app(&limiter);
    let admin = test_admin_app(&limiter);

    app.clone().oneshot(get_from("/api/test", "10.0.0.1")).await.unwrap();
    let denied = app.clone().oneshot(get_from("/api/test", "10.0.0.1")).await.unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);

    let reset = admin
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/rate-limit/api-test/10.0.0.1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(reset.status(), StatusCode::NO_CONTENT);

    let response = app.clone().oneshot(get_from("/api/test", "10.0.0.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-ratelimit-remaining"), Some("0"));
    assert_eq!(limiter.get_endpoint_stats("api-test").blocked_requests, 1);
}

#[tokio::test]
async fn test_admin_clear_wipes_counters() {
    let limiter = limiter_with(&[("api-test", RateLimitConfig::new(60_000, 1))]);
    let app = test_app(&limiter);
    let admin = test_admin_app(&limiter);

    app.clone().oneshot(get_from("/api/test", "10.0.0.1")).await.unwrap();
    app.clone().oneshot(get_from("/api/test", "10.0.0.1")).await.unwrap();

    let cleared = admin
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/rate-limit/clear")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(cleared.status(), StatusCode::NO_CONTENT);

    let monitoring = limiter.get_monitoring_data();
    assert_eq!(monitoring.active_limits, 0);
    assert!(monitoring.blocked_requests.is_empty());
}

#[tokio::test]
async fn test_quota_status_reports_without_spending_other_quotas() {
    let limiter = limiter_with(&[
        ("quota-status", RateLimitConfig::new(60_000, 10)),
        ("saved-jobs", RateLimitConfig::new(60_000, 4)),
    ]);
    limiter.check_rate_limit("10.0.0.1", "saved-jobs");
    let app = test_app(&limiter);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(get_from("/api/quota-status", "10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["identifier"], "10.0.0.1");
        assert_eq!(body["quotas"]["saved-jobs"]["remaining"], 3);
        assert_eq!(body["quotas"]["saved-jobs"]["allowed"], true);
    }

    // the guard counted both status calls
    assert_eq!(limiter.get_rate_limit_info("10.0.0.1", "quota-status").remaining, 8);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let limiter = limiter_with(&[("api-test", RateLimitConfig::new(60_000, 1))]);
    let app = test_app(&limiter);
    app.clone().oneshot(get_from("/api/test", "10.0.0.1")).await.unwrap();
    app.clone().oneshot(get_from("/api/test", "10.0.0.2")).await.unwrap();

    let health = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(json_body(health).await["status"], "healthy");

    let metrics = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(metrics.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(metrics.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("quota_requests_allowed_total"));
    // gauge reflects the two live windows at scrape time
    assert!(text.lines().any(|line| line == "quota_active_limits 2"));
}
