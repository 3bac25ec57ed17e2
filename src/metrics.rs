use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, register_counter_vec, register_gauge};


lazy_static! {
    pub static ref REQUESTS_ALLOWED: CounterVec = register_counter_vec!(
        "quota_requests_allowed_total",
        "Requests admitted by the rate limiter",
        &["endpoint"]
    )
    .unwrap();
    pub static ref REQUESTS_BLOCKED: CounterVec = register_counter_vec!(
        "quota_requests_blocked_total",
        "Requests denied by the rate limiter",
        &["endpoint"]
    )
    .unwrap();
    pub static ref ACTIVE_LIMITS: Gauge =
        register_gauge!("quota_active_limits", "Current number of live rate limit windows").unwrap();
}
