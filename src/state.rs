use std::sync::Arc;
use crate::rate_limit::RateLimiter;

// app's shared state

pub struct AppState {
    pub limiter: Arc<RateLimiter>, // one limiter for the whole process
}

impl AppState {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}
