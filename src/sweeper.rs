use std::sync::Arc;
use tokio::time::{Duration, interval};
use tracing::{debug, info};

use crate::rate_limit::RateLimiter;

// Background eviction of expired windows. Checks already replace stale
// entries lazily; this only bounds memory for keys that never come back.
pub async fn sweeper(limiter: Arc<RateLimiter>, sweep_interval: Duration) {
    let mut interval = interval(sweep_interval);

    info!(interval = ?sweep_interval, "rate limit sweeper started");

    loop {
        interval.tick().await;

        let removed = limiter.sweep_expired();
        if removed > 0 {
            debug!(removed, "evicted expired rate limit windows");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimitConfig;

    #[tokio::test]
    async fn sweeper_evicts_expired_windows() {
        let limiter = Arc::new(RateLimiter::new());
        limiter
            .configure_rate_limit("test", RateLimitConfig::new(20, 5))
            .unwrap();
        limiter.check_rate_limit("u1", "test");
        limiter.check_rate_limit("u2", "test");
        assert_eq!(limiter.get_endpoint_stats("test").active_limits, 2);

        let task = tokio::spawn(sweeper(Arc::clone(&limiter), Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(150)).await;
        task.abort();

        assert_eq!(limiter.get_monitoring_data().active_limits, 0);
        assert_eq!(limiter.sweep_expired(), 0);
    }
}
