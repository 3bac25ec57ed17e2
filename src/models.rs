use serde::Serialize;
use std::collections::BTreeMap;

use crate::rate_limit::RateLimitConfig;

// Outcome of an admission check (or of a read-only peek at one)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    pub allowed: bool,
    // -1 when the endpoint has no policy
    pub remaining: i64,
    // epoch millis at which the current window ends
    pub reset_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl RateLimitResult {
    pub(crate) fn unlimited(now: i64) -> Self {
        Self {
            allowed: true,
            remaining: -1,
            reset_time: now,
            retry_after: None,
            message: None,
            limit: None,
            status_code: None,
        }
    }

    pub(crate) fn allowed(config: &RateLimitConfig, remaining: i64, reset_time: i64) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_time,
            retry_after: None,
            message: None,
            limit: Some(config.max_requests),
            status_code: None,
        }
    }

    pub(crate) fn denied(config: &RateLimitConfig, reset_time: i64, now: i64) -> Self {
        let retry_after = retry_after_secs(reset_time, now);
        let message = config.message.clone().unwrap_or_else(|| {
            format!("Too many requests. Please try again in {retry_after} seconds.")
        });

        Self {
            allowed: false,
            remaining: 0,
            reset_time,
            retry_after: Some(retry_after),
            message: Some(message),
            limit: Some(config.max_requests),
            status_code: config.status_code,
        }
    }
}

// ceil((reset - now) / 1000), never negative
pub(crate) fn retry_after_secs(reset_time: i64, now: i64) -> u64 {
    let millis = (reset_time - now).max(0) as u64;
    millis.div_ceil(1000)
}

// Per-endpoint aggregate for the stats route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStats {
    pub endpoint: String,
    pub active_limits: usize,
    pub total_requests: u64,
    pub blocked_requests: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<RateLimitConfig>,
}

// Global snapshot for the monitoring route
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringData {
    pub active_limits: usize,
    pub blocked_requests: BTreeMap<String, u64>,
    pub configs: BTreeMap<String, RateLimitConfig>,
    pub timestamp: String,
}
