use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::metrics::{REQUESTS_ALLOWED, REQUESTS_BLOCKED};
use crate::models::{EndpointStats, MonitoringData, RateLimitResult};

// Policy for one logical endpoint: max_requests per window_ms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl RateLimitConfig {
    pub fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
            message: None,
            status_code: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    // validate() rejects anything that does not fit, so the clamp never kicks in
    fn window_millis(&self) -> i64 {
        i64::try_from(self.window_ms).unwrap_or(i64::MAX)
    }

    pub(crate) fn validate(&self, endpoint: &str) -> Result<(), ConfigError> {
        let reason = if self.window_ms == 0 {
            "windowMs must be greater than zero"
        } else if i64::try_from(self.window_ms).is_err() {
            "windowMs is too large"
        } else if self.max_requests == 0 {
            "maxRequests must be greater than zero"
        } else if self.status_code.is_some_and(|code| !(400..=599).contains(&code)) {
            "statusCode must be a 4xx or 5xx code"
        } else {
            return Ok(());
        };

        Err(ConfigError::InvalidPolicy {
            endpoint: endpoint.to_string(),
            reason,
        })
    }
}

// Counter for one (identifier, endpoint) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_time: i64,
    pub first_request: i64,
}

impl RateLimitEntry {
    fn start(now: i64, config: &RateLimitConfig) -> Self {
        Self {
            count: 1,
            reset_time: now.saturating_add(config.window_millis()),
            first_request: now,
        }
    }

    fn is_expired(&self, now: i64) -> bool {
        now > self.reset_time
    }
}

// Composite key, rendered as `identifier:endpoint`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RateLimitKey {
    pub identifier: String,
    pub endpoint: String,
}

impl RateLimitKey {
    pub fn new(identifier: &str, endpoint: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            endpoint: endpoint.to_string(),
        }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.identifier, self.endpoint)
    }
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// Fixed-window admission control keyed by (client identifier, endpoint).
// Windows start at each key's first request. One instance is shared by every
// guarded route; entry updates run under the dashmap shard guard.
#[derive(Debug, Default)]
pub struct RateLimiter {
    configs: DashMap<String, RateLimitConfig>,
    entries: DashMap<RateLimitKey, RateLimitEntry>,
    // survives window resets and explicit resets, only clear_all wipes it
    blocked: DashMap<RateLimitKey, u64>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    // registers or overwrites the policy for endpoint
    pub fn configure_rate_limit(
        &self,
        endpoint: &str,
        config: RateLimitConfig,
    ) -> Result<(), ConfigError> {
        config.validate(endpoint)?;
        info!(
            endpoint,
            window_ms = config.window_ms,
            max_requests = config.max_requests,
            "rate limit configured"
        );
        self.configs.insert(endpoint.to_string(), config);
        Ok(())
    }

    pub fn get_config(&self, endpoint: &str) -> Option<RateLimitConfig> {
        self.configs.get(endpoint).map(|config| config.clone())
    }

    pub fn configured_endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self.configs.iter().map(|c| c.key().clone()).collect();
        endpoints.sort();
        endpoints
    }

    // counts one request, unconfigured endpoints always pass with remaining -1
    pub fn check_rate_limit(&self, identifier: &str, endpoint: &str) -> RateLimitResult {
        self.check_rate_limit_at(identifier, endpoint, now_ms())
    }

    pub(crate) fn check_rate_limit_at(
        &self,
        identifier: &str,
        endpoint: &str,
        now: i64,
    ) -> RateLimitResult {
        let Some(config) = self.get_config(endpoint) else {
            return RateLimitResult::unlimited(now);
        };
        let key = RateLimitKey::new(identifier, endpoint);
        let max = i64::from(config.max_requests);

        let result = match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    // window is over, start a fresh one in place
                    let entry = RateLimitEntry::start(now, &config);
                    occupied.insert(entry);
                    debug!(key = %key, "rate limit window restarted");
                    RateLimitResult::allowed(&config, max - 1, entry.reset_time)
                } else if occupied.get().count >= config.max_requests {
                    RateLimitResult::denied(&config, occupied.get().reset_time, now)
                } else {
                    let entry = occupied.get_mut();
                    entry.count += 1;
                    RateLimitResult::allowed(&config, max - i64::from(entry.count), entry.reset_time)
                }
            }
            Entry::Vacant(vacant) => {
                let entry = RateLimitEntry::start(now, &config);
                vacant.insert(entry);
                RateLimitResult::allowed(&config, max - 1, entry.reset_time)
            }
        };

        if result.allowed {
            REQUESTS_ALLOWED.with_label_values(&[endpoint]).inc();
        } else {
            *self.blocked.entry(key).or_insert(0) += 1;
            REQUESTS_BLOCKED.with_label_values(&[endpoint]).inc();
        }

        result
    }

    // read-only twin of check_rate_limit, no live window means full quota
    pub fn get_rate_limit_info(&self, identifier: &str, endpoint: &str) -> RateLimitResult {
        self.get_rate_limit_info_at(identifier, endpoint, now_ms())
    }

    pub(crate) fn get_rate_limit_info_at(
        &self,
        identifier: &str,
        endpoint: &str,
        now: i64,
    ) -> RateLimitResult {
        let Some(config) = self.get_config(endpoint) else {
            return RateLimitResult::unlimited(now);
        };
        let key = RateLimitKey::new(identifier, endpoint);
        let max = i64::from(config.max_requests);

        match self.entries.get(&key).map(|entry| *entry) {
            Some(entry) if !entry.is_expired(now) => {
                if entry.count >= config.max_requests {
                    RateLimitResult::denied(&config, entry.reset_time, now)
                } else {
                    RateLimitResult::allowed(&config, max - i64::from(entry.count), entry.reset_time)
                }
            }
            _ => RateLimitResult::allowed(&config, max, now.saturating_add(config.window_millis())),
        }
    }

    // blocked counter is kept
    pub fn reset_rate_limit(&self, identifier: &str, endpoint: &str) {
        let key = RateLimitKey::new(identifier, endpoint);
        if self.entries.remove(&key).is_some() {
            info!(key = %key, "rate limit reset");
        }
    }

    pub fn get_endpoint_stats(&self, endpoint: &str) -> EndpointStats {
        self.get_endpoint_stats_at(endpoint, now_ms())
    }

    pub(crate) fn get_endpoint_stats_at(&self, endpoint: &str, now: i64) -> EndpointStats {
        let (active_limits, total_requests) = self
            .entries
            .iter()
            .filter(|e| e.key().endpoint == endpoint && !e.value().is_expired(now))
            .fold((0usize, 0u64), |(active, total), e| {
                (active + 1, total + u64::from(e.value().count))
            });

        let blocked_requests = self
            .blocked
            .iter()
            .filter(|b| b.key().endpoint == endpoint)
            .map(|b| *b.value())
            .sum();

        EndpointStats {
            endpoint: endpoint.to_string(),
            active_limits,
            total_requests,
            blocked_requests,
            config: self.get_config(endpoint),
        }
    }

    pub fn get_monitoring_data(&self) -> MonitoringData {
        self.get_monitoring_data_at(now_ms())
    }

    pub(crate) fn get_monitoring_data_at(&self, now: i64) -> MonitoringData {
        let active_limits = self.active_limits_at(now);

        let blocked_requests = self
            .blocked
            .iter()
            .map(|b| (b.key().to_string(), *b.value()))
            .collect::<BTreeMap<_, _>>();

        let configs = self
            .configs
            .iter()
            .map(|c| (c.key().clone(), c.value().clone()))
            .collect::<BTreeMap<_, _>>();

        MonitoringData {
            active_limits,
            blocked_requests,
            configs,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn active_limits(&self) -> usize {
        self.active_limits_at(now_ms())
    }

    fn active_limits_at(&self, now: i64) -> usize {
        self.entries.iter().filter(|e| !e.value().is_expired(now)).count()
    }

    // policies stay registered
    pub fn clear_all(&self) {
        self.entries.clear();
        self.blocked.clear();
        info!("all rate limit state cleared");
    }

    // returns how many entries were evicted
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(now_ms())
    }

    pub(crate) fn sweep_expired_at(&self, now: i64) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}
