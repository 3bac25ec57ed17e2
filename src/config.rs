use clap::Parser;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::rate_limit::{RateLimitConfig, RateLimiter};

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "quota-gateway")]
#[command(about = "Per-client, per-endpoint request quotas for the job search API")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // JSON file mapping endpoint name -> {windowMs, maxRequests, message?, statusCode?}
    // Entries overwrite or extend the built-in policy table
    #[arg(long)]
    pub policies: Option<PathBuf>,

    // Seconds between sweeps of expired windows, 0 disables the sweeper
    #[arg(long, default_value_t = 60)]
    pub sweep_interval: u64,

    // Loopback-only port for the reset/clear routes, not served when unset
    #[arg(long)]
    pub admin_port: Option<u16>,
}

pub type PolicyTable = BTreeMap<String, RateLimitConfig>;

const MINUTE_MS: u64 = 60 * 1000;

// Built-in policies registered at startup
pub fn default_policies() -> PolicyTable {
    let policies = [
        (
            "jobs-search",
            RateLimitConfig::new(MINUTE_MS, 30)
                .with_message("Too many job searches. Please wait a moment before searching again."),
        ),
        (
            "user-preferences",
            RateLimitConfig::new(MINUTE_MS, 20)
                .with_message("Too many preference updates. Please slow down."),
        ),
        (
            "saved-jobs",
            RateLimitConfig::new(MINUTE_MS, 30)
                .with_message("Too many saved job requests. Please try again shortly."),
        ),
        (
            "saved-searches",
            RateLimitConfig::new(MINUTE_MS, 20)
                .with_message("Too many saved search requests. Please try again shortly."),
        ),
        (
            "auth",
            RateLimitConfig::new(15 * MINUTE_MS, 5)
                .with_message("Too many authentication attempts. Please try again in 15 minutes."),
        ),
        (
            "api-test",
            RateLimitConfig::new(MINUTE_MS, 10)
                .with_message("API test rate limit exceeded."),
        ),
        (
            "quota-status",
            RateLimitConfig::new(MINUTE_MS, 30)
                .with_message("Too many quota status requests."),
        ),
    ];

    policies
        .into_iter()
        .map(|(endpoint, config)| (endpoint.to_string(), config))
        .collect()
}

pub fn load_policy_file(path: &Path) -> Result<PolicyTable, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_policies(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_policies(json: &str) -> Result<PolicyTable, serde_json::Error> {
    serde_json::from_str(json)
}

// Defaults first, then the override file on top
pub fn resolve_policies(override_file: Option<&Path>) -> Result<PolicyTable, ConfigError> {
    let mut policies = default_policies();
    if let Some(path) = override_file {
        policies.extend(load_policy_file(path)?);
    }
    Ok(policies)
}

pub fn register_policies(limiter: &RateLimiter, policies: PolicyTable) -> Result<(), ConfigError> {
    for (endpoint, config) in policies {
        limiter.configure_rate_limit(&endpoint, config)?;
    }
    Ok(())
}
