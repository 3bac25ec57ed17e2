// per-client, per-endpoint request quotas for the job search API

pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;
pub mod sweeper;

pub use error::{ConfigError, RateLimitError};
pub use guard::with_rate_limit;
pub use identity::{ClientId, SessionUser};
pub use models::{EndpointStats, MonitoringData, RateLimitResult};
pub use rate_limit::{RateLimitConfig, RateLimiter};
