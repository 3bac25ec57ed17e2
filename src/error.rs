use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::guard::insert_rate_limit_headers;
use crate::models::RateLimitResult;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse policy file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid policy for endpoint `{endpoint}`: {reason}")]
    InvalidPolicy {
        endpoint: String,
        reason: &'static str,
    },
}

// Denial produced by the guard, rendered as a RATE_LIMIT_ERROR response
#[derive(Debug, Clone)]
pub struct RateLimitError {
    result: RateLimitResult,
}

impl RateLimitError {
    pub fn new(result: RateLimitResult) -> Self {
        Self { result }
    }

    pub fn status(&self) -> StatusCode {
        self.result
            .status_code
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::TOO_MANY_REQUESTS)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
    error: ErrorDetail,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: &'static str,
    retry_after: u64,
    reset_time: i64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            status: "error",
            message: self
                .result
                .message
                .clone()
                .unwrap_or_else(|| "Too many requests".to_string()),
            error: ErrorDetail {
                kind: "RATE_LIMIT_ERROR",
                retry_after: self.result.retry_after.unwrap_or(0),
                reset_time: self.result.reset_time,
            },
        };

        let mut response = (status, Json(body)).into_response();
        insert_rate_limit_headers(response.headers_mut(), &self.result);
        response
    }
}
