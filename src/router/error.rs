//! Router Error Types
//!
//! Every failure the edge router can hit maps to a structured JSON body.
//! Infrastructure failures fail closed: the submission is never forwarded.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::types::LogSubmissionResponse;
use crate::log_buffer::LogBufferError;
use crate::rate_limit::LimiterError;

/// Error types for router operations
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed submission, rejected before the limiter is consulted
    #[error("{message}")]
    Validation {
        trace_id: Option<String>,
        message: String,
    },

    /// Limiter failed or did not answer in time
    #[error("{source}")]
    Limiter {
        trace_id: Option<String>,
        #[source]
        source: LimiterError,
    },

    /// Entry was admitted but could not be handed to the log buffer
    #[error("Failed to buffer log entry: {source}")]
    Buffer {
        trace_id: String,
        remaining_quota: u64,
        #[source]
        source: LogBufferError,
    },
}

impl ApiError {
    pub fn validation(trace_id: Option<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            trace_id,
            message: message.into(),
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Limiter { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Buffer { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Label used for submission metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "invalid",
            ApiError::Limiter {
                source: LimiterError::Timeout(_),
                ..
            } => "timeout",
            ApiError::Limiter { .. } => "limiter_error",
            ApiError::Buffer { .. } => "buffer_error",
        }
    }

    fn trace_id(&self) -> Option<String> {
        match self {
            ApiError::Validation { trace_id, .. } | ApiError::Limiter { trace_id, .. } => {
                trace_id.clone()
            }
            ApiError::Buffer { trace_id, .. } => Some(trace_id.clone()),
        }
    }

    fn remaining_quota(&self) -> u64 {
        match self {
            ApiError::Buffer {
                remaining_quota, ..
            } => *remaining_quota,
            _ => 0,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = LogSubmissionResponse {
            success: false,
            trace_id: self.trace_id(),
            remaining_quota: self.remaining_quota(),
            error: Some(self.to_string()),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::validation(None, "trace_id is required").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Limiter {
                trace_id: None,
                source: LimiterError::Timeout(100)
            }
            .status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_outcome_labels() {
        let timeout = ApiError::Limiter {
            trace_id: Some("t1".to_string()),
            source: LimiterError::Timeout(100),
        };
        assert_eq!(timeout.outcome(), "timeout");
        assert_eq!(timeout.to_string(), "Rate limiter timed out after 100ms");

        let unavailable = ApiError::Limiter {
            trace_id: None,
            source: LimiterError::Unavailable,
        };
        assert_eq!(unavailable.outcome(), "limiter_error");
    }
}
