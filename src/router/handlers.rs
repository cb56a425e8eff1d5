//! HTTP handlers of the edge router.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error, warn};

use super::error::ApiError;
use super::types::{CheckRequest, LogSubmission, LogSubmissionResponse};
use super::AppState;
use crate::log_buffer::LogEntry;
use crate::metrics;
use crate::rate_limit::{CheckResult, SystemTag};

/// `POST /log`: validate, classify, admit, forward.
pub async fn submit_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<LogSubmission>, JsonRejection>,
) -> Response {
    match handle_log_submission(&state, &headers, payload).await {
        Ok(response) => response,
        Err(e) => {
            metrics::record_submission(e.outcome());
            match &e {
                ApiError::Validation { .. } => debug!("Rejected malformed submission: {}", e),
                _ => warn!("Log submission failed: {}", e),
            }
            e.into_response()
        }
    }
}

async fn handle_log_submission(
    state: &AppState,
    headers: &HeaderMap,
    payload: Result<Json<LogSubmission>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(submission) =
        payload.map_err(|rejection| ApiError::validation(None, rejection.body_text()))?;

    // Validation happens before the limiter so bad input never consumes quota
    let submission = submission.validate()?;
    let system = state
        .classifier
        .classify(submission.system.as_deref(), headers);

    let decision = state
        .limiter
        .check_within(
            system.clone(),
            submission.trace_id.clone(),
            state.actor_timeout,
        )
        .await
        .map_err(|source| ApiError::Limiter {
            trace_id: Some(submission.trace_id.clone()),
            source,
        })?;

    if !decision.allowed {
        metrics::record_submission("denied");
        let body = LogSubmissionResponse {
            success: false,
            trace_id: Some(submission.trace_id),
            remaining_quota: 0,
            error: decision.reason,
        };
        return Ok((StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response());
    }

    let trace_id = submission.trace_id.clone();
    let entry = LogEntry::new(
        submission.trace_id,
        submission.message,
        submission.level,
        system,
        submission.context,
    );

    state
        .log_buffer
        .append(entry)
        .await
        .map_err(|source| ApiError::Buffer {
            trace_id: trace_id.clone(),
            remaining_quota: decision.remaining_quota,
            source,
        })?;

    metrics::record_submission("accepted");
    let body = LogSubmissionResponse {
        success: true,
        trace_id: Some(trace_id),
        remaining_quota: decision.remaining_quota,
        error: None,
    };
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// `POST /check`: raw admission decision.
///
/// Limiter failures are reported as a denial so callers fail closed.
pub async fn check(
    State(state): State<AppState>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return check_failure(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let trace_id = match request.trace_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => return check_failure(StatusCode::BAD_REQUEST, "trace_id is required".to_string()),
    };
    let system = request
        .system
        .filter(|s| !s.trim().is_empty())
        .map(SystemTag::new)
        .unwrap_or_else(SystemTag::unknown);

    match state
        .limiter
        .check_within(system, trace_id, state.actor_timeout)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            error!("Admission check failed: {}", e);
            check_failure(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

fn check_failure(status: StatusCode, reason: String) -> Response {
    let body = CheckResult {
        allowed: false,
        reason: Some(reason),
        remaining_quota: 0,
        tier: None,
    };
    (status, Json(body)).into_response()
}

/// `GET /status`: limiter introspection.
pub async fn status(State(state): State<AppState>) -> Response {
    match state.limiter.status_within(state.actor_timeout).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            error!("Failed to read limiter status: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// `GET /metrics`
pub async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}
