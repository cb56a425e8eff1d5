//! Request and response bodies of the public HTTP surface.

use serde::{Deserialize, Serialize};

use super::error::ApiError;

/// Default level for submissions that omit one
pub const DEFAULT_LEVEL: &str = "info";

/// Body of `POST /log`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSubmission {
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    /// Explicit system tag; overrides header classification
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

/// A submission that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSubmission {
    pub trace_id: String,
    pub message: String,
    pub level: String,
    pub system: Option<String>,
    pub context: Option<serde_json::Value>,
}

impl LogSubmission {
    /// Require a non-blank trace id and message
    pub fn validate(self) -> Result<ValidSubmission, ApiError> {
        let trace_id = match self.trace_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Err(ApiError::validation(None, "trace_id is required")),
        };

        let message = match self.message {
            Some(m) if !m.trim().is_empty() => m,
            _ => return Err(ApiError::validation(Some(trace_id), "message is required")),
        };

        let level = self
            .level
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string());

        Ok(ValidSubmission {
            trace_id,
            message,
            level,
            system: self.system,
            context: self.context,
        })
    }
}

/// Response of `POST /log`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSubmissionResponse {
    pub success: bool,
    pub trace_id: Option<String>,
    pub remaining_quota: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `POST /check`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(trace_id: Option<&str>, message: Option<&str>) -> LogSubmission {
        LogSubmission {
            trace_id: trace_id.map(String::from),
            message: message.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_submission_defaults_level() {
        let valid = submission(Some("t1"), Some("boom")).validate().unwrap();
        assert_eq!(valid.trace_id, "t1");
        assert_eq!(valid.level, "info");
    }

    #[test]
    fn test_missing_trace_id() {
        let err = submission(None, Some("boom")).validate().unwrap_err();
        assert_eq!(err.to_string(), "trace_id is required");

        let err = submission(Some("   "), Some("boom")).validate().unwrap_err();
        assert_eq!(err.to_string(), "trace_id is required");
    }

    #[test]
    fn test_missing_message_keeps_trace_id() {
        let err = submission(Some("t1"), Some("")).validate().unwrap_err();
        match err {
            ApiError::Validation { trace_id, message } => {
                assert_eq!(trace_id.as_deref(), Some("t1"));
                assert_eq!(message, "message is required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_level_is_normalised() {
        let mut s = submission(Some("t1"), Some("boom"));
        s.level = Some(" WARN ".to_string());
        assert_eq!(s.validate().unwrap().level, "warn");
    }
}
