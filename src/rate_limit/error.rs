//! Rate Limiter Error Types
//!
//! Infrastructure failures only. Exhausted quotas are not errors; they are
//! reported as a denied [`CheckResult`](super::CheckResult).

use super::store::StoreError;

/// Error types for rate limiter operations
#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
    /// Window state could not be loaded or persisted
    #[error("Rate limiter persistence failure: {0}")]
    Persistence(#[from] StoreError),

    /// Actor task is no longer running
    #[error("Rate limiter unavailable")]
    Unavailable,

    /// Actor did not answer within the deadline
    #[error("Rate limiter timed out after {0}ms")]
    Timeout(u64),
}
