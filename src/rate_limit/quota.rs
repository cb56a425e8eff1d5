//! Quota Types
//!
//! System tags, limit tiers and the admission decision returned by the
//! rate limiter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse category of log submitter used for per-system accounting.
///
/// Tags are open-ended: any lower-case name is a valid tag, so new
/// submitters can be classified without touching the limiter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SystemTag(String);

impl SystemTag {
    /// Create a tag, normalising case and surrounding whitespace
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn browser() -> Self {
        Self::new("browser")
    }

    pub fn convex() -> Self {
        Self::new("convex")
    }

    pub fn worker() -> Self {
        Self::new("worker")
    }

    pub fn manual() -> Self {
        Self::new("manual")
    }

    pub fn unknown() -> Self {
        Self::new("unknown")
    }

    /// Tag name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SystemTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SystemTag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SystemTag {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<SystemTag> for String {
    fn from(tag: SystemTag) -> Self {
        tag.0
    }
}

/// Quota tier that rejected a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitTier {
    /// Deployment-wide limit
    Global,
    /// Per-system quota
    System,
    /// Per-trace limit
    Trace,
}

impl LimitTier {
    /// Label used for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitTier::Global => "global",
            LimitTier::System => "system",
            LimitTier::Trace => "trace",
        }
    }
}

/// Result of an admission check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Whether the request is admitted
    pub allowed: bool,

    /// Reason for denial, naming the exhausted tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Admissions left for the trace in this window (0 when denied)
    pub remaining_quota: u64,

    /// Tier that rejected the request
    #[serde(skip)]
    pub tier: Option<LimitTier>,
}

impl CheckResult {
    /// Create an allowed result
    pub fn allowed(remaining_quota: u64) -> Self {
        Self {
            allowed: true,
            reason: None,
            remaining_quota,
            tier: None,
        }
    }

    /// Denied by the global limit
    pub fn global_exceeded() -> Self {
        Self::denied(LimitTier::Global, "Global rate limit exceeded".to_string())
    }

    /// Denied by the quota of `system`
    pub fn system_exceeded(system: &SystemTag) -> Self {
        Self::denied(
            LimitTier::System,
            format!("{} system rate limit exceeded", system),
        )
    }

    /// Denied by the per-trace limit
    pub fn trace_exceeded(trace_id: &str) -> Self {
        Self::denied(
            LimitTier::Trace,
            format!("Per-trace rate limit exceeded for {}", trace_id),
        )
    }

    fn denied(tier: LimitTier, reason: String) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            remaining_quota: 0,
            tier: Some(tier),
        }
    }
}
