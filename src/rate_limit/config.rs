//! Rate Limit Configuration
//!
//! Quota parameters for the admission-control actor. A configuration is
//! fixed for the lifetime of one actor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::quota::SystemTag;

/// Default quota limits
pub const DEFAULT_GLOBAL_LIMIT: u64 = 1000; // submissions per window
pub const DEFAULT_BROWSER_QUOTA: u64 = 400;
pub const DEFAULT_CONVEX_QUOTA: u64 = 300;
pub const DEFAULT_WORKER_QUOTA: u64 = 300;
pub const DEFAULT_MANUAL_QUOTA: u64 = 100;
pub const DEFAULT_SYSTEM_QUOTA: u64 = 100; // tags without an explicit quota
pub const DEFAULT_PER_TRACE_LIMIT: u64 = 100;
pub const DEFAULT_WINDOW_MS: u64 = 3_600_000; // one hour

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Maximum admissions across all systems per window
    pub global_limit: u64,

    /// Per-system admission quotas per window
    pub system_quotas: BTreeMap<SystemTag, u64>,

    /// Quota for system tags that have no entry in `system_quotas`
    pub default_system_quota: u64,

    /// Maximum admissions for a single trace per window
    pub per_trace_limit: u64,

    /// Window length in milliseconds
    pub window_ms: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        let mut system_quotas = BTreeMap::new();
        system_quotas.insert(SystemTag::browser(), DEFAULT_BROWSER_QUOTA);
        system_quotas.insert(SystemTag::convex(), DEFAULT_CONVEX_QUOTA);
        system_quotas.insert(SystemTag::worker(), DEFAULT_WORKER_QUOTA);
        system_quotas.insert(SystemTag::manual(), DEFAULT_MANUAL_QUOTA);

        Self {
            global_limit: DEFAULT_GLOBAL_LIMIT,
            system_quotas,
            default_system_quota: DEFAULT_SYSTEM_QUOTA,
            per_trace_limit: DEFAULT_PER_TRACE_LIMIT,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Quota that applies to the given system tag
    pub fn quota_for(&self, system: &SystemTag) -> u64 {
        self.system_quotas
            .get(system)
            .copied()
            .unwrap_or(self.default_system_quota)
    }

    /// Set the quota for one system tag
    pub fn with_system_quota(mut self, system: SystemTag, quota: u64) -> Self {
        self.system_quotas.insert(system, quota);
        self
    }

    /// Get window duration
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.window_ms == 0 {
            anyhow::bail!("Rate limit window must be > 0 ms");
        }
        if self.per_trace_limit == 0 {
            anyhow::bail!("Per-trace limit must be > 0");
        }
        if self.global_limit == 0 {
            anyhow::bail!("Global limit must be > 0");
        }
        for (system, quota) in &self.system_quotas {
            if *quota > self.global_limit {
                tracing::warn!(
                    "Quota for system '{}' ({}) exceeds the global limit ({})",
                    system,
                    quota,
                    self.global_limit
                );
            }
        }
        Ok(())
    }
}
