//! Window State
//!
//! Counters for one fixed-length counting window. Only the rate limiter
//! actor holds a mutable `WindowState`; everything else sees snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::config::RateLimiterConfig;
use super::quota::{CheckResult, SystemTag};

/// Admission counters for the current window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    /// Start of the window
    pub window_start: DateTime<Utc>,

    /// Admissions across all systems
    pub global_current: u64,

    /// Admissions per system tag
    pub system_current: BTreeMap<SystemTag, u64>,

    /// Admissions per trace id
    pub trace_counts: HashMap<String, u64>,
}

impl WindowState {
    /// Create an empty window starting at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            window_start: now,
            global_current: 0,
            system_current: BTreeMap::new(),
            trace_counts: HashMap::new(),
        }
    }

    /// Milliseconds elapsed since the window started.
    /// A clock that steps backwards yields 0 rather than a negative age.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        (now - self.window_start).num_milliseconds().max(0) as u64
    }

    /// Whether the window has run its full length
    pub fn is_expired(&self, now: DateTime<Utc>, window_ms: u64) -> bool {
        self.elapsed_ms(now) >= window_ms
    }

    /// Milliseconds left before the window expires
    pub fn remaining_ms(&self, now: DateTime<Utc>, window_ms: u64) -> u64 {
        window_ms.saturating_sub(self.elapsed_ms(now))
    }

    /// Replace every counter with an empty window starting at `now`
    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = Self::new(now);
    }

    /// Admissions recorded for a system in this window
    pub fn system_count(&self, system: &SystemTag) -> u64 {
        self.system_current.get(system).copied().unwrap_or(0)
    }

    /// Admissions recorded for a trace in this window
    pub fn trace_count(&self, trace_id: &str) -> u64 {
        self.trace_counts.get(trace_id).copied().unwrap_or(0)
    }

    /// Evaluate the three tiers in order: global, system, trace.
    ///
    /// Returns the denial for the first exhausted tier, or `None` if the
    /// request fits. Never mutates.
    pub fn evaluate(
        &self,
        config: &RateLimiterConfig,
        system: &SystemTag,
        trace_id: &str,
    ) -> Option<CheckResult> {
        if self.global_current >= config.global_limit {
            return Some(CheckResult::global_exceeded());
        }
        if self.system_count(system) >= config.quota_for(system) {
            return Some(CheckResult::system_exceeded(system));
        }
        if self.trace_count(trace_id) >= config.per_trace_limit {
            return Some(CheckResult::trace_exceeded(trace_id));
        }
        None
    }

    /// Record one admission on all three counters. Returns the new trace count.
    pub fn admit(&mut self, system: &SystemTag, trace_id: &str) -> u64 {
        self.global_current += 1;
        *self.system_current.entry(system.clone()).or_insert(0) += 1;
        let count = self.trace_counts.entry(trace_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Undo one admission previously recorded with [`WindowState::admit`]
    pub fn revoke(&mut self, system: &SystemTag, trace_id: &str) {
        self.global_current = self.global_current.saturating_sub(1);

        if let Some(count) = self.system_current.get_mut(system) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.system_current.remove(system);
            }
        }

        if let Some(count) = self.trace_counts.get_mut(trace_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.trace_counts.remove(trace_id);
            }
        }
    }

    /// Check the counter invariants against `config`
    ///
    /// The global count must equal the sum of the system counts and the sum
    /// of the trace counts, and no counter may exceed its limit.
    pub fn is_consistent(&self, config: &RateLimiterConfig) -> bool {
        let system_sum: u64 = self.system_current.values().sum();
        let trace_sum: u64 = self.trace_counts.values().sum();

        self.global_current == system_sum
            && self.global_current == trace_sum
            && self.global_current <= config.global_limit
            && self
                .system_current
                .iter()
                .all(|(system, count)| *count <= config.quota_for(system))
            && self
                .trace_counts
                .values()
                .all(|count| *count <= config.per_trace_limit)
    }
}
