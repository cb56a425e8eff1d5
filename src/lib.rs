//! Edge Ingest Library
//!
//! Admission control for an edge log-ingestion gateway: a serialized rate
//! limiter actor enforcing global, per-system and per-trace quotas, a
//! rule-table system classifier, and the stateless HTTP router in front of
//! them.

pub mod classifier;
pub mod config;
pub mod log_buffer;
pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod router;
