//! Rate Limiting and Admission Control Module
//!
//! Enforces global, per-system and per-trace quotas over a fixed time
//! window. All quota accounting happens inside one serialized actor.
//!
//! # Features
//!
//! - Three limit tiers evaluated in fixed precedence: global, system, trace
//! - No partial increments: a request either bumps all three counters or none
//! - Write-through persistence before an admission is acknowledged
//! - Fail-closed on persistence failure or timeout
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Rate Limiter Actor                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐         │
//! │  │ Global      │  │ System      │  │ Trace       │         │
//! │  │ Limit       │  │ Quotas      │  │ Limit       │         │
//! │  └─────────────┘  └─────────────┘  └─────────────┘         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │          State Store (In-Memory or JSON File)        │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod actor;
pub mod clock;
pub mod config;
pub mod error;
pub mod quota;
pub mod store;
pub mod window;

pub use actor::{RateLimiterActor, RateLimiterBuilder, RateLimiterHandle, StatusReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RateLimiterConfig;
pub use error::LimiterError;
pub use quota::{CheckResult, LimitTier, SystemTag};
pub use store::{FileStore, MemoryStore, StateStore, StoreError};
pub use window::WindowState;
