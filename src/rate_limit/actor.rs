//! Rate Limiter Actor
//!
//! A single tokio task owns the [`WindowState`] and drains a command queue
//! in arrival order. Every `check` runs to completion, including the durable
//! write, before the next command is looked at, so concurrent callers can
//! never jointly over-admit.
//!
//! ```text
//!   handle.check() ─┐
//!   handle.check() ─┼──► mpsc queue ──► actor task ──► StateStore
//!   handle.status() ┘         (FIFO)     (owns WindowState)
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::clock::{Clock, SystemClock};
use super::config::RateLimiterConfig;
use super::error::LimiterError;
use super::quota::{CheckResult, SystemTag};
use super::store::{MemoryStore, StateStore};
use super::window::WindowState;
use crate::metrics;

/// Default number of queued commands before callers wait for capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Snapshot returned by [`RateLimiterHandle::status`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Active configuration
    pub config: RateLimiterConfig,

    /// Counters of the current window
    pub current_state: WindowState,

    /// Milliseconds until the window expires
    pub window_remaining_ms: u64,
}

enum Command {
    Check {
        system: SystemTag,
        trace_id: String,
        reply: oneshot::Sender<Result<CheckResult, LimiterError>>,
    },
    Status {
        reply: oneshot::Sender<Result<StatusReport, LimiterError>>,
    },
}

/// Builder for the rate limiter actor
#[derive(Debug)]
pub struct RateLimiterBuilder {
    config: RateLimiterConfig,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    queue_capacity: usize,
}

impl RateLimiterBuilder {
    /// Start building an actor for `config`
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(SystemClock),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Durable store for the window state
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    /// Clock used for window expiry
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bound of the command queue
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Build the actor without starting it
    pub fn build(self) -> (RateLimiterActor, RateLimiterHandle) {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let config = Arc::new(self.config);

        let actor = RateLimiterActor {
            config: config.clone(),
            store: self.store,
            clock: self.clock,
            state: None,
            loaded: false,
            receiver,
        };
        let handle = RateLimiterHandle { sender, config };

        (actor, handle)
    }

    /// Build the actor and run it on the current tokio runtime
    pub fn spawn(self) -> RateLimiterHandle {
        let (actor, handle) = self.build();
        tokio::spawn(actor.run());
        handle
    }
}

/// The task that owns the window state
#[derive(Debug)]
pub struct RateLimiterActor {
    config: Arc<RateLimiterConfig>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    state: Option<WindowState>,
    loaded: bool,
    receiver: mpsc::Receiver<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Check {
                system, trace_id, ..
            } => f
                .debug_struct("Check")
                .field("system", system)
                .field("trace_id", trace_id)
                .finish(),
            Command::Status { .. } => f.write_str("Status"),
        }
    }
}

impl RateLimiterActor {
    /// Process commands until every handle has been dropped
    pub async fn run(mut self) {
        info!(
            global_limit = self.config.global_limit,
            per_trace_limit = self.config.per_trace_limit,
            window_ms = self.config.window_ms,
            "Rate limiter actor started"
        );

        while let Some(command) = self.receiver.recv().await {
            match command {
                Command::Check {
                    system,
                    trace_id,
                    reply,
                } => {
                    // Caller timed out while the command was queued and was
                    // already told it was rejected; don't spend quota on it
                    if reply.is_closed() {
                        debug!(system = %system, trace_id, "Skipping abandoned check");
                        metrics::record_abandoned();
                        continue;
                    }

                    let started = Instant::now();
                    let result = self.check(&system, &trace_id).await;
                    metrics::LIMITER_CHECK_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());
                    metrics::record_decision(&result);
                    // Caller may have given up waiting; the decision stands either way
                    let _ = reply.send(result);
                }
                Command::Status { reply } => {
                    let _ = reply.send(self.status().await);
                }
            }
        }

        info!("Rate limiter actor stopped");
    }

    async fn ensure_loaded(&mut self) -> Result<(), LimiterError> {
        if !self.loaded {
            let stored = self.store.load().await.map_err(|e| {
                error!("Failed to load rate limiter state: {}", e);
                LimiterError::from(e)
            })?;
            if let Some(state) = &stored {
                info!(
                    global_current = state.global_current,
                    window_start = %state.window_start,
                    "Restored rate limiter state"
                );
            }
            self.state = stored;
            self.loaded = true;
        }
        Ok(())
    }

    async fn check(
        &mut self,
        system: &SystemTag,
        trace_id: &str,
    ) -> Result<CheckResult, LimiterError> {
        self.ensure_loaded().await?;

        let now = self.clock.now();
        let config = &self.config;
        let state = self.state.get_or_insert_with(|| WindowState::new(now));

        if state.is_expired(now, config.window_ms) {
            debug!(
                admitted = state.global_current,
                window_start = %state.window_start,
                "Window expired, resetting counters"
            );
            state.reset(now);
            metrics::LIMITER_WINDOW_RESETS_TOTAL.inc();
        }

        if let Some(denial) = state.evaluate(config, system, trace_id) {
            debug!(
                system = %system,
                trace_id,
                reason = denial.reason.as_deref().unwrap_or_default(),
                "Request denied"
            );
            return Ok(denial);
        }

        let trace_count = state.admit(system, trace_id);

        if let Err(e) = self.store.save(state).await {
            state.revoke(system, trace_id);
            error!(
                system = %system,
                trace_id,
                "Failed to persist rate limiter state, rejecting request: {}",
                e
            );
            return Err(e.into());
        }

        Ok(CheckResult::allowed(
            config.per_trace_limit.saturating_sub(trace_count),
        ))
    }

    async fn status(&mut self) -> Result<StatusReport, LimiterError> {
        self.ensure_loaded().await?;

        let now = self.clock.now();
        let current_state = self
            .state
            .clone()
            .unwrap_or_else(|| WindowState::new(now));
        let window_remaining_ms = current_state.remaining_ms(now, self.config.window_ms);

        Ok(StatusReport {
            config: (*self.config).clone(),
            current_state,
            window_remaining_ms,
        })
    }
}

/// Cloneable handle to the rate limiter actor
#[derive(Debug, Clone)]
pub struct RateLimiterHandle {
    sender: mpsc::Sender<Command>,
    config: Arc<RateLimiterConfig>,
}

impl RateLimiterHandle {
    /// Spawn an actor with an in-memory store and the system clock
    pub fn spawn(config: RateLimiterConfig) -> Self {
        RateLimiterBuilder::new(config).spawn()
    }

    /// Configuration the actor was started with
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Decide whether one submission from `system` on `trace_id` is admitted
    pub async fn check(
        &self,
        system: SystemTag,
        trace_id: impl Into<String>,
    ) -> Result<CheckResult, LimiterError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Command::Check {
                system,
                trace_id: trace_id.into(),
                reply,
            })
            .await
            .map_err(|_| LimiterError::Unavailable)?;

        response.await.map_err(|_| LimiterError::Unavailable)?
    }

    /// Like [`check`](Self::check), but fails closed with
    /// [`LimiterError::Timeout`] if no answer arrives within `deadline`
    pub async fn check_within(
        &self,
        system: SystemTag,
        trace_id: impl Into<String>,
        deadline: Duration,
    ) -> Result<CheckResult, LimiterError> {
        match tokio::time::timeout(deadline, self.check(system, trace_id)).await {
            Ok(result) => result,
            Err(_) => Err(LimiterError::Timeout(deadline.as_millis() as u64)),
        }
    }

    /// Read-only snapshot of the configuration and current counters
    pub async fn status(&self) -> Result<StatusReport, LimiterError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Command::Status { reply })
            .await
            .map_err(|_| LimiterError::Unavailable)?;

        response.await.map_err(|_| LimiterError::Unavailable)?
    }

    /// Like [`status`](Self::status) with a deadline
    pub async fn status_within(&self, deadline: Duration) -> Result<StatusReport, LimiterError> {
        match tokio::time::timeout(deadline, self.status()).await {
            Ok(result) => result,
            Err(_) => Err(LimiterError::Timeout(deadline.as_millis() as u64)),
        }
    }
}
