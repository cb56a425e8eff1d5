//! Edge Router
//!
//! Stateless HTTP front door. Handlers hold no mutable state of their own;
//! every quota decision is delegated to the rate limiter actor, so any
//! number of router tasks can run in parallel.

pub mod error;
pub mod handlers;
pub mod types;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::classifier::SystemClassifier;
use crate::config::Config;
use crate::log_buffer::LogBuffer;
use crate::rate_limit::{RateLimiterBuilder, RateLimiterHandle};

pub use error::ApiError;
pub use types::{CheckRequest, LogSubmission, LogSubmissionResponse};

/// Default deadline for a limiter answer
pub const DEFAULT_ACTOR_TIMEOUT: Duration = Duration::from_millis(2000);

/// Shared, immutable router state
#[derive(Clone)]
pub struct AppState {
    pub limiter: RateLimiterHandle,
    pub classifier: Arc<SystemClassifier>,
    pub log_buffer: Arc<dyn LogBuffer>,
    /// Deadline for each limiter call; exceeding it fails the request closed
    pub actor_timeout: Duration,
    /// Whether `/metrics` is routed
    pub metrics_enabled: bool,
}

impl AppState {
    pub fn new(
        limiter: RateLimiterHandle,
        classifier: SystemClassifier,
        log_buffer: Arc<dyn LogBuffer>,
    ) -> Self {
        Self {
            limiter,
            classifier: Arc::new(classifier),
            log_buffer,
            actor_timeout: DEFAULT_ACTOR_TIMEOUT,
            metrics_enabled: true,
        }
    }

    /// Spawn the rate limiter actor and assemble the state described by `config`.
    /// Must be called from within a tokio runtime.
    pub fn from_config(config: &Config) -> Self {
        let limiter = RateLimiterBuilder::new(config.limiter.clone())
            .store(config.store.build())
            .queue_capacity(config.server.queue_capacity)
            .spawn();

        Self::new(
            limiter,
            SystemClassifier::new(config.classifier.clone()),
            config.log_buffer.build(),
        )
        .with_actor_timeout(config.server.actor_timeout())
        .with_metrics(config.metrics.enabled)
    }

    pub fn with_actor_timeout(mut self, timeout: Duration) -> Self {
        self.actor_timeout = timeout;
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }
}

/// Build the axum router
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/log", post(handlers::submit_log))
        .route("/check", post(handlers::check))
        .route("/status", get(handlers::status))
        .route("/health", get(handlers::health));
    if state.metrics_enabled {
        router = router.route("/metrics", get(handlers::metrics_handler));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Serve the router on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: tokio::net::TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .context("Failed to read listener address")?;
    info!(
        metrics = state.metrics_enabled,
        "Edge router listening on {}", addr
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Edge router server error")?;

    info!("Edge router stopped");
    Ok(())
}
