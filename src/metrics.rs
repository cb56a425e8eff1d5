// Prometheus metrics for the edge ingest gateway
//
// Exposed on the /metrics endpoint:
// - Log submissions by outcome (counter)
// - Limiter decisions by tier (counter)
// - Limiter check latency (histogram)
// - Window resets (counter)

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use crate::rate_limit::{CheckResult, LimiterError};

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref LOG_SUBMISSIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("log_submissions_total", "Log submissions received by the router"),
        &["outcome"]
    ).expect("Failed to create log submissions metric");

    pub static ref LIMITER_DECISIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("limiter_decisions_total", "Admission decisions made by the rate limiter"),
        &["decision"]
    ).expect("Failed to create limiter decisions metric");

    pub static ref LIMITER_CHECK_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("limiter_check_duration_seconds", "Time spent evaluating one admission check"),
    ).expect("Failed to create limiter check duration metric");

    pub static ref LIMITER_WINDOW_RESETS_TOTAL: IntCounter = IntCounter::new(
        "limiter_window_resets_total",
        "Number of quota windows that expired and were reset"
    ).expect("Failed to create window resets metric");
}

/// Register all metrics with the registry - call once at startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(LOG_SUBMISSIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LIMITER_DECISIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LIMITER_CHECK_DURATION_SECONDS.clone()))?;
    REGISTRY.register(Box::new(LIMITER_WINDOW_RESETS_TOTAL.clone()))?;
    Ok(())
}

/// Record the outcome of one limiter check
pub fn record_decision(result: &Result<CheckResult, LimiterError>) {
    let label = match result {
        Ok(r) if r.allowed => "allowed",
        Ok(r) => r.tier.map(|t| t.as_str()).unwrap_or("denied"),
        Err(_) => "error",
    };
    LIMITER_DECISIONS_TOTAL.with_label_values(&[label]).inc();
}

/// Record a check dropped because its caller stopped waiting
pub fn record_abandoned() {
    LIMITER_DECISIONS_TOTAL
        .with_label_values(&["abandoned"])
        .inc();
}

/// Record the outcome of one /log submission
pub fn record_submission(outcome: &str) {
    LOG_SUBMISSIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
