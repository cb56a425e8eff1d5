// Configuration File Support
//
// TOML configuration for the edge ingest gateway with environment variable
// overrides. A missing file yields the defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::classifier::ClassifierConfig;
use crate::log_buffer::LogBufferConfig;
use crate::logging::LoggingConfig;
use crate::rate_limit::{FileStore, MemoryStore, RateLimiterConfig, StateStore};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "edge-ingest.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Quota parameters
    pub limiter: RateLimiterConfig,

    /// Window state persistence
    pub store: StoreConfig,

    /// Downstream log buffer
    pub log_buffer: LogBufferConfig,

    /// System classification rules
    pub classifier: ClassifierConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,

    /// Deadline for a rate limiter answer in milliseconds
    pub actor_timeout_ms: u64,

    /// Rate limiter command queue capacity
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8787".to_string(),
            actor_timeout_ms: 2000,
            queue_capacity: crate::rate_limit::actor::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Get the limiter deadline
    pub fn actor_timeout(&self) -> Duration {
        Duration::from_millis(self.actor_timeout_ms)
    }

    /// Parse the listen address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.bind))
    }
}

/// Window state persistence backend
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process memory only; state is lost on restart
    Memory,
    /// JSON file, written through on every admission
    #[default]
    File,
}

/// State store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// State file path (file backend)
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            path: PathBuf::from("./data/limiter-state.json"),
        }
    }
}

impl StoreConfig {
    /// Build the configured store
    pub fn build(&self) -> Arc<dyn StateStore> {
        match self.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::File => Arc::new(FileStore::new(&self.path)),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to register metrics and serve them on /metrics
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration from `edge-ingest.toml` in the working directory
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or
    /// if the resulting configuration is invalid. If the config file does
    /// not exist, the defaults (plus environment overrides) are used.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - EDGE_INGEST_LOG_LEVEL
    /// - EDGE_INGEST_LOG_FORMAT
    /// - EDGE_INGEST_BIND
    /// - EDGE_INGEST_ACTOR_TIMEOUT_MS
    /// - EDGE_INGEST_GLOBAL_LIMIT
    /// - EDGE_INGEST_PER_TRACE_LIMIT
    /// - EDGE_INGEST_WINDOW_MS
    /// - EDGE_INGEST_STATE_PATH
    /// - EDGE_INGEST_LOG_BUFFER_URL
    /// - EDGE_INGEST_METRICS_ENABLED
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Logging overrides
        if let Some(level) = lookup("EDGE_INGEST_LOG_LEVEL").and_then(|v| v.parse().ok()) {
            self.logging.level = level;
        }
        if let Some(format) = lookup("EDGE_INGEST_LOG_FORMAT").and_then(|v| v.parse().ok()) {
            self.logging.format = format;
        }

        // Server overrides
        if let Some(bind) = lookup("EDGE_INGEST_BIND") {
            self.server.bind = bind;
        }
        if let Some(timeout) = lookup("EDGE_INGEST_ACTOR_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.server.actor_timeout_ms = timeout;
        }

        // Limiter overrides
        if let Some(limit) = lookup("EDGE_INGEST_GLOBAL_LIMIT").and_then(|v| v.parse().ok()) {
            self.limiter.global_limit = limit;
        }
        if let Some(limit) = lookup("EDGE_INGEST_PER_TRACE_LIMIT").and_then(|v| v.parse().ok()) {
            self.limiter.per_trace_limit = limit;
        }
        if let Some(window) = lookup("EDGE_INGEST_WINDOW_MS").and_then(|v| v.parse().ok()) {
            self.limiter.window_ms = window;
        }

        // Store overrides
        if let Some(path) = lookup("EDGE_INGEST_STATE_PATH") {
            self.store.backend = StoreBackend::File;
            self.store.path = PathBuf::from(path);
        }

        // Log buffer overrides
        if let Some(url) = lookup("EDGE_INGEST_LOG_BUFFER_URL") {
            self.log_buffer.url = Some(url).filter(|u| !u.is_empty());
        }

        // Metrics overrides
        if let Some(enabled) = lookup("EDGE_INGEST_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(self.metrics.enabled);
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        self.server.bind_addr()?;
        if self.server.actor_timeout_ms == 0 {
            anyhow::bail!("Actor timeout must be > 0 ms");
        }
        if self.server.queue_capacity == 0 {
            anyhow::bail!("Limiter queue capacity must be > 0");
        }

        self.limiter
            .validate()
            .context("Invalid limiter configuration")?;
        self.classifier
            .validate()
            .context("Invalid classifier configuration")?;

        if self.store.backend == StoreBackend::File && self.store.path.as_os_str().is_empty() {
            anyhow::bail!("File state store requires a path");
        }

        if let Some(url) = &self.log_buffer.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("Log buffer URL must be http(s): {}", url);
            }
        }
        if self.log_buffer.timeout_ms == 0 {
            anyhow::bail!("Log buffer timeout must be > 0 ms");
        }

        Ok(())
    }
}
