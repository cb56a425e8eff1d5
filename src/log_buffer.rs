// Downstream log buffer clients
//
// Admitted submissions are appended to a log buffer. The buffer itself
// (storage, export) lives outside this service; this module only holds the
// clients that hand entries over to it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::rate_limit::SystemTag;

/// Default number of entries retained by the in-memory buffer
pub const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

/// Log entry handed to the buffer after admission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique entry id
    pub id: String,
    pub trace_id: String,
    pub message: String,
    pub level: String,
    /// System the submission was charged to
    pub system: SystemTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    /// Time the gateway accepted the entry
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(
        trace_id: String,
        message: String,
        level: String,
        system: SystemTag,
        context: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            trace_id,
            message,
            level,
            system,
            context,
            timestamp: Utc::now(),
        }
    }
}

/// Error returned by a log buffer client
#[derive(Debug, thiserror::Error)]
pub enum LogBufferError {
    /// Transport failure
    #[error("Log buffer request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Buffer answered with a non-success status
    #[error("Log buffer rejected entry with status {0}")]
    Rejected(u16),
}

/// Append-only sink for admitted log entries
#[async_trait]
pub trait LogBuffer: Send + Sync {
    async fn append(&self, entry: LogEntry) -> Result<(), LogBufferError>;
}

/// Log buffer client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogBufferConfig {
    /// Endpoint entries are POSTed to. In-memory buffering when unset.
    pub url: Option<String>,

    /// Bearer token for the endpoint
    pub auth_token: Option<String>,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Entries retained by the in-memory buffer
    pub memory_capacity: usize,
}

impl Default for LogBufferConfig {
    fn default() -> Self {
        Self {
            url: None,
            auth_token: None,
            timeout_ms: 5000,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

impl LogBufferConfig {
    /// Build the client this configuration describes
    pub fn build(&self) -> Arc<dyn LogBuffer> {
        match &self.url {
            Some(url) => Arc::new(HttpLogBuffer::new(
                url.clone(),
                self.auth_token.clone(),
                Duration::from_millis(self.timeout_ms),
            )),
            None => Arc::new(MemoryLogBuffer::with_capacity(self.memory_capacity)),
        }
    }
}

/// Bounded in-memory buffer; the oldest entries are dropped when full
#[derive(Debug, Clone)]
pub struct MemoryLogBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl MemoryLogBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    /// Copy of the buffered entries, oldest first
    pub async fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl Default for MemoryLogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogBuffer for MemoryLogBuffer {
    async fn append(&self, entry: LogEntry) -> Result<(), LogBufferError> {
        let mut entries = self.entries.lock().await;
        entries.push_back(entry);
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(0..excess);
        }
        Ok(())
    }
}

/// Forwards entries to an HTTP log buffer endpoint
#[derive(Debug, Clone)]
pub struct HttpLogBuffer {
    client: reqwest::Client,
    url: String,
    auth_token: Option<String>,
    timeout: Duration,
}

impl HttpLogBuffer {
    pub fn new(url: String, auth_token: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            auth_token,
            timeout,
        }
    }
}

#[async_trait]
impl LogBuffer for HttpLogBuffer {
    async fn append(&self, entry: LogEntry) -> Result<(), LogBufferError> {
        let start = Instant::now();

        let mut request = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&entry);

        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            debug!(
                "Appended log entry {} in {}ms",
                entry.id,
                start.elapsed().as_millis()
            );
            Ok(())
        } else {
            warn!("Log buffer rejected entry {}: HTTP {}", entry.id, status);
            Err(LogBufferError::Rejected(status.as_u16()))
        }
    }
}
