//! State Store
//!
//! Durable write-through storage for the window state. The actor loads the
//! state once on cold start and saves it before acknowledging an admission.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::window::WindowState;

/// Error raised by a state store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem error
    #[error("State store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored state could not be encoded or decoded
    #[error("State store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store is not accepting reads or writes
    #[error("State store unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage for the window state
#[async_trait]
pub trait StateStore: Send + Sync + std::fmt::Debug {
    /// Load the last saved state, if any
    async fn load(&self) -> Result<Option<WindowState>, StoreError>;

    /// Persist the state. Must not return until the write is durable.
    async fn save(&self, state: &WindowState) -> Result<(), StoreError>;
}

/// In-memory state store
///
/// Clones share storage, so a test can inspect what the actor saved or hand
/// the same store to a restarted actor.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<Option<WindowState>>>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Last saved state
    pub async fn snapshot(&self) -> Option<WindowState> {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<Option<WindowState>, StoreError> {
        Ok(self.state.read().await.clone())
    }

    async fn save(&self, state: &WindowState) -> Result<(), StoreError> {
        *self.state.write().await = Some(state.clone());
        Ok(())
    }
}

/// JSON file state store
///
/// Writes go to a sibling temporary file which is synced and renamed over
/// the target, so a crash never leaves a torn state file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn load(&self) -> Result<Option<WindowState>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &WindowState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.temp_path();
        let mut file = tokio::fs::File::create(&temp_path).await?;
        tokio::io::AsyncWriteExt::write_all(&mut file, &bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}
