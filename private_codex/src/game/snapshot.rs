//! Single-slot persistence of an in-flight match.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, path::PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

use super::{entities::Username, master::MatchState};

/// Upper bound on what a snapshot blob may ask the decoder to allocate.
pub const MAX_SNAPSHOT_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("failed to decode snapshot: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MatchSnapshot {
    pub state: MatchState,
    pub saved_at: DateTime<Utc>,
}

impl MatchSnapshot {
    pub fn new(state: MatchState) -> Self {
        Self {
            state,
            saved_at: Utc::now(),
        }
    }

    pub fn roster_key(&self) -> BTreeSet<Username> {
        self.state.roster_key()
    }
}

/// Where the latest snapshot lives. Saving replaces the previous one.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &MatchSnapshot) -> SnapshotResult<()>;

    async fn load(&self) -> SnapshotResult<Option<MatchSnapshot>>;

    async fn clear(&self) -> SnapshotResult<()>;
}

#[derive(Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<Option<MatchSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, snapshot: &MatchSnapshot) -> SnapshotResult<()> {
        *self.slot.lock().await = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self) -> SnapshotResult<Option<MatchSnapshot>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn clear(&self) -> SnapshotResult<()> {
        self.slot.lock().await.take();
        Ok(())
    }
}

/// Bincode blob on disk. Writes go to a sibling temp file and are renamed
/// into place so a crash never leaves a torn snapshot.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tmp.into()
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, snapshot: &MatchSnapshot) -> SnapshotResult<()> {
        let bytes = bincode::serde::encode_to_vec(snapshot, bincode::config::standard())?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        log::debug!(
            "Saved snapshot ({} bytes) to {}",
            bytes.len(),
            self.path.display()
        );
        Ok(())
    }

    async fn load(&self) -> SnapshotResult<Option<MatchSnapshot>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let config = bincode::config::standard().with_limit::<MAX_SNAPSHOT_SIZE>();
        let (snapshot, _) = bincode::serde::decode_from_slice(&bytes, config)?;
        Ok(Some(snapshot))
    }

    async fn clear(&self) -> SnapshotResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
