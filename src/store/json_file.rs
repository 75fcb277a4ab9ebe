//! File-backed state store.
//!
//! The document lives at `<data_dir>/ai_scholar_state_v6.json`. Writes go to a
//! sibling temp file that is renamed over the target, so a crash mid-write
//! leaves the previous document intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};

use super::traits::StateStore;
use crate::error::StorageError;
use crate::state::AppState;

/// JSON document store.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn corrupt_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".corrupt");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<AppState, StorageError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No saved state, starting fresh");
                return Ok(AppState::default());
            }
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        match serde_json::from_str::<AppState>(&raw) {
            Ok(mut state) => {
                state.normalize();
                debug!(
                    path = %self.path.display(),
                    sessions = state.sessions.len(),
                    "State loaded"
                );
                Ok(state)
            }
            Err(e) => {
                let backup = self.corrupt_path();
                warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    error = %e,
                    "Saved state is unreadable, starting fresh"
                );
                fs::copy(&self.path, &backup)
                    .await
                    .map_err(|e| StorageError::io(&backup, e))?;
                Ok(AppState::default())
            }
        }
    }

    async fn save(&self, state: &AppState) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }
        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, &json)
            .await
            .map_err(|e| StorageError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;
        debug!(path = %self.path.display(), bytes = json.len(), "State saved");
        Ok(())
    }
}
