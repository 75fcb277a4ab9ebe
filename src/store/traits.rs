//! `StateStore`, the single async interface for state persistence.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::state::AppState;

/// Backend-agnostic store for the application state document.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the persisted state, or a fresh default when nothing is stored.
    ///
    /// Implementations return a normalized tree (see `AppState::normalize`).
    async fn load(&self) -> Result<AppState, StorageError>;

    /// Replace the persisted state with `state`.
    async fn save(&self, state: &AppState) -> Result<(), StorageError>;
}
