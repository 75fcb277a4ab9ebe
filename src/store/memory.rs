//! In-memory state store for tests and ephemeral runs.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::StateStore;
use crate::error::StorageError;
use crate::state::AppState;

/// Keeps the last saved state in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Option<AppState>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing state, as if it had been loaded from disk.
    pub fn with_state(state: AppState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: Mutex::new(0),
        }
    }

    /// The most recently saved state.
    pub async fn snapshot(&self) -> Option<AppState> {
        self.state.lock().await.clone()
    }

    /// Number of `save` calls so far.
    pub async fn save_count(&self) -> usize {
        *self.saves.lock().await
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<AppState, StorageError> {
        let mut state = self.state.lock().await.clone().unwrap_or_default();
        state.normalize();
        Ok(state)
    }

    async fn save(&self, state: &AppState) -> Result<(), StorageError> {
        *self.state.lock().await = Some(state.clone());
        *self.saves.lock().await += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_store_loads_default() {
        let store = MemoryStore::new();
        assert_eq!(store.load().await.unwrap(), AppState::default());
        assert!(store.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn save_is_visible_to_load() {
        let store = MemoryStore::new();
        let mut state = AppState::default();
        state.new_session();
        store.save(&state).await.unwrap();
        assert_eq!(store.load().await.unwrap(), state);
        assert_eq!(store.save_count().await, 1);
    }
}
