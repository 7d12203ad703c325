//! In-memory history persistence.

use async_trait::async_trait;
use chat_memory_core::{HistoryPersistence, Message, SessionKey, StorageError};
use dashmap::DashMap;

/// In-memory persistence backend.
///
/// Useful for development and single-process deployments.
/// Data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    histories: DashMap<SessionKey, Vec<Message>>,
}

impl MemoryPersistence {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            histories: DashMap::new(),
        }
    }

    /// Number of sessions with a stored history.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.histories.len()
    }
}

#[async_trait]
impl HistoryPersistence for MemoryPersistence {
    async fn load(&self, key: &SessionKey) -> Result<Vec<Message>, StorageError> {
        Ok(self
            .histories
            .get(key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn save(&self, key: &SessionKey, messages: &[Message]) -> Result<(), StorageError> {
        self.histories.insert(key.clone(), messages.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &SessionKey) -> Result<(), StorageError> {
        self.histories.remove(key);
        Ok(())
    }
}
