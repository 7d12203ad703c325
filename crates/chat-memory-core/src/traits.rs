//! Core traits for storage and inference.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::{InferenceRequest, Message, SessionKey};

/// Persistence backend error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Stored history is corrupt: {0}")]
    Corrupt(String),
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Session store error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),
}

/// Inference provider error.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),
}

/// Bounded per-session message log.
///
/// Operations on one key behave as if executed one at a time in submission
/// order. Operations on different keys are independent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Append a message, evicting the oldest entry on overflow.
    async fn append(&self, key: &SessionKey, msg: Message) -> Result<(), StoreError>;

    /// Current history, oldest first. Empty for unknown sessions.
    async fn get_history(&self, key: &SessionKey) -> Result<Vec<Message>, StoreError>;

    /// Reset the history to empty. Idempotent.
    async fn clear(&self, key: &SessionKey) -> Result<(), StoreError>;

    /// Validate and append an untyped `{role, content}` record.
    async fn append_value(&self, key: &SessionKey, value: &Value) -> Result<(), StoreError> {
        let msg = Message::from_value(value)?;
        self.append(key, msg).await
    }
}

/// Durable backing for session histories.
///
/// Backends store whole histories; windowing and ordering are enforced by
/// the caller.
#[async_trait]
pub trait HistoryPersistence: Send + Sync {
    /// Load the stored history, or an empty list if none exists.
    async fn load(&self, key: &SessionKey) -> Result<Vec<Message>, StorageError>;

    /// Replace the stored history.
    async fn save(&self, key: &SessionKey, messages: &[Message]) -> Result<(), StorageError>;

    /// Delete the stored history. Succeeds if none exists.
    async fn remove(&self, key: &SessionKey) -> Result<(), StorageError>;
}

/// Language model capability.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Generate a reply for the given messages.
    async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError>;
}

#[async_trait]
impl<T: HistoryPersistence + ?Sized> HistoryPersistence for Arc<T> {
    async fn load(&self, key: &SessionKey) -> Result<Vec<Message>, StorageError> {
        (**self).load(key).await
    }

    async fn save(&self, key: &SessionKey, messages: &[Message]) -> Result<(), StorageError> {
        (**self).save(key, messages).await
    }

    async fn remove(&self, key: &SessionKey) -> Result<(), StorageError> {
        (**self).remove(key).await
    }
}

#[async_trait]
impl<T: InferenceProvider + ?Sized> InferenceProvider for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        (**self).generate(request).await
    }
}
