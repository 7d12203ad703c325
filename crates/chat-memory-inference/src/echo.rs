//! Offline provider for local runs without model credentials.

use async_trait::async_trait;
use chat_memory_core::{InferenceError, InferenceProvider, InferenceRequest};

/// Replies with a prefix followed by the latest user message.
#[derive(Debug, Clone)]
pub struct EchoProvider {
    prefix: String,
}

impl EchoProvider {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for EchoProvider {
    fn default() -> Self {
        Self::new("You said: ")
    }
}

#[async_trait]
impl InferenceProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        let last = request.last_user_message().ok_or_else(|| {
            InferenceError::Provider("no user message to echo".into())
        })?;
        Ok(format!("{}{}", self.prefix, last.content))
    }
}
