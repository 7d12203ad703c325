//! Prompt assembly for a single turn.

use serde::{Deserialize, Serialize};

use crate::Message;

/// Instruction prepended to every turn unless configured otherwise.
pub const DEFAULT_SYSTEM_PREAMBLE: &str =
    "You are a helpful AI assistant with memory. Keep responses concise and friendly.";

/// Default generation budget per reply.
pub const DEFAULT_MAX_TOKENS: u32 = 300;

/// Request handed to an inference provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Role-tagged messages, system preamble first.
    pub messages: Vec<Message>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl InferenceRequest {
    /// Most recent user message, if any.
    #[must_use]
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::Role::User)
    }
}

/// System preamble plus conversation history.
#[derive(Debug, Clone)]
pub struct PromptContext {
    preamble: Message,
    history: Vec<Message>,
}

impl PromptContext {
    /// Create a context with the given system preamble and no history.
    #[must_use]
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            preamble: Message::system(preamble),
            history: Vec::new(),
        }
    }

    /// Attach the session history, oldest first.
    #[must_use]
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// Number of messages the request will carry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len() + 1
    }

    /// Always false; the preamble is always present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Flatten into an inference request.
    #[must_use]
    pub fn into_request(self, max_tokens: u32) -> InferenceRequest {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(self.preamble);
        messages.extend(self.history);
        InferenceRequest {
            messages,
            max_tokens,
        }
    }
}

impl Default for PromptContext {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PREAMBLE)
    }
}
