//! Wire protocol for client-server communication.

use chat_memory_core::Message;
use serde::{Deserialize, Serialize};

/// Body of a chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Text typed by the user.
    pub message: String,
}

/// Body of a successful chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Assistant reply for this turn.
    pub reply: String,
}

/// Body of a successful clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub ok: bool,
}

impl ClearResponse {
    #[must_use]
    pub const fn ok() -> Self {
        Self { ok: true }
    }
}

/// Body of a history read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// Stored messages, oldest first.
    pub messages: Vec<Message>,
}

/// Body of any failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable machine-readable code, e.g. `INFERENCE_FAILED`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

impl ErrorBody {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}
