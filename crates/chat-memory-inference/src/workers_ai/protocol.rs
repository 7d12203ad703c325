//! Workers AI REST wire types.

use chat_memory_core::{InferenceError, Message};
use serde::{Deserialize, Serialize};

/// Body of `POST /accounts/{account_id}/ai/run/{model}`.
#[derive(Debug, Serialize)]
pub struct RunRequest<'a> {
    pub messages: &'a [Message],
    pub max_tokens: u32,
}

/// Standard API envelope.
#[derive(Debug, Deserialize)]
pub struct RunEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub result: Option<RunResult>,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

/// Text-generation result.
#[derive(Debug, Deserialize)]
pub struct RunResult {
    #[serde(default)]
    pub response: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl RunEnvelope {
    /// Joined error messages reported by the API.
    #[must_use]
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{} ({})", e.message, e.code))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Extract the generated text.
    ///
    /// # Errors
    /// - `Provider` if the API reported failure.
    /// - `MalformedResponse` if the result carries no usable text.
    pub fn into_reply(self) -> Result<String, InferenceError> {
        if !self.success {
            let summary = self.error_summary();
            return Err(InferenceError::Provider(if summary.is_empty() {
                "request was not successful".to_string()
            } else {
                summary
            }));
        }

        match self.result.and_then(|r| r.response) {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(InferenceError::MalformedResponse("empty response".into())),
            None => Err(InferenceError::MalformedResponse("missing result.response".into())),
        }
    }
}
