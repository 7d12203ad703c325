//! Turn errors mapped to HTTP status codes and the error body.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chat_memory_session::TurnError;
use tracing::warn;

use crate::protocol::ErrorBody;

/// Error returned by the HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Request body was not a JSON object with a string `message`.
    BadRequest(String),
    /// A turn, clear or history read failed.
    Turn(TurnError),
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        Self::Turn(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::BadRequest(msg) | Self::Turn(TurnError::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone())
            }
            Self::Turn(TurnError::InvalidMessage(msg)) => {
                (StatusCode::BAD_REQUEST, "INVALID_MESSAGE", msg.clone())
            }
            Self::Turn(TurnError::StorageUnavailable(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "STORAGE_UNAVAILABLE",
                "Conversation storage is unavailable".to_string(),
            ),
            Self::Turn(TurnError::InferenceFailed(_)) => (
                StatusCode::BAD_GATEWAY,
                "INFERENCE_FAILED",
                "The model could not produce a reply".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            if let Self::Turn(e) = &self {
                warn!(%status, code, "request failed: {e}");
            }
        }
        (status, Json(ErrorBody::new(code, message))).into_response()
    }
}
