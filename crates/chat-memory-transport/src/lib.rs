//! Transport layer for chat memory turns.
//!
//! Provides:
//! - Wire protocol (JSON request/response bodies)
//! - HTTP router and error mapping (feature: http)

pub mod protocol;

#[cfg(feature = "http")]
pub mod error;

#[cfg(feature = "http")]
pub mod http;

pub use protocol::{ChatRequest, ChatResponse, ClearResponse, ErrorBody, HistoryResponse};

#[cfg(feature = "http")]
pub use http::{ChatState, create_chat_router};
