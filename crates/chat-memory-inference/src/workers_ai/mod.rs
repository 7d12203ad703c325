//! Workers AI text-generation provider and wire protocol.

pub mod client;
pub mod protocol;

pub use client::{DEFAULT_BASE_URL, DEFAULT_MODEL, WorkersAiConfig, WorkersAiProvider};
