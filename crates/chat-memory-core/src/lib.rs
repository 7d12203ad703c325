//! Core abstractions for bounded per-session chat memory.
//!
//! This crate provides the fundamental building blocks:
//! - `Message` / `Role` - Role-tagged conversation entries
//! - `History` - Fixed-capacity window with FIFO eviction
//! - `PromptContext` - System preamble + history, ready for inference
//! - Store, persistence and inference traits

pub mod context;
pub mod history;
pub mod message;
pub mod traits;

pub use context::{DEFAULT_MAX_TOKENS, DEFAULT_SYSTEM_PREAMBLE, InferenceRequest, PromptContext};
pub use history::{HISTORY_CAPACITY, History};
pub use message::{Message, Role, SessionKey};
pub use traits::{
    HistoryPersistence, InferenceError, InferenceProvider, SessionStore, StorageError, StoreError,
};
