//! Inference providers for chat memory turns.
//!
//! Provides:
//! - `WorkersAiProvider` - Workers AI text-generation REST client
//! - `EchoProvider` - Offline provider that echoes the latest user message

pub mod echo;
pub mod workers_ai;

pub use echo::EchoProvider;
pub use workers_ai::{WorkersAiConfig, WorkersAiProvider};
