//! Session actors, persistence and turn orchestration for chat memory.
//!
//! Provides:
//! - `SessionActors` - Actor-per-key `SessionStore`
//! - `TurnOrchestrator` - One conversational turn, start to finish
//! - Persistence backends (memory, SQLite)

pub mod actors;
pub mod orchestrator;
pub mod storage;

pub use actors::SessionActors;
pub use orchestrator::{TurnConfig, TurnError, TurnOrchestrator};
