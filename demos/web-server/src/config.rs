//! Command-line and environment configuration.

use std::{net::SocketAddr, time::Duration};

use chat_memory_core::{DEFAULT_MAX_TOKENS, DEFAULT_SYSTEM_PREAMBLE};
use chat_memory_session::{TurnConfig, actors::DEFAULT_IDLE_TIMEOUT};
use clap::{Parser, ValueEnum};
use secrecy::SecretString;

/// Which inference backend answers turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// Workers AI text generation (needs account id and API token).
    WorkersAi,
    /// Echo the user's message back; no credentials needed.
    Echo,
}

/// Chat server with bounded per-session memory.
#[derive(Debug, Parser)]
#[command(name = "chat-memory-server", version, about)]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "CHAT_MEMORY_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Inference backend.
    #[arg(long, env = "CHAT_MEMORY_PROVIDER", value_enum, default_value_t = ProviderKind::WorkersAi)]
    pub provider: ProviderKind,

    /// Workers AI account id.
    #[arg(long, env = "CF_ACCOUNT_ID")]
    pub account_id: Option<String>,

    /// Workers AI API token.
    #[arg(long, env = "CF_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<SecretString>,

    /// Text-generation model.
    #[arg(long, env = "CHAT_MEMORY_MODEL", default_value = chat_memory_inference::workers_ai::DEFAULT_MODEL)]
    pub model: String,

    /// Generation budget per reply.
    #[arg(long, env = "CHAT_MEMORY_MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// Seconds to wait for the model before failing the turn.
    #[arg(
        long,
        env = "CHAT_MEMORY_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    /// Seconds a session may stay idle before its actor is retired.
    #[arg(
        long,
        env = "CHAT_MEMORY_SESSION_IDLE_SECS",
        default_value_t = DEFAULT_IDLE_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub session_idle_secs: u64,

    /// System message prepended to every turn.
    #[arg(long, env = "CHAT_MEMORY_PREAMBLE", default_value = DEFAULT_SYSTEM_PREAMBLE)]
    pub system_preamble: String,

    /// Session used by `/api/chat` and `/api/clear`.
    #[arg(long, env = "CHAT_MEMORY_DEFAULT_SESSION", default_value = "session-1")]
    pub default_session: String,

    /// SQLite database URL (requires the `sqlite` feature); memory if unset.
    #[arg(long, env = "CHAT_MEMORY_DATABASE_URL")]
    pub database_url: Option<String>,
}

impl ServerConfig {
    #[must_use]
    pub fn turn_config(&self) -> TurnConfig {
        TurnConfig {
            system_preamble: self.system_preamble.clone(),
            max_tokens: self.max_tokens,
            generate_timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    #[must_use]
    pub const fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }
}
