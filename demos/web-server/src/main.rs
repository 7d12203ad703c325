//! Chat server with bounded per-session memory.
//!
//! Run with: cargo run -p chat-memory-server -- --provider echo
//!
//! Then `curl -X POST localhost:3000/api/chat -H 'content-type: application/json' -d '{"message":"Hello"}'`.

mod config;

use std::sync::Arc;

use anyhow::{Context, bail};
use chat_memory_core::{InferenceProvider, SessionKey};
use chat_memory_inference::{EchoProvider, WorkersAiConfig, WorkersAiProvider};
use chat_memory_session::{SessionActors, TurnOrchestrator, storage::MemoryPersistence};
use chat_memory_transport::create_chat_router;
use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ProviderKind, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServerConfig::parse();

    let store = build_store(&config).await?;
    let provider = build_provider(&config)?;
    tracing::info!(provider = provider.name(), "Inference provider ready");

    let turns = Arc::new(TurnOrchestrator::with_config(
        store,
        provider,
        config.turn_config(),
    ));

    // Build router
    let app = create_chat_router(turns, SessionKey::new(config.default_session.as_str()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!("Server listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn build_store(config: &ServerConfig) -> anyhow::Result<SessionActors> {
    match config.database_url.as_deref() {
        None => {
            tracing::info!("Using in-memory history storage");
            Ok(SessionActors::new(MemoryPersistence::new())
                .with_idle_timeout(config.session_idle_timeout()))
        }
        #[cfg(feature = "sqlite")]
        Some(url) => {
            let persistence = chat_memory_session::storage::SqlitePersistence::connect(url)
                .await
                .with_context(|| format!("failed to open {url}"))?;
            tracing::info!("Using SQLite history storage");
            Ok(SessionActors::new(persistence).with_idle_timeout(config.session_idle_timeout()))
        }
        #[cfg(not(feature = "sqlite"))]
        Some(_) => bail!("a database URL was given but the server was built without `sqlite`"),
    }
}

fn build_provider(config: &ServerConfig) -> anyhow::Result<Arc<dyn InferenceProvider>> {
    match config.provider {
        ProviderKind::Echo => Ok(Arc::new(EchoProvider::default())),
        ProviderKind::WorkersAi => {
            let (Some(account_id), Some(api_token)) = (&config.account_id, &config.api_token)
            else {
                bail!("workers-ai needs --account-id/CF_ACCOUNT_ID and --api-token/CF_API_TOKEN");
            };
            let workers = WorkersAiConfig::new(account_id.as_str(), api_token.clone())
                .with_model(config.model.as_str());
            Ok(Arc::new(WorkersAiProvider::new(workers)?))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
