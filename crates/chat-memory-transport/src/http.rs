//! HTTP routes for chat turns.
//!
//! The un-prefixed routes (`/api/chat`, `/api/clear`, `/api/history`) act on
//! the router's default session. The `/api/sessions/{session_id}/...` routes
//! address any session explicitly.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use chat_memory_core::{InferenceProvider, SessionKey, SessionStore};
use chat_memory_session::TurnOrchestrator;

use crate::{
    error::ApiError,
    protocol::{ChatRequest, ChatResponse, ClearResponse, HistoryResponse},
};

/// Shared state for the chat routes.
pub struct ChatState<S, P>
where
    S: SessionStore,
    P: InferenceProvider,
{
    /// Turn pipeline.
    pub orchestrator: Arc<TurnOrchestrator<S, P>>,
    /// Session used by the un-prefixed routes.
    pub default_session: SessionKey,
}

impl<S, P> Clone for ChatState<S, P>
where
    S: SessionStore,
    P: InferenceProvider,
{
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            default_session: self.default_session.clone(),
        }
    }
}

type ChatBody = Result<Json<ChatRequest>, JsonRejection>;

async fn run_turn<S, P>(
    state: &ChatState<S, P>,
    session: &SessionKey,
    body: ChatBody,
) -> Result<Json<ChatResponse>, ApiError>
where
    S: SessionStore,
    P: InferenceProvider,
{
    let Json(request) = body?;
    let reply = state.orchestrator.submit(session, &request.message).await?;
    Ok(Json(ChatResponse { reply }))
}

async fn chat_default<S, P>(
    State(state): State<ChatState<S, P>>,
    body: ChatBody,
) -> Result<Json<ChatResponse>, ApiError>
where
    S: SessionStore + 'static,
    P: InferenceProvider + 'static,
{
    run_turn(&state, &state.default_session, body).await
}

async fn chat_session<S, P>(
    State(state): State<ChatState<S, P>>,
    Path(session_id): Path<String>,
    body: ChatBody,
) -> Result<Json<ChatResponse>, ApiError>
where
    S: SessionStore + 'static,
    P: InferenceProvider + 'static,
{
    run_turn(&state, &SessionKey::new(session_id), body).await
}

async fn clear_default<S, P>(
    State(state): State<ChatState<S, P>>,
) -> Result<Json<ClearResponse>, ApiError>
where
    S: SessionStore + 'static,
    P: InferenceProvider + 'static,
{
    state
        .orchestrator
        .clear_session(&state.default_session)
        .await?;
    Ok(Json(ClearResponse::ok()))
}

async fn clear_session<S, P>(
    State(state): State<ChatState<S, P>>,
    Path(session_id): Path<String>,
) -> Result<Json<ClearResponse>, ApiError>
where
    S: SessionStore + 'static,
    P: InferenceProvider + 'static,
{
    state
        .orchestrator
        .clear_session(&SessionKey::new(session_id))
        .await?;
    Ok(Json(ClearResponse::ok()))
}

async fn history_default<S, P>(
    State(state): State<ChatState<S, P>>,
) -> Result<Json<HistoryResponse>, ApiError>
where
    S: SessionStore + 'static,
    P: InferenceProvider + 'static,
{
    let messages = state.orchestrator.history(&state.default_session).await?;
    Ok(Json(HistoryResponse { messages }))
}

async fn history_session<S, P>(
    State(state): State<ChatState<S, P>>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError>
where
    S: SessionStore + 'static,
    P: InferenceProvider + 'static,
{
    let messages = state
        .orchestrator
        .history(&SessionKey::new(session_id))
        .await?;
    Ok(Json(HistoryResponse { messages }))
}

/// Create the chat router.
///
/// # Example
/// ```ignore
/// let turns = Arc::new(TurnOrchestrator::new(SessionActors::default(), EchoProvider::default()));
/// let app = Router::new().merge(create_chat_router(turns, "session-1".into()));
/// ```
#[must_use]
pub fn create_chat_router<S, P>(
    orchestrator: Arc<TurnOrchestrator<S, P>>,
    default_session: SessionKey,
) -> Router
where
    S: SessionStore + 'static,
    P: InferenceProvider + 'static,
{
    Router::new()
        .route("/api/chat", post(chat_default::<S, P>))
        .route("/api/clear", post(clear_default::<S, P>))
        .route("/api/history", get(history_default::<S, P>))
        .route("/api/sessions/{session_id}/chat", post(chat_session::<S, P>))
        .route(
            "/api/sessions/{session_id}/clear",
            post(clear_session::<S, P>),
        )
        .route(
            "/api/sessions/{session_id}/history",
            get(history_session::<S, P>),
        )
        .with_state(ChatState {
            orchestrator,
            default_session,
        })
}
