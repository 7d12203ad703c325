//! Turn orchestration: one user message in, one assistant reply out.

use std::time::Duration;

use chat_memory_core::{
    DEFAULT_MAX_TOKENS, DEFAULT_SYSTEM_PREAMBLE, InferenceError, InferenceProvider, Message,
    PromptContext, SessionKey, SessionStore, StorageError, StoreError,
};
use tracing::{info, instrument, warn};

/// Turn error.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(StorageError),
    #[error("Inference failed: {0}")]
    InferenceFailed(#[from] InferenceError),
}

impl From<StoreError> for TurnError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidMessage(msg) => Self::InvalidMessage(msg),
            StoreError::StorageUnavailable(e) => Self::StorageUnavailable(e),
        }
    }
}

/// Per-turn settings.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// System message prepended to every request.
    pub system_preamble: String,
    /// Generation budget per reply.
    pub max_tokens: u32,
    /// Upper bound on a single `generate` call.
    pub generate_timeout: Duration,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            system_preamble: DEFAULT_SYSTEM_PREAMBLE.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            generate_timeout: Duration::from_secs(30),
        }
    }
}

/// Drives conversational turns over a session store and an inference provider.
///
/// Holds no conversation state of its own; every turn reads what it needs
/// from the store.
pub struct TurnOrchestrator<S, P>
where
    S: SessionStore,
    P: InferenceProvider,
{
    store: S,
    provider: P,
    config: TurnConfig,
}

impl<S, P> TurnOrchestrator<S, P>
where
    S: SessionStore,
    P: InferenceProvider,
{
    /// Create an orchestrator with default settings.
    #[must_use]
    pub fn new(store: S, provider: P) -> Self {
        Self::with_config(store, provider, TurnConfig::default())
    }

    /// Create an orchestrator with explicit settings.
    #[must_use]
    pub const fn with_config(store: S, provider: P, config: TurnConfig) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// The underlying session store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &TurnConfig {
        &self.config
    }

    /// Run one turn and return the assistant's reply.
    ///
    /// The user message is stored before inference and kept even if
    /// inference fails. Failing to store the reply is logged but does not
    /// fail the turn.
    ///
    /// # Errors
    /// - `InvalidInput` for blank text, with no side effects.
    /// - `InvalidMessage` / `StorageUnavailable` if the user message or the
    ///   history read fails; no inference is attempted.
    /// - `InferenceFailed` on provider error or timeout.
    #[instrument(skip(self, user_text), fields(session = %session, provider = self.provider.name()))]
    pub async fn submit(&self, session: &SessionKey, user_text: &str) -> Result<String, TurnError> {
        if user_text.trim().is_empty() {
            return Err(TurnError::InvalidInput("message must not be empty".into()));
        }

        self.store.append(session, Message::user(user_text)).await?;
        let history = self.store.get_history(session).await?;

        let request = PromptContext::new(self.config.system_preamble.as_str())
            .with_history(history)
            .into_request(self.config.max_tokens);
        let context_len = request.messages.len();

        let reply = match tokio::time::timeout(
            self.config.generate_timeout,
            self.provider.generate(&request),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!("Inference failed: {e}");
                return Err(e.into());
            }
            Err(_) => {
                warn!("Inference timed out after {:?}", self.config.generate_timeout);
                return Err(InferenceError::Timeout(self.config.generate_timeout).into());
            }
        };

        if let Err(e) = self
            .store
            .append(session, Message::assistant(reply.as_str()))
            .await
        {
            warn!("Reply not persisted, returning it anyway: {e}");
        }

        info!(
            context_len,
            input_chars = user_text.chars().count(),
            reply_chars = reply.chars().count(),
            "turn completed"
        );
        Ok(reply)
    }

    /// Reset a session's history.
    ///
    /// # Errors
    /// Returns `StorageUnavailable` if the backend cannot be written.
    #[instrument(skip(self), fields(session = %session))]
    pub async fn clear_session(&self, session: &SessionKey) -> Result<(), TurnError> {
        self.store.clear(session).await?;
        info!("session cleared");
        Ok(())
    }

    /// Current history of a session, oldest first.
    ///
    /// # Errors
    /// Returns `StorageUnavailable` if the backend cannot be read.
    pub async fn history(&self, session: &SessionKey) -> Result<Vec<Message>, TurnError> {
        Ok(self.store.get_history(session).await?)
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use chat_memory_core::{
        HISTORY_CAPACITY, HistoryPersistence, InferenceRequest, Role, SessionStore,
    };
    use tokio::sync::Notify;

    use super::*;
    use crate::{SessionActors, storage::MemoryPersistence};

    /// Deterministic provider for turn tests.
    #[derive(Default)]
    struct StubProvider {
        reply: Option<String>,
        hang: bool,
        calls: AtomicUsize,
        requests: Mutex<Vec<InferenceRequest>>,
    }

    impl StubProvider {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self::default()
        }

        fn hanging() -> Self {
            Self {
                hang: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl InferenceProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.reply
                .clone()
                .ok_or_else(|| InferenceError::Provider("model offline".into()))
        }
    }

    /// Provider that parks turns whose message is "wait" until released.
    #[derive(Default)]
    struct GatedProvider {
        parked: Notify,
        gate: Notify,
    }

    #[async_trait]
    impl InferenceProvider for GatedProvider {
        fn name(&self) -> &str {
            "gated"
        }

        async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
            let last = request.last_user_message().map(|m| m.content.clone());
            if last.as_deref() == Some("wait") {
                self.parked.notify_one();
                self.gate.notified().await;
            }
            Ok(format!("re: {}", last.unwrap_or_default()))
        }
    }

    /// Memory backend that refuses writes whose newest message has `role`.
    struct RejectRole {
        inner: MemoryPersistence,
        role: Role,
    }

    #[async_trait]
    impl HistoryPersistence for RejectRole {
        async fn load(&self, key: &SessionKey) -> Result<Vec<Message>, StorageError> {
            self.inner.load(key).await
        }

        async fn save(&self, key: &SessionKey, messages: &[Message]) -> Result<(), StorageError> {
            if messages.last().is_some_and(|m| m.role == self.role) {
                return Err(StorageError::Unavailable("disk full".into()));
            }
            self.inner.save(key, messages).await
        }

        async fn remove(&self, key: &SessionKey) -> Result<(), StorageError> {
            self.inner.remove(key).await
        }
    }

    fn key() -> SessionKey {
        SessionKey::from("session-1")
    }

    #[tokio::test]
    async fn test_first_turn_stores_user_and_reply() {
        let turns = TurnOrchestrator::new(SessionActors::default(), StubProvider::replying("Hi there"));

        let reply = turns.submit(&key(), "Hello").await.unwrap();

        assert_eq!(reply, "Hi there");
        assert_eq!(
            turns.store().get_history(&key()).await.unwrap(),
            vec![Message::user("Hello"), Message::assistant("Hi there")]
        );
    }

    #[tokio::test]
    async fn test_request_carries_preamble_history_and_budget() {
        let store = SessionActors::default();
        store.append(&key(), Message::user("earlier")).await.unwrap();
        store.append(&key(), Message::assistant("noted")).await.unwrap();
        let turns = TurnOrchestrator::new(store, StubProvider::replying("ok"));

        turns.submit(&key(), "now").await.unwrap();

        let requests = turns.provider.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.max_tokens, 300);
        assert_eq!(
            request.messages,
            vec![
                Message::system(DEFAULT_SYSTEM_PREAMBLE),
                Message::user("earlier"),
                Message::assistant("noted"),
                Message::user("now"),
            ]
        );
    }

    #[tokio::test]
    async fn test_full_window_stays_at_capacity() {
        let store = SessionActors::default();
        let originals: Vec<Message> = (0..HISTORY_CAPACITY)
            .map(|i| Message::user(format!("old{i}")))
            .collect();
        for msg in originals.clone() {
            store.append(&key(), msg).await.unwrap();
        }
        let turns = TurnOrchestrator::new(store, StubProvider::replying("fresh"));

        turns.submit(&key(), "New").await.unwrap();

        let history = turns.store().get_history(&key()).await.unwrap();
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert!(!history.contains(&originals[0]));
        assert!(!history.contains(&originals[1]));
        assert_eq!(
            &history[HISTORY_CAPACITY - 2..],
            &[Message::user("New"), Message::assistant("fresh")]
        );
        assert_eq!(history[0], originals[2]);
    }

    #[tokio::test]
    async fn test_inference_failure_keeps_user_message() {
        let turns = TurnOrchestrator::new(SessionActors::default(), StubProvider::failing());

        let err = turns.submit(&key(), "Anyone there?").await.unwrap_err();

        assert!(matches!(err, TurnError::InferenceFailed(InferenceError::Provider(_))));
        assert_eq!(
            turns.store().get_history(&key()).await.unwrap(),
            vec![Message::user("Anyone there?")]
        );
    }

    #[tokio::test]
    async fn test_generate_timeout_is_inference_failure() {
        let config = TurnConfig {
            generate_timeout: Duration::from_millis(50),
            ..TurnConfig::default()
        };
        let turns =
            TurnOrchestrator::with_config(SessionActors::default(), StubProvider::hanging(), config);

        let err = turns.submit(&key(), "Hello").await.unwrap_err();

        assert!(matches!(err, TurnError::InferenceFailed(InferenceError::Timeout(_))));
        assert_eq!(turns.store().get_history(&key()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_input_has_no_side_effects() {
        let turns = TurnOrchestrator::new(SessionActors::default(), StubProvider::replying("x"));

        for blank in ["", "   ", "\n\t"] {
            let err = turns.submit(&key(), blank).await.unwrap_err();
            assert!(matches!(err, TurnError::InvalidInput(_)));
        }

        assert_eq!(turns.provider.calls.load(Ordering::SeqCst), 0);
        assert!(turns.store().get_history(&key()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_append_failure_skips_inference() {
        let store = SessionActors::new(RejectRole {
            inner: MemoryPersistence::new(),
            role: Role::User,
        });
        let turns = TurnOrchestrator::new(store, StubProvider::replying("never"));

        let err = turns.submit(&key(), "Hello").await.unwrap_err();

        assert!(matches!(err, TurnError::StorageUnavailable(_)));
        assert_eq!(turns.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reply_append_failure_still_returns_reply() {
        let store = SessionActors::new(RejectRole {
            inner: MemoryPersistence::new(),
            role: Role::Assistant,
        });
        let turns = TurnOrchestrator::new(store, StubProvider::replying("Hi there"));

        let reply = turns.submit(&key(), "Hello").await.unwrap();

        assert_eq!(reply, "Hi there");
        assert_eq!(
            turns.store().get_history(&key()).await.unwrap(),
            vec![Message::user("Hello")]
        );
    }

    #[tokio::test]
    async fn test_concurrent_turns_on_one_session() {
        let turns = Arc::new(TurnOrchestrator::new(
            SessionActors::default(),
            StubProvider::replying("ack"),
        ));

        let a = {
            let turns = Arc::clone(&turns);
            tokio::spawn(async move { turns.submit(&key(), "first").await })
        };
        let b = {
            let turns = Arc::clone(&turns);
            tokio::spawn(async move { turns.submit(&key(), "second").await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let history = turns.store().get_history(&key()).await.unwrap();
        assert_eq!(history.len(), 4);
        assert!(history.contains(&Message::user("first")));
        assert!(history.contains(&Message::user("second")));
        assert_eq!(
            history.iter().filter(|m| m.role == Role::Assistant).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_many_concurrent_turns_never_exceed_capacity() {
        let turns = Arc::new(TurnOrchestrator::new(
            SessionActors::default(),
            StubProvider::replying("ack"),
        ));

        let tasks: Vec<_> = (0..30)
            .map(|i| {
                let turns = Arc::clone(&turns);
                tokio::spawn(async move { turns.submit(&key(), &format!("msg {i}")).await })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            task.unwrap().unwrap();
        }

        let history = turns.store().get_history(&key()).await.unwrap();
        assert_eq!(history.len(), HISTORY_CAPACITY);
    }

    #[tokio::test]
    async fn test_slow_session_does_not_block_others() {
        let turns = Arc::new(TurnOrchestrator::new(
            SessionActors::default(),
            GatedProvider::default(),
        ));

        let slow = {
            let turns = Arc::clone(&turns);
            tokio::spawn(async move { turns.submit(&SessionKey::from("slow"), "wait").await })
        };
        turns.provider.parked.notified().await;

        let fast = tokio::time::timeout(
            Duration::from_secs(5),
            turns.submit(&SessionKey::from("fast"), "go"),
        )
        .await
        .expect("other session must not be blocked")
        .unwrap();
        assert_eq!(fast, "re: go");

        // The parked session's history is still readable mid-turn.
        let parked = turns.history(&SessionKey::from("slow")).await.unwrap();
        assert_eq!(parked, vec![Message::user("wait")]);

        turns.provider.gate.notify_one();
        assert_eq!(slow.await.unwrap().unwrap(), "re: wait");
    }

    #[tokio::test]
    async fn test_clear_session() {
        let turns = TurnOrchestrator::new(SessionActors::default(), StubProvider::replying("x"));
        turns.submit(&key(), "Hello").await.unwrap();

        turns.clear_session(&key()).await.unwrap();
        turns.clear_session(&key()).await.unwrap();

        assert!(turns.history(&key()).await.unwrap().is_empty());
    }
}
