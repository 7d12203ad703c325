//! Actor-per-key session store.
//!
//! Every session key gets its own task with a bounded inbox. The task owns
//! the live `History` for that key and handles one command at a time, so
//! all reads and writes for a key are serialized in arrival order. Different
//! keys never wait on each other: the only shared structure is the sharded
//! mailbox map, touched briefly to look up or register a sender.
//!
//! An actor that stays idle past the idle timeout unregisters itself and
//! stops. The next command for that key spawns a fresh actor, which reloads
//! the history from persistence.

use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chat_memory_core::{
    History, HistoryPersistence, Message, SessionKey, SessionStore, StorageError, StoreError,
};
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Commands queued per session.
const MAILBOX_SIZE: usize = 64;

/// How long an actor waits for a command before retiring.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

type Reply<T> = oneshot::Sender<Result<T, StoreError>>;
type Mailboxes = DashMap<SessionKey, Mailbox>;

enum Command {
    Append { msg: Message, reply: Reply<()> },
    Get { reply: Reply<Vec<Message>> },
    Clear { reply: Reply<()> },
}

/// Registered sender of one actor.
struct Mailbox {
    actor_id: u64,
    tx: mpsc::Sender<Command>,
}

/// Session store backed by one serialized actor per session key.
///
/// Histories are written through to the persistence backend after every
/// mutation; the actor only adopts the new state once the write succeeded.
pub struct SessionActors {
    persistence: Arc<dyn HistoryPersistence>,
    mailboxes: Arc<Mailboxes>,
    next_actor_id: AtomicU64,
    idle_timeout: Duration,
}

impl SessionActors {
    /// Create a store over the given persistence backend.
    #[must_use]
    pub fn new<P>(persistence: P) -> Self
    where
        P: HistoryPersistence + 'static,
    {
        Self {
            persistence: Arc::new(persistence),
            mailboxes: Arc::new(DashMap::new()),
            next_actor_id: AtomicU64::new(0),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Set how long an actor may sit idle before it retires.
    #[must_use]
    pub const fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Number of sessions with a running actor.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.mailboxes.len()
    }

    fn mailbox(&self, key: &SessionKey) -> mpsc::Sender<Command> {
        if let Some(mailbox) = self.mailboxes.get(key) {
            return mailbox.tx.clone();
        }

        self.mailboxes
            .entry(key.clone())
            .or_insert_with(|| self.spawn_actor(key))
            .tx
            .clone()
    }

    fn spawn_actor(&self, key: &SessionKey) -> Mailbox {
        let actor_id = self.next_actor_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(MAILBOX_SIZE);
        let actor = SessionActor {
            key: key.clone(),
            actor_id,
            persistence: Arc::clone(&self.persistence),
            mailboxes: Arc::downgrade(&self.mailboxes),
            idle_timeout: self.idle_timeout,
            history: None,
            inbox: rx,
        };
        tokio::spawn(actor.run());
        Mailbox { actor_id, tx }
    }

    async fn dispatch<T>(
        &self,
        key: &SessionKey,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, StoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let mut cmd = make(reply_tx);

        // A closed mailbox means the actor died; replace it once.
        for _ in 0..2 {
            match self.mailbox(key).send(cmd).await {
                Ok(()) => {
                    return reply_rx.await.map_err(|_| actor_stopped(key))?;
                }
                Err(mpsc::error::SendError(returned)) => {
                    warn!(session = %key, "session actor stopped, respawning");
                    self.mailboxes.remove_if(key, |_, mailbox| mailbox.tx.is_closed());
                    cmd = returned;
                }
            }
        }

        Err(actor_stopped(key))
    }
}

#[cfg(feature = "memory")]
impl Default for SessionActors {
    fn default() -> Self {
        Self::new(crate::storage::MemoryPersistence::new())
    }
}

fn actor_stopped(key: &SessionKey) -> StoreError {
    StoreError::StorageUnavailable(StorageError::Internal(format!(
        "session actor for {key} stopped"
    )))
}

#[async_trait]
impl SessionStore for SessionActors {
    async fn append(&self, key: &SessionKey, msg: Message) -> Result<(), StoreError> {
        msg.validate()?;
        self.dispatch(key, |reply| Command::Append { msg, reply })
            .await
    }

    async fn get_history(&self, key: &SessionKey) -> Result<Vec<Message>, StoreError> {
        self.dispatch(key, |reply| Command::Get { reply }).await
    }

    async fn clear(&self, key: &SessionKey) -> Result<(), StoreError> {
        self.dispatch(key, |reply| Command::Clear { reply }).await
    }
}

/// Sole owner of one session's history.
struct SessionActor {
    key: SessionKey,
    actor_id: u64,
    persistence: Arc<dyn HistoryPersistence>,
    mailboxes: Weak<Mailboxes>,
    idle_timeout: Duration,
    /// `None` until the first successful load.
    history: Option<History>,
    inbox: mpsc::Receiver<Command>,
}

impl SessionActor {
    async fn run(mut self) {
        debug!(session = %self.key, "session actor started");

        loop {
            match tokio::time::timeout(self.idle_timeout, self.inbox.recv()).await {
                Ok(Some(cmd)) => self.handle(cmd).await,
                Ok(None) => break,
                Err(_) if self.retire() => break,
                Err(_) => {}
            }
        }

        debug!(session = %self.key, "session actor stopped");
    }

    async fn handle(&mut self, cmd: Command) {
        // A dropped reply receiver means the caller went away; the
        // command has still been applied.
        match cmd {
            Command::Append { msg, reply } => {
                let _ = reply.send(self.append(msg).await);
            }
            Command::Get { reply } => {
                let _ = reply.send(self.loaded().await.map(History::to_vec));
            }
            Command::Clear { reply } => {
                let _ = reply.send(self.clear().await);
            }
        }
    }

    /// Unregister this actor after an idle period.
    ///
    /// The entry is removed under the map's shard lock, and only while the
    /// map holds the sole sender and the inbox is empty. Senders are cloned
    /// under the same lock, so once removed nothing can reach this actor and
    /// the key never has two live owners.
    fn retire(&self) -> bool {
        let Some(mailboxes) = self.mailboxes.upgrade() else {
            return true;
        };
        let retired = mailboxes
            .remove_if(&self.key, |_, mailbox| {
                mailbox.actor_id == self.actor_id
                    && mailbox.tx.strong_count() == 1
                    && self.inbox.is_empty()
            })
            .is_some();
        if retired {
            debug!(session = %self.key, "session actor idle, retiring");
        }
        retired
    }

    async fn loaded(&mut self) -> Result<&History, StoreError> {
        if self.history.is_none() {
            let messages = self.persistence.load(&self.key).await?;
            if let Some(err) = messages.iter().find_map(|msg| msg.validate().err()) {
                return Err(StorageError::Corrupt(format!(
                    "stored history for {}: {err}",
                    self.key
                ))
                .into());
            }
            self.history = Some(History::from_messages(messages));
        }
        Ok(self.history.get_or_insert_with(History::new))
    }

    async fn append(&mut self, msg: Message) -> Result<(), StoreError> {
        let mut next = self.loaded().await?.clone();
        let role = msg.role;
        let evicted = next.push(msg).is_some();

        self.persistence.save(&self.key, &next.to_vec()).await?;

        debug!(
            session = %self.key,
            %role,
            len = next.len(),
            evicted,
            "appended message"
        );
        self.history = Some(next);
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), StoreError> {
        self.persistence.remove(&self.key).await?;
        self.history = Some(History::new());
        debug!(session = %self.key, "cleared history");
        Ok(())
    }
}
