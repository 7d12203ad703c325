//! SQLite history persistence (feature-gated).
//!
//! One row per session key. The history is stored as a JSON array of
//! `{role, content}` records and replaced with a single upsert, so a crash
//! leaves either the old or the new history, never a mix.

use std::{
    str::FromStr,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use chat_memory_core::{HistoryPersistence, Message, SessionKey, StorageError};
use sqlx::{
    Row,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS chat_history (
    session_key TEXT PRIMARY KEY NOT NULL,
    messages    TEXT NOT NULL,
    updated_at  INTEGER NOT NULL
)";

/// SQLite persistence backend.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Open (creating if missing) the database and ensure the schema exists.
    ///
    /// # Errors
    /// Returns error if database connection or schema creation fails.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let opts = SqliteConnectOptions::from_str(database_url)
            .map_err(unavailable)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(unavailable)?;

        Self::with_pool(pool).await
    }

    /// Wrap an existing pool and ensure the schema exists.
    ///
    /// # Errors
    /// Returns error if schema creation fails.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(unavailable)?;
        Ok(Self { pool })
    }
}

fn unavailable(e: impl std::fmt::Display) -> StorageError {
    StorageError::Unavailable(e.to_string())
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().try_into().unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[async_trait]
impl HistoryPersistence for SqlitePersistence {
    async fn load(&self, key: &SessionKey) -> Result<Vec<Message>, StorageError> {
        let row = sqlx::query("SELECT messages FROM chat_history WHERE session_key = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        let Some(row) = row else {
            return Ok(Vec::new());
        };

        let raw: String = row.try_get("messages").map_err(unavailable)?;
        serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt(format!("{key}: {e}")))
    }

    async fn save(&self, key: &SessionKey, messages: &[Message]) -> Result<(), StorageError> {
        let raw =
            serde_json::to_string(messages).map_err(|e| StorageError::Internal(e.to_string()))?;

        sqlx::query(
            "INSERT INTO chat_history (session_key, messages, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(session_key) DO UPDATE SET
                messages = excluded.messages,
                updated_at = excluded.updated_at",
        )
        .bind(key.as_str())
        .bind(raw)
        .bind(now())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }

    async fn remove(&self, key: &SessionKey) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM chat_history WHERE session_key = ?")
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
