//! Postgres-backed turn storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use colloquy_conversation::{HistoryEntry, StoreError, TurnStore};
use colloquy_core::{ChatSessionId, TurnId};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for turn queries.
#[derive(FromRow)]
struct TurnRow {
    id: String,
    session_id: String,
    user_message: String,
    assistant_response: String,
    tool_used: Option<String>,
    created_at: DateTime<Utc>,
}

impl TurnRow {
    fn try_into_entry(self) -> Result<HistoryEntry, sqlx::Error> {
        let id = TurnId::from_str(&self.id).map_err(|e| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid turn id '{}': {}", self.id, e),
            )))
        })?;
        let session_id = ChatSessionId::from_str(&self.session_id).map_err(|e| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid session id '{}': {}", self.session_id, e),
            )))
        })?;

        Ok(HistoryEntry {
            id,
            session_id,
            user_message: self.user_message,
            assistant_response: self.assistant_response,
            tool_used: self.tool_used,
            created_at: self.created_at,
        })
    }
}

/// Repository for turn rows.
pub struct PgTurnStore {
    pool: PgPool,
}

impl PgTurnStore {
    /// Creates a new repository.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TurnStore for PgTurnStore {
    async fn append(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chat_turns
                (id, session_id, user_message, assistant_response, tool_used, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.session_id.to_string())
        .bind(&entry.user_message)
        .bind(&entry.assistant_response)
        .bind(&entry.tool_used)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::write)?;

        Ok(())
    }

    async fn recent(
        &self,
        session_id: ChatSessionId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows: Vec<TurnRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, user_message, assistant_response, tool_used, created_at
            FROM chat_turns
            WHERE session_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(session_id.to_string())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::query)?;

        rows.into_iter()
            .map(|r| r.try_into_entry().map_err(StoreError::query))
            .collect()
    }

    async fn delete_all(&self, session_id: ChatSessionId) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM chat_turns
            WHERE session_id = $1
            "#,
        )
        .bind(session_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(StoreError::write)?;

        Ok(result.rows_affected())
    }
}
