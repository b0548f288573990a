//! Postgres-backed session storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use colloquy_conversation::{SessionRecord, SessionStore, StoreError};
use colloquy_core::{ChatSessionId, IdentityId};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    session_id: String,
    identity_id: String,
    display_name: String,
    created_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
}

impl SessionRow {
    fn try_into_record(self) -> Result<SessionRecord, sqlx::Error> {
        let session_id = ChatSessionId::from_str(&self.session_id).map_err(|e| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid session id '{}': {}", self.session_id, e),
            )))
        })?;
        let identity_id = IdentityId::from_str(&self.identity_id).map_err(|e| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid identity id '{}': {}", self.identity_id, e),
            )))
        })?;

        Ok(SessionRecord {
            session_id,
            identity_id,
            display_name: self.display_name,
            created_at: self.created_at,
            last_active_at: self.last_active_at,
        })
    }
}

/// Repository for session rows.
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Creates a new repository.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn find_by_identity(
        &self,
        identity: IdentityId,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT session_id, identity_id, display_name, created_at, last_active_at
            FROM user_sessions
            WHERE identity_id = $1
            "#,
        )
        .bind(identity.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::query)?;

        match row {
            Some(r) => Ok(Some(r.try_into_record().map_err(StoreError::query)?)),
            None => Ok(None),
        }
    }

    async fn insert_or_fetch(&self, record: SessionRecord) -> Result<SessionRecord, StoreError> {
        // The UNIQUE constraint on identity_id decides the winner under
        // concurrent creation; every caller gets the surviving row back.
        let row: SessionRow = sqlx::query_as(
            r#"
            INSERT INTO user_sessions
                (session_id, identity_id, display_name, created_at, last_active_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (identity_id)
            DO UPDATE SET last_active_at = EXCLUDED.last_active_at
            RETURNING session_id, identity_id, display_name, created_at, last_active_at
            "#,
        )
        .bind(record.session_id.to_string())
        .bind(record.identity_id.to_string())
        .bind(&record.display_name)
        .bind(record.created_at)
        .bind(record.last_active_at)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::write)?;

        row.try_into_record().map_err(StoreError::write)
    }

    async fn touch(&self, identity: IdentityId, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE user_sessions
            SET last_active_at = $2
            WHERE identity_id = $1
            "#,
        )
        .bind(identity.to_string())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::write)?;

        Ok(())
    }

    async fn delete_by_identity(&self, identity: IdentityId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM user_sessions
            WHERE identity_id = $1
            "#,
        )
        .bind(identity.to_string())
        .execute(&self.pool)
        .await
        .map_err(StoreError::write)?;

        Ok(result.rows_affected() > 0)
    }
}
