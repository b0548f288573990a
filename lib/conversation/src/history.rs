//! Append-only chat history per session.
//!
//! [`HistoryStore`] mirrors a durable [`TurnStore`] with an in-memory
//! cache. The failure rules are deliberately asymmetric: a failed read
//! degrades to an empty context so the conversation can proceed, while a
//! failed write propagates, since silently losing a durable turn would
//! corrupt the conversation record.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use colloquy_core::{ChatSessionId, TurnId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One recorded turn: a user message and the assistant's response.
///
/// Immutable once created; deleted only in bulk with its session's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique turn identifier.
    pub id: TurnId,
    /// The session this turn belongs to.
    pub session_id: ChatSessionId,
    /// What the user said.
    pub user_message: String,
    /// What the assistant answered.
    pub assistant_response: String,
    /// The tool consulted for this turn, if any.
    pub tool_used: Option<String>,
    /// When the turn was recorded. Strictly increasing within a session.
    pub created_at: DateTime<Utc>,
}

/// Trait for durable turn storage.
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// Appends a turn.
    async fn append(&self, entry: &HistoryEntry) -> Result<(), StoreError>;

    /// Returns up to `limit` turns for a session, most recent first.
    async fn recent(
        &self,
        session_id: ChatSessionId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError>;

    /// Deletes all turns for a session, returning how many were removed.
    async fn delete_all(&self, session_id: ChatSessionId) -> Result<u64, StoreError>;
}

/// Per-session turn log bridging an in-memory mirror with durable storage.
pub struct HistoryStore {
    store: Arc<dyn TurnStore>,
    histories: DashMap<ChatSessionId, Vec<HistoryEntry>>,
    tails: DashMap<ChatSessionId, DateTime<Utc>>,
}

impl HistoryStore {
    /// Creates a history store backed by the given durable store.
    #[must_use]
    pub fn new(store: Arc<dyn TurnStore>) -> Self {
        Self {
            store,
            histories: DashMap::new(),
            tails: DashMap::new(),
        }
    }

    /// Records a turn: durable write first, cache append second.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable write fails. The cache is not
    /// updated in that case.
    pub async fn append_turn(
        &self,
        session_id: ChatSessionId,
        user_message: impl Into<String>,
        assistant_response: impl Into<String>,
        tool_used: Option<String>,
    ) -> Result<HistoryEntry, StoreError> {
        let entry = HistoryEntry {
            id: TurnId::new(),
            session_id,
            user_message: user_message.into(),
            assistant_response: assistant_response.into(),
            tool_used,
            created_at: self.reserve_timestamp(session_id),
        };

        self.store.append(&entry).await?;
        self.histories
            .entry(session_id)
            .or_default()
            .push(entry.clone());
        Ok(entry)
    }

    /// Returns at most `limit` most recent turns in chronological order.
    ///
    /// The durable query fetches most-recent-first; the result is reversed
    /// before delivery because the context is fed to a generation
    /// capability that expects temporal order. A store failure is logged
    /// and degrades to an empty sequence; a read never aborts a turn.
    pub async fn load_context(
        &self,
        session_id: ChatSessionId,
        limit: usize,
    ) -> Vec<HistoryEntry> {
        match self.store.recent(session_id, limit).await {
            Ok(mut entries) => {
                entries.reverse();
                if let Some(newest) = entries.last() {
                    let mut tail = self
                        .tails
                        .entry(session_id)
                        .or_insert(DateTime::<Utc>::MIN_UTC);
                    if newest.created_at > *tail {
                        *tail = newest.created_at;
                    }
                }
                self.histories.insert(session_id, entries.clone());
                entries
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "history read failed, continuing without context"
                );
                Vec::new()
            }
        }
    }

    /// Deletes all turns for a session from durable storage and the cache.
    ///
    /// Returns true if anything existed on either side.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable delete fails.
    pub async fn clear(&self, session_id: ChatSessionId) -> Result<bool, StoreError> {
        let deleted = self.store.delete_all(session_id).await?;
        let cached = self.histories.remove(&session_id).is_some();
        self.tails.remove(&session_id);
        Ok(deleted > 0 || cached)
    }

    /// Returns the cached mirror for a session, if any.
    #[must_use]
    pub fn cached(&self, session_id: ChatSessionId) -> Option<Vec<HistoryEntry>> {
        self.histories.get(&session_id).map(|entries| entries.clone())
    }

    /// Assigns a per-session strictly increasing timestamp.
    ///
    /// Two appends landing in the same instant get distinct, ordered
    /// stamps, keeping the log's creation-time ordering unambiguous.
    fn reserve_timestamp(&self, session_id: ChatSessionId) -> DateTime<Utc> {
        let now = Utc::now();
        let mut tail = self
            .tails
            .entry(session_id)
            .or_insert(DateTime::<Utc>::MIN_UTC);
        let at = if now > *tail {
            now
        } else {
            *tail + Duration::microseconds(1)
        };
        *tail = at;
        at
    }
}
