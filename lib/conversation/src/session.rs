//! Session continuity for conversations.
//!
//! Each identity has at most one live session at a time, enforced by a
//! uniqueness constraint on the identity at the durable layer. A session
//! moves through three states: it does not exist yet, it is active (every
//! access refreshes `last_active_at`), and it is cleared, which is terminal
//! until a later turn creates a fresh session for the same identity.
//!
//! [`SessionDirectory`] bridges an in-memory cache with the durable
//! [`SessionStore`]. Concurrent `get_or_create` calls for the same identity
//! may both take the creation path; the store's upsert resolves the race so
//! exactly one durable session survives. Same-identity calls are otherwise
//! not serialized.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use colloquy_core::{ChatSessionId, IdentityId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The party a conversation belongs to.
///
/// Owned by the external credential service; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque stable identifier.
    pub id: IdentityId,
    /// Human-readable name.
    pub display_name: String,
}

impl Identity {
    /// Creates an identity reference.
    #[must_use]
    pub fn new(id: IdentityId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// A live conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: ChatSessionId,
    /// The identity that owns this session.
    pub identity: Identity,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last active.
    pub last_active_at: DateTime<Utc>,
}

/// The durable representation of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique session identifier.
    pub session_id: ChatSessionId,
    /// The identity that owns the session (unique at the durable layer).
    pub identity_id: IdentityId,
    /// Display name of the owning identity.
    pub display_name: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last active.
    pub last_active_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Creates a fresh record for an identity, minting a new session id.
    #[must_use]
    pub fn new(identity: &Identity, at: DateTime<Utc>) -> Self {
        Self {
            session_id: ChatSessionId::new(),
            identity_id: identity.id,
            display_name: identity.display_name.clone(),
            created_at: at,
            last_active_at: at,
        }
    }

    /// Converts the record into the in-memory session form.
    #[must_use]
    pub fn into_session(self) -> Session {
        Session {
            id: self.session_id,
            identity: Identity {
                id: self.identity_id,
                display_name: self.display_name,
            },
            created_at: self.created_at,
            last_active_at: self.last_active_at,
        }
    }
}

/// Trait for durable session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Finds the session owned by an identity.
    async fn find_by_identity(
        &self,
        identity: IdentityId,
    ) -> Result<Option<SessionRecord>, StoreError>;

    /// Inserts a session, or returns the existing one if the identity
    /// already owns a session.
    ///
    /// This is the race-resolution point: under concurrent creation the
    /// uniqueness constraint on the identity decides the winner and every
    /// caller receives the winning record. A check-then-insert cannot
    /// provide this guarantee.
    async fn insert_or_fetch(&self, record: SessionRecord) -> Result<SessionRecord, StoreError>;

    /// Refreshes the last-active time of an identity's session.
    async fn touch(&self, identity: IdentityId, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Deletes the session owned by an identity.
    ///
    /// Returns true if a session existed.
    async fn delete_by_identity(&self, identity: IdentityId) -> Result<bool, StoreError>;
}

/// Maps each identity to its single live session.
///
/// Both lookup directions are cache-resident for O(1) access. The caches
/// are sharded maps, so unrelated identities never contend on a single
/// lock.
pub struct SessionDirectory {
    store: Arc<dyn SessionStore>,
    by_identity: DashMap<IdentityId, Session>,
    by_session: DashMap<ChatSessionId, IdentityId>,
}

impl SessionDirectory {
    /// Creates a directory backed by the given durable store.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            by_identity: DashMap::new(),
            by_session: DashMap::new(),
        }
    }

    /// Returns the identity's live session, creating one if none exists.
    ///
    /// Idempotent: repeated calls for the same identity return the same
    /// session id. Every call refreshes `last_active_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable store fails.
    pub async fn get_or_create(&self, identity: &Identity) -> Result<Session, StoreError> {
        let now = Utc::now();

        if let Some(mut cached) = self.by_identity.get_mut(&identity.id) {
            cached.last_active_at = now;
            let session = cached.clone();
            drop(cached);
            self.by_session.insert(session.id, identity.id);
            return Ok(session);
        }

        if let Some(record) = self.store.find_by_identity(identity.id).await? {
            self.store.touch(identity.id, now).await?;
            let mut session = record.into_session();
            session.last_active_at = now;
            self.insert_cache(session.clone());
            return Ok(session);
        }

        let candidate = SessionRecord::new(identity, now);
        let record = self.store.insert_or_fetch(candidate).await?;
        let session = record.into_session();
        self.insert_cache(session.clone());
        Ok(session)
    }

    /// Removes the identity's session from cache and durable storage.
    ///
    /// Returns true if anything existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable delete fails.
    pub async fn clear(&self, identity: IdentityId) -> Result<bool, StoreError> {
        let cached = self.by_identity.remove(&identity);
        if let Some((_, session)) = &cached {
            self.by_session.remove(&session.id);
        }
        let deleted = self.store.delete_by_identity(identity).await?;
        Ok(cached.is_some() || deleted)
    }

    /// Returns the cached session for an identity, if any.
    #[must_use]
    pub fn session_for_identity(&self, identity: IdentityId) -> Option<Session> {
        self.by_identity.get(&identity).map(|s| s.clone())
    }

    /// Returns the identity owning a session, if cached.
    #[must_use]
    pub fn identity_for_session(&self, session_id: ChatSessionId) -> Option<IdentityId> {
        self.by_session.get(&session_id).map(|id| *id)
    }

    fn insert_cache(&self, session: Session) {
        self.by_session.insert(session.id, session.identity.id);
        self.by_identity.insert(session.identity.id, session);
    }
}
