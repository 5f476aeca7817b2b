
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::AskdocsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match *self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    #[inline]
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(anyhow::anyhow!("Unknown turn role: {}", other)),
        }
    }
}

/// One immutable role-tagged message in a session's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted, user-owned conversation record. The owning user never
/// changes after creation; turns are append-only and chronological.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub turns: Vec<Turn>,
    pub reference_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
}

impl Session {
    #[inline]
    pub fn new(user_id: &str, session_id: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: session_id.map_or_else(|| Uuid::new_v4().to_string(), str::to_string),
            user_id: user_id.to_string(),
            turns: Vec::new(),
            reference_urls: Vec::new(),
            created_at: now,
            last_interaction: now,
        }
    }

    /// Append one turn and refresh the last-interaction timestamp.
    #[inline]
    pub fn append_turn(&mut self, role: Role, content: &str) {
        let now = Utc::now();
        self.turns.push(Turn {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.to_string(),
            created_at: now,
        });
        self.last_interaction = now;
    }
}

/// Durable store collaborator for session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_by_id(&self, session_id: &str) -> Result<Option<Session>>;
    async fn latest_for_user(&self, user_id: &str) -> Result<Option<Session>>;
    async fn create(&self, session: &Session) -> Result<()>;
    async fn upsert(&self, session: &Session) -> Result<()>;
}

/// Resolves sessions for (user, optional session id) pairs and persists
/// conversation turns around a turn's generation.
pub struct SessionCoordinator {
    store: Arc<dyn SessionStore>,
    expiration: Duration,
}

impl SessionCoordinator {
    #[inline]
    pub fn new(store: Arc<dyn SessionStore>, expiration_hours: u32) -> Self {
        Self {
            store,
            expiration: Duration::hours(i64::from(expiration_hours)),
        }
    }

    /// Resolve the session for a chat turn. Ownership mismatch is terminal;
    /// store faults and expired or unknown sessions degrade to a fresh
    /// session so the turn can proceed.
    #[inline]
    pub async fn resolve(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> crate::Result<Session> {
        let Some(id) = session_id else {
            return Ok(self.start_session(user_id, None).await);
        };

        match self.store.get_by_id(id).await {
            Ok(Some(session)) => {
                if session.user_id != user_id {
                    warn!(
                        "User {} presented session {} owned by another user",
                        user_id, id
                    );
                    return Err(AskdocsError::SessionOwnership {
                        session_id: id.to_string(),
                    });
                }
                if self.is_current(&session) {
                    debug!("Reusing session {}", id);
                    return Ok(session);
                }
                // The expired record still occupies this id in the store, so
                // the replacement gets a fresh one.
                info!("Session {} expired, starting a new session", id);
                Ok(self.start_session(user_id, None).await)
            }
            Ok(None) => {
                info!("Session {} not found, creating it", id);
                Ok(self.start_session(user_id, Some(id)).await)
            }
            Err(e) => {
                warn!(
                    "Session lookup for {} failed, continuing with a new session: {:#}",
                    id, e
                );
                Ok(self.start_session(user_id, Some(id)).await)
            }
        }
    }

    /// Standalone session-retrieval path: ownership and expiry checked,
    /// nothing created. A mismatched or stale session reads as absent.
    #[inline]
    pub async fn find_active(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<Option<Session>> {
        let found = match session_id {
            Some(id) => self.store.get_by_id(id).await?,
            None => self.store.latest_for_user(user_id).await?,
        };

        Ok(found.filter(|session| session.user_id == user_id && self.is_current(session)))
    }

    /// Upsert the full session record. Callers on the streaming path log
    /// failures instead of surfacing them; the response has already been
    /// computed.
    #[inline]
    pub async fn persist(&self, session: &Session) -> Result<()> {
        self.store.upsert(session).await
    }

    fn is_current(&self, session: &Session) -> bool {
        Utc::now().signed_duration_since(session.last_interaction) < self.expiration
    }

    async fn start_session(&self, user_id: &str, session_id: Option<&str>) -> Session {
        let session = Session::new(user_id, session_id);
        // Creation is written through eagerly, but a durability fault here
        // must not cost the turn; the final persist will retry the write.
        if let Err(e) = self.store.create(&session).await {
            warn!("Failed to create session {}: {:#}", session.id, e);
        }
        session
    }
}
