
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::chat::session::{Role, Session, Turn};

/// Raw `sessions` table row. Turns live in their own table; the JSON-encoded
/// `reference_urls` column carries the session-level reference list.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub reference_urls: String,
    pub created_at: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TurnRow {
    pub id: String,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl SessionRow {
    /// Assemble the domain session from its row and ordered turn rows.
    #[inline]
    pub fn into_session(self, turn_rows: Vec<TurnRow>) -> Result<Session> {
        let reference_urls: Vec<String> = serde_json::from_str(&self.reference_urls)
            .context("Failed to parse session reference_urls")?;

        let turns = turn_rows
            .into_iter()
            .map(TurnRow::into_turn)
            .collect::<Result<Vec<Turn>>>()?;

        Ok(Session {
            id: self.id,
            user_id: self.user_id,
            turns,
            reference_urls,
            created_at: self.created_at,
            last_interaction: self.last_interaction,
        })
    }
}

impl TurnRow {
    #[inline]
    pub fn into_turn(self) -> Result<Turn> {
        Ok(Turn {
            id: self.id,
            role: Role::parse(&self.role)?,
            content: self.content,
            created_at: self.created_at,
        })
    }
}
