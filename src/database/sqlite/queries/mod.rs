
use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

use super::models::{SessionRow, TurnRow};
use crate::chat::session::Session;

pub struct SessionQueries;

impl SessionQueries {
    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, session_id: &str) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, user_id, reference_urls, created_at, last_interaction
             FROM sessions WHERE id = ?",
        )
        .bind(session_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session by id")?;

        match row {
            Some(row) => {
                let turns = Self::turns_for_session(pool, &row.id).await?;
                Ok(Some(row.into_session(turns)?))
            }
            None => Ok(None),
        }
    }

    #[inline]
    pub async fn latest_for_user(pool: &SqlitePool, user_id: &str) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, user_id, reference_urls, created_at, last_interaction
             FROM sessions WHERE user_id = ?
             ORDER BY last_interaction DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get latest session for user")?;

        match row {
            Some(row) => {
                let turns = Self::turns_for_session(pool, &row.id).await?;
                Ok(Some(row.into_session(turns)?))
            }
            None => Ok(None),
        }
    }

    #[inline]
    pub async fn create(pool: &SqlitePool, session: &Session) -> Result<()> {
        let reference_urls = serde_json::to_string(&session.reference_urls)
            .context("Failed to serialize reference_urls")?;

        sqlx::query(
            "INSERT INTO sessions (id, user_id, reference_urls, created_at, last_interaction)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&reference_urls)
        .bind(session.created_at)
        .bind(session.last_interaction)
        .execute(pool)
        .await
        .context("Failed to create session")?;

        Self::insert_missing_turns(pool, session).await?;

        debug!("Created session {}", session.id);
        Ok(())
    }

    /// Upsert the full session record: the mutable row fields are updated,
    /// turns not yet present are appended. The owning user is never
    /// overwritten.
    #[inline]
    pub async fn upsert(pool: &SqlitePool, session: &Session) -> Result<()> {
        let reference_urls = serde_json::to_string(&session.reference_urls)
            .context("Failed to serialize reference_urls")?;

        sqlx::query(
            "INSERT INTO sessions (id, user_id, reference_urls, created_at, last_interaction)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                reference_urls = excluded.reference_urls,
                last_interaction = excluded.last_interaction",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&reference_urls)
        .bind(session.created_at)
        .bind(session.last_interaction)
        .execute(pool)
        .await
        .context("Failed to upsert session")?;

        Self::insert_missing_turns(pool, session).await?;

        debug!(
            "Upserted session {} with {} turns",
            session.id,
            session.turns.len()
        );
        Ok(())
    }

    async fn insert_missing_turns(pool: &SqlitePool, session: &Session) -> Result<()> {
        for turn in &session.turns {
            // Turns are immutable once written; re-persisting a session must
            // not duplicate or rewrite them.
            sqlx::query(
                "INSERT OR IGNORE INTO turns (id, session_id, role, content, created_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&turn.id)
            .bind(&session.id)
            .bind(turn.role.as_str())
            .bind(&turn.content)
            .bind(turn.created_at)
            .execute(pool)
            .await
            .context("Failed to insert turn")?;
        }
        Ok(())
    }

    async fn turns_for_session(pool: &SqlitePool, session_id: &str) -> Result<Vec<TurnRow>> {
        sqlx::query_as::<_, TurnRow>(
            "SELECT id, session_id, role, content, created_at
             FROM turns WHERE session_id = ?
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(session_id)
        .fetch_all(pool)
        .await
        .context("Failed to load turns for session")
    }
}
