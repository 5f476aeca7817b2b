use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::chat::session::{Session, SessionStore};
use crate::database::sqlite::queries::SessionQueries;


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_url: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_url)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        let db_path = config_dir.join("sessions.db");

        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(db_path.to_string_lossy().as_ref()).await
    }
}

#[async_trait]
impl SessionStore for Database {
    #[inline]
    async fn get_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        SessionQueries::get_by_id(&self.pool, session_id).await
    }

    #[inline]
    async fn latest_for_user(&self, user_id: &str) -> Result<Option<Session>> {
        SessionQueries::latest_for_user(&self.pool, user_id).await
    }

    #[inline]
    async fn create(&self, session: &Session) -> Result<()> {
        SessionQueries::create(&self.pool, session).await
    }

    #[inline]
    async fn upsert(&self, session: &Session) -> Result<()> {
        SessionQueries::upsert(&self.pool, session).await
    }
}
