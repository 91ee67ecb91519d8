//! Durable record store for agent sessions
//!
//! SQLite through `sqlx`: one `agents` row per session, schema applied from
//! the embedded `migrations/` directory. The store guarantees atomicity of a
//! single record's update; serialization between writers of the same agent
//! is the session manager's job.

mod models;
mod repository;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::error::Result;

pub use repository::AgentStore;

/// Database connection pool
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `path` and apply migrations
    ///
    /// # Errors
    /// Returns error if the directory cannot be created, the connection
    /// fails, or a migration fails
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", path.display());

        let options = SqliteConnectOptions::from_str(&database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        log::debug!("Opened agent database at {}", path.display());

        Ok(db)
    }

    /// Create an in-memory database (for testing)
    ///
    /// A single connection that never expires, so the data lives as long
    /// as the pool.
    ///
    /// # Errors
    /// Returns error if the connection or a migration fails
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Agent repository over this pool
    #[must_use]
    pub fn agents(&self) -> AgentStore {
        AgentStore::new(self.pool.clone())
    }
}
