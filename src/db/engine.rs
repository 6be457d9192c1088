//! Database engine and connection management

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Database engine wrapper
#[derive(Clone)]
pub struct DbEngine {
    pool: SqlitePool,
}

impl DbEngine {
    /// Open (creating if needed) the SQLite database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        // Create connection options with SQLite pragmas
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .pragma("cache_size", "10000")
            .pragma("temp_store", "FILE");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let engine = Self { pool };
        engine.create_tables().await?;
        Ok(engine)
    }

    /// Private in-memory database. One connection, kept alive for the pool's lifetime.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let engine = Self { pool };
        engine.create_tables().await?;
        Ok(engine)
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create all database tables
    async fn create_tables(&self) -> Result<()> {
        let pool = self.pool();

        // Downloaded tracks
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS downloaded_track (
                track_id TEXT PRIMARY KEY NOT NULL,
                title TEXT NOT NULL,
                artist TEXT NOT NULL,
                thumbnail_url TEXT,
                duration_text TEXT,
                file_path TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                downloaded_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        // Migration table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dbmigration (
                id INTEGER PRIMARY KEY,
                version INTEGER NOT NULL DEFAULT 0
            );
            INSERT OR IGNORE INTO dbmigration (id, version) VALUES (1, 0);
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_file_and_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ytmusic.db");

        let engine = DbEngine::open(&path).await.unwrap();
        assert!(path.exists());

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'downloaded_track'",
        )
        .fetch_one(engine.pool())
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_reopen_keeps_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ytmusic.db");

        DbEngine::open(&path).await.unwrap().pool().close().await;
        let engine = DbEngine::open(&path).await.unwrap();

        let (version,): (i32,) = sqlx::query_as("SELECT version FROM dbmigration WHERE id = 1")
            .fetch_one(engine.pool())
            .await
            .unwrap();
        assert_eq!(version, 0);
    }
}
