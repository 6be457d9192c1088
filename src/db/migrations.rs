//! Database migrations

use anyhow::Result;
use tracing::info;

use super::DbEngine;

/// Current migration version
const CURRENT_VERSION: i32 = 2;

/// Run database migrations
pub async fn run_migrations(engine: &DbEngine) -> Result<()> {
    let current_version = get_migration_version(engine).await?;

    if current_version >= CURRENT_VERSION {
        info!("Database is up to date (version {})", current_version);
        return Ok(());
    }

    info!(
        "Running migrations from version {} to {}",
        current_version, CURRENT_VERSION
    );

    // Run migrations in order
    for version in (current_version + 1)..=CURRENT_VERSION {
        run_migration(engine, version).await?;

        sqlx::query("UPDATE dbmigration SET version = ? WHERE id = 1")
            .bind(version)
            .execute(engine.pool())
            .await?;

        info!("Applied migration {}", version);
    }

    Ok(())
}

async fn run_migration(engine: &DbEngine, version: i32) -> Result<()> {
    let pool = engine.pool();

    match version {
        1 => {
            // Initial schema is created on open
        }
        2 => {
            // listing is ordered by recency
            sqlx::query(
                "CREATE INDEX IF NOT EXISTS idx_downloaded_track_downloaded_at \
                 ON downloaded_track(downloaded_at)",
            )
            .execute(pool)
            .await?;
        }
        _ => {
            tracing::warn!("Unknown migration version: {}", version);
        }
    }

    Ok(())
}

/// Get the current migration version
pub async fn get_migration_version(engine: &DbEngine) -> Result<i32> {
    let row: (i32,) = sqlx::query_as("SELECT version FROM dbmigration WHERE id = 1")
        .fetch_one(engine.pool())
        .await?;

    Ok(row.0)
}
