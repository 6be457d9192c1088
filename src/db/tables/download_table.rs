//! Downloaded track table operations

use anyhow::Result;
use async_trait::async_trait;
use sqlx::FromRow;

use crate::core::DownloadRecordStore;
use crate::db::DbEngine;
use crate::models::{DownloadStats, DownloadedTrack};

/// Database row for downloaded_track table
#[derive(Debug, FromRow)]
struct DownloadedTrackRow {
    track_id: String,
    title: String,
    artist: String,
    thumbnail_url: Option<String>,
    duration_text: Option<String>,
    file_path: String,
    file_size: i64,
    downloaded_at: i64,
}

impl From<DownloadedTrackRow> for DownloadedTrack {
    fn from(row: DownloadedTrackRow) -> Self {
        Self {
            track_id: row.track_id,
            title: row.title,
            artist: row.artist,
            thumbnail_url: row.thumbnail_url,
            duration_text: row.duration_text,
            file_path: row.file_path,
            file_size: row.file_size,
            downloaded_at: row.downloaded_at,
        }
    }
}

/// Downloaded track table operations
#[derive(Clone)]
pub struct DownloadTable {
    engine: DbEngine,
}

impl DownloadTable {
    pub fn new(engine: DbEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl DownloadRecordStore for DownloadTable {
    async fn upsert(&self, record: &DownloadedTrack) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO downloaded_track \
             (track_id, title, artist, thumbnail_url, duration_text, file_path, file_size, downloaded_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.track_id)
        .bind(&record.title)
        .bind(&record.artist)
        .bind(&record.thumbnail_url)
        .bind(&record.duration_text)
        .bind(&record.file_path)
        .bind(record.file_size)
        .bind(record.downloaded_at)
        .execute(self.engine.pool())
        .await?;

        Ok(())
    }

    async fn get(&self, track_id: &str) -> Result<Option<DownloadedTrack>> {
        let row: Option<DownloadedTrackRow> =
            sqlx::query_as("SELECT * FROM downloaded_track WHERE track_id = ?")
                .bind(track_id)
                .fetch_optional(self.engine.pool())
                .await?;

        Ok(row.map(DownloadedTrack::from))
    }

    async fn exists(&self, track_id: &str) -> Result<bool> {
        let row: (i64,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM downloaded_track WHERE track_id = ?)")
                .bind(track_id)
                .fetch_one(self.engine.pool())
                .await?;

        Ok(row.0 != 0)
    }

    async fn delete(&self, track_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM downloaded_track WHERE track_id = ?")
            .bind(track_id)
            .execute(self.engine.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn all(&self) -> Result<Vec<DownloadedTrack>> {
        let rows: Vec<DownloadedTrackRow> = sqlx::query_as(
            "SELECT * FROM downloaded_track ORDER BY downloaded_at DESC, rowid DESC",
        )
        .fetch_all(self.engine.pool())
        .await?;

        Ok(rows.into_iter().map(DownloadedTrack::from).collect())
    }

    async fn stats(&self) -> Result<DownloadStats> {
        let (count, total_size): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(file_size), 0) FROM downloaded_track",
        )
        .fetch_one(self.engine.pool())
        .await?;

        Ok(DownloadStats { count, total_size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, size: i64, at: i64) -> DownloadedTrack {
        DownloadedTrack {
            track_id: id.to_string(),
            title: format!("Song {id}"),
            artist: "Artist".to_string(),
            thumbnail_url: None,
            duration_text: Some("3:00".to_string()),
            file_path: format!("/downloads/{id}.m4a"),
            file_size: size,
            downloaded_at: at,
        }
    }

    async fn table() -> DownloadTable {
        DownloadTable::new(DbEngine::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let table = table().await;
        assert!(table.get("a").await.unwrap().is_none());
        assert!(!table.exists("a").await.unwrap());

        table.upsert(&record("a", 1000, 1)).await.unwrap();

        assert_eq!(table.get("a").await.unwrap(), Some(record("a", 1000, 1)));
        assert!(table.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let table = table().await;
        table.upsert(&record("a", 1000, 1)).await.unwrap();
        table.upsert(&record("a", 2000, 2)).await.unwrap();

        let all = table.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].file_size, 2000);
    }

    #[tokio::test]
    async fn test_all_is_newest_first() {
        let table = table().await;
        table.upsert(&record("old", 1, 100)).await.unwrap();
        table.upsert(&record("new", 1, 300)).await.unwrap();
        table.upsert(&record("mid", 1, 200)).await.unwrap();

        let ids: Vec<String> = table
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.track_id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let table = table().await;
        table.upsert(&record("a", 1, 1)).await.unwrap();

        assert!(table.delete("a").await.unwrap());
        assert!(!table.delete("a").await.unwrap());
        assert!(!table.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_stats() {
        let table = table().await;
        assert_eq!(table.stats().await.unwrap(), DownloadStats::default());

        table.upsert(&record("a", 1000, 1)).await.unwrap();
        table.upsert(&record("b", 500, 2)).await.unwrap();

        let stats = table.stats().await.unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_size, 1500);
    }
}
