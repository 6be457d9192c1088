//! Download models: the persisted record and the published transfer state

use serde::{Deserialize, Serialize};

use super::Track;

/// Persisted proof that a track's audio is stored locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedTrack {
    /// Track id (unique key)
    pub track_id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration_text: Option<String>,
    /// Absolute path of the audio file
    pub file_path: String,
    /// File size in bytes
    pub file_size: i64,
    /// Unix timestamp in milliseconds
    pub downloaded_at: i64,
}

impl DownloadedTrack {
    /// Build a record for `track`, copying its display metadata as of now
    pub fn from_track(track: &Track, file_path: String, file_size: i64) -> Self {
        Self {
            track_id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            thumbnail_url: track.thumbnail_url.clone(),
            duration_text: track.duration_text.clone(),
            file_path,
            file_size,
            downloaded_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Map the record back to a playable track (for offline queues)
    pub fn to_track(&self) -> Track {
        Track {
            id: self.track_id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            artist_id: None,
            album: None,
            duration_text: self.duration_text.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
        }
    }
}

/// State of the current (most recent) download attempt
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum DownloadState {
    #[default]
    Idle,
    Downloading {
        track_id: String,
        /// Fraction complete in `[0, 1]`
        progress: f32,
    },
    Completed {
        track_id: String,
    },
    Error {
        track_id: String,
        message: String,
    },
}

impl DownloadState {
    /// Track the state refers to, if any
    pub fn track_id(&self) -> Option<&str> {
        match self {
            DownloadState::Idle => None,
            DownloadState::Downloading { track_id, .. }
            | DownloadState::Completed { track_id }
            | DownloadState::Error { track_id, .. } => Some(track_id),
        }
    }

    /// True while a transfer is running
    pub fn is_active(&self) -> bool {
        matches!(self, DownloadState::Downloading { .. })
    }
}

/// Aggregate figures over every downloaded track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadStats {
    pub count: i64,
    /// Sum of file sizes in bytes
    pub total_size: i64,
}
