//! Wire types of the backend API

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::models::Track;

/// Envelope around every JSON response
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Unwrap the payload, turning an unsuccessful envelope into an error
    pub fn into_data(self) -> Result<T> {
        if !self.success {
            return Err(anyhow!(self
                .error
                .unwrap_or_else(|| "request failed".to_string())));
        }
        self.data
            .ok_or_else(|| anyhow!("response has no data"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SongDto {
    pub video_id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub artist_id: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration_text: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl From<SongDto> for Track {
    fn from(dto: SongDto) -> Self {
        Track {
            id: dto.video_id,
            title: dto.title,
            artist: dto.artist,
            artist_id: dto.artist_id,
            album: dto.album,
            duration_text: dto.duration_text,
            thumbnail_url: dto.thumbnail_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RelatedResponseDto {
    #[serde(default)]
    pub songs: Vec<SongDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataResponseDto {
    pub video_id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub has_lyrics: bool,
}

impl From<MetadataResponseDto> for Track {
    fn from(dto: MetadataResponseDto) -> Self {
        Track {
            id: dto.video_id,
            title: dto.title,
            artist: dto.artist,
            artist_id: None,
            album: dto.album,
            duration_text: dto.duration_seconds.map(format_duration),
            thumbnail_url: None,
        }
    }
}

/// "m:ss", or "h:mm:ss" past an hour
pub fn format_duration(seconds: u32) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
