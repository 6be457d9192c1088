//! Track model

use serde::{Deserialize, Serialize};

/// A playable song, as returned by the remote API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Opaque external media id (e.g. an 11 character video id)
    pub id: String,
    /// Track title
    pub title: String,
    /// Display artist
    pub artist: String,
    /// Browse id of the artist, for direct navigation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_id: Option<String>,
    /// Album name
    #[serde(default)]
    pub album: Option<String>,
    /// Human readable duration ("3:45")
    #[serde(default)]
    pub duration_text: Option<String>,
    /// Artwork url
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl Track {
    /// Create a track with only the required fields set
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            artist_id: None,
            album: None,
            duration_text: None,
            thumbnail_url: None,
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_duration(mut self, duration_text: impl Into<String>) -> Self {
        self.duration_text = Some(duration_text.into());
        self
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }
}
