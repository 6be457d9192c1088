//! HTTP client for the YT Music backend

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::dto::{ApiResponse, MetadataResponseDto, RelatedResponseDto};
use crate::core::{DownloadError, RelatedTracks, TrackStream, TrackStreamSource};
use crate::models::Track;

const USER_AGENT: &str = concat!("ytmusic/", env!("CARGO_PKG_VERSION"));

/// Backend API client
#[derive(Clone)]
pub struct YtMusicClient {
    client: Client,
    base_url: String,
    quality: String,
}

impl YtMusicClient {
    /// `connect_timeout` bounds connection setup only; streaming downloads
    /// are bounded by the download manager's stall timeout instead
    pub fn new(base_url: &str, quality: &str, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            quality: quality.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    /// Title, artist and duration of a track
    pub async fn metadata(&self, video_id: &str) -> Result<Track> {
        let response: ApiResponse<MetadataResponseDto> = self
            .client
            .get(self.url(&format!("metadata/{}", video_id)))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.into_data()?.into())
    }

    pub async fn related_songs(&self, video_id: &str, limit: usize) -> Result<Vec<Track>> {
        let response: ApiResponse<RelatedResponseDto> = self
            .client
            .get(self.url(&format!("related/{}", video_id)))
            .query(&[("limit", limit)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .into_data()?
            .songs
            .into_iter()
            .map(Track::from)
            .collect())
    }

    /// Open the audio stream of a track
    pub async fn download_audio(&self, video_id: &str) -> Result<TrackStream, DownloadError> {
        let response = self
            .client
            .get(self.url(&format!("download/{}", video_id)))
            .query(&[("quality", self.quality.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Api(format!(
                "download of {} returned {}",
                video_id, status
            )));
        }

        let total_len = response.content_length();
        debug!("Streaming {} ({:?} bytes)", video_id, total_len);

        Ok(TrackStream {
            total_len,
            chunks: response
                .bytes_stream()
                .map(|chunk| chunk.map_err(DownloadError::from))
                .boxed(),
        })
    }
}

#[async_trait]
impl TrackStreamSource for YtMusicClient {
    async fn open(&self, track_id: &str) -> Result<TrackStream, DownloadError> {
        self.download_audio(track_id).await
    }
}

#[async_trait]
impl RelatedTracks for YtMusicClient {
    async fn related(&self, track_id: &str, limit: usize) -> Result<Vec<Track>> {
        self.related_songs(track_id, limit).await
    }
}
