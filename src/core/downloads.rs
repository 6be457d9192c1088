//! Offline downloads - fetches track audio to disk and keeps the record store in sync
//!
//! There is a single "current" download. Its status is published through a
//! watch channel so any number of observers can follow it. Starting a new
//! transfer cancels whatever transfer was still running; asking for a track
//! that is already on disk does not.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::{DownloadState, DownloadStats, DownloadedTrack, Track};

/// Default wait for the next chunk before a transfer counts as stalled
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by `download` and `delete`
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server error: {0}")]
    Api(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no data received for {}s", .0.as_secs())]
    Stalled(Duration),

    #[error("download cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// An opened audio byte stream
pub struct TrackStream {
    /// Total length in bytes, when the source knows it
    pub total_len: Option<u64>,
    pub chunks: BoxStream<'static, Result<Bytes, DownloadError>>,
}

/// Where track audio comes from
#[async_trait]
pub trait TrackStreamSource: Send + Sync {
    async fn open(&self, track_id: &str) -> Result<TrackStream, DownloadError>;
}

/// Persistence for download records, keyed by track id
#[async_trait]
pub trait DownloadRecordStore: Send + Sync {
    /// Insert or replace the record for `record.track_id`
    async fn upsert(&self, record: &DownloadedTrack) -> anyhow::Result<()>;
    async fn get(&self, track_id: &str) -> anyhow::Result<Option<DownloadedTrack>>;
    async fn exists(&self, track_id: &str) -> anyhow::Result<bool>;
    /// Returns whether a record was removed
    async fn delete(&self, track_id: &str) -> anyhow::Result<bool>;
    /// All records, newest first
    async fn all(&self) -> anyhow::Result<Vec<DownloadedTrack>>;
    async fn stats(&self) -> anyhow::Result<DownloadStats>;
}

/// Result of a successful `delete`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Record and file are gone
    Removed,
    /// There was nothing to delete
    NotDownloaded,
    /// The record was removed but the file could not be unlinked
    RecordRemovedFileKept,
}

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    /// Extension of stored audio files, without the dot
    pub extension: String,
    pub stall_timeout: Duration,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            extension: "m4a".to_string(),
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }
}

struct Transfer {
    attempt: u64,
    track_id: String,
    token: CancellationToken,
}

#[derive(Default)]
struct Transfers {
    last_attempt: u64,
    active: Option<Transfer>,
}

/// Download engine and owner of the published `DownloadState`
pub struct DownloadManager {
    source: Arc<dyn TrackStreamSource>,
    store: Arc<dyn DownloadRecordStore>,
    downloads_dir: PathBuf,
    settings: DownloadSettings,
    state: watch::Sender<DownloadState>,
    /// Bumped on every record change; drives the watch_* streams
    revision: watch::Sender<u64>,
    transfers: Mutex<Transfers>,
}

impl DownloadManager {
    pub fn new(
        source: Arc<dyn TrackStreamSource>,
        store: Arc<dyn DownloadRecordStore>,
        downloads_dir: impl Into<PathBuf>,
        settings: DownloadSettings,
    ) -> Self {
        let (state, _) = watch::channel(DownloadState::Idle);
        let (revision, _) = watch::channel(0);

        Self {
            source,
            store,
            downloads_dir: downloads_dir.into(),
            settings,
            state,
            revision,
            transfers: Mutex::new(Transfers::default()),
        }
    }

    /// Latest published state
    pub fn state(&self) -> DownloadState {
        self.state.borrow().clone()
    }

    /// Observe the download state
    pub fn subscribe(&self) -> watch::Receiver<DownloadState> {
        self.state.subscribe()
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    /// Download `track` and record it.
    ///
    /// An existing record whose file is still on disk short-circuits to
    /// `Completed` without opening a stream or disturbing the running transfer.
    /// On failure the partial file is removed, no record is written and
    /// `Error` is published.
    pub async fn download(&self, track: &Track) -> Result<DownloadedTrack, DownloadError> {
        match self.existing_download(&track.id).await {
            Ok(Some(existing)) => {
                debug!("{} already downloaded at {}", track.id, existing.file_path);
                self.state.send_replace(DownloadState::Completed {
                    track_id: track.id.clone(),
                });
                return Ok(existing);
            }
            Ok(None) => {}
            Err(e) => {
                let e = DownloadError::from(e);
                warn!("Could not check download of {}: {}", track.id, e);
                self.state.send_replace(DownloadState::Error {
                    track_id: track.id.clone(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        }

        let (attempt, token) = self.begin(&track.id);

        let result = self.run(track, attempt, &token).await;

        match &result {
            Ok(_) => {}
            Err(DownloadError::Cancelled) => {
                debug!("Download of {} was superseded", track.id);
            }
            Err(e) => {
                warn!("Download of {} failed: {}", track.id, e);
                self.publish(
                    attempt,
                    DownloadState::Error {
                        track_id: track.id.clone(),
                        message: e.to_string(),
                    },
                );
            }
        }

        self.finish(attempt);
        result
    }

    /// Cancel the running transfer, if any, and go back to `Idle`
    pub fn cancel(&self) {
        let mut transfers = self.transfers.lock();
        if let Some(transfer) = transfers.active.take() {
            info!("Cancelling download of {}", transfer.track_id);
            transfer.token.cancel();
        }
        self.state.send_replace(DownloadState::Idle);
    }

    /// Force the published state back to `Idle`
    pub fn reset_state(&self) {
        self.state.send_replace(DownloadState::Idle);
    }

    /// Remove a downloaded track. Deleting something that is not downloaded succeeds.
    pub async fn delete(&self, track_id: &str) -> Result<DeleteOutcome, DownloadError> {
        let Some(record) = self.store.get(track_id).await? else {
            return Ok(DeleteOutcome::NotDownloaded);
        };

        let outcome = match tokio::fs::remove_file(&record.file_path).await {
            Ok(()) => DeleteOutcome::Removed,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DeleteOutcome::Removed,
            Err(e) => {
                warn!(
                    "Could not remove {} for {}: {}; dropping the record anyway",
                    record.file_path, track_id, e
                );
                DeleteOutcome::RecordRemovedFileKept
            }
        };

        self.store.delete(track_id).await?;
        self.bump_revision();
        info!("Deleted download {}", track_id);

        Ok(outcome)
    }

    /// All downloads, newest first
    pub async fn all_downloads(&self) -> anyhow::Result<Vec<DownloadedTrack>> {
        self.store.all().await
    }

    pub async fn is_downloaded(&self, track_id: &str) -> anyhow::Result<bool> {
        self.store.exists(track_id).await
    }

    /// Location of the stored audio for `track_id`
    pub async fn file_path(&self, track_id: &str) -> anyhow::Result<Option<PathBuf>> {
        Ok(self
            .store
            .get(track_id)
            .await?
            .map(|record| PathBuf::from(record.file_path)))
    }

    pub async fn stats(&self) -> anyhow::Result<DownloadStats> {
        self.store.stats().await
    }

    /// Stream of the download list: the current list first, then a fresh one
    /// after every record change. Ends when the manager is dropped.
    pub fn watch_downloads(&self) -> BoxStream<'static, anyhow::Result<Vec<DownloadedTrack>>> {
        let store = Arc::clone(&self.store);
        let changes = self.revision.subscribe();

        stream::unfold((store, changes, true), |(store, mut changes, first)| async move {
            if !first && changes.changed().await.is_err() {
                return None;
            }
            let downloads = store.all().await;
            Some((downloads, (store, changes, false)))
        })
        .boxed()
    }

    /// Stream of whether `track_id` is downloaded, refreshed on every record change
    pub fn watch_is_downloaded(
        &self,
        track_id: impl Into<String>,
    ) -> BoxStream<'static, anyhow::Result<bool>> {
        let track_id = track_id.into();
        self.watch_downloads()
            .map(move |downloads| {
                downloads.map(|list| list.iter().any(|d| d.track_id == track_id))
            })
            .boxed()
    }

    /// Final on-disk location for a track
    pub fn path_for(&self, track_id: &str) -> PathBuf {
        self.downloads_dir
            .join(format!("{}.{}", file_stem(track_id), self.settings.extension))
    }

    fn partial_path_for(&self, track_id: &str, attempt: u64) -> PathBuf {
        self.downloads_dir.join(format!(
            "{}.{}.{}.part",
            file_stem(track_id),
            attempt,
            self.settings.extension
        ))
    }

    async fn run(
        &self,
        track: &Track,
        attempt: u64,
        token: &CancellationToken,
    ) -> Result<DownloadedTrack, DownloadError> {
        self.publish(
            attempt,
            DownloadState::Downloading {
                track_id: track.id.clone(),
                progress: 0.0,
            },
        );
        info!("Downloading {} ({} - {})", track.id, track.artist, track.title);

        tokio::fs::create_dir_all(&self.downloads_dir).await?;
        let partial = self.partial_path_for(&track.id, attempt);
        let target = self.path_for(&track.id);

        let outcome = match self.transfer(&track.id, attempt, token, &partial).await {
            Ok(written) if !token.is_cancelled() => {
                debug!("Received {} bytes for {}", written, track.id);
                tokio::fs::rename(&partial, &target).await
                    .map_err(DownloadError::from)
            }
            Ok(_) => Err(DownloadError::Cancelled),
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            remove_quietly(&partial).await;
            return Err(e);
        }

        let file_size = match tokio::fs::metadata(&target).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                remove_quietly(&target).await;
                return Err(e.into());
            }
        };

        let record = DownloadedTrack::from_track(
            track,
            target.to_string_lossy().into_owned(),
            file_size as i64,
        );
        if let Err(e) = self.store.upsert(&record).await {
            remove_quietly(&target).await;
            return Err(e.into());
        }
        self.bump_revision();

        self.publish(
            attempt,
            DownloadState::Completed {
                track_id: track.id.clone(),
            },
        );
        info!("Downloaded {} ({} bytes)", track.id, file_size);

        Ok(record)
    }

    /// Copy the source stream into `path`, publishing progress after every chunk
    async fn transfer(
        &self,
        track_id: &str,
        attempt: u64,
        token: &CancellationToken,
        path: &Path,
    ) -> Result<u64, DownloadError> {
        let TrackStream { total_len, mut chunks } = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(DownloadError::Cancelled),
            opened = self.source.open(track_id) => opened?,
        };
        // unknown length: progress stays at its initial 0 until completion
        let total_len = total_len.filter(|len| *len > 0);

        let mut file = tokio::fs::File::create(path).await?;
        let mut written: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(DownloadError::Cancelled),
                next = tokio::time::timeout(self.settings.stall_timeout, chunks.next()) => next,
            };

            let chunk = match next {
                Err(_) => return Err(DownloadError::Stalled(self.settings.stall_timeout)),
                Ok(None) => break,
                Ok(Some(chunk)) => chunk?,
            };

            file.write_all(&chunk).await?;
            written += chunk.len() as u64;

            if let Some(total) = total_len {
                let progress = (written as f64 / total as f64).min(1.0) as f32;
                self.publish(
                    attempt,
                    DownloadState::Downloading {
                        track_id: track_id.to_string(),
                        progress,
                    },
                );
            }
        }

        file.flush().await?;
        Ok(written)
    }

    /// The stored record for `track_id`, unless its file has disappeared
    async fn existing_download(&self, track_id: &str) -> anyhow::Result<Option<DownloadedTrack>> {
        let Some(record) = self.store.get(track_id).await? else {
            return Ok(None);
        };

        if tokio::fs::metadata(&record.file_path).await.is_ok() {
            Ok(Some(record))
        } else {
            debug!(
                "Record for {} points at missing file {}; downloading again",
                track_id, record.file_path
            );
            Ok(None)
        }
    }

    /// Register a new attempt, cancelling the one in flight
    fn begin(&self, track_id: &str) -> (u64, CancellationToken) {
        let mut transfers = self.transfers.lock();
        transfers.last_attempt += 1;
        let attempt = transfers.last_attempt;
        let token = CancellationToken::new();

        let previous = transfers.active.replace(Transfer {
            attempt,
            track_id: track_id.to_string(),
            token: token.clone(),
        });
        if let Some(previous) = previous {
            info!(
                "Cancelling download of {} in favour of {}",
                previous.track_id, track_id
            );
            previous.token.cancel();
        }

        (attempt, token)
    }

    fn finish(&self, attempt: u64) {
        let mut transfers = self.transfers.lock();
        if transfers.active.as_ref().is_some_and(|t| t.attempt == attempt) {
            transfers.active = None;
        }
    }

    /// Publish `state` only while `attempt` is still the current transfer
    fn publish(&self, attempt: u64, state: DownloadState) {
        let transfers = self.transfers.lock();
        if transfers.active.as_ref().is_some_and(|t| t.attempt == attempt) {
            self.state.send_replace(state);
        }
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

/// File-system safe stem for an opaque track id.
///
/// ASCII letters, digits and `-` are kept; every other byte becomes `_XX`
/// (upper-case hex), so distinct ids always get distinct stems.
fn file_stem(track_id: &str) -> String {
    if track_id.is_empty() {
        return "_".to_string();
    }

    let mut stem = String::with_capacity(track_id.len());
    for byte in track_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("_{:02X}", byte));
        }
    }
    stem
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to clean up {}: {}", path.display(), e);
        }
    }
}
