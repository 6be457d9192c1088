//! Core playback and download logic

pub mod downloads;
pub mod player;
pub mod queue;

pub use downloads::{
    DeleteOutcome, DownloadError, DownloadManager, DownloadRecordStore, DownloadSettings,
    TrackStream, TrackStreamSource,
};
pub use player::{PlayerSession, PlayerState, RelatedTracks};
pub use queue::Queue;
