//! Data models
//!
//! Plain values shared by the queue, the download engine and the store.

mod download;
mod track;

pub use download::{DownloadState, DownloadStats, DownloadedTrack};
pub use track::Track;
