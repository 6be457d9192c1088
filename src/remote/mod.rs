//! Remote backend access

mod client;
pub mod dto;

pub use client::YtMusicClient;
