//! Playback session - owns the queue and publishes what should be playing
//!
//! Audio output lives elsewhere; this only decides which track is current
//! and tells observers through a watch channel.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::queue::Queue;
use crate::models::Track;

/// Default number of related tracks fetched when the queue runs out
pub const DEFAULT_RELATED_LIMIT: usize = 20;

/// Source of "more like this" tracks used for autoplay
#[async_trait]
pub trait RelatedTracks: Send + Sync {
    async fn related(&self, track_id: &str, limit: usize) -> anyhow::Result<Vec<Track>>;
}

/// Snapshot of the queue as seen by observers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerState {
    pub queue: Vec<Track>,
    pub current_index: Option<usize>,
    pub current: Option<Track>,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PlayerState {
    fn of(queue: &Queue) -> Self {
        Self {
            queue: queue.tracks().to_vec(),
            current_index: queue.current_index(),
            current: queue.current().cloned(),
            has_next: queue.has_next(),
            has_previous: queue.has_previous(),
        }
    }
}

/// Single owner of the playback queue
pub struct PlayerSession {
    queue: Queue,
    related: Option<Arc<dyn RelatedTracks>>,
    related_limit: usize,
    state: watch::Sender<PlayerState>,
}

impl PlayerSession {
    pub fn new() -> Self {
        let (state, _) = watch::channel(PlayerState::default());
        Self {
            queue: Queue::new(),
            related: None,
            related_limit: DEFAULT_RELATED_LIMIT,
            state,
        }
    }

    /// Enable autoplay of related tracks when the queue runs out
    pub fn with_related(mut self, related: Arc<dyn RelatedTracks>, limit: usize) -> Self {
        self.related = Some(related);
        self.related_limit = limit;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> PlayerState {
        self.state.borrow().clone()
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn current(&self) -> Option<&Track> {
        self.queue.current()
    }

    /// Play a single track, dropping the old queue
    pub fn play_track(&mut self, track: Track) -> Option<Track> {
        info!("Playing {} ({})", track.title, track.id);
        self.queue.replace([track], 0);
        self.publish();
        self.queue.current().cloned()
    }

    /// Play a list (search results, a playlist, favorites, downloads) from `start`
    pub fn play_list(&mut self, tracks: Vec<Track>, start: usize) -> Option<Track> {
        debug!("Replacing queue with {} tracks at {}", tracks.len(), start);
        self.queue.replace(tracks, start);
        self.publish();
        self.queue.current().cloned()
    }

    pub fn add_to_queue(&mut self, track: Track) {
        self.queue.append(track);
        self.publish();
    }

    pub fn add_all_to_queue(&mut self, tracks: Vec<Track>) {
        self.queue.append_all(tracks);
        self.publish();
    }

    /// Jump to a queued track. Selecting the current one does nothing.
    pub fn play_from_queue(&mut self, index: usize) -> Option<Track> {
        if self.queue.current_index() == Some(index) {
            return None;
        }
        let track = self.queue.jump_to(index).cloned();
        if track.is_some() {
            self.publish();
        }
        track
    }

    pub fn remove_from_queue(&mut self, index: usize) -> Option<Track> {
        let removed = self.queue.remove_at(index);
        if removed.is_some() {
            self.publish();
        }
        removed
    }

    pub fn previous(&mut self) -> Option<Track> {
        let track = self.queue.retreat().cloned();
        if track.is_some() {
            self.publish();
        }
        track
    }

    /// Advance; at the end of the queue, append related tracks and continue with them
    pub async fn next(&mut self) -> Option<Track> {
        if let Some(track) = self.queue.advance().cloned() {
            self.publish();
            return Some(track);
        }

        let related = self.related.clone()?;
        let seed = self.queue.current()?.id.clone();

        match related.related(&seed, self.related_limit).await {
            Ok(tracks) if !tracks.is_empty() => {
                info!("Queue ended, adding {} related tracks", tracks.len());
                self.queue.append_all(tracks);
                let track = self.queue.advance().cloned();
                self.publish();
                track
            }
            Ok(_) => {
                debug!("No related tracks for {}", seed);
                None
            }
            Err(e) => {
                warn!("Failed to load related tracks for {}: {}", seed, e);
                None
            }
        }
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.publish();
    }

    fn publish(&self) {
        self.state.send_replace(PlayerState::of(&self.queue));
    }
}

impl Default for PlayerSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracks(ids: &[&str]) -> Vec<Track> {
        ids.iter()
            .map(|id| Track::new(*id, format!("Song {id}"), "Artist"))
            .collect()
    }

    struct FixedRelated(Vec<Track>);

    #[async_trait]
    impl RelatedTracks for FixedRelated {
        async fn related(&self, _track_id: &str, limit: usize) -> anyhow::Result<Vec<Track>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    struct BrokenRelated;

    #[async_trait]
    impl RelatedTracks for BrokenRelated {
        async fn related(&self, _track_id: &str, _limit: usize) -> anyhow::Result<Vec<Track>> {
            anyhow::bail!("offline")
        }
    }

    #[test]
    fn test_play_list_publishes_state() {
        let mut session = PlayerSession::new();
        let rx = session.subscribe();

        let current = session.play_list(tracks(&["a", "b", "c"]), 1);
        assert_eq!(current.map(|t| t.id), Some("b".into()));

        let state = rx.borrow().clone();
        assert_eq!(state.queue.len(), 3);
        assert_eq!(state.current_index, Some(1));
        assert!(state.has_next);
        assert!(state.has_previous);
    }

    #[test]
    fn test_play_track_replaces_queue() {
        let mut session = PlayerSession::new();
        session.play_list(tracks(&["a", "b"]), 0);
        session.play_track(Track::new("z", "Z", "Artist"));

        let state = session.state();
        assert_eq!(state.queue.len(), 1);
        assert_eq!(state.current.map(|t| t.id), Some("z".into()));
    }

    #[test]
    fn test_add_to_empty_queue_starts_playback() {
        let mut session = PlayerSession::new();
        session.add_to_queue(Track::new("a", "A", "Artist"));
        assert_eq!(session.current().map(|t| t.id.as_str()), Some("a"));

        session.add_all_to_queue(tracks(&["b", "c"]));
        assert_eq!(session.current().map(|t| t.id.as_str()), Some("a"));
        assert_eq!(session.state().queue.len(), 3);
    }

    #[test]
    fn test_play_from_queue_ignores_current() {
        let mut session = PlayerSession::new();
        session.play_list(tracks(&["a", "b"]), 0);

        assert!(session.play_from_queue(0).is_none());
        assert!(session.play_from_queue(5).is_none());
        assert_eq!(session.play_from_queue(1).map(|t| t.id), Some("b".into()));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut session = PlayerSession::new();
        session.play_list(tracks(&["a", "b", "c"]), 2);

        session.remove_from_queue(0);
        assert_eq!(session.state().current_index, Some(1));
        assert_eq!(session.current().map(|t| t.id.as_str()), Some("c"));

        session.clear();
        assert_eq!(session.state(), PlayerState::default());
    }

    #[tokio::test]
    async fn test_next_and_previous() {
        let mut session = PlayerSession::new();
        session.play_list(tracks(&["a", "b"]), 0);

        assert_eq!(session.next().await.map(|t| t.id), Some("b".into()));
        assert!(session.next().await.is_none());
        assert_eq!(session.current().map(|t| t.id.as_str()), Some("b"));

        assert_eq!(session.previous().map(|t| t.id), Some("a".into()));
        assert!(session.previous().is_none());
    }

    #[tokio::test]
    async fn test_next_at_end_pulls_related() {
        let mut session = PlayerSession::new()
            .with_related(Arc::new(FixedRelated(tracks(&["r1", "r2", "r3"]))), 2);
        session.play_track(Track::new("a", "A", "Artist"));

        let next = session.next().await;
        assert_eq!(next.map(|t| t.id), Some("r1".into()));

        let state = session.state();
        assert_eq!(state.queue.len(), 3);
        assert_eq!(state.current_index, Some(1));
    }

    #[tokio::test]
    async fn test_related_failure_keeps_position() {
        let mut session = PlayerSession::new().with_related(Arc::new(BrokenRelated), 5);
        session.play_track(Track::new("a", "A", "Artist"));

        assert!(session.next().await.is_none());
        assert_eq!(session.current().map(|t| t.id.as_str()), Some("a"));
        assert_eq!(session.state().queue.len(), 1);
    }

    #[tokio::test]
    async fn test_next_on_empty_queue() {
        let mut session =
            PlayerSession::new().with_related(Arc::new(FixedRelated(tracks(&["r1"]))), 5);
        assert!(session.next().await.is_none());
        assert!(session.state().queue.is_empty());
    }
}
