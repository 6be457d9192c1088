//! Playback queue - an ordered track list with a cursor
//!
//! Every operation is total: invalid indices and empty queues produce `None`
//! or a no-op, never an error. The cursor is either `None` or a valid index.

use crate::models::Track;

/// Ordered playback sequence plus the position of the current track
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: Vec<Track>,
    cursor: Option<usize>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole queue, starting at `start` (clamped into range)
    pub fn replace<I>(&mut self, tracks: I, start: usize)
    where
        I: IntoIterator<Item = Track>,
    {
        self.tracks.clear();
        self.tracks.extend(tracks);
        self.cursor = if self.tracks.is_empty() {
            None
        } else {
            Some(start.min(self.tracks.len() - 1))
        };
    }

    /// Track under the cursor
    pub fn current(&self) -> Option<&Track> {
        self.cursor.and_then(|i| self.tracks.get(i))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.cursor.is_some_and(|i| i + 1 < self.tracks.len())
    }

    pub fn has_previous(&self) -> bool {
        self.cursor.is_some_and(|i| i > 0)
    }

    /// Move to the next track. No wraparound: at the end nothing changes.
    pub fn advance(&mut self) -> Option<&Track> {
        if !self.has_next() {
            return None;
        }
        self.cursor = self.cursor.map(|i| i + 1);
        self.current()
    }

    /// Move to the previous track
    pub fn retreat(&mut self) -> Option<&Track> {
        if !self.has_previous() {
            return None;
        }
        self.cursor = self.cursor.map(|i| i - 1);
        self.current()
    }

    /// Put the cursor on `index` if it is valid
    pub fn jump_to(&mut self, index: usize) -> Option<&Track> {
        if index >= self.tracks.len() {
            return None;
        }
        self.cursor = Some(index);
        self.current()
    }

    /// Add to the end; an empty queue starts at the new track
    pub fn append(&mut self, track: Track) {
        self.tracks.push(track);
        if self.cursor.is_none() {
            self.cursor = Some(0);
        }
    }

    /// Add many to the end; an empty queue starts at the first of them
    pub fn append_all<I>(&mut self, tracks: I)
    where
        I: IntoIterator<Item = Track>,
    {
        self.tracks.extend(tracks);
        if self.cursor.is_none() && !self.tracks.is_empty() {
            self.cursor = Some(0);
        }
    }

    /// Remove the track at `index`, keeping the cursor on the same logical track
    pub fn remove_at(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }
        let removed = self.tracks.remove(index);

        self.cursor = match self.cursor {
            Some(cursor) if index < cursor => Some(cursor - 1),
            // the current track itself went away; stay in place unless that is now past the end
            Some(cursor) if index == cursor && cursor >= self.tracks.len() => {
                self.tracks.len().checked_sub(1)
            }
            other => other,
        };

        Some(removed)
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracks(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| Track::new(format!("id{i}"), format!("Song {i}"), "Artist"))
            .collect()
    }

    fn current_id(queue: &Queue) -> Option<&str> {
        queue.current().map(|t| t.id.as_str())
    }

    #[test]
    fn test_replace_selects_start() {
        let list = tracks(4);
        for i in 0..list.len() {
            let mut queue = Queue::new();
            queue.replace(list.clone(), i);
            assert_eq!(queue.current(), Some(&list[i]));
        }
    }

    #[test]
    fn test_replace_clamps_start() {
        let list = tracks(3);
        let mut queue = Queue::new();

        queue.replace(list.clone(), 99);
        assert_eq!(queue.current(), Some(&list[2]));

        queue.replace(list.clone(), 0);
        assert_eq!(queue.current(), Some(&list[0]));

        queue.replace(Vec::new(), 5);
        assert_eq!(queue.current(), None);
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn test_advance_stops_at_end() {
        let mut queue = Queue::new();
        queue.replace(tracks(3), 0);

        let mut steps = 0;
        while queue.has_next() {
            assert!(queue.advance().is_some());
            steps += 1;
        }
        assert_eq!(steps, 2);
        assert_eq!(current_id(&queue), Some("id2"));

        assert!(queue.advance().is_none());
        assert_eq!(current_id(&queue), Some("id2"));
    }

    #[test]
    fn test_retreat_stops_at_start() {
        let mut queue = Queue::new();
        queue.replace(tracks(2), 1);

        assert!(queue.has_previous());
        assert_eq!(queue.retreat().map(|t| t.id.clone()), Some("id0".into()));
        assert!(!queue.has_previous());
        assert!(queue.retreat().is_none());
        assert_eq!(queue.current_index(), Some(0));
    }

    #[test]
    fn test_empty_queue_navigation() {
        let mut queue = Queue::new();
        assert!(!queue.has_next());
        assert!(!queue.has_previous());
        assert!(queue.advance().is_none());
        assert!(queue.retreat().is_none());
        assert!(queue.jump_to(0).is_none());
        assert!(queue.remove_at(0).is_none());
    }

    #[test]
    fn test_jump_to() {
        let mut queue = Queue::new();
        queue.replace(tracks(3), 0);

        assert_eq!(queue.jump_to(2).map(|t| t.id.clone()), Some("id2".into()));
        assert!(queue.jump_to(3).is_none());
        assert_eq!(queue.current_index(), Some(2));
    }

    #[test]
    fn test_append_auto_starts_only_when_empty() {
        let mut queue = Queue::new();
        queue.append(Track::new("a", "A", "X"));
        assert_eq!(current_id(&queue), Some("a"));

        queue.append(Track::new("b", "B", "X"));
        assert_eq!(current_id(&queue), Some("a"));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_append_all() {
        let mut queue = Queue::new();
        queue.append_all(Vec::new());
        assert_eq!(queue.current_index(), None);

        queue.append_all(tracks(2));
        assert_eq!(current_id(&queue), Some("id0"));

        queue.jump_to(1);
        queue.append_all(tracks(2));
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn test_duplicates_allowed() {
        let mut queue = Queue::new();
        let track = Track::new("same", "Same", "X");
        queue.replace(vec![track.clone(), track.clone()], 0);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.advance(), Some(&track));
    }

    #[test]
    fn test_remove_before_cursor_keeps_track() {
        let mut queue = Queue::new();
        queue.replace(tracks(4), 2);

        let removed = queue.remove_at(0);
        assert_eq!(removed.map(|t| t.id), Some("id0".into()));
        assert_eq!(queue.current_index(), Some(1));
        assert_eq!(current_id(&queue), Some("id2"));
    }

    #[test]
    fn test_remove_after_cursor() {
        let mut queue = Queue::new();
        queue.replace(tracks(4), 1);

        queue.remove_at(3);
        assert_eq!(queue.current_index(), Some(1));
        assert_eq!(current_id(&queue), Some("id1"));
    }

    #[test]
    fn test_remove_current_in_middle_moves_to_following() {
        let mut queue = Queue::new();
        queue.replace(tracks(3), 1);

        queue.remove_at(1);
        assert_eq!(queue.current_index(), Some(1));
        assert_eq!(current_id(&queue), Some("id2"));
    }

    #[test]
    fn test_remove_current_at_end_clamps() {
        let mut queue = Queue::new();
        queue.replace(tracks(3), 2);

        queue.remove_at(2);
        assert_eq!(queue.current_index(), Some(1));

        let mut single = Queue::new();
        single.replace(tracks(1), 0);
        single.remove_at(0);
        assert_eq!(single.current_index(), None);
        assert!(single.is_empty());
    }

    #[test]
    fn test_remove_invalid_index_is_noop() {
        let mut queue = Queue::new();
        queue.replace(tracks(2), 1);

        assert!(queue.remove_at(2).is_none());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn test_clear() {
        let mut queue = Queue::new();
        queue.replace(tracks(3), 1);
        queue.clear();

        assert!(queue.is_empty());
        assert_eq!(queue.current(), None);
        assert_eq!(queue.current_index(), None);
    }
}
