//! Play queue
//!
//! Ordered list of tracks plus a current index. Navigation only moves the
//! index; loading audio for the new entry is the transport's job.
//!
//! # Navigation rules
//!
//! - Empty queue: `advance`/`previous` return `false`.
//! - One entry: the index stays at 0; the result is the repeat flag.
//! - Several entries: step by one. Past either end, wrap when repeat is on,
//!   otherwise stay on the boundary entry and return `false`.

use crate::audio::types::TrackMetadata;
use std::path::{Path, PathBuf};

/// One track in the queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub path: PathBuf,
    pub metadata: TrackMetadata,
}

impl QueueEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            metadata: TrackMetadata::default(),
        }
    }

    pub fn with_metadata(path: impl Into<PathBuf>, metadata: TrackMetadata) -> Self {
        Self {
            path: path.into(),
            metadata,
        }
    }

    /// Name shown to the user: title if tagged, else the file name
    pub fn display_name(&self) -> String {
        match &self.metadata.title {
            Some(title) => match &self.metadata.artist {
                Some(artist) => format!("{} - {}", artist, title),
                None => title.clone(),
            },
            None => self.file_name(),
        }
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    /// Case-insensitive substring match over file name and tags.
    ///
    /// `needle` must already be lowercase.
    fn matches(&self, needle: &str) -> bool {
        if self.file_name().to_lowercase().contains(needle) {
            return true;
        }
        self.metadata
            .fields()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Ordered play queue with a current position
#[derive(Debug, Clone, Default)]
pub struct PlayQueue {
    entries: Vec<QueueEntry>,
    /// `None` exactly when the queue is empty
    current: Option<usize>,
    repeat: bool,
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a queue of untagged entries, positioned at the first one
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut queue = Self::new();
        for path in paths {
            queue.add(QueueEntry::new(path));
        }
        queue
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&QueueEntry> {
        self.entries.get(index)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&QueueEntry> {
        self.current.and_then(|i| self.entries.get(i))
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    /// Paths in queue order, for persistence
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    /// Index of the first entry with this path
    pub fn position_of(&self, path: &Path) -> Option<usize> {
        self.entries.iter().position(|e| e.path == path)
    }

    /// Append; the first entry added becomes current
    pub fn add(&mut self, entry: QueueEntry) {
        self.entries.push(entry);
        if self.current.is_none() {
            self.current = Some(0);
        }
    }

    /// Insert at `index` (clamped to the end); the current entry keeps its identity
    pub fn insert(&mut self, index: usize, entry: QueueEntry) {
        let index = index.min(self.entries.len());
        self.entries.insert(index, entry);
        self.current = match self.current {
            None => Some(0),
            Some(cur) if index <= cur => Some(cur + 1),
            Some(cur) => Some(cur),
        };
    }

    /// Remove the entry at `index`.
    ///
    /// Removing the current entry leaves the index on whatever now occupies
    /// that slot (or the new last entry).
    pub fn remove(&mut self, index: usize) -> Option<QueueEntry> {
        if index >= self.entries.len() {
            return None;
        }
        let removed = self.entries.remove(index);
        self.current = match self.current {
            _ if self.entries.is_empty() => None,
            Some(cur) if index < cur => Some(cur - 1),
            Some(cur) => Some(cur.min(self.entries.len() - 1)),
            None => Some(0),
        };
        Some(removed)
    }

    /// Move an entry; the current entry keeps its identity
    pub fn move_entry(&mut self, from: usize, to: usize) -> bool {
        if from >= self.entries.len() || to >= self.entries.len() {
            return false;
        }
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);

        if let Some(cur) = self.current {
            self.current = Some(if cur == from {
                to
            } else if from < cur && to >= cur {
                cur - 1
            } else if from > cur && to <= cur {
                cur + 1
            } else {
                cur
            });
        }
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current = None;
    }

    /// Jump to `index`; out of range leaves the queue unchanged
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.entries.len() {
            self.current = Some(index);
            true
        } else {
            false
        }
    }

    pub fn set_metadata(&mut self, index: usize, metadata: TrackMetadata) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.metadata = metadata;
        }
    }

    /// Step to the next entry.
    ///
    /// # Returns
    /// `false` when there is nothing further to play
    pub fn advance(&mut self) -> bool {
        self.step(Direction::Forward)
    }

    /// Step to the previous entry; mirror of [`PlayQueue::advance`]
    pub fn previous(&mut self) -> bool {
        self.step(Direction::Backward)
    }

    /// Jump forward to the next entry matching `filter`.
    ///
    /// Other entries are searched in order, wrapping past the end, then the
    /// current entry itself. No match leaves the index where it was. An
    /// empty filter is a plain [`PlayQueue::advance`].
    pub fn advance_filtered(&mut self, filter: &str) -> bool {
        self.step_filtered(filter, Direction::Forward)
    }

    /// Backward counterpart of [`PlayQueue::advance_filtered`]
    pub fn previous_filtered(&mut self, filter: &str) -> bool {
        self.step_filtered(filter, Direction::Backward)
    }

    fn step(&mut self, direction: Direction) -> bool {
        let len = self.entries.len();
        match len {
            0 => false,
            1 => {
                self.current = Some(0);
                self.repeat
            }
            _ => {
                let cur = self.current.unwrap_or(0).min(len - 1);
                let (next, moved) = match direction {
                    Direction::Forward if cur + 1 < len => (cur + 1, true),
                    Direction::Forward if self.repeat => (0, true),
                    Direction::Forward => (len - 1, false),
                    Direction::Backward if cur > 0 => (cur - 1, true),
                    Direction::Backward if self.repeat => (len - 1, true),
                    Direction::Backward => (0, false),
                };
                self.current = Some(next);
                moved
            }
        }
    }

    fn step_filtered(&mut self, filter: &str, direction: Direction) -> bool {
        let needle = filter.trim().to_lowercase();
        if needle.is_empty() {
            return self.step(direction);
        }

        let len = self.entries.len();
        if len == 0 {
            return false;
        }
        let cur = self.current.unwrap_or(0).min(len - 1);

        for offset in 1..=len {
            let index = match direction {
                Direction::Forward => (cur + offset) % len,
                Direction::Backward => (cur + len - offset % len) % len,
            };
            if self.entries[index].matches(&needle) {
                self.current = Some(index);
                return true;
            }
        }
        false
    }
}
