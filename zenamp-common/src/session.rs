//! Queue/session persistence
//!
//! The play queue is stored as a line-oriented UTF-8 playlist:
//!
//! ```text
//! #EXTM3U
//! /music/a.flac
//! relative/b.mp3
//! ```
//!
//! Relative entries are resolved against the playlist's own directory.
//! Blank lines and other `#` lines (`#EXTINF` etc.) are skipped on read.
//!
//! A two-line sidecar records where playback was:
//!
//! ```text
//! 3
//! 81.25
//! ```
//!
//! (queue index, then playback offset in seconds; `-1` means no current entry).

use crate::config::{ensure_app_config_dir, write_atomic};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// First line of every playlist we write
pub const M3U_HEADER: &str = "#EXTM3U";

/// File name of the persisted queue inside the config directory
pub const QUEUE_FILE_NAME: &str = "queue.m3u";

/// File name of the persisted index/offset sidecar
pub const SESSION_FILE_NAME: &str = "queue.state";

/// Ordered list of track paths as stored in an M3U playlist
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistFile {
    pub entries: Vec<PathBuf>,
}

impl PlaylistFile {
    pub fn new(entries: Vec<PathBuf>) -> Self {
        Self { entries }
    }

    /// Parse playlist text. Relative paths are joined onto `base_dir`.
    pub fn parse(content: &str, base_dir: &Path) -> Self {
        let entries = content
            .lines()
            .map(|line| line.trim_start_matches('\u{feff}').trim())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                let path = PathBuf::from(line);
                if path.is_absolute() {
                    path
                } else {
                    base_dir.join(path)
                }
            })
            .collect();
        Self { entries }
    }

    /// Render as `#EXTM3U` text, one path per line
    pub fn to_m3u_string(&self) -> String {
        let mut out = String::from(M3U_HEADER);
        out.push('\n');
        for entry in &self.entries {
            out.push_str(&entry.to_string_lossy());
            out.push('\n');
        }
        out
    }

    /// Load a playlist file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let playlist = Self::parse(&content, base_dir);
        debug!("Loaded {} entries from {}", playlist.entries.len(), path.display());
        Ok(playlist)
    }

    /// Save the playlist atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_m3u_string())
    }
}

/// Playback position recorded alongside the persisted queue
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionState {
    /// Current queue index, `None` for an empty queue
    pub index: Option<usize>,
    /// Playback offset into the current track, in seconds
    pub offset_seconds: f64,
}

impl SessionState {
    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());

        let index_line = lines
            .next()
            .ok_or_else(|| Error::SessionFormat("missing index line".to_string()))?;
        let raw_index: i64 = index_line
            .parse()
            .map_err(|_| Error::SessionFormat(format!("invalid index: {}", index_line)))?;

        let offset_seconds = match lines.next() {
            Some(line) => line
                .parse::<f64>()
                .map_err(|_| Error::SessionFormat(format!("invalid offset: {}", line)))?,
            None => 0.0,
        };

        Ok(Self {
            index: usize::try_from(raw_index).ok(),
            offset_seconds: if offset_seconds.is_finite() {
                offset_seconds.max(0.0)
            } else {
                0.0
            },
        })
    }

    pub fn to_sidecar_string(&self) -> String {
        let index = self.index.map(|i| i as i64).unwrap_or(-1);
        format!("{}\n{}\n", index, self.offset_seconds)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_sidecar_string())
    }
}

/// Locations of the persisted queue and sidecar inside a directory
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPaths {
    pub playlist: PathBuf,
    pub state: PathBuf,
}

impl SessionPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            playlist: dir.join(QUEUE_FILE_NAME),
            state: dir.join(SESSION_FILE_NAME),
        }
    }

    /// Paths under the per-user config directory (created if missing)
    pub fn user_default() -> Result<Self> {
        Ok(Self::in_dir(&ensure_app_config_dir()?))
    }

    /// Write the queue and sidecar pair
    pub fn save(&self, playlist: &PlaylistFile, state: &SessionState) -> Result<()> {
        playlist.save(&self.playlist)?;
        state.save(&self.state)?;
        info!(
            "Saved session: {} entries, index {:?} at {:.2}s",
            playlist.entries.len(),
            state.index,
            state.offset_seconds
        );
        Ok(())
    }

    /// Read the pair back. A missing sidecar restores the queue from the start.
    pub fn load(&self) -> Result<(PlaylistFile, SessionState)> {
        if !self.playlist.exists() {
            return Err(Error::NotFound(self.playlist.display().to_string()));
        }
        let playlist = PlaylistFile::load(&self.playlist)?;
        let state = if self.state.exists() {
            SessionState::load(&self.state)?
        } else {
            SessionState {
                index: if playlist.entries.is_empty() { None } else { Some(0) },
                offset_seconds: 0.0,
            }
        };
        Ok((playlist, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_and_resolves_relative() {
        let text = "#EXTM3U\n#EXTINF:123,Artist - Title\nsongs/a.mp3\n\n/abs/b.flac\n";
        let playlist = PlaylistFile::parse(text, Path::new("/lists"));
        assert_eq!(
            playlist.entries,
            vec![PathBuf::from("/lists/songs/a.mp3"), PathBuf::from("/abs/b.flac")]
        );
    }

    #[test]
    fn test_to_m3u_string_has_header_first() {
        let playlist = PlaylistFile::new(vec![PathBuf::from("/a.wav")]);
        let text = playlist.to_m3u_string();
        assert_eq!(text.lines().next(), Some(M3U_HEADER));
        assert_eq!(text.lines().nth(1), Some("/a.wav"));
    }

    #[test]
    fn test_sidecar_negative_index_is_none() {
        let state = SessionState::parse("-1\n0\n").unwrap();
        assert_eq!(state.index, None);
        assert_eq!(state.to_sidecar_string(), "-1\n0\n");
    }

    #[test]
    fn test_sidecar_rejects_garbage() {
        assert!(SessionState::parse("abc\n1.0\n").is_err());
        assert!(SessionState::parse("").is_err());
        assert!(SessionState::parse("2\nnope\n").is_err());
    }

    #[test]
    fn test_sidecar_missing_offset_defaults_to_zero() {
        let state = SessionState::parse("4").unwrap();
        assert_eq!(state.index, Some(4));
        assert_eq!(state.offset_seconds, 0.0);
    }
}
