//! Playback buffer and position cursor
//!
//! A [`PlaybackBuffer`] is the private copy of one decoded track that the
//! mixer reads from. It is never shared with the cache, so in-place
//! processing of these samples can't leak into cached audio.
//!
//! The cursor counts samples (not frames) and is kept frame-aligned.

use crate::audio::types::AudioFormat;

/// Transport status of the loaded buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    /// Nothing playing; cursor at 0
    #[default]
    Stopped,
    Playing,
    Paused,
    /// Cursor reached the end during playback
    Finished,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Stopped => "stopped",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Finished => "finished",
        }
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One track's interleaved samples plus a read cursor
#[derive(Debug, Clone)]
pub struct PlaybackBuffer {
    samples: Vec<i16>,
    position: usize,
    format: AudioFormat,
}

impl PlaybackBuffer {
    /// Wrap samples for playback, cursor at 0.
    ///
    /// A zero channel count is treated as mono.
    pub fn new(samples: Vec<i16>, format: AudioFormat) -> Self {
        let format = AudioFormat::new(format.sample_rate, format.channels.max(1));
        Self {
            samples,
            position: 0,
            format,
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.format.channels as usize
    }

    /// Total samples (all channels)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Cursor in samples
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Mutable view for in-place processing of this track only
    pub fn samples_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    /// True when no complete frame remains at the cursor
    pub fn is_at_end(&self) -> bool {
        self.position + self.channels() > self.samples.len()
    }

    /// Samples of the frame under the cursor, or `None` at the end
    pub fn current_frame(&self) -> Option<&[i16]> {
        if self.is_at_end() {
            return None;
        }
        Some(&self.samples[self.position..self.position + self.channels()])
    }

    /// Move the cursor forward by `n` samples, clamped to the length.
    ///
    /// # Returns
    /// `true` if the end was reached
    pub fn advance(&mut self, n: usize) -> bool {
        self.position = self.position.saturating_add(n).min(self.samples.len());
        if self.is_at_end() {
            self.position = self.samples.len();
            return true;
        }
        false
    }

    /// Move the cursor to `target` samples, clamped to `[0, len)` and
    /// rounded down to a frame boundary.
    pub fn seek(&mut self, target: usize) {
        if self.samples.is_empty() {
            self.position = 0;
            return;
        }
        let channels = self.channels();
        let clamped = target.min(self.samples.len() - 1);
        self.position = clamped - clamped % channels;
    }

    /// Move to `seconds` into the track
    pub fn seek_seconds(&mut self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        let frame = (seconds * self.format.sample_rate as f64) as usize;
        self.seek(frame.saturating_mul(self.channels()));
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn position_seconds(&self) -> f64 {
        self.samples_to_seconds(self.position)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples_to_seconds(self.samples.len())
    }

    fn samples_to_seconds(&self, samples: usize) -> f64 {
        let per_second = self.format.samples_per_second();
        if per_second == 0 {
            return 0.0;
        }
        samples as f64 / per_second as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo(frames: usize) -> PlaybackBuffer {
        PlaybackBuffer::new((0..(frames * 2) as i16).collect(), AudioFormat::new(10, 2))
    }

    #[test]
    fn test_advance_clamps_and_reports_end() {
        let mut buf = stereo(3);
        assert!(!buf.advance(2));
        assert_eq!(buf.position(), 2);
        assert!(buf.advance(100));
        assert_eq!(buf.position(), 6);
        assert!(buf.is_at_end());
        assert_eq!(buf.current_frame(), None);
    }

    #[test]
    fn test_seek_clamps_and_aligns() {
        let mut buf = stereo(4);
        buf.seek(5);
        assert_eq!(buf.position(), 4);
        buf.seek(1_000);
        // Last valid sample index is 7, aligned down to frame start 6
        assert_eq!(buf.position(), 6);
        assert_eq!(buf.current_frame(), Some(&[6i16, 7][..]));
    }

    #[test]
    fn test_seek_on_empty_buffer() {
        let mut buf = PlaybackBuffer::new(Vec::new(), AudioFormat::new(44100, 2));
        buf.seek(10);
        assert_eq!(buf.position(), 0);
        assert!(buf.is_at_end());
    }

    #[test]
    fn test_partial_trailing_frame_counts_as_end() {
        let mut buf = PlaybackBuffer::new(vec![1, 2, 3], AudioFormat::new(10, 2));
        assert!(buf.advance(2));
        assert_eq!(buf.position(), 3);
    }

    #[test]
    fn test_seconds_conversion() {
        let mut buf = stereo(20);
        assert!((buf.duration_seconds() - 2.0).abs() < 1e-9);
        buf.seek_seconds(0.5);
        assert_eq!(buf.position(), 10);
        assert!((buf.position_seconds() - 0.5).abs() < 1e-9);
        buf.seek_seconds(f64::NAN);
        assert_eq!(buf.position(), 0);
    }

    #[test]
    fn test_zero_channels_treated_as_mono() {
        let buf = PlaybackBuffer::new(vec![1, 2], AudioFormat::new(10, 0));
        assert_eq!(buf.channels(), 1);
    }
}
