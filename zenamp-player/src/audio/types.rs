//! Core audio data types
//!
//! Every decoder, whatever the source format, converges on [`DecodedAudio`]:
//! interleaved signed 16-bit PCM plus its sample rate and channel count.

/// Sample rate and channel layout of a PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Samples (not frames) per second of audio
    pub fn samples_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.channels as u64
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::new(44100, 2)
    }
}

/// Canonical decoder output.
///
/// **Format:**
/// - Samples are i16, interleaved by channel: [L, R, L, R, ...]
/// - `bits_per_sample` is always 16
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl DecodedAudio {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
            bits_per_sample: 16,
        }
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels)
    }

    /// Number of frames (one sample per channel)
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Get duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Tag metadata used for filtered queue navigation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
}

impl TrackMetadata {
    /// Iterate over the populated text fields
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        [&self.title, &self.artist, &self.album, &self.genre]
            .into_iter()
            .filter_map(|f| f.as_deref())
    }
}
