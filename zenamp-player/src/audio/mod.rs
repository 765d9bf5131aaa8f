//! Audio decoding, caching, equalization, rate conversion and device output

pub mod cache;
pub mod decoder;
pub mod equalizer;
pub mod output;
pub mod resampler;
pub mod types;

pub use cache::{AudioBufferCache, CachedAudioBuffer};
pub use decoder::{AudioDecoder, SymphoniaDecoder};
pub use equalizer::{Equalizer, EqualizerSettings};
pub use output::{CpalOutput, NullOutput, OutputDevice};
pub use types::{AudioFormat, DecodedAudio, TrackMetadata};
