//! Format conversion to canonical PCM
//!
//! Every source format is normalized to [`DecodedAudio`] (interleaved i16)
//! before it reaches the cache or the playback buffer. The core only sees the
//! [`AudioDecoder`] trait; [`SymphoniaDecoder`] covers MP3, Ogg Vorbis, FLAC,
//! M4A (AAC/ALAC), AIFF and WAV. Other decoders (MIDI synthesis, Opus, WMA)
//! plug in behind the same trait.
//!
//! Decoding is slow relative to the UI poll; the transport runs it on a
//! blocking worker, never on the audio thread.

use crate::audio::types::{DecodedAudio, TrackMetadata};
use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::{Hint, ProbeResult};
use tracing::{debug, warn};

/// Source-format decoder producing canonical PCM
pub trait AudioDecoder: Send + Sync {
    /// Decode the whole file.
    ///
    /// A file that parses but yields no samples returns `Ok` with empty
    /// samples; the transport treats that as a soft failure.
    fn decode(&self, path: &Path) -> Result<DecodedAudio>;

    /// Read title/artist/album/genre tags. Missing tags are simply `None`.
    fn read_metadata(&self, _path: &Path) -> TrackMetadata {
        TrackMetadata::default()
    }
}

/// Audio decoder using symphonia
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    fn probe(path: &Path) -> Result<ProbeResult> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Decode(format!("Failed to open file {}: {}", path.display(), e)))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(ext_str) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext_str);
        }

        symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to probe {}: {}", path.display(), e)))
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio> {
        debug!("Decoding entire file: {}", path.display());

        let probed = Self::probe(path)?;
        let mut format = probed.format;

        // Get the first decodable audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode(format!("No audio track found in {}", path.display())))?;

        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut samples: Vec<i16> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<i16>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("Reached end of file");
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    warn!("Stream reset required in {}; stopping decode", path.display());
                    break;
                }
                Err(e) => {
                    if samples.is_empty() {
                        return Err(Error::Decode(format!(
                            "Error reading {}: {}",
                            path.display(),
                            e
                        )));
                    }
                    warn!("Error reading packet: {}", e);
                    break;
                }
            };

            // Skip packets for other tracks
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    if sample_rate == 0 {
                        sample_rate = spec.rate;
                    }
                    if channels == 0 {
                        channels = spec.channels.count() as u16;
                    }

                    // Capacity, not length; grow the scratch buffer if a packet is larger
                    let needed = decoded.capacity() as u64;
                    let too_small = sample_buf
                        .as_ref()
                        .map(|buf| (buf.capacity() as u64) < needed * spec.channels.count() as u64)
                        .unwrap_or(true);
                    if too_small {
                        sample_buf = Some(SampleBuffer::<i16>::new(needed, spec));
                    }

                    if let Some(buf) = sample_buf.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        samples.extend_from_slice(buf.samples());
                    }
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt frame; skip it and keep going
                    debug!("Skipping undecodable packet: {}", e);
                }
                Err(e) => {
                    return Err(Error::Decode(format!("Decode failed for {}: {}", path.display(), e)));
                }
            }
        }

        if sample_rate == 0 || channels == 0 {
            if samples.is_empty() {
                return Ok(DecodedAudio::new(samples, sample_rate.max(1), channels.max(1)));
            }
            return Err(Error::Decode(format!(
                "Missing sample rate or channel count in {}",
                path.display()
            )));
        }

        debug!(
            "Decoded {} samples ({} frames) at {} Hz, {} channels",
            samples.len(),
            samples.len() / channels as usize,
            sample_rate,
            channels
        );

        Ok(DecodedAudio::new(samples, sample_rate, channels))
    }

    fn read_metadata(&self, path: &Path) -> TrackMetadata {
        let mut probed = match Self::probe(path) {
            Ok(probed) => probed,
            Err(e) => {
                debug!("No metadata for {}: {}", path.display(), e);
                return TrackMetadata::default();
            }
        };

        let mut meta = TrackMetadata::default();
        if let Some(revision) = probed.format.metadata().current() {
            apply_tags(&mut meta, revision.tags());
        }
        // ID3v2 and friends are read by the probe, ahead of the container
        if let Some(metadata) = probed.metadata.get() {
            if let Some(revision) = metadata.current() {
                apply_tags(&mut meta, revision.tags());
            }
        }
        meta
    }
}

fn apply_tags(meta: &mut TrackMetadata, tags: &[Tag]) {
    for tag in tags {
        let slot = match tag.std_key {
            Some(StandardTagKey::TrackTitle) => &mut meta.title,
            Some(StandardTagKey::Artist) => &mut meta.artist,
            Some(StandardTagKey::Album) => &mut meta.album,
            Some(StandardTagKey::Genre) => &mut meta.genre,
            _ => continue,
        };
        if slot.is_none() {
            let value = tag.value.to_string();
            if !value.trim().is_empty() {
                *slot = Some(value);
            }
        }
    }
}
