//! Audio Test File Generation Utilities
//!
//! Generate deterministic WAV files with known characteristics:
//! - Silent audio (all zeros)
//! - Sine waves at specific frequencies
//! - Structurally valid files with no samples

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;

/// Standard test sample rate (44.1 kHz)
pub const TEST_SAMPLE_RATE: u32 = 44100;

fn spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Generate a silent WAV file
///
/// # Arguments
/// * `path` - Output file path
/// * `sample_rate` - Frames per second
/// * `channels` - Interleaved channel count
/// * `duration_ms` - Duration in milliseconds
pub fn generate_silent_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    duration_ms: u64,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(sample_rate, channels))?;

    let total_frames = (sample_rate as u64 * duration_ms) / 1000;
    for _ in 0..total_frames * channels as u64 {
        writer.write_sample(0i16)?;
    }

    writer.finalize()?;
    Ok(())
}

/// Generate a stereo sine wave WAV at 44.1 kHz
///
/// # Arguments
/// * `path` - Output file path
/// * `frequency` - Tone frequency in Hz
/// * `amplitude` - Peak amplitude, 0.0..=1.0 of full scale
/// * `duration_ms` - Duration in milliseconds
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    frequency: f32,
    amplitude: f32,
    duration_ms: u64,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(TEST_SAMPLE_RATE, 2))?;

    let total_frames = (TEST_SAMPLE_RATE as u64 * duration_ms) / 1000;
    for n in 0..total_frames {
        let t = n as f32 / TEST_SAMPLE_RATE as f32;
        let sample = ((2.0 * PI * frequency * t).sin() * amplitude * i16::MAX as f32) as i16;
        writer.write_sample(sample)?;
        writer.write_sample(sample)?;
    }

    writer.finalize()?;
    Ok(())
}

/// Generate a WAV with a valid header and no samples
pub fn generate_empty_wav<P: AsRef<Path>>(path: P) -> Result<(), hound::Error> {
    WavWriter::create(path, spec(TEST_SAMPLE_RATE, 2))?.finalize()
}
