//! Sample rate conversion using rubato
//!
//! Used when the output device cannot run at a track's native rate. Only
//! the private playback copy is converted; the cache keeps source-rate audio.

use crate::audio::types::AudioFormat;
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

/// Convert interleaved i16 `samples` in `format` to `target_rate`.
///
/// # Arguments
/// - `samples`: Interleaved audio at `format.sample_rate`
/// - `format`: Source rate and channel count
/// - `target_rate`: Rate the device is running at
///
/// # Returns
/// Interleaved audio at `target_rate` with the same channel count. A copy of
/// the input if the rates already match.
///
/// # Errors
/// `Decode` if rubato rejects the ratio or fails mid-conversion
pub fn resample(samples: &[i16], format: AudioFormat, target_rate: u32) -> Result<Vec<i16>> {
    if format.sample_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let channels = format.channels.max(1) as usize;
    let planar_input = deinterleave(samples, channels);
    let input_frames = planar_input[0].len();
    if input_frames == 0 {
        return Ok(Vec::new());
    }

    debug!(
        "Resampling {} frames from {} Hz to {} Hz ({} channels)",
        input_frames, format.sample_rate, target_rate, channels
    );

    // Whole track in one chunk; the ratio is fixed for the life of the copy
    let mut resampler = FastFixedIn::<f32>::new(
        target_rate as f64 / format.sample_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        input_frames,
        channels,
    )
    .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

    let planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

    let output = interleave(&planar_output);
    debug!("Resampled to {} frames", output.len() / channels);
    Ok(output)
}

/// i16 interleaved → f32 planar in [-1.0, 1.0)
fn deinterleave(samples: &[i16], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (channel, &sample) in planar.iter_mut().zip(frame) {
            channel.push(sample as f32 / 32768.0);
        }
    }
    planar
}

/// f32 planar → i16 interleaved, rounded and clamped
fn interleave(planar: &[Vec<f32>]) -> Vec<i16> {
    let Some(first) = planar.first() else {
        return Vec::new();
    };
    let frames = first.len();
    let mut interleaved = Vec::with_capacity(frames * planar.len());
    for frame in 0..frames {
        for channel in planar {
            let value = (channel[frame] * 32768.0).round();
            interleaved.push(value.clamp(i16::MIN as f32, i16::MAX as f32) as i16);
        }
    }
    interleaved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_a_copy() {
        let input = vec![1, -2, 3, -4];
        let output = resample(&input, AudioFormat::new(44100, 2), 44100).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_deinterleave_interleave() {
        let planar = deinterleave(&[16384, -16384, 0, 8192], 2);
        assert_eq!(planar, vec![vec![0.5, 0.0], vec![-0.5, 0.25]]);
        assert_eq!(interleave(&planar), vec![16384, -16384, 0, 8192]);
    }

    #[test]
    fn test_interleave_clamps() {
        assert_eq!(interleave(&[vec![1.5, -1.5]]), vec![i16::MAX, i16::MIN]);
        assert!(interleave(&[]).is_empty());
    }

    #[test]
    fn test_44100_to_48000_length() {
        let frames = 4410;
        let input: Vec<i16> = (0..frames)
            .flat_map(|i| {
                let t = i as f32 / 44100.0;
                let s = ((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 10000.0) as i16;
                [s, s]
            })
            .collect();

        let output = resample(&input, AudioFormat::new(44100, 2), 48000).unwrap();
        let output_frames = output.len() / 2;
        let expected = 4800;

        assert_eq!(output.len() % 2, 0);
        assert!(
            output_frames + 16 >= expected && output_frames <= expected + 16,
            "Expected ~{} frames, got {}",
            expected,
            output_frames
        );
    }

    #[test]
    fn test_constant_level_survives() {
        let input = vec![8000i16; 2000];
        let output = resample(&input, AudioFormat::new(48000, 1), 44100).unwrap();
        let middle = output[output.len() / 2];
        assert!((middle as i32 - 8000).abs() <= 8, "middle sample {}", middle);
    }
}
