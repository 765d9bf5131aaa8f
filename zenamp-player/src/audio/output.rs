//! Audio output using cpal
//!
//! The transport talks to the device through [`OutputDevice`] so it can be
//! driven by [`NullOutput`] when there is no hardware (tests, headless runs).
//! [`CpalOutput`] registers one data callback per stream that hands the device
//! buffer to [`Mixer::render`]; cpal guarantees callbacks never overlap.
//!
//! The mixer works in interleaved i16. The callback renders into a scratch
//! block allocated when the stream is built, one block-sized chunk at a time,
//! and converts to the device's sample format.

use crate::audio::types::AudioFormat;
use crate::error::{Error, Result};
use crate::playback::mixer::Mixer;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Scratch block reserved per stream; larger device buffers are rendered in
/// several passes
const SCRATCH_SAMPLES: usize = 16 * 1024;

/// Device the transport plays through
pub trait OutputDevice {
    /// (Re)open the device for `format`, rendering from `mixer`.
    ///
    /// The stream starts paused. Returns the format actually negotiated, which
    /// may differ when the device cannot do the requested rate or layout.
    fn open(&mut self, format: AudioFormat, mixer: Arc<Mixer>) -> Result<AudioFormat>;

    /// Start delivering callbacks
    fn resume(&mut self) -> Result<()>;

    /// Stop delivering callbacks; the stream stays open
    fn pause(&mut self) -> Result<()>;

    /// Drop the stream
    fn close(&mut self);

    /// Format of the open stream, if any
    fn output_format(&self) -> Option<AudioFormat>;

    fn name(&self) -> String;

    /// Set by the stream's error callback
    fn has_error(&self) -> bool {
        false
    }

    fn clear_error(&self) {}
}

/// Audio output manager using cpal.
pub struct CpalOutput {
    device: Device,
    stream: Option<Stream>,
    format: Option<AudioFormat>,
    buffer_frames: Option<u32>,
    /// Stream error flag - set by the stream error callback
    error_flag: Arc<AtomicBool>,
    /// Count of consecutive errors
    error_count: Arc<AtomicU32>,
}

impl CpalOutput {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Find the output device.
    ///
    /// # Arguments
    /// - `device_name`: Optional device name (None = default device)
    /// - `buffer_frames`: Optional fixed block size in frames (None = device default)
    ///
    /// # Fallback Behavior
    /// If the requested device is not found, the default device is used.
    ///
    /// # Errors
    /// - No device at all: the audio subsystem is unusable
    pub fn new(device_name: Option<&str>, buffer_frames: Option<u32>) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => {
                let mut devices = host
                    .output_devices()
                    .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

                match devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                    Some(dev) => {
                        info!("Found requested audio device: {}", name);
                        dev
                    }
                    None => {
                        warn!("Requested device '{}' not found, falling back to default device", name);
                        host.default_output_device().ok_or_else(|| {
                            Error::AudioOutput(format!(
                                "Device '{}' not found and no default device available",
                                name
                            ))
                        })?
                    }
                }
            }
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?,
        };

        info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        Ok(Self {
            device,
            stream: None,
            format: None,
            buffer_frames,
            error_flag: Arc::new(AtomicBool::new(false)),
            error_count: Arc::new(AtomicU32::new(0)),
        })
    }

    /// Pick a stream config for `format`, falling back to the device default.
    fn choose_config(&self, format: AudioFormat) -> Result<(StreamConfig, SampleFormat)> {
        let supported = self
            .device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let mut best: Option<cpal::SupportedStreamConfigRange> = None;
        for range in supported {
            if range.channels() != format.channels
                || range.min_sample_rate().0 > format.sample_rate
                || range.max_sample_rate().0 < format.sample_rate
            {
                continue;
            }
            // Prefer native i16 so the callback skips conversion
            let replace = match &best {
                None => true,
                Some(current) => {
                    current.sample_format() != SampleFormat::I16 && range.sample_format() == SampleFormat::I16
                }
            };
            if replace {
                best = Some(range);
            }
        }

        let (mut config, sample_format) = match best {
            Some(range) => {
                let sample_format = range.sample_format();
                let config = range
                    .with_sample_rate(cpal::SampleRate(format.sample_rate))
                    .config();
                (config, sample_format)
            }
            None => {
                let default = self
                    .device
                    .default_output_config()
                    .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
                warn!(
                    "Device cannot play {} Hz / {} ch; using {} Hz / {} ch (tracks are resampled)",
                    format.sample_rate,
                    format.channels,
                    default.sample_rate().0,
                    default.channels()
                );
                (default.config(), default.sample_format())
            }
        };

        if let Some(frames) = self.buffer_frames {
            config.buffer_size = cpal::BufferSize::Fixed(frames);
        }
        Ok((config, sample_format))
    }

    fn build_stream<T>(&self, config: &StreamConfig, mixer: Arc<Mixer>) -> Result<Stream>
    where
        T: SizedSample + FromSample<i16>,
    {
        let channels = config.channels as usize;
        let error_flag = Arc::clone(&self.error_flag);
        let error_count = Arc::clone(&self.error_count);
        let mut scratch: Vec<i16> = vec![0; scratch_len(channels)];

        self.device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    for chunk in data.chunks_mut(scratch.len()) {
                        let block = &mut scratch[..chunk.len()];
                        mixer.render(block, channels);
                        for (out, sample) in chunk.iter_mut().zip(block.iter()) {
                            *out = T::from_sample(*sample);
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                    error_count.fetch_add(1, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    /// Get the consecutive error count.
    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::SeqCst)
    }
}

/// Scratch length: whole frames only, so chunked renders never split a frame
fn scratch_len(channels: usize) -> usize {
    let channels = channels.max(1);
    (SCRATCH_SAMPLES / channels).max(1) * channels
}

impl OutputDevice for CpalOutput {
    fn open(&mut self, format: AudioFormat, mixer: Arc<Mixer>) -> Result<AudioFormat> {
        self.close();

        let (config, sample_format) = self.choose_config(format)?;
        debug!(
            "Opening stream: sample_rate={}, channels={}, format={:?}, buffer_size={:?}",
            config.sample_rate.0, config.channels, sample_format, config.buffer_size
        );

        mixer
            .monitor()
            .set_expected_block(config.sample_rate.0, self.buffer_frames);

        let stream = match sample_format {
            SampleFormat::I16 => self.build_stream::<i16>(&config, mixer)?,
            SampleFormat::I32 => self.build_stream::<i32>(&config, mixer)?,
            SampleFormat::U16 => self.build_stream::<u16>(&config, mixer)?,
            SampleFormat::F32 => self.build_stream::<f32>(&config, mixer)?,
            SampleFormat::F64 => self.build_stream::<f64>(&config, mixer)?,
            other => {
                return Err(Error::AudioOutput(format!("Unsupported sample format: {:?}", other)));
            }
        };

        // Some backends start streams on creation
        if let Err(e) = stream.pause() {
            debug!("Stream could not be paused after build: {}", e);
        }

        let opened = AudioFormat::new(config.sample_rate.0, config.channels);
        self.stream = Some(stream);
        self.format = Some(opened);
        Ok(opened)
    }

    fn resume(&mut self) -> Result<()> {
        match &self.stream {
            Some(stream) => stream
                .play()
                .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e))),
            None => Err(Error::InvalidState("No open audio stream".to_string())),
        }
    }

    fn pause(&mut self) -> Result<()> {
        if let Some(stream) = &self.stream {
            stream
                .pause()
                .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("Failed to pause stream on close: {}", e);
            }
            drop(stream);
            info!("Audio stream closed");
        }
        self.format = None;
    }

    fn output_format(&self) -> Option<AudioFormat> {
        self.format
    }

    fn name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".to_string())
    }

    fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }

    fn clear_error(&self) {
        self.error_flag.store(false, Ordering::SeqCst);
        self.error_count.store(0, Ordering::SeqCst);
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}

/// Device stand-in that never calls the mixer on its own.
///
/// Whoever holds the mixer drives it by calling [`Mixer::render`] directly.
#[derive(Debug, Default)]
pub struct NullOutput {
    format: Option<AudioFormat>,
    running: Arc<AtomicBool>,
    fail_open: bool,
    /// Rate every stream is opened at, whatever was asked for
    fixed_rate: Option<u32>,
}

impl NullOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device whose `open` always fails, for exercising device errors
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// A device that only runs at `sample_rate`, like a shared-mode mixer
    pub fn at_rate(sample_rate: u32) -> Self {
        Self {
            fixed_rate: Some(sample_rate),
            ..Self::default()
        }
    }

    /// Shared flag mirroring whether callbacks would currently be delivered
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}

impl OutputDevice for NullOutput {
    fn open(&mut self, format: AudioFormat, _mixer: Arc<Mixer>) -> Result<AudioFormat> {
        if self.fail_open {
            return Err(Error::AudioOutput("null device configured to fail".to_string()));
        }
        self.running.store(false, Ordering::SeqCst);
        let opened = match self.fixed_rate {
            Some(rate) => AudioFormat::new(rate, format.channels),
            None => format,
        };
        self.format = Some(opened);
        Ok(opened)
    }

    fn resume(&mut self) -> Result<()> {
        if self.format.is_none() {
            return Err(Error::InvalidState("No open audio stream".to_string()));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.format = None;
    }

    fn output_format(&self) -> Option<AudioFormat> {
        self.format
    }

    fn name(&self) -> String {
        "null".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::equalizer::EqualizerSettings;

    #[test]
    fn test_list_devices() {
        // Requires audio hardware; just verify it doesn't panic
        let result = CpalOutput::list_devices();
        assert!(result.is_ok() || result.is_err());
    }

    #[test]
    fn test_null_output_lifecycle() {
        let mixer = Arc::new(Mixer::new(EqualizerSettings::default(), None));
        let mut output = NullOutput::new();
        let running = output.running_flag();

        assert!(output.resume().is_err());

        let format = AudioFormat::new(22050, 1);
        assert_eq!(output.open(format, mixer).unwrap(), format);
        assert!(!running.load(Ordering::SeqCst));

        output.resume().unwrap();
        assert!(running.load(Ordering::SeqCst));

        output.pause().unwrap();
        assert!(!running.load(Ordering::SeqCst));

        output.close();
        assert_eq!(output.output_format(), None);
    }

    #[test]
    fn test_fixed_rate_null_output_reports_its_rate() {
        let mixer = Arc::new(Mixer::new(EqualizerSettings::default(), None));
        let mut output = NullOutput::at_rate(48000);
        let opened = output.open(AudioFormat::new(44100, 2), mixer).unwrap();
        assert_eq!(opened, AudioFormat::new(48000, 2));
        assert_eq!(output.output_format(), Some(opened));
    }

    #[test]
    fn test_scratch_holds_whole_frames() {
        assert_eq!(scratch_len(2), SCRATCH_SAMPLES);
        assert_eq!(scratch_len(6) % 6, 0);
        assert!(scratch_len(6) <= SCRATCH_SAMPLES);
        assert_eq!(scratch_len(0), SCRATCH_SAMPLES);
    }

    #[test]
    fn test_i16_to_device_formats() {
        assert_eq!(f32::from_sample(i16::MIN), -1.0);
        assert_eq!(i16::from_sample(1234i16), 1234);
        assert_eq!(u16::from_sample(0i16), 32768);
    }
}
