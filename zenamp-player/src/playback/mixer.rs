//! Real-time mixer
//!
//! The [`Mixer`] owns the playback state behind one mutex and is shared
//! between the device callback and the transport.
//!
//! # Callback contract
//!
//! [`Mixer::render`] runs on the device thread. Per block it:
//! - zeroes the output
//! - `try_lock`s the state; a busy lock means this block stays silent
//! - scales by volume (integer percent, i32 math, clamped back to i16)
//! - runs the equalizer once per source channel
//! - steps the cursor with a fractional speed accumulator (varispeed, so
//!   pitch follows speed)
//! - hands the block to the visualizer
//! - raises the finished flag when the cursor reaches the end
//!
//! It never allocates, blocks or logs.
//!
//! Everything else on [`Mixer`] is the UI side and takes the lock normally.

use crate::audio::equalizer::{Equalizer, EqualizerSettings};
use crate::audio::types::AudioFormat;
use crate::error::{Error, Result};
use crate::playback::buffer::{PlaybackBuffer, PlaybackStatus};
use crate::playback::callback_monitor::CallbackMonitor;
use crate::playback::visualizer::VisualizerFeed;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub const DEFAULT_VOLUME_PERCENT: u32 = 100;
pub const MAX_VOLUME_PERCENT: u32 = 500;
pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 4.0;

/// Source channels beyond this are dropped by the mixer
pub const MAX_MIX_CHANNELS: usize = 8;

/// State guarded by the playback lock
pub struct MixerState {
    buffer: Option<PlaybackBuffer>,
    status: PlaybackStatus,
    volume_percent: u32,
    speed: f64,
    speed_accumulator: f64,
    equalizer: Equalizer,
    visualizer: Option<Box<dyn VisualizerFeed>>,
}

/// Shared playback engine
pub struct Mixer {
    state: Mutex<MixerState>,
    /// Set by the callback at end of track, cleared by the transport
    finished: AtomicBool,
    monitor: CallbackMonitor,
}

impl Mixer {
    /// Create an idle mixer.
    ///
    /// The equalizer starts at the default format and is rebuilt on the
    /// first load with a different rate or layout.
    pub fn new(equalizer: EqualizerSettings, visualizer: Option<Box<dyn VisualizerFeed>>) -> Self {
        let format = AudioFormat::default();
        Self {
            state: Mutex::new(MixerState {
                buffer: None,
                status: PlaybackStatus::Stopped,
                volume_percent: DEFAULT_VOLUME_PERCENT,
                speed: 1.0,
                speed_accumulator: 0.0,
                equalizer: Equalizer::new(format.sample_rate, format.channels, equalizer),
                visualizer,
            }),
            finished: AtomicBool::new(false),
            monitor: CallbackMonitor::new(),
        }
    }

    /// Fill `out` with the next block of interleaved audio.
    ///
    /// # Arguments
    /// - `out`: Device block, interleaved with `out_channels`
    /// - `out_channels`: Device channel count. Output channel `c` reads source
    ///   channel `c % source_channels`.
    ///
    /// # Returns
    /// Frames taken from the track (0 for a silent block)
    pub fn render(&self, out: &mut [i16], out_channels: usize) -> usize {
        out.fill(0);
        self.monitor.record_callback();

        let mut guard = match self.state.try_lock() {
            Ok(guard) => guard,
            Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(std::sync::TryLockError::WouldBlock) => {
                self.monitor.record_contended();
                return 0;
            }
        };
        let state = &mut *guard;

        if state.status != PlaybackStatus::Playing {
            return 0;
        }
        let Some(buffer) = state.buffer.as_mut() else {
            return 0;
        };

        let out_channels = out_channels.max(1);
        let src_channels = buffer.channels().min(MAX_MIX_CHANNELS);
        let stride = buffer.channels();
        let volume = state.volume_percent as i32;
        let mut processed = [0i16; MAX_MIX_CHANNELS];
        let mut produced = 0usize;

        for frame in out.chunks_exact_mut(out_channels) {
            let Some(input) = buffer.current_frame() else {
                break;
            };

            for (c, slot) in processed.iter_mut().take(src_channels).enumerate() {
                let scaled = (input[c] as i32 * volume / 100).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
                *slot = state.equalizer.process_sample(scaled, c);
            }
            for (c, sample) in frame.iter_mut().enumerate() {
                *sample = processed[c % src_channels];
            }
            produced += 1;

            state.speed_accumulator += state.speed;
            let mut ended = false;
            while state.speed_accumulator >= 1.0 {
                state.speed_accumulator -= 1.0;
                if buffer.advance(stride) {
                    ended = true;
                    break;
                }
            }
            if ended {
                break;
            }
        }

        let at_end = buffer.is_at_end();

        if produced < out.len() / out_channels {
            self.monitor.record_short_block();
        }

        if let Some(visualizer) = state.visualizer.as_mut() {
            visualizer.feed(&out[..produced * out_channels], produced, out_channels);
        }

        if at_end {
            state.status = PlaybackStatus::Finished;
            self.finished.store(true, Ordering::Release);
        }

        produced
    }

    fn lock(&self) -> MutexGuard<'_, MixerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a new track, replacing (and freeing) the previous one.
    ///
    /// Status becomes `Stopped` with the cursor at 0. The equalizer is
    /// rebuilt when the track's rate or channel count differs from the last.
    pub fn load(&self, samples: Vec<i16>, format: AudioFormat) {
        let mut state = self.lock();
        let buffer = PlaybackBuffer::new(samples, format);

        let channels = buffer.format().channels;
        if !state.equalizer.matches(format.sample_rate, channels) {
            let settings = state.equalizer.settings();
            debug!(
                "Rebuilding equalizer for {} Hz, {} channels",
                format.sample_rate, channels
            );
            state.equalizer = Equalizer::new(format.sample_rate, channels, settings);
        } else {
            state.equalizer.reset();
        }

        // Old buffer dropped here, under the lock
        state.buffer = Some(buffer);
        state.status = PlaybackStatus::Stopped;
        state.speed_accumulator = 0.0;
        self.finished.store(false, Ordering::Release);
    }

    /// Drop the loaded track
    pub fn unload(&self) {
        let mut state = self.lock();
        state.buffer = None;
        state.status = PlaybackStatus::Stopped;
        if let Some(visualizer) = state.visualizer.as_mut() {
            visualizer.reset();
        }
        self.finished.store(false, Ordering::Release);
    }

    /// Start playback of the loaded track, rewinding if it already ended.
    ///
    /// # Errors
    /// - `InvalidState` if nothing is loaded
    pub fn play(&self) -> Result<()> {
        let mut state = self.lock();
        let buffer = state
            .buffer
            .as_mut()
            .ok_or_else(|| Error::InvalidState("No track loaded".to_string()))?;
        if buffer.is_at_end() {
            buffer.rewind();
        }
        state.status = PlaybackStatus::Playing;
        self.finished.store(false, Ordering::Release);
        Ok(())
    }

    /// Playing → Paused. Zeroes the visualizer. Returns whether the status changed.
    pub fn pause(&self) -> bool {
        let mut state = self.lock();
        if state.status != PlaybackStatus::Playing {
            return false;
        }
        state.status = PlaybackStatus::Paused;
        if let Some(visualizer) = state.visualizer.as_mut() {
            visualizer.reset();
        }
        true
    }

    /// Paused → Playing. Returns whether the status changed.
    pub fn resume(&self) -> bool {
        let mut state = self.lock();
        if state.status != PlaybackStatus::Paused {
            return false;
        }
        state.status = PlaybackStatus::Playing;
        true
    }

    /// Any state → Stopped, cursor 0
    pub fn stop(&self) {
        let mut state = self.lock();
        state.status = PlaybackStatus::Stopped;
        state.speed_accumulator = 0.0;
        if let Some(buffer) = state.buffer.as_mut() {
            buffer.rewind();
        }
        if let Some(visualizer) = state.visualizer.as_mut() {
            visualizer.reset();
        }
        self.finished.store(false, Ordering::Release);
    }

    /// Move the cursor to `target` samples (clamped, frame-aligned)
    pub fn seek_samples(&self, target: usize) {
        if let Some(buffer) = self.lock().buffer.as_mut() {
            buffer.seek(target);
        }
    }

    pub fn seek_seconds(&self, seconds: f64) {
        if let Some(buffer) = self.lock().buffer.as_mut() {
            buffer.seek_seconds(seconds);
        }
    }

    /// Set volume in percent, clamped to 0..=500. Returns the applied value.
    pub fn set_volume(&self, percent: u32) -> u32 {
        let percent = percent.min(MAX_VOLUME_PERCENT);
        self.lock().volume_percent = percent;
        percent
    }

    pub fn volume(&self) -> u32 {
        self.lock().volume_percent
    }

    /// Set playback speed, clamped to 0.1..=4.0; resets the accumulator.
    /// Returns the applied value.
    pub fn set_speed(&self, speed: f64) -> f64 {
        let speed = if speed.is_finite() {
            speed.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            1.0
        };
        let mut state = self.lock();
        state.speed = speed;
        state.speed_accumulator = 0.0;
        speed
    }

    pub fn speed(&self) -> f64 {
        self.lock().speed
    }

    pub fn set_equalizer(&self, settings: EqualizerSettings) {
        self.lock().equalizer.set_settings(settings);
    }

    pub fn equalizer(&self) -> EqualizerSettings {
        self.lock().equalizer.settings()
    }

    /// Replace the visualizer feed
    pub fn set_visualizer(&self, visualizer: Option<Box<dyn VisualizerFeed>>) {
        self.lock().visualizer = visualizer;
    }

    pub fn status(&self) -> PlaybackStatus {
        self.lock().status
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().buffer.is_some()
    }

    /// Format of the loaded track
    pub fn format(&self) -> Option<AudioFormat> {
        self.lock().buffer.as_ref().map(|b| b.format())
    }

    /// Cursor in samples
    pub fn position_samples(&self) -> usize {
        self.lock().buffer.as_ref().map(|b| b.position()).unwrap_or(0)
    }

    pub fn position_seconds(&self) -> f64 {
        self.lock()
            .buffer
            .as_ref()
            .map(|b| b.position_seconds())
            .unwrap_or(0.0)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.lock()
            .buffer
            .as_ref()
            .map(|b| b.duration_seconds())
            .unwrap_or(0.0)
    }

    /// Run `f` on the loaded buffer under the lock
    pub fn with_buffer_mut<R>(&self, f: impl FnOnce(&mut PlaybackBuffer) -> R) -> Option<R> {
        self.lock().buffer.as_mut().map(f)
    }

    /// Consume the end-of-track flag
    pub fn take_finished(&self) -> bool {
        self.finished.swap(false, Ordering::AcqRel)
    }

    pub fn monitor(&self) -> &CallbackMonitor {
        &self.monitor
    }

    /// Hold the playback lock, forcing callbacks to render silence.
    #[doc(hidden)]
    pub fn hold_lock(&self) -> MutexGuard<'_, MixerState> {
        self.lock()
    }
}

impl std::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Mixer")
            .field("status", &state.status)
            .field("volume_percent", &state.volume_percent)
            .field("speed", &state.speed)
            .field("loaded", &state.buffer.is_some())
            .finish()
    }
}
