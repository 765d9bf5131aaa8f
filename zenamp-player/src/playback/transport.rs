//! Transport: the player context
//!
//! [`Player`] ties the queue, the decoded-audio cache, the mixer and the
//! output device together. It is owned by one task (the UI/poll loop); the
//! only thing shared with the device thread is the [`Mixer`].
//!
//! # Loading
//!
//! Queue navigation never loads audio by itself. After the index moves the
//! transport resolves the entry through the cache (decoding on a blocking
//! worker on a miss), gives the mixer a private copy and starts the device.
//! The copy is converted to the device rate when the device could not be
//! opened at the track's own rate.
//!
//! # Bad files
//!
//! A file that fails to decode is skipped immediately. A file that decodes
//! to nothing is skipped after a short delay so the notice stays visible.
//! Either way at most one attempt per queue entry is made before giving up.

use crate::audio::cache::{AudioBufferCache, DEFAULT_CACHE_MAX_BYTES};
use crate::audio::decoder::AudioDecoder;
use crate::audio::equalizer::EqualizerSettings;
use crate::audio::output::OutputDevice;
use crate::audio::resampler;
use crate::audio::types::AudioFormat;
use crate::error::{Error, Result};
use crate::playback::buffer::PlaybackStatus;
use crate::playback::callback_monitor::CallbackStats;
use crate::playback::events::{EventBus, PlayerEvent};
use crate::playback::mixer::{Mixer, DEFAULT_VOLUME_PERCENT};
use crate::playback::queue::{PlayQueue, QueueEntry};
use crate::playback::visualizer::VisualizerFeed;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use zenamp_common::session::{PlaylistFile, SessionPaths, SessionState};

/// Delay before skipping a track that decoded to no audio
pub const EMPTY_TRACK_SKIP_DELAY: Duration = Duration::from_millis(500);

/// Startup settings for a [`Player`]
#[derive(Debug, Clone)]
pub struct PlayerOptions {
    pub cache_max_bytes: usize,
    pub volume_percent: u32,
    pub speed: f64,
    pub repeat: bool,
    pub equalizer: EqualizerSettings,
    pub empty_skip_delay: Duration,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            cache_max_bytes: DEFAULT_CACHE_MAX_BYTES,
            volume_percent: DEFAULT_VOLUME_PERCENT,
            speed: 1.0,
            repeat: false,
            equalizer: EqualizerSettings::default(),
            empty_skip_delay: EMPTY_TRACK_SKIP_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingSkip {
    due: Instant,
    attempts: usize,
}

/// The playback context
pub struct Player {
    queue: PlayQueue,
    cache: AudioBufferCache,
    mixer: Arc<Mixer>,
    output: Box<dyn OutputDevice>,
    decoder: Arc<dyn AudioDecoder>,
    events: EventBus,
    /// Format the device was last opened for (requested, not negotiated)
    opened_for: Option<AudioFormat>,
    pending_skip: Option<PendingSkip>,
    /// Offset to apply when the restored entry is next loaded
    resume_offset: Option<(usize, f64)>,
    empty_skip_delay: Duration,
    callback_stats: CallbackStats,
}

impl Player {
    pub fn new(output: Box<dyn OutputDevice>, decoder: Arc<dyn AudioDecoder>, options: PlayerOptions) -> Self {
        let mixer = Arc::new(Mixer::new(options.equalizer, None));
        mixer.set_volume(options.volume_percent);
        mixer.set_speed(options.speed);

        let mut queue = PlayQueue::new();
        queue.set_repeat(options.repeat);

        info!(
            "Player created: output={}, volume={}%, speed={:.2}, repeat={}",
            output.name(),
            mixer.volume(),
            mixer.speed(),
            options.repeat
        );

        Self {
            queue,
            cache: AudioBufferCache::new(options.cache_max_bytes),
            mixer,
            output,
            decoder,
            events: EventBus::default(),
            opened_for: None,
            pending_skip: None,
            resume_offset: None,
            empty_skip_delay: options.empty_skip_delay,
            callback_stats: CallbackStats::default(),
        }
    }

    /// Attach a visualizer to the mixer
    pub fn with_visualizer(self, feed: Box<dyn VisualizerFeed>) -> Self {
        self.mixer.set_visualizer(Some(feed));
        self
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn queue(&self) -> &PlayQueue {
        &self.queue
    }

    pub fn cache(&self) -> &AudioBufferCache {
        &self.cache
    }

    pub fn mixer(&self) -> &Arc<Mixer> {
        &self.mixer
    }

    pub fn status(&self) -> PlaybackStatus {
        self.mixer.status()
    }

    pub fn position_seconds(&self) -> f64 {
        self.mixer.position_seconds()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.mixer.duration_seconds()
    }

    // ---------------------------------------------------------------
    // Queue editing
    // ---------------------------------------------------------------

    /// Append files, reading their tags on a blocking worker.
    ///
    /// Relative paths are made absolute against the working directory so a
    /// saved session still finds them from elsewhere.
    ///
    /// # Returns
    /// Number of entries added
    pub async fn enqueue<I>(&mut self, paths: I) -> Result<usize>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(absolute_path).collect();
        let decoder = Arc::clone(&self.decoder);
        let entries = tokio::task::spawn_blocking(move || {
            paths
                .into_iter()
                .map(|path| {
                    let metadata = decoder.read_metadata(&path);
                    QueueEntry::with_metadata(path, metadata)
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| Error::Queue(format!("Metadata task failed: {}", e)))?;

        let added = entries.len();
        for entry in entries {
            self.queue.add(entry);
        }
        debug!("Enqueued {} entries ({} total)", added, self.queue.len());
        Ok(added)
    }

    /// Remove an entry. Removing the playing entry stops playback.
    pub fn remove_entry(&mut self, index: usize) -> Option<QueueEntry> {
        let was_current = self.queue.current_index() == Some(index);
        let removed = self.queue.remove(index)?;
        if was_current {
            self.stop();
            self.mixer.unload();
        }
        Some(removed)
    }

    pub fn move_entry(&mut self, from: usize, to: usize) -> bool {
        self.queue.move_entry(from, to)
    }

    /// Empty the queue and stop
    pub fn clear_queue(&mut self) {
        self.stop();
        self.mixer.unload();
        self.queue.clear();
        self.resume_offset = None;
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.queue.set_repeat(repeat);
    }

    /// Move the queue position without loading anything
    pub fn select(&mut self, index: usize) -> bool {
        self.queue.select(index)
    }

    // ---------------------------------------------------------------
    // Transport
    // ---------------------------------------------------------------

    /// Select `index` and play it (skipping forward past bad files).
    ///
    /// # Returns
    /// `true` if something is now playing
    ///
    /// # Errors
    /// - `Queue` if `index` is out of range
    /// - `AudioOutput` if the device could not be opened
    pub async fn play_index(&mut self, index: usize) -> Result<bool> {
        if !self.queue.select(index) {
            return Err(Error::Queue(format!(
                "Index {} out of range (queue has {} entries)",
                index,
                self.queue.len()
            )));
        }
        self.start_current(0).await
    }

    /// Play the current entry from the start
    pub async fn play_current(&mut self) -> Result<bool> {
        self.start_current(0).await
    }

    /// Move to the next entry and play it.
    ///
    /// At the end of a non-repeating queue nothing changes and `false` is
    /// returned.
    pub async fn next(&mut self) -> Result<bool> {
        if !self.queue.advance() {
            return Ok(false);
        }
        self.start_current(0).await
    }

    /// Move to the previous entry and play it
    pub async fn previous(&mut self) -> Result<bool> {
        if !self.queue.previous() {
            return Ok(false);
        }
        self.start_current(0).await
    }

    /// Jump forward to the next entry matching `filter` and play it
    pub async fn next_filtered(&mut self, filter: &str) -> Result<bool> {
        if !self.queue.advance_filtered(filter) {
            return Ok(false);
        }
        self.start_current(0).await
    }

    /// Jump back to the previous entry matching `filter` and play it
    pub async fn previous_filtered(&mut self, filter: &str) -> Result<bool> {
        if !self.queue.previous_filtered(filter) {
            return Ok(false);
        }
        self.start_current(0).await
    }

    /// Play/pause toggle.
    ///
    /// From `Stopped` or `Finished` this starts the loaded track again, or
    /// loads the current entry if nothing is loaded.
    pub async fn toggle_pause(&mut self) -> Result<PlaybackStatus> {
        match self.mixer.status() {
            PlaybackStatus::Playing => {
                self.mixer.pause();
                if let Err(e) = self.output.pause() {
                    warn!("Failed to pause output: {}", e);
                }
                self.emit_status(PlaybackStatus::Paused);
            }
            PlaybackStatus::Paused => {
                self.mixer.resume();
                self.resume_output()?;
                self.emit_status(PlaybackStatus::Playing);
            }
            PlaybackStatus::Stopped | PlaybackStatus::Finished => {
                if self.mixer.is_loaded() && self.opened_for.is_some() {
                    self.start_playback()?;
                } else {
                    self.start_current(0).await?;
                }
            }
        }
        Ok(self.mixer.status())
    }

    /// Stop and rewind. Valid in any state.
    pub fn stop(&mut self) {
        self.pending_skip = None;
        self.mixer.stop();
        if let Err(e) = self.output.pause() {
            warn!("Failed to pause output: {}", e);
        }
        self.emit_status(PlaybackStatus::Stopped);
    }

    pub fn seek_seconds(&mut self, seconds: f64) {
        self.mixer.seek_seconds(seconds);
    }

    /// Returns the applied (clamped) volume
    pub fn set_volume(&mut self, percent: u32) -> u32 {
        self.mixer.set_volume(percent)
    }

    /// Returns the applied (clamped) speed
    pub fn set_speed(&mut self, speed: f64) -> f64 {
        self.mixer.set_speed(speed)
    }

    pub fn set_equalizer(&mut self, settings: EqualizerSettings) {
        self.mixer.set_equalizer(settings);
    }

    /// Periodic poll, roughly every 100 ms.
    ///
    /// Handles end of track, delayed skips and device errors.
    pub async fn tick(&mut self) -> Result<()> {
        self.mixer.monitor().report(&mut self.callback_stats);

        if self.output.has_error() {
            self.handle_device_error("stream error reported by device".to_string());
        }

        if self.mixer.take_finished() {
            if let Some(index) = self.queue.current_index() {
                debug!("Track {} finished", index);
                self.events.emit(PlayerEvent::TrackFinished { index });
            }
            if self.queue.advance() {
                self.start_current(0).await?;
            } else {
                self.finish_queue();
            }
        }

        if let Some(skip) = self.pending_skip {
            if Instant::now() >= skip.due {
                self.pending_skip = None;
                if self.queue.advance() {
                    self.start_current(skip.attempts).await?;
                } else {
                    self.finish_queue();
                }
            }
        }

        Ok(())
    }

    /// Stopped with no skip pending: nothing will play until asked
    pub fn is_idle(&self) -> bool {
        self.mixer.status() == PlaybackStatus::Stopped && self.pending_skip.is_none()
    }

    /// True while a delayed skip is waiting for its deadline
    pub fn has_pending_skip(&self) -> bool {
        self.pending_skip.is_some()
    }

    // ---------------------------------------------------------------
    // Session
    // ---------------------------------------------------------------

    /// Snapshot of the queue and position for persistence
    pub fn session(&self) -> (PlaylistFile, SessionState) {
        let playlist = PlaylistFile::new(self.queue.paths());
        let offset_seconds = match self.mixer.status() {
            PlaybackStatus::Stopped | PlaybackStatus::Finished => 0.0,
            _ => self.mixer.position_seconds(),
        };
        let state = SessionState {
            index: self.queue.current_index(),
            offset_seconds,
        };
        (playlist, state)
    }

    pub fn save_session(&self, paths: &SessionPaths) -> Result<()> {
        let (playlist, state) = self.session();
        paths.save(&playlist, &state)?;
        Ok(())
    }

    /// Replace the queue with a saved session.
    ///
    /// Nothing is loaded; the saved offset is applied the next time the saved
    /// entry starts playing.
    ///
    /// # Returns
    /// Number of entries restored
    pub async fn restore_session(&mut self, paths: &SessionPaths) -> Result<usize> {
        let (playlist, state) = paths.load()?;
        self.clear_queue();
        let restored = self.enqueue(playlist.entries).await?;

        if let Some(index) = state.index {
            if self.queue.select(index) {
                self.resume_offset = Some((index, state.offset_seconds));
            } else {
                warn!("Saved index {} is outside the restored queue", index);
            }
        }

        info!(
            "Restored session: {} entries, index {:?}, offset {:.2}s",
            restored,
            self.queue.current_index(),
            state.offset_seconds
        );
        Ok(restored)
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    /// Load the current entry and start it, skipping forward past bad files.
    ///
    /// `attempts` counts entries already skipped in this run.
    async fn start_current(&mut self, mut attempts: usize) -> Result<bool> {
        self.pending_skip = None;

        loop {
            let Some(index) = self.queue.current_index() else {
                self.finish_queue();
                return Ok(false);
            };
            let path = match self.queue.get(index) {
                Some(entry) => entry.path.clone(),
                None => return Err(Error::Queue(format!("Queue index {} has no entry", index))),
            };

            match self.load(&path).await {
                Ok(()) => {
                    if let Some((resume_index, offset)) = self.resume_offset.take() {
                        if resume_index == index {
                            self.mixer.seek_seconds(offset);
                        }
                    }
                    self.start_playback()?;
                    info!("Playing [{}] {}", index, path.display());
                    self.events.emit(PlayerEvent::TrackStarted {
                        index,
                        path,
                        duration_seconds: self.mixer.duration_seconds(),
                    });
                    return Ok(true);
                }
                Err(e) if e.is_skippable() => {
                    warn!("Skipping {}: {}", path.display(), e);
                    self.events.emit(PlayerEvent::LoadFailed {
                        index,
                        path: path.clone(),
                        reason: e.to_string(),
                    });

                    attempts += 1;
                    if attempts >= self.queue.len() {
                        warn!("No playable entries after {} attempts", attempts);
                        self.finish_queue();
                        return Ok(false);
                    }

                    if matches!(e, Error::EmptyAudio(_)) {
                        self.mixer.stop();
                        self.pending_skip = Some(PendingSkip {
                            due: Instant::now() + self.empty_skip_delay,
                            attempts,
                        });
                        return Ok(false);
                    }

                    if !self.queue.advance() {
                        self.finish_queue();
                        return Ok(false);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Resolve `path` through the cache and install a private copy in the mixer
    async fn load(&mut self, path: &Path) -> Result<()> {
        let key = path.to_string_lossy().into_owned();

        let (samples, format) = if let Some(cached) = self.cache.find(&key) {
            debug!("Cache hit: {}", key);
            (cached.to_playback_copy()?, cached.format())
        } else {
            let decoder = Arc::clone(&self.decoder);
            let owned = path.to_path_buf();
            let decoded = tokio::task::spawn_blocking(move || decoder.decode(&owned))
                .await
                .map_err(|e| Error::Playback(format!("Decode task failed: {}", e)))??;

            if decoded.is_empty() || decoded.frame_count() == 0 {
                return Err(Error::EmptyAudio(path.display().to_string()));
            }

            let cached = self.cache.insert(key, decoded)?;
            (cached.to_playback_copy()?, cached.format())
        };

        self.install(samples, format).await
    }

    /// Swap the mixer's track with the device paused, reopening it if the
    /// format changed. The device is left paused.
    ///
    /// If the device runs at another rate the copy is resampled to it, so the
    /// mixer's format (and with it position and duration) is the device's.
    async fn install(&mut self, samples: Vec<i16>, format: AudioFormat) -> Result<()> {
        if let Err(e) = self.output.pause() {
            debug!("Output pause before load failed: {}", e);
        }

        if self.opened_for != Some(format) {
            self.mixer.stop();
            match self.output.open(format, Arc::clone(&self.mixer)) {
                Ok(actual) => {
                    if actual != format {
                        info!(
                            "Output opened at {} Hz / {} ch for {} Hz / {} ch source",
                            actual.sample_rate, actual.channels, format.sample_rate, format.channels
                        );
                    }
                    self.output.clear_error();
                    self.opened_for = Some(format);
                }
                Err(e) => {
                    self.handle_device_error(e.to_string());
                    return Err(e);
                }
            }
        }

        let device_rate = self
            .output
            .output_format()
            .map_or(format.sample_rate, |actual| actual.sample_rate);

        let (samples, format) = if device_rate != format.sample_rate {
            let converted =
                tokio::task::spawn_blocking(move || resampler::resample(&samples, format, device_rate))
                    .await
                    .map_err(|e| Error::Playback(format!("Resample task failed: {}", e)))??;
            if converted.is_empty() {
                return Err(Error::EmptyAudio(format!(
                    "nothing left after resampling to {} Hz",
                    device_rate
                )));
            }
            (converted, AudioFormat::new(device_rate, format.channels))
        } else {
            (samples, format)
        };

        self.mixer.load(samples, format);
        Ok(())
    }

    fn start_playback(&mut self) -> Result<()> {
        self.mixer.play()?;
        self.resume_output()?;
        self.emit_status(PlaybackStatus::Playing);
        Ok(())
    }

    fn resume_output(&mut self) -> Result<()> {
        if let Err(e) = self.output.resume() {
            self.handle_device_error(e.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Stop playback after a device failure; the next load reopens the device
    fn handle_device_error(&mut self, message: String) {
        error!("Audio device error: {}", message);
        self.mixer.stop();
        self.output.close();
        self.output.clear_error();
        self.opened_for = None;
        self.events.emit(PlayerEvent::DeviceError { message });
        self.emit_status(PlaybackStatus::Stopped);
    }

    fn finish_queue(&mut self) {
        info!("End of queue");
        self.pending_skip = None;
        self.mixer.stop();
        if let Err(e) = self.output.pause() {
            debug!("Output pause at end of queue failed: {}", e);
        }
        self.emit_status(PlaybackStatus::Stopped);
        self.events.emit(PlayerEvent::QueueExhausted);
    }

    fn emit_status(&self, status: PlaybackStatus) {
        self.events.emit(PlayerEvent::StateChanged { status });
    }
}

fn absolute_path(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::path::absolute(&path) {
        Ok(absolute) => absolute,
        Err(e) => {
            warn!("Keeping relative path {}: {}", path.display(), e);
            path
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.output.close();
    }
}
