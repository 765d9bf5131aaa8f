//! Visualizer feed
//!
//! The mixer hands every rendered block to a [`VisualizerFeed`] while it holds
//! the playback lock, so implementations must not block or allocate. The
//! provided [`LevelMeter`] publishes RMS and peak through atomics and pushes a
//! mono downmix into a lock-free ring that a UI thread drains through
//! [`VisualizerReader`].

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Receives the final output of each rendered block
pub trait VisualizerFeed: Send {
    /// Called from the audio callback with the interleaved block just written
    /// to the device.
    ///
    /// # Arguments
    /// - `samples`: Rendered samples, `frames * channels` long
    /// - `frames`: Frames actually produced (silence padding excluded)
    /// - `channels`: Interleaved channel count of `samples`
    fn feed(&mut self, samples: &[i16], frames: usize, channels: usize);

    /// Zero any displayed values. Called on pause and stop.
    fn reset(&mut self);
}

#[derive(Debug, Default)]
struct SharedLevels {
    rms_bits: AtomicU32,
    peak_bits: AtomicU32,
    blocks: AtomicU64,
}

impl SharedLevels {
    fn store(&self, rms: f32, peak: f32) {
        self.rms_bits.store(rms.to_bits(), Ordering::Relaxed);
        self.peak_bits.store(peak.to_bits(), Ordering::Relaxed);
    }
}

/// Feed side: lives inside the mixer
pub struct LevelMeter {
    levels: Arc<SharedLevels>,
    producer: HeapProd<f32>,
}

/// UI side of a [`LevelMeter`]
pub struct VisualizerReader {
    levels: Arc<SharedLevels>,
    consumer: HeapCons<f32>,
}

/// Create a connected meter/reader pair.
///
/// `history_frames` bounds the mono ring; frames that arrive while it is full
/// are dropped until the reader catches up.
pub fn level_meter(history_frames: usize) -> (LevelMeter, VisualizerReader) {
    let levels = Arc::new(SharedLevels::default());
    let (producer, consumer) = HeapRb::<f32>::new(history_frames.max(1)).split();
    (
        LevelMeter {
            levels: Arc::clone(&levels),
            producer,
        },
        VisualizerReader { levels, consumer },
    )
}

impl VisualizerFeed for LevelMeter {
    fn feed(&mut self, samples: &[i16], frames: usize, channels: usize) {
        self.levels.blocks.fetch_add(1, Ordering::Relaxed);
        let channels = channels.max(1);
        let used = (frames * channels).min(samples.len());
        if used == 0 {
            self.levels.store(0.0, 0.0);
            return;
        }

        let mut sum_sq = 0.0f64;
        let mut peak = 0.0f32;
        for frame in samples[..used].chunks_exact(channels) {
            let mut mono = 0.0f32;
            for &s in frame {
                let v = s as f32 / 32768.0;
                sum_sq += (v as f64) * (v as f64);
                peak = peak.max(v.abs());
                mono += v;
            }
            // Full ring: drop rather than block
            let _ = self.producer.try_push(mono / channels as f32);
        }

        let rms = (sum_sq / used as f64).sqrt() as f32;
        self.levels.store(rms, peak);
    }

    fn reset(&mut self) {
        self.levels.store(0.0, 0.0);
    }
}

impl VisualizerReader {
    /// RMS of the last block, 0.0..=1.0
    pub fn rms(&self) -> f32 {
        f32::from_bits(self.levels.rms_bits.load(Ordering::Relaxed))
    }

    /// Absolute peak of the last block, 0.0..=1.0
    pub fn peak(&self) -> f32 {
        f32::from_bits(self.levels.peak_bits.load(Ordering::Relaxed))
    }

    /// Number of blocks fed so far
    pub fn blocks_fed(&self) -> u64 {
        self.levels.blocks.load(Ordering::Relaxed)
    }

    /// Mono frames waiting to be read
    pub fn available(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Pop up to `out.len()` mono frames; returns how many were written
    pub fn read_frames(&mut self, out: &mut [f32]) -> usize {
        self.consumer.pop_slice(out)
    }
}
