//! Audio callback timing monitor
//!
//! Counts what happens inside the device callback so that glitches can be
//! reported from the UI side. The callback only touches atomics here; all
//! logging happens in [`CallbackMonitor::report`], which the transport calls
//! from its poll loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Audio callback timing monitor
///
/// Tracks:
/// - Total callbacks
/// - Blocks rendered as silence because the playback lock was held
/// - Blocks cut short by the end of the track
/// - Irregular callback intervals (jitter against the negotiated block time)
///
/// **Design:** Lock-free for use in real-time audio callback
#[derive(Debug)]
pub struct CallbackMonitor {
    /// Start time for monotonic elapsed time calculation
    start_time: Instant,

    /// Last callback elapsed time (nanoseconds since start_time)
    last_callback_ns: AtomicU64,

    callback_count: AtomicU64,
    contended_count: AtomicU64,
    short_block_count: AtomicU64,
    irregular_intervals: AtomicU64,

    /// Expected interval between callbacks (nanoseconds, 0 = unknown)
    expected_interval_ns: AtomicU64,
}

impl Default for CallbackMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackMonitor {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            last_callback_ns: AtomicU64::new(0),
            callback_count: AtomicU64::new(0),
            contended_count: AtomicU64::new(0),
            short_block_count: AtomicU64::new(0),
            irregular_intervals: AtomicU64::new(0),
            expected_interval_ns: AtomicU64::new(0),
        }
    }

    /// Set the interval the device should call at.
    ///
    /// # Arguments
    /// - `sample_rate`: Stream sample rate
    /// - `block_frames`: Fixed block size, if one was requested. With a
    ///   device-chosen block size the interval is unknown and jitter is not
    ///   tracked.
    pub fn set_expected_block(&self, sample_rate: u32, block_frames: Option<u32>) {
        let interval_ns = match block_frames {
            Some(frames) if sample_rate > 0 => {
                ((frames as f64 / sample_rate as f64) * 1_000_000_000.0) as u64
            }
            _ => 0,
        };
        self.expected_interval_ns.store(interval_ns, Ordering::Relaxed);
        self.last_callback_ns.store(0, Ordering::Relaxed);
        debug!(
            "CallbackMonitor expecting {:.2}ms blocks",
            interval_ns as f64 / 1_000_000.0
        );
    }

    /// Record callback invocation (call at start of audio callback)
    ///
    /// **REAL-TIME SAFE**: Only atomic operations, no logging
    pub fn record_callback(&self) {
        let now_ns = (self.start_time.elapsed().as_nanos() as u64).max(1);
        let last_ns = self.last_callback_ns.swap(now_ns, Ordering::Relaxed);
        self.callback_count.fetch_add(1, Ordering::Relaxed);

        let expected_ns = self.expected_interval_ns.load(Ordering::Relaxed);
        if last_ns == 0 || expected_ns == 0 {
            return;
        }

        // 20% of the block time
        let tolerance_ns = expected_ns / 5;
        if now_ns.saturating_sub(last_ns).abs_diff(expected_ns) > tolerance_ns {
            self.irregular_intervals.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a block rendered as silence because the lock was busy
    pub fn record_contended(&self) {
        self.contended_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a block that ran out of samples before it was full
    pub fn record_short_block(&self) {
        self.short_block_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics
    pub fn stats(&self) -> CallbackStats {
        CallbackStats {
            callback_count: self.callback_count.load(Ordering::Relaxed),
            contended_count: self.contended_count.load(Ordering::Relaxed),
            short_block_count: self.short_block_count.load(Ordering::Relaxed),
            irregular_intervals: self.irregular_intervals.load(Ordering::Relaxed),
        }
    }

    /// Log counters that moved since `last`, then update `last`.
    ///
    /// Not for use from the audio callback.
    pub fn report(&self, last: &mut CallbackStats) {
        let stats = self.stats();

        if stats.contended_count > last.contended_count {
            debug!(
                "Audio callback hit a busy lock: {} total (+{})",
                stats.contended_count,
                stats.contended_count - last.contended_count
            );
        }

        let new_irregular = stats.irregular_intervals - last.irregular_intervals;
        if new_irregular >= 100 {
            let pct = if stats.callback_count > 0 {
                (stats.irregular_intervals as f64 / stats.callback_count as f64) * 100.0
            } else {
                0.0
            };
            warn!(
                "Audio callback irregular intervals: {} total (+{}), {} callbacks ({:.1}%)",
                stats.irregular_intervals, new_irregular, stats.callback_count, pct
            );
        } else {
            // Hold back until enough accumulate to be worth a warning
            *last = CallbackStats {
                irregular_intervals: last.irregular_intervals,
                ..stats
            };
            return;
        }

        *last = stats;
    }
}

/// Callback statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallbackStats {
    pub callback_count: u64,
    pub contended_count: u64,
    pub short_block_count: u64,
    pub irregular_intervals: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate() {
        let monitor = CallbackMonitor::new();
        monitor.record_callback();
        monitor.record_callback();
        monitor.record_contended();
        monitor.record_short_block();

        let stats = monitor.stats();
        assert_eq!(stats.callback_count, 2);
        assert_eq!(stats.contended_count, 1);
        assert_eq!(stats.short_block_count, 1);
    }

    #[test]
    fn test_unknown_interval_never_irregular() {
        let monitor = CallbackMonitor::new();
        monitor.set_expected_block(44100, None);
        for _ in 0..10 {
            monitor.record_callback();
        }
        assert_eq!(monitor.stats().irregular_intervals, 0);
    }

    #[test]
    fn test_back_to_back_callbacks_are_irregular() {
        let monitor = CallbackMonitor::new();
        // One-second blocks; consecutive calls arrive far too early
        monitor.set_expected_block(1000, Some(1000));
        monitor.record_callback();
        monitor.record_callback();
        monitor.record_callback();
        assert_eq!(monitor.stats().irregular_intervals, 2);
    }

    #[test]
    fn test_report_advances_snapshot() {
        let monitor = CallbackMonitor::new();
        let mut last = CallbackStats::default();
        monitor.record_callback();
        monitor.record_contended();
        monitor.report(&mut last);
        assert_eq!(last.callback_count, 1);
        assert_eq!(last.contended_count, 1);
    }
}
