//! Decoded-audio cache
//!
//! Keeps recently decoded tracks in memory so replaying them skips the decoder.
//! Memory is bounded by a ceiling fixed at construction; inserts evict the
//! least-recently-used entries until the new entry fits.
//!
//! # Ownership
//!
//! The cache exclusively owns its entries. Playback never borrows cache memory:
//! the load path takes a private copy with [`CachedAudioBuffer::to_playback_copy`],
//! so evicting an entry can never pull samples out from under the mixer.
//!
//! # Threading
//!
//! Only the transport owner touches the cache. The audio callback never does,
//! which is why there is no lock here.

use crate::audio::types::{AudioFormat, DecodedAudio};
use crate::error::{Error, Result};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Default memory ceiling (500 MB)
pub const DEFAULT_CACHE_MAX_BYTES: usize = 500 * 1024 * 1024;

/// One decoded track held by the cache.
///
/// Immutable once inserted, apart from the access stamp.
#[derive(Debug)]
pub struct CachedAudioBuffer {
    path: String,
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    duration_seconds: f64,
    memory_bytes: usize,
    last_access: u64,
}

impl CachedAudioBuffer {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Bytes of sample memory (sample count × 2)
    pub fn memory_bytes(&self) -> usize {
        self.memory_bytes
    }

    /// Logical access stamp; larger is more recent
    pub fn last_access(&self) -> u64 {
        self.last_access
    }

    /// Copy the samples into a fresh vector for the playback buffer.
    ///
    /// # Errors
    /// - `CacheAllocation` if the copy cannot be allocated
    pub fn to_playback_copy(&self) -> Result<Vec<i16>> {
        let mut copy = Vec::new();
        copy.try_reserve_exact(self.samples.len()).map_err(|e| {
            Error::CacheAllocation(format!(
                "copying {} samples of {}: {}",
                self.samples.len(),
                self.path,
                e
            ))
        })?;
        copy.extend_from_slice(&self.samples);
        Ok(copy)
    }
}

/// Bounded, LRU-evicting store of decoded tracks keyed by source path
#[derive(Debug)]
pub struct AudioBufferCache {
    entries: HashMap<String, CachedAudioBuffer>,
    total_memory: usize,
    max_memory: usize,
    clock: u64,
}

impl AudioBufferCache {
    /// Create an empty cache with the given memory ceiling in bytes
    pub fn new(max_memory_bytes: usize) -> Self {
        info!(
            "Audio cache initialized: ceiling {:.1} MB",
            max_memory_bytes as f64 / (1024.0 * 1024.0)
        );
        Self {
            entries: HashMap::new(),
            total_memory: 0,
            max_memory: max_memory_bytes,
            clock: 0,
        }
    }

    /// Look up a decoded track by exact path.
    ///
    /// A hit refreshes the entry's access stamp; a miss changes nothing.
    pub fn find(&mut self, path: &str) -> Option<&CachedAudioBuffer> {
        let entry = self.entries.get_mut(path)?;
        self.clock += 1;
        entry.last_access = self.clock;
        Some(entry)
    }

    /// Check for an entry without refreshing its access stamp
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Read an entry without refreshing its access stamp
    pub fn peek(&self, path: &str) -> Option<&CachedAudioBuffer> {
        self.entries.get(path)
    }

    /// Insert a decoded track, evicting least-recently-used entries to make room.
    ///
    /// # Arguments
    /// - `path`: Source path, the cache key
    /// - `audio`: Decoded PCM; ownership moves into the cache
    ///
    /// # Returns
    /// The new entry. The borrow ends before the next insert, which may evict it.
    ///
    /// # Oversize entries
    /// An entry larger than the whole ceiling is still admitted, alone, after
    /// everything else has been evicted.
    ///
    /// # Errors
    /// - `CacheAllocation` if the map cannot grow; the cache is left unchanged
    pub fn insert(&mut self, path: impl Into<String>, audio: DecodedAudio) -> Result<&CachedAudioBuffer> {
        let path = path.into();
        let footprint = audio.samples.len() * std::mem::size_of::<i16>();

        // Reserve before touching anything so a failure leaves no partial state
        self.entries
            .try_reserve(1)
            .map_err(|e| Error::CacheAllocation(format!("cache entry for {}: {}", path, e)))?;

        if let Some(old) = self.entries.remove(&path) {
            self.total_memory -= old.memory_bytes;
            debug!("Replacing cached entry for {}", path);
        }

        if footprint > self.max_memory {
            warn!(
                "Cache entry {} ({} bytes) exceeds ceiling of {} bytes; admitting it alone",
                path, footprint, self.max_memory
            );
        }

        while self.total_memory + footprint > self.max_memory && !self.entries.is_empty() {
            self.evict_oldest();
        }

        self.clock += 1;
        let duration_seconds = audio.duration_seconds();
        let entry = CachedAudioBuffer {
            path: path.clone(),
            samples: audio.samples,
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            bits_per_sample: audio.bits_per_sample,
            duration_seconds,
            memory_bytes: footprint,
            last_access: self.clock,
        };
        self.total_memory += footprint;

        debug!(
            "Cached {} ({} bytes, {:.2}s); total {} of {} bytes in {} entries",
            path,
            footprint,
            duration_seconds,
            self.total_memory,
            self.max_memory,
            self.entries.len() + 1
        );

        let inserted = match self.entries.entry(path) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(entry);
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(entry),
        };
        Ok(inserted)
    }

    /// Remove one entry. Returns whether it was present.
    pub fn remove(&mut self, path: &str) -> bool {
        match self.entries.remove(path) {
            Some(entry) => {
                self.total_memory -= entry.memory_bytes;
                true
            }
            None => false,
        }
    }

    /// Free every entry and reset the running total
    pub fn clear(&mut self) {
        let count = self.entries.len();
        self.entries.clear();
        self.total_memory = 0;
        debug!("Audio cache cleared ({} entries freed)", count);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all entry footprints in bytes
    pub fn total_memory(&self) -> usize {
        self.total_memory
    }

    pub fn max_memory(&self) -> usize {
        self.max_memory
    }

    /// Evict the entry with the oldest access stamp. Linear scan; inserts are rare.
    fn evict_oldest(&mut self) -> Option<String> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(path, _)| path.clone())?;

        let entry = self.entries.remove(&oldest)?;
        self.total_memory -= entry.memory_bytes;
        debug!("Evicted {} ({} bytes) from audio cache", oldest, entry.memory_bytes);
        Some(oldest)
    }
}

impl Default for AudioBufferCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_MAX_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_of_bytes(bytes: usize) -> DecodedAudio {
        DecodedAudio::new(vec![0; bytes / 2], 44100, 1)
    }

    #[test]
    fn test_insert_tracks_memory() {
        let mut cache = AudioBufferCache::new(1000);
        cache.insert("a", audio_of_bytes(200)).unwrap();
        cache.insert("b", audio_of_bytes(300)).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.total_memory(), 500);
        assert_eq!(cache.find("a").unwrap().memory_bytes(), 200);
        assert_eq!(cache.find("a").unwrap().sample_count(), 100);
    }

    #[test]
    fn test_find_miss_has_no_side_effect() {
        let mut cache = AudioBufferCache::new(1000);
        cache.insert("a", audio_of_bytes(200)).unwrap();
        let stamp = cache.entries["a"].last_access;

        assert!(cache.find("missing").is_none());
        assert_eq!(cache.entries["a"].last_access, stamp);
        assert_eq!(cache.total_memory(), 200);
    }

    #[test]
    fn test_find_refreshes_access_stamp() {
        let mut cache = AudioBufferCache::new(1000);
        cache.insert("a", audio_of_bytes(200)).unwrap();
        cache.insert("b", audio_of_bytes(200)).unwrap();

        let before = cache.entries["a"].last_access;
        cache.find("a");
        assert!(cache.entries["a"].last_access > cache.entries["b"].last_access);
        assert!(cache.entries["a"].last_access > before);
    }

    #[test]
    fn test_eviction_keeps_total_under_ceiling() {
        let mut cache = AudioBufferCache::new(1000);
        for i in 0..20 {
            cache.insert(format!("track{}", i), audio_of_bytes(300)).unwrap();
            assert!(cache.total_memory() <= cache.max_memory());
            let sum: usize = cache.entries.values().map(|e| e.memory_bytes()).sum();
            assert_eq!(sum, cache.total_memory());
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_recently_found_entry_survives_eviction() {
        let mut cache = AudioBufferCache::new(600);
        cache.insert("old", audio_of_bytes(200)).unwrap();
        cache.insert("middle", audio_of_bytes(200)).unwrap();
        cache.insert("new", audio_of_bytes(200)).unwrap();

        // Touch the oldest so "middle" becomes the LRU entry
        cache.find("old");
        cache.insert("incoming", audio_of_bytes(200)).unwrap();

        assert!(cache.contains("old"));
        assert!(!cache.contains("middle"));
        assert!(cache.contains("new"));
        assert!(cache.contains("incoming"));
    }

    #[test]
    fn test_oversize_entry_admitted_alone() {
        let mut cache = AudioBufferCache::new(1000);
        cache.insert("a", audio_of_bytes(400)).unwrap();
        cache.insert("b", audio_of_bytes(400)).unwrap();

        cache.insert("huge", audio_of_bytes(4000)).unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.contains("huge"));
        assert_eq!(cache.total_memory(), 4000);

        // The next insert evicts the oversize entry first
        cache.insert("c", audio_of_bytes(400)).unwrap();
        assert!(!cache.contains("huge"));
        assert_eq!(cache.total_memory(), 400);
    }

    #[test]
    fn test_reinsert_same_path_replaces() {
        let mut cache = AudioBufferCache::new(1000);
        cache.insert("a", audio_of_bytes(200)).unwrap();
        cache.insert("a", audio_of_bytes(600)).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_memory(), 600);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache = AudioBufferCache::new(1000);
        cache.insert("a", audio_of_bytes(200)).unwrap();
        cache.insert("b", audio_of_bytes(200)).unwrap();

        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert_eq!(cache.total_memory(), 200);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.total_memory(), 0);
    }

    #[test]
    fn test_playback_copy_is_independent() {
        let mut cache = AudioBufferCache::new(1000);
        cache
            .insert("a", DecodedAudio::new(vec![1, 2, 3, 4], 8000, 2))
            .unwrap();

        let mut copy = cache.find("a").unwrap().to_playback_copy().unwrap();
        copy[0] = 999;

        assert_eq!(cache.find("a").unwrap().samples(), &[1, 2, 3, 4]);
    }
}
