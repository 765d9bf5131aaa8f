//! # Zenamp playback core (zenamp-player)
//!
//! Decodes whole tracks to interleaved i16, keeps them in a bounded LRU
//! cache, and plays them through a real-time mixer with volume, varispeed
//! and a three-band equalizer.
//!
//! **Architecture:** symphonia decode → cache → private playback buffer →
//! mixer callback → cpal

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;

pub use error::{Error, Result};
pub use playback::{Player, PlayerEvent, PlayerOptions};
