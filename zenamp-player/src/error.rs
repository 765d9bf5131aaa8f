//! Error types for zenamp-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! None of these are process-fatal inside the library; the transport handles
//! each one at the boundary closest to where it originates.

use thiserror::Error;

/// Main error type for zenamp-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audio decoding errors (corrupt or unsupported file)
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// File decoded structurally but produced no samples
    #[error("No audio in {0}")]
    EmptyAudio(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Allocation failed while inserting into or copying out of the cache
    #[error("Cache allocation failed: {0}")]
    CacheAllocation(String),

    /// Playback engine errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// Queue management errors
    #[error("Queue error: {0}")]
    Queue(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared crate (session persistence, config paths)
    #[error(transparent)]
    Common(#[from] zenamp_common::Error),
}

impl Error {
    /// Failures the transport answers by skipping to the next queue entry
    pub fn is_skippable(&self) -> bool {
        matches!(self, Error::Decode(_) | Error::EmptyAudio(_) | Error::Io(_))
    }
}

/// Convenience Result type using zenamp-player Error
pub type Result<T> = std::result::Result<T, Error>;
