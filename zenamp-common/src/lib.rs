//! # Zenamp Common Library
//!
//! Shared code for the Zenamp player crates:
//! - Per-user configuration locations
//! - Queue/session persistence (`#EXTM3U` playlist plus sidecar)
//! - Common error type

pub mod config;
pub mod error;
pub mod session;

pub use error::{Error, Result};
pub use session::{PlaylistFile, SessionState};
