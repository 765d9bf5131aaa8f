//! Test helper modules for zenamp-player integration tests
//!
//! Provides reusable test infrastructure components:
//! - audio_generator: deterministic WAV fixtures written with hound
//! - scripted: a decoder with canned results per path

#![allow(dead_code)]

pub mod audio_generator;
pub mod scripted;
