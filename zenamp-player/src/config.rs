//! Player configuration
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (with `ZENAMP_*` environment fallbacks)
//! 2. TOML configuration file
//! 3. Built-in defaults (code constants)
//!
//! ```toml
//! volume = 80
//! speed = 1.0
//! cache_max_mb = 500
//! repeat = true
//! device = "pulse"
//! buffer_frames = 1024
//!
//! [equalizer]
//! enabled = true
//! bass_db = 4.0
//! mid_db = 0.0
//! treble_db = -2.0
//!
//! [logging]
//! level = "debug"
//! ```

use crate::audio::cache::DEFAULT_CACHE_MAX_BYTES;
use crate::audio::equalizer::EqualizerSettings;
use crate::error::{Error, Result};
use crate::playback::mixer::DEFAULT_VOLUME_PERCENT;
use crate::playback::transport::PlayerOptions;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Settings loaded from `config.toml`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlayerConfig {
    /// Volume in percent (0-500)
    #[serde(default = "default_volume")]
    pub volume: u32,

    /// Playback speed (0.1-4.0)
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// Decoded-audio cache ceiling in megabytes
    #[serde(default = "default_cache_max_mb")]
    pub cache_max_mb: usize,

    #[serde(default)]
    pub repeat: bool,

    /// Output device name (default device if unset or not found)
    #[serde(default)]
    pub device: Option<String>,

    /// Fixed device block size in frames (device default if unset)
    #[serde(default)]
    pub buffer_frames: Option<u32>,

    #[serde(default)]
    pub equalizer: EqualizerSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_volume() -> u32 {
    DEFAULT_VOLUME_PERCENT
}

fn default_speed() -> f64 {
    1.0
}

fn default_cache_max_mb() -> usize {
    DEFAULT_CACHE_MAX_BYTES / (1024 * 1024)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            speed: default_speed(),
            cache_max_mb: default_cache_max_mb(),
            repeat: false,
            device: None,
            buffer_frames: None,
            equalizer: EqualizerSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Load from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = zenamp_common::config::load_toml(path)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load the resolved config file, or defaults when there is none.
    ///
    /// An explicitly named file that fails to load is an error; see
    /// [`zenamp_common::config::resolve_config_file`] for the lookup order.
    pub fn resolve(cli_arg: Option<&Path>) -> Result<Self> {
        match zenamp_common::config::resolve_config_file(cli_arg) {
            Some(path) => Self::load(&path),
            None => {
                info!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Clamp out-of-range values, logging each correction
    pub fn validated(mut self) -> Self {
        let volume = self.volume.min(crate::playback::mixer::MAX_VOLUME_PERCENT);
        if volume != self.volume {
            warn!("volume {} out of range, using {}", self.volume, volume);
            self.volume = volume;
        }

        let speed = if self.speed.is_finite() {
            self.speed
                .clamp(crate::playback::mixer::MIN_SPEED, crate::playback::mixer::MAX_SPEED)
        } else {
            1.0
        };
        if speed != self.speed {
            warn!("speed {} out of range, using {}", self.speed, speed);
            self.speed = speed;
        }

        if self.cache_max_mb == 0 {
            warn!("cache_max_mb must be positive, using {}", default_cache_max_mb());
            self.cache_max_mb = default_cache_max_mb();
        }

        self.equalizer = self.equalizer.clamped();
        self
    }

    pub fn player_options(&self) -> PlayerOptions {
        PlayerOptions {
            cache_max_bytes: self.cache_max_mb.saturating_mul(1024 * 1024),
            volume_percent: self.volume,
            speed: self.speed,
            repeat: self.repeat,
            equalizer: self.equalizer,
            ..PlayerOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = PlayerConfig::from_toml_str("").unwrap();
        assert_eq!(config, PlayerConfig::default());
        assert_eq!(config.cache_max_mb, 500);
        assert_eq!(config.logging.level, "info");
        assert!(!config.equalizer.enabled);
    }

    #[test]
    fn test_partial_file() {
        let config = PlayerConfig::from_toml_str(
            r#"
            volume = 80
            repeat = true

            [equalizer]
            enabled = true
            bass_db = 4.5
            "#,
        )
        .unwrap();

        assert_eq!(config.volume, 80);
        assert!(config.repeat);
        assert_eq!(config.speed, 1.0);
        assert!(config.equalizer.enabled);
        assert_eq!(config.equalizer.bass_db, 4.5);
        assert_eq!(config.equalizer.treble_db, 0.0);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            PlayerConfig::from_toml_str("volume = \"loud\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_validated_clamps() {
        let config = PlayerConfig {
            volume: 9000,
            speed: 0.0,
            cache_max_mb: 0,
            ..PlayerConfig::default()
        }
        .validated();

        assert_eq!(config.volume, 500);
        assert_eq!(config.speed, 0.1);
        assert_eq!(config.cache_max_mb, 500);
    }

    #[test]
    fn test_player_options() {
        let options = PlayerConfig {
            cache_max_mb: 2,
            volume: 50,
            ..PlayerConfig::default()
        }
        .player_options();
        assert_eq!(options.cache_max_bytes, 2 * 1024 * 1024);
        assert_eq!(options.volume_percent, 50);
    }
}
