//! Configuration file and per-user directory resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name used under the platform config directory
pub const APP_DIR_NAME: &str = "zenamp";

/// File name of the TOML configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ZENAMP_CONFIG";

/// Per-user configuration directory (`~/.config/zenamp` on Linux,
/// `~/Library/Application Support/zenamp` on macOS, `%APPDATA%\zenamp` on Windows)
pub fn app_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}

/// Create the per-user configuration directory if missing and return it
pub fn ensure_app_config_dir() -> Result<PathBuf> {
    let dir = app_config_dir()?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Config file resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable `ZENAMP_CONFIG`
/// 3. `<config dir>/zenamp/config.toml`, if it exists
///
/// Returns `None` when nothing applies; callers then run on built-in defaults.
pub fn resolve_config_file(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Default per-user location
    let default = app_config_dir().ok()?.join(CONFIG_FILE_NAME);
    if default.exists() {
        Some(default)
    } else {
        debug!("No config file at {}", default.display());
        None
    }
}

/// Read and parse a TOML file into `T`
pub fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(toml::from_str(&content)?)
}

/// Write `contents` to `path` atomically (temp file + rename), so a crash
/// mid-write never leaves a truncated file behind.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
        None => "tmp".to_string(),
    });
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
