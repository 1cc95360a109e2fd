//! Filesystem locations for configuration
//!
//! All user-visible state lives under `~/.chorus`. The `CHORUS_CONFIG_DIR`
//! environment variable overrides the directory wholesale.

use std::path::PathBuf;

use crate::constants;

/// Root configuration directory (`~/.chorus` unless overridden)
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHORUS_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(constants::config::CONFIG_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(constants::config::CONFIG_DIR_NAME))
}

/// Path of the provider configuration file
pub fn config_file() -> PathBuf {
    config_dir().join(constants::config::CONFIG_FILE_NAME)
}
