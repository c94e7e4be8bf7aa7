//! Configuration directory resolution
//!
//! Settings and logs live under one per-user directory:
//! `$STITCHTOON_CONFIG_DIR` when set, otherwise `<os config dir>/stitchtoon`.

use crate::error::Result;
use std::path::PathBuf;
use tracing::debug;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "STITCHTOON_CONFIG_DIR";

/// Name of the settings file inside the configuration directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Configuration manager
pub struct ConfigManager;

impl ConfigManager {
    /// Get the configuration directory
    ///
    /// Falls back to the current directory when the platform has no notion of
    /// a per-user config directory.
    pub fn get_config_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }
        dirs::config_dir().map_or_else(|| PathBuf::from("."), |dir| dir.join("stitchtoon"))
    }

    /// Get the path to the settings file
    pub fn get_settings_path() -> PathBuf {
        Self::get_config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Get the directory log files are written to
    pub fn get_log_dir() -> PathBuf {
        Self::get_config_dir().join("logs")
    }

    /// Ensure the configuration directory exists
    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_dir = Self::get_config_dir();
        std::fs::create_dir_all(&config_dir)?;
        debug!("Using configuration directory {}", config_dir.display());
        Ok(config_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ConfigDirGuard, create_test_dir};

    #[test]
    fn test_settings_path() {
        let path = ConfigManager::get_settings_path();
        assert!(path.to_string_lossy().ends_with("settings.json"));
    }

    #[test]
    fn test_env_override() {
        let temp_dir = create_test_dir();
        let _guard = ConfigDirGuard::new(&temp_dir);

        assert_eq!(ConfigManager::get_config_dir(), temp_dir.path());
        assert_eq!(ConfigManager::get_log_dir(), temp_dir.path().join("logs"));
    }

    #[test]
    fn test_ensure_config_dir_creates_directory() {
        let temp_dir = create_test_dir();
        let nested = temp_dir.path().join("nested").join("stitchtoon");
        let _guard = ConfigDirGuard::with_path(&nested);

        let dir = ConfigManager::ensure_config_dir().unwrap();
        assert_eq!(dir, nested);
        assert!(nested.is_dir());
    }
}
