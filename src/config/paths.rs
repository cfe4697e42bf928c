//! Path management for spindb
//!
//! ## Path Resolution Order
//!
//! 1. `SPINDB_CONFIG_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/spindb` or `~/.config/spindb`
//! 3. Windows: `%APPDATA%\spindb`

use std::path::PathBuf;

use crate::error::SpinError;

/// Manages all paths used by spindb
#[derive(Debug, Clone)]
pub struct SpinPaths {
    /// Base directory for configuration and the default local store
    base_dir: PathBuf,
}

impl SpinPaths {
    /// Create a new SpinPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, SpinError> {
        let base_dir = if let Ok(custom) = std::env::var("SPINDB_CONFIG_DIR") {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create SpinPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.config/spindb/ or equivalent)
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("spindb.json")
    }

    /// Get the default root for local buckets (~/.config/spindb/store/)
    pub fn store_dir(&self) -> PathBuf {
        self.base_dir.join("store")
    }

    /// Ensure the base directory exists
    pub fn ensure_directories(&self) -> Result<(), SpinError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| SpinError::Io(format!("Failed to create base directory: {}", e)))
    }
}

/// Resolve the default config directory based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, SpinError> {
    let config_base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME")
                .map_err(|_| SpinError::Config("HOME environment variable not set".into()))?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(config_base.join("spindb"))
}

/// Resolve the default config directory based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, SpinError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| SpinError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("spindb"))
}
