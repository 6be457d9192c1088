//! Path management
//!
//! This module manages all filesystem paths used by the application.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Manages all filesystem paths for the application
#[derive(Debug, Clone)]
pub struct Paths {
    /// Config directory path
    config_dir: PathBuf,
}

impl Paths {
    /// Resolve the config directory (override, or the platform data dir) and
    /// create the directory tree
    pub fn new(config_override: Option<PathBuf>) -> Result<Self> {
        let config_dir = match config_override {
            Some(path) => path,
            None => directories::ProjectDirs::from("", "", "ytmusic")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .context("Could not determine a home directory; pass --config")?,
        };

        let paths = Self { config_dir };
        paths.create_directories()?;

        Ok(paths)
    }

    fn create_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(self.downloads_dir())?;
        Ok(())
    }

    // ========== Getters ==========

    /// Get the config directory
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get the main database path
    pub fn app_db_path(&self) -> PathBuf {
        self.config_dir.join("ytmusic.db")
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    /// App-private directory holding downloaded audio
    pub fn downloads_dir(&self) -> PathBuf {
        self.config_dir.join("downloads")
    }
}
