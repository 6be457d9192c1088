//! User configuration
//!
//! This module handles user-configurable settings stored in settings.json.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Paths;
use crate::core::DownloadSettings;

/// Environment variable overriding the backend url
pub const API_URL_ENV: &str = "YTMUSIC_API_URL";

/// User configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    /// Base url of the backend API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Audio quality requested for downloads
    #[serde(default = "default_download_quality")]
    pub download_quality: String,

    /// Extension of downloaded files
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Seconds without data before a download is abandoned
    #[serde(default = "default_stall_timeout")]
    pub stall_timeout_secs: u64,

    /// Seconds allowed for connecting to the backend
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Related tracks appended when the queue runs out
    #[serde(default = "default_related_limit")]
    pub related_limit: usize,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            download_quality: default_download_quality(),
            file_extension: default_file_extension(),
            stall_timeout_secs: default_stall_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            related_limit: default_related_limit(),
        }
    }
}

impl UserConfig {
    /// Load configuration from file, writing the defaults on first run
    pub fn load(paths: &Paths) -> Result<Self> {
        let settings_path = paths.settings_path();

        let mut config = if settings_path.exists() {
            let content =
                std::fs::read_to_string(&settings_path).context("Failed to read settings file")?;
            serde_json::from_str(&content).context("Failed to parse settings file")?
        } else {
            let config = Self::default();
            config.save(paths)?;
            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, paths: &Paths) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(paths.settings_path(), content).context("Failed to write settings file")?;

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.api_base_url = url.to_string();
            }
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn download_settings(&self) -> DownloadSettings {
        DownloadSettings {
            extension: self.file_extension.trim_start_matches('.').to_string(),
            stall_timeout: Duration::from_secs(self.stall_timeout_secs.max(1)),
        }
    }
}

// Default value functions for serde

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_download_quality() -> String {
    "best".to_string()
}

fn default_file_extension() -> String {
    "m4a".to_string()
}

fn default_stall_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_related_limit() -> usize {
    20
}
