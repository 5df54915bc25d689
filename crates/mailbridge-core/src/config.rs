//! Client configuration.
//!
//! Settings are read from `config.json` under the platform configuration
//! directory (`~/.config/mailbridge/` on Linux). A missing file means
//! defaults; `MAILBRIDGE_API_URL` overrides the backend address.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::handshake::{MIN_POLL_INTERVAL, PopupSize};

/// Directory name used under the platform config and data directories.
pub(crate) const APP_DIR: &str = "mailbridge";

/// Environment variable overriding [`ClientConfig::api_base_url`].
pub const API_URL_ENV: &str = "MAILBRIDGE_API_URL";

/// Client settings that persist across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend API base address.
    pub api_base_url: String,
    /// Popup width in pixels.
    pub popup_width: u32,
    /// Popup height in pixels.
    pub popup_height: u32,
    /// How often an open popup is checked for having been closed by the user.
    pub popup_poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let size = PopupSize::default();
        Self {
            api_base_url: mailbridge_transport::DEFAULT_BASE_URL.to_string(),
            popup_width: size.width,
            popup_height: size.height,
            popup_poll_interval_ms: 500,
        }
    }
}

impl ClientConfig {
    /// Returns the default settings file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Loads settings from the default location and applies the environment
    /// override.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::default_path()).await?;
        config.apply_api_url_override(std::env::var(API_URL_ENV).ok());
        Ok(config)
    }

    /// Loads settings from `path`, falling back to defaults if it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// holds invalid values.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            tracing::debug!(?path, "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        tracing::debug!(?path, "Loaded config");
        Ok(config)
    }

    /// Checks values that parse but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(Error::Config("api_base_url must not be empty".to_string()));
        }
        if self.popup_width == 0 || self.popup_height == 0 {
            return Err(Error::Config(
                "popup_width and popup_height must be positive".to_string(),
            ));
        }
        if self.popup_poll_interval_ms == 0 {
            return Err(Error::Config("popup_poll_interval_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Writes settings to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;
        tracing::info!("Config saved to {:?}", path);
        Ok(())
    }

    /// Replaces the base address with `value` when it is set and non-empty.
    pub fn apply_api_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.filter(|url| !url.trim().is_empty()) {
            self.api_base_url = url;
        }
    }

    /// Popup dimensions.
    #[must_use]
    pub const fn popup_size(&self) -> PopupSize {
        PopupSize {
            width: self.popup_width,
            height: self.popup_height,
        }
    }

    /// Interval between abandoned-popup checks, never shorter than
    /// [`MIN_POLL_INTERVAL`].
    #[must_use]
    pub fn popup_poll_interval(&self) -> Duration {
        Duration::from_millis(self.popup_poll_interval_ms).max(MIN_POLL_INTERVAL)
    }
}
