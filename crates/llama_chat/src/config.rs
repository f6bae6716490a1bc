use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "llama-chat";

/// How image attachments are drawn inside bubbles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    /// Two-column cells painted with the pixel color as background.
    #[default]
    Blocks,
    /// Glyphs picked by tonal density, colored with the pixel color.
    Ascii,
}

/// User configuration, read from `<config_dir>/llama-chat/config.json`.
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub model: Option<String>,
    pub image_style: ImageStyle,
    /// Show a notification when writing to the clipboard fails.
    pub notify_clipboard_errors: bool,
    /// Show a notification when the image picker is dismissed without a selection.
    pub notify_picker_cancel: bool,
    pub notification_timeout_ms: u64,
    /// Root for chat history files; defaults to the platform data directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: llm::ollama::DEFAULT_BASE_URL.to_string(),
            model: None,
            image_style: ImageStyle::Blocks,
            notify_clipboard_errors: false,
            notify_picker_cancel: false,
            notification_timeout_ms: 3000,
            data_dir: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.json"))
    }

    /// Load configuration. An explicitly given file must exist; the default
    /// location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Apply environment overrides (`OLLAMA_HOST`).
    pub fn apply_env(&mut self, ollama_host: Option<String>) {
        if let Some(host) = ollama_host.filter(|h| !h.trim().is_empty()) {
            let host = host.trim();
            self.base_url = if host.starts_with("http://") || host.starts_with("https://") {
                host.to_string()
            } else {
                format!("http://{host}")
            };
        }
    }

    /// Directory that holds logs and the `chats/` store.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_NAME))
            .context("Could not determine the user data directory")
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_millis(self.notification_timeout_ms)
    }
}
