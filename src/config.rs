//! Settings parser for `<config_dir>/lumina/config.toml`

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const APP_DIR: &str = "lumina";
const CONFIG_FILENAME: &str = "config.toml";

pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub thinking_budget: u32,
    /// Streams replies fragment by fragment when true.
    pub stream: bool,
    pub data_dir: Option<PathBuf>,
    /// Extra font with Arabic coverage, tried before the system fallbacks.
    pub font_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.8,
            thinking_budget: 4000,
            stream: true,
            data_dir: None,
            font_path: None,
        }
    }
}

impl Settings {
    /// Directory holding the persisted thread collection.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
        })
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(api_key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY")) {
            self.api_key = api_key;
        }
        if let Some(model) = non_empty("LUMINA_MODEL") {
            self.model = model;
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILENAME)
}

pub fn read_settings(path: &Path) -> Result<Option<Settings>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(toml::from_str(&content)?))
}

/// Loads settings from `path`, falling back to defaults when the file is
/// missing or unreadable, then applies environment overrides.
pub fn load_settings(path: &Path) -> Settings {
    let mut settings = match read_settings(path) {
        Ok(Some(settings)) => {
            debug!("Loaded settings from {:?}", path);
            settings
        }
        Ok(None) => {
            debug!("No config file at {:?}, using defaults", path);
            Settings::default()
        }
        Err(e) => {
            warn!("Ignoring config {:?}: {}", path, e);
            Settings::default()
        }
    };
    settings.apply_env_overrides(|key| std::env::var(key).ok());
    settings
}
