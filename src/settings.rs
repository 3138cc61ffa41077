//! Application settings persisted as JSON
//!
//! Settings are stored at `~/.config/audiobox/settings.json`.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio::DeviceEngineFactory;
use crate::error::SettingsError;

const APP_DIR: &str = "audiobox";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where record items write their takes
    pub recordings_dir: PathBuf,
    /// Capture sample rate requested from the input device
    pub sample_rate: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            recordings_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("recordings"),
            sample_rate: 48000,
        }
    }
}

impl Settings {
    /// Get the default settings path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(SETTINGS_FILE)
    }

    /// Load from the default path
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(&Self::default_path())
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let io_error = |source: std::io::Error| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents).map_err(io_error)?;
        Ok(())
    }

    /// Engine factory honoring these settings
    pub fn engine_factory(&self) -> DeviceEngineFactory {
        DeviceEngineFactory::new(self.sample_rate)
    }
}
