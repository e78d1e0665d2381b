use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::Medium;
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Words per day when neither the reading nor its medium sets a speed
    #[serde(default = "default_words_per_day")]
    pub default_words_per_day: u32,
    #[serde(default)]
    pub reading_speeds: ReadingSpeeds,
    /// Readings shown on each side by `inspect`
    #[serde(default = "default_inspect_window")]
    pub inspect_window: usize,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

/// Default words per day for each medium
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingSpeeds {
    #[serde(default = "default_kindle_speed")]
    pub kindle: u32,
    #[serde(default = "default_hardcover_speed")]
    pub hardcover: u32,
    #[serde(default = "default_audio_speed")]
    pub audio: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: default_log_level(),
            default_words_per_day: default_words_per_day(),
            reading_speeds: ReadingSpeeds::default(),
            inspect_window: default_inspect_window(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

impl Default for ReadingSpeeds {
    fn default() -> Self {
        Self {
            kindle: default_kindle_speed(),
            hardcover: default_hardcover_speed(),
            audio: default_audio_speed(),
        }
    }
}

impl ReadingSpeeds {
    pub fn for_medium(&self, medium: Medium) -> u32 {
        match medium {
            Medium::Kindle => self.kindle,
            Medium::Hardcover => self.hardcover,
            Medium::Audio => self.audio,
        }
    }
}

// Default value functions
fn default_database_path() -> String {
    // Fallback only; the profile decides the real path at load time
    if let Some(data_dir) = utils::get_data_dir(utils::Profile::Prod) {
        data_dir.join("readings.db").to_string_lossy().to_string()
    } else {
        "~/.local/share/reading-chain/readings.db".to_string()
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_words_per_day() -> u32 {
    5000
}

fn default_kindle_speed() -> u32 {
    10000
}

fn default_hardcover_speed() -> u32 {
    12500
}

fn default_audio_speed() -> u32 {
    20000
}

fn default_inspect_window() -> usize {
    2
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
}

impl Config {
    /// Load configuration from file, or create default if missing
    /// Uses the provided profile to determine config and database paths
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            let mut config: Config = toml::from_str(&contents)?;

            // Keep the database inside the profile's data dir
            config.database_path = Self::default_database_path_for_profile(profile);

            Ok(config)
        } else {
            let mut config = Config::default();
            config.database_path = Self::default_database_path_for_profile(profile);
            // Logging is not up yet; the config decides its level
            let save_result = config.save_to(&config_path);
            if let Err(ref e) = save_result {
                eprintln!("ERROR: Failed to save config file: {}", e);
                eprintln!("Config path: {:?}", config_path);
            }
            save_result?;
            Ok(config)
        }
    }

    /// Load an explicit config file; its `database_path` is used as written
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Ok(toml::from_str(&contents)?)
    }

    /// Write configuration to `path`, creating parent directories
    pub fn save_to(&mut self, path: &Path) -> Result<(), ConfigError> {
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join("readings.db").to_string_lossy().to_string()
        } else {
            match profile {
                utils::Profile::Dev => "~/.local/share/reading-chain-dev/readings.db".to_string(),
                utils::Profile::Prod => "~/.local/share/reading-chain/readings.db".to_string(),
            }
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    /// Default reading speed for a medium
    pub fn words_per_day(&self, medium: Medium) -> u32 {
        match self.reading_speeds.for_medium(medium) {
            0 => self.default_words_per_day.max(1),
            speed => speed,
        }
    }
}
