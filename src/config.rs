//! Persistent application configuration model and defaults.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::audio_player::DEFAULT_VOLUME_PERCENT;

pub const CONFIG_FILE_NAME: &str = "spoopify.toml";
const DATA_DIR_NAME: &str = "spoopify";
const DATABASE_FILE_NAME: &str = "music_player.db";

/// Root configuration persisted to `spoopify.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Library storage location.
    pub library: LibraryConfig,
    #[serde(default)]
    /// Playback preferences.
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LibraryConfig {
    /// Database file; defaults to the platform data directory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaybackConfig {
    /// Output volume in percent (0-100).
    #[serde(default = "default_volume")]
    pub volume: u8,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
        }
    }
}

fn default_volume() -> u8 {
    DEFAULT_VOLUME_PERCENT
}

pub fn sanitize_config(config: Config) -> Config {
    Config {
        library: config.library,
        playback: PlaybackConfig {
            volume: config.playback.volume.min(100),
        },
    }
}

/// Location of the config file under the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Database file used when the config does not name one.
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
        .join(DATABASE_FILE_NAME)
}

impl Config {
    pub fn database_path(&self) -> PathBuf {
        self.library
            .database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }
}

/// Reads the config at `path`, writing defaults first when the file is missing.
/// Unparseable content falls back to defaults.
pub fn load_or_create_config(path: &Path) -> Config {
    if !path.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        let default_config = Config::default();
        if let Err(err) = save_config(path, &default_config) {
            warn!("{}", err);
        }
        return default_config;
    }

    let config = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str::<Config>(&content).unwrap_or_else(|err| {
            warn!("Invalid config at {}, using defaults: {}", path.display(), err);
            Config::default()
        }),
        Err(err) => {
            warn!("Failed to read config {}: {}", path.display(), err);
            Config::default()
        }
    };
    sanitize_config(config)
}

pub fn save_config(path: &Path, config: &Config) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|err| format!("Failed to create {}: {}", parent.display(), err))?;
    }
    let config_text = toml::to_string(config)
        .map_err(|err| format!("Failed to serialize config: {}", err))?;
    std::fs::write(path, config_text)
        .map_err(|err| format!("Failed to persist config to {}: {}", path.display(), err))
}
