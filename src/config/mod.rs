use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub recording: RecordingConfig,
    pub camera: CameraConfig,
    pub capabilities: CapabilitiesConfig,
    pub location: LocationConfig,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Defaults to `sessions.db` in the data directory.
    pub database_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub audio_dir: Option<String>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            audio_dir: None,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Drop folder a tethered camera writes into.
    pub inbox_dir: Option<String>,
    pub media_dir: Option<String>,
}

/// Which capabilities the user has granted to the app.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitiesConfig {
    pub microphone: bool,
    pub camera: bool,
    pub geolocation: bool,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            microphone: true,
            camera: true,
            geolocation: true,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy_meters: Option<f64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        resolve(self.storage.database_path.as_deref(), global::db_file)
    }

    pub fn audio_dir(&self) -> Result<PathBuf> {
        resolve(self.recording.audio_dir.as_deref(), global::recordings_dir)
    }

    pub fn inbox_dir(&self) -> Result<PathBuf> {
        resolve(self.camera.inbox_dir.as_deref(), global::inbox_dir)
    }

    pub fn media_dir(&self) -> Result<PathBuf> {
        resolve(self.camera.media_dir.as_deref(), global::media_dir)
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}

fn resolve(configured: Option<&str>, fallback: fn() -> Result<PathBuf>) -> Result<PathBuf> {
    match configured {
        Some(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
        _ => fallback(),
    }
}
