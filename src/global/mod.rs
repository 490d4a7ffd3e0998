use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "fieldrec";

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .context("Unable to determine config directory")
}

pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = dirs::data_dir() {
        return Ok(dir.join(APP_DIR));
    }
    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".local").join("share").join(APP_DIR));
    }
    Err(anyhow!("Unable to determine data directory"))
}

pub fn db_file() -> Result<PathBuf> {
    Ok(data_dir()?.join("sessions.db"))
}

/// Finished WAV recordings, one per session.
pub fn recordings_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join("recordings"))
}

/// Where the inbox camera picks up new images.
pub fn inbox_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join("inbox"))
}

/// Ingested photos, named by content hash.
pub fn media_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join("media"))
}
