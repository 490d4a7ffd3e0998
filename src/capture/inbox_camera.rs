//! Camera backed by a drop folder.
//!
//! A tethered camera (or a phone sync tool) writes images into the inbox; each
//! capture takes the oldest waiting image and moves it into the media
//! directory under a content-addressed name.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{Camera, DeviceError, ImageRef};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "webp"];

#[derive(Debug, Clone)]
pub struct InboxCamera {
    inbox_dir: PathBuf,
    media_dir: PathBuf,
}

impl InboxCamera {
    pub fn new(inbox_dir: PathBuf, media_dir: PathBuf) -> Self {
        Self {
            inbox_dir,
            media_dir,
        }
    }

    pub fn inbox_dir(&self) -> &Path {
        &self.inbox_dir
    }

    fn next_image(inbox: &Path) -> Option<PathBuf> {
        let mut candidates: Vec<(SystemTime, PathBuf)> = WalkDir::new(inbox)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && is_image(entry.path()))
            .map(|entry| {
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, entry.into_path())
            })
            .collect();

        candidates.sort();
        candidates.into_iter().next().map(|(_, path)| path)
    }

    fn ingest(source: &Path, media_dir: &Path) -> Result<PathBuf> {
        let bytes = std::fs::read(source)
            .with_context(|| format!("Failed to read image {}", source.display()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = format!("{:x}", hasher.finalize());

        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg")
            .to_ascii_lowercase();
        let destination = media_dir.join(format!("{}.{}", &digest[..16], extension));

        std::fs::create_dir_all(media_dir).context("Failed to create media directory")?;
        std::fs::write(&destination, &bytes)
            .with_context(|| format!("Failed to write {}", destination.display()))?;
        std::fs::remove_file(source)
            .with_context(|| format!("Failed to remove {} from inbox", source.display()))?;

        Ok(destination)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl Camera for InboxCamera {
    async fn capture_photo(&self) -> Result<ImageRef, DeviceError> {
        let inbox = self.inbox_dir.clone();
        let media_dir = self.media_dir.clone();

        tokio::task::spawn_blocking(move || {
            let Some(source) = Self::next_image(&inbox) else {
                return Err(DeviceError::Unavailable(format!(
                    "no image waiting in {}",
                    inbox.display()
                )));
            };
            debug!("Ingesting {:?}", source);

            // A failed file move loses this photo only, not the recording.
            let stored = Self::ingest(&source, &media_dir)
                .map_err(|e| DeviceError::Unavailable(format!("{e:#}")))?;
            info!("Photo captured: {:?}", stored);
            Ok(ImageRef(stored.to_string_lossy().to_string()))
        })
        .await
        .map_err(|e| DeviceError::Fault(format!("camera task failed: {e}")))?
    }
}
