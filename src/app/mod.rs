//! Wiring of the concrete devices and the store from the loaded config.

use crate::capture::{ConfigCapabilityGate, FixedLocation, InboxCamera, MicRecorder};
use crate::config::Config;
use crate::session::{RecordingOptions, RecordingSession, SessionBackends, SessionManager};
use crate::store::SqliteSessionStore;
use crate::viewer::{CpalSink, SessionViewer, WavAudioLoader};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

pub fn open_store(config: &Config) -> Result<Arc<SqliteSessionStore>> {
    let path = config.database_path()?;
    let store = SqliteSessionStore::open(&path)
        .with_context(|| format!("Failed to open session store at {:?}", path))?;
    Ok(Arc::new(store))
}

pub fn build_backends(config: &Config) -> Result<SessionBackends> {
    let audio_dir = config.audio_dir()?;
    let inbox_dir = config.inbox_dir()?;
    let media_dir = config.media_dir()?;

    std::fs::create_dir_all(&inbox_dir)
        .with_context(|| format!("Failed to create camera inbox {:?}", inbox_dir))?;

    info!("Recordings go to {:?}", audio_dir);
    info!("Watching camera inbox {:?}", inbox_dir);

    Ok(SessionBackends {
        gate: Arc::new(ConfigCapabilityGate::new(config.capabilities.clone())),
        recorder: Arc::new(MicRecorder::new(audio_dir)?),
        camera: Arc::new(InboxCamera::new(inbox_dir, media_dir)),
        location: Arc::new(FixedLocation::from_config(&config.location)),
    })
}

pub fn build_manager(config: &Config, store: Arc<SqliteSessionStore>) -> Result<SessionManager> {
    let backends = build_backends(config)?;
    Ok(SessionManager::new(backends, store).with_options(RecordingOptions {
        sample_rate: config.recording.sample_rate,
        channels: config.recording.channels,
    }))
}

pub fn build_viewer(session: RecordingSession) -> Result<SessionViewer> {
    let sink = CpalSink::new()?;
    Ok(SessionViewer::new(
        session,
        Arc::new(WavAudioLoader),
        Arc::new(sink),
    ))
}
