//! Read-only view over one stored session: audio playback and a photo gallery.
//!
//! A viewer owns a copy of the session and never writes back to the store or
//! touches the active-session slot.

mod gallery;
mod playback;
mod wav;

pub use gallery::PhotoGallery;
pub use playback::{AudioClip, AudioLoader, AudioPlayer, AudioSink, PlaybackError, PlaybackState};
pub use wav::{CpalSink, WavAudioLoader};

use std::sync::Arc;
use tracing::debug;

use crate::session::RecordingSession;

pub struct SessionViewer {
    session: RecordingSession,
    player: AudioPlayer,
    gallery: PhotoGallery,
}

impl SessionViewer {
    pub fn new(
        session: RecordingSession,
        loader: Arc<dyn AudioLoader>,
        sink: Arc<dyn AudioSink>,
    ) -> Self {
        debug!(
            "Viewing session {} ({} photos)",
            session.id,
            session.photos.len()
        );
        Self {
            player: AudioPlayer::new(session.audio_ref.clone(), loader, sink),
            gallery: PhotoGallery::new(session.photos.clone()),
            session,
        }
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.player.state()
    }

    pub async fn play(&mut self) -> Result<(), PlaybackError> {
        self.player.play().await
    }

    pub async fn pause(&mut self) -> Result<(), PlaybackError> {
        self.player.pause().await
    }

    pub fn player(&self) -> &AudioPlayer {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut AudioPlayer {
        &mut self.player
    }

    pub fn gallery(&self) -> &PhotoGallery {
        &self.gallery
    }

    pub fn gallery_mut(&mut self) -> &mut PhotoGallery {
        &mut self.gallery
    }

    /// Tear the view down, stopping playback and freeing the loaded audio.
    /// Dropping the viewer does the same.
    pub fn close(mut self) {
        self.player.release();
        debug!("Closed viewer for session {}", self.session.id);
    }
}
