//! Audio playback for a stored session.
//!
//! Idle → Loading → Playing ⇄ Paused → Finished. The clip is loaded on the
//! first `play` and released when the player is released or dropped.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capture::AudioRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    Finished,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Finished => "finished",
        }
    }
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("session has no recorded audio")]
    NoAudio,

    #[error("failed to load audio {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("audio output error: {0}")]
    Output(String),

    #[error("cannot {operation} while {}", .state.as_str())]
    InvalidState {
        operation: &'static str,
        state: PlaybackState,
    },
}

/// Decoded interleaved 16-bit audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioClip {
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }

    fn frame_duration(&self, frames: usize) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }
}

#[async_trait]
pub trait AudioLoader: Send + Sync {
    async fn load(&self, audio: &AudioRef) -> Result<AudioClip, PlaybackError>;
}

#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Begin output of `clip` at frame `from`.
    async fn play(&self, clip: Arc<AudioClip>, from: usize) -> Result<(), PlaybackError>;

    /// Halt output and return the frame reached.
    async fn pause(&self) -> Result<usize, PlaybackError>;

    /// Frames of the current clip sent to the device so far.
    fn position(&self) -> usize;

    /// Stop output and drop any buffered clip.
    fn stop(&self);
}

pub struct AudioPlayer {
    audio: Option<AudioRef>,
    loader: Arc<dyn AudioLoader>,
    sink: Arc<dyn AudioSink>,
    clip: Option<Arc<AudioClip>>,
    state: PlaybackState,
    position: usize,
}

impl AudioPlayer {
    pub fn new(
        audio: Option<AudioRef>,
        loader: Arc<dyn AudioLoader>,
        sink: Arc<dyn AudioSink>,
    ) -> Self {
        Self {
            audio,
            loader,
            sink,
            clip: None,
            state: PlaybackState::Idle,
            position: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.clip.is_some()
    }

    /// Start or continue playback. From `Finished` this restarts at the
    /// beginning; while already playing it does nothing.
    pub async fn play(&mut self) -> Result<(), PlaybackError> {
        match self.state {
            PlaybackState::Playing => return Ok(()),
            PlaybackState::Loading => {
                return Err(PlaybackError::InvalidState {
                    operation: "play",
                    state: self.state,
                })
            }
            PlaybackState::Finished => self.position = 0,
            PlaybackState::Idle | PlaybackState::Paused => {}
        }

        let clip = match self.clip.clone() {
            Some(clip) => clip,
            None => self.load().await?,
        };

        if let Err(e) = self.sink.play(Arc::clone(&clip), self.position).await {
            warn!("Playback failed to start: {}", e);
            self.release();
            return Err(e);
        }

        self.state = PlaybackState::Playing;
        debug!("Playback started at frame {}", self.position);
        Ok(())
    }

    async fn load(&mut self) -> Result<Arc<AudioClip>, PlaybackError> {
        let Some(audio) = self.audio.clone() else {
            return Err(PlaybackError::NoAudio);
        };

        self.state = PlaybackState::Loading;
        match self.loader.load(&audio).await {
            Ok(clip) => {
                info!(
                    "Loaded {} ({:.1}s)",
                    audio,
                    clip.duration().as_secs_f64()
                );
                let clip = Arc::new(clip);
                self.clip = Some(Arc::clone(&clip));
                self.position = 0;
                Ok(clip)
            }
            Err(e) => {
                warn!("Failed to load {}: {}", audio, e);
                self.state = PlaybackState::Idle;
                Err(e)
            }
        }
    }

    pub async fn pause(&mut self) -> Result<(), PlaybackError> {
        if self.state != PlaybackState::Playing {
            return Err(PlaybackError::InvalidState {
                operation: "pause",
                state: self.state,
            });
        }

        match self.sink.pause().await {
            Ok(position) => {
                self.position = position;
                self.state = PlaybackState::Paused;
                Ok(())
            }
            Err(e) => {
                warn!("Playback failed to pause: {}", e);
                self.release();
                Err(e)
            }
        }
    }

    /// Sync the position with the output device and detect the end of the clip.
    pub fn refresh(&mut self) -> PlaybackState {
        if self.state != PlaybackState::Playing {
            return self.state;
        }
        let Some(clip) = &self.clip else {
            return self.state;
        };

        self.position = self.sink.position().min(clip.frames());
        if self.position >= clip.frames() {
            self.sink.stop();
            self.state = PlaybackState::Finished;
            debug!("Playback finished");
        }
        self.state
    }

    /// Elapsed and total playback time. Zero until the clip is loaded.
    pub fn progress(&self) -> (Duration, Duration) {
        match &self.clip {
            Some(clip) => (clip.frame_duration(self.position), clip.duration()),
            None => (Duration::ZERO, Duration::ZERO),
        }
    }

    /// Stop output and free the loaded clip.
    pub fn release(&mut self) {
        if self.clip.is_some() || self.state != PlaybackState::Idle {
            self.sink.stop();
        }
        if self.clip.take().is_some() {
            debug!("Audio clip released");
        }
        self.position = 0;
        self.state = PlaybackState::Idle;
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.release();
    }
}
