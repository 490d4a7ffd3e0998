//! Session data model shared by the state machine, the store and the viewer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capture::{AudioRef, GeoLocation, ImageRef};

/// Unique identifier generated when a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
}

/// Phase of a recording session lifecycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    Paused,
    Stopping,
    Terminated(Outcome),
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Terminated(Outcome::Success) => "completed",
            Self::Terminated(Outcome::Failed) => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "recording" => Some(Self::Recording),
            "paused" => Some(Self::Paused),
            "stopping" => Some(Self::Stopping),
            "completed" => Some(Self::Terminated(Outcome::Success)),
            "failed" => Some(Self::Terminated(Outcome::Failed)),
            _ => None,
        }
    }

    /// Recording or paused: the session holds the capture device.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single photo taken during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoCapture {
    pub reference: ImageRef,
    pub timestamp: DateTime<Utc>,
    pub geolocation: Option<GeoLocation>,
    pub caption: Option<String>,
}

/// One continuous recording episode tied to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSession {
    pub id: SessionId,
    pub project_id: String,
    pub state: SessionState,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: u64,
    pub audio_ref: Option<AudioRef>,
    pub photos: Vec<PhotoCapture>,
}

impl RecordingSession {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            id: SessionId::generate(),
            project_id: project_id.into(),
            state: SessionState::Recording,
            start_time: Utc::now(),
            end_time: None,
            duration_seconds: 0,
            audio_ref: None,
            photos: Vec::new(),
        }
    }

    pub fn photo_count(&self) -> usize {
        self.photos.len()
    }

    /// `mm:ss` of recorded time, for summaries.
    pub fn duration_label(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.duration_seconds / 60,
            self.duration_seconds % 60
        )
    }
}
