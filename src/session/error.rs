use thiserror::Error;

use super::model::{RecordingSession, SessionId, SessionState};
use crate::capture::{Capability, DeviceError};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0} permission denied")]
    PermissionDenied(Capability),

    #[error("session {active} is already active; stop it before starting another")]
    SessionAlreadyActive { active: String },

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("capture device error: {0}")]
    CaptureDevice(#[from] DeviceError),

    /// The session could not be persisted. It is handed back so nothing that
    /// was captured is lost; `stop_session` retries the save.
    #[error("failed to save session {}: {source}", .session.id)]
    Storage {
        #[source]
        source: StoreError,
        session: Box<RecordingSession>,
    },
}

impl SessionError {
    /// The unsaved session carried by a storage failure.
    pub fn retained_session(&self) -> Option<&RecordingSession> {
        match self {
            Self::Storage { session, .. } => Some(session),
            _ => None,
        }
    }

    pub(crate) fn already_active(active: Option<&SessionId>) -> Self {
        Self::SessionAlreadyActive {
            active: active
                .map(|id| id.to_string())
                .unwrap_or_else(|| "<starting>".to_string()),
        }
    }

    /// Short hint for the consumer on how to recover.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "grant the permission in settings and try again",
            Self::SessionAlreadyActive { .. } => "stop the active session first",
            Self::InvalidState { .. } => "check the session state before retrying",
            Self::CaptureDevice(e) if e.is_fatal() => {
                "the recording was closed; reconnect the device and start a new session"
            }
            Self::CaptureDevice(_) => "the device is busy; try again",
            Self::Storage { .. } => "retry saving; the captured audio and photos are kept",
        }
    }
}
