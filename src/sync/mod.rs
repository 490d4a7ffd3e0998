//! Upload of stored sessions to a remote backend.
//!
//! No backend protocol exists yet. Sessions stay queryable in the local store
//! until one does; the shipped uploader refuses every request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::session::RecordingSession;

/// Identifier assigned by the remote side to an uploaded session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(pub String);

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("session upload is not implemented")]
    NotImplemented,
}

#[async_trait]
pub trait SessionUploader: Send + Sync {
    async fn upload_session(&self, session: &RecordingSession) -> Result<RemoteId, SyncError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnimplementedUploader;

#[async_trait]
impl SessionUploader for UnimplementedUploader {
    async fn upload_session(&self, session: &RecordingSession) -> Result<RemoteId, SyncError> {
        debug!("Upload requested for session {}, no backend configured", session.id);
        Err(SyncError::NotImplemented)
    }
}
