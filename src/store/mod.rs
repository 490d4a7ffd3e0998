//! Durable store of finished sessions.
//!
//! Append-only: sessions are added once and never updated or deleted.

mod sqlite;

pub use sqlite::SqliteSessionStore;

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::session::{Outcome, RecordingSession, SessionId, SessionState};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("session {id} rejected: {reason}")]
    Rejected { id: String, reason: String },

    #[error("store writer is not running")]
    WriterClosed,

    #[error("failed to lock store: {0}")]
    Lock(String),
}

impl StoreError {
    pub(crate) fn sqlite(err: anyhow::Error) -> Self {
        Self::Sqlite(format!("{:#}", err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Stored,
    /// A session with this id was stored earlier; nothing was written.
    AlreadyStored,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a completed session together with its photos, all or nothing.
    async fn append(&self, session: &RecordingSession) -> Result<AppendOutcome, StoreError>;

    /// Every stored session in append order, photos in capture order.
    async fn list(&self) -> Result<Vec<RecordingSession>, StoreError>;

    async fn get(&self, id: &SessionId) -> Result<Option<RecordingSession>, StoreError>;

    /// The `limit` most recently appended sessions, newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<RecordingSession>, StoreError> {
        let mut sessions = self.list().await?;
        sessions.reverse();
        sessions.truncate(limit);
        Ok(sessions)
    }
}

/// Only successfully completed sessions may be stored.
pub(crate) fn ensure_appendable(session: &RecordingSession) -> Result<(), StoreError> {
    if session.state == SessionState::Terminated(Outcome::Success) {
        return Ok(());
    }
    Err(StoreError::Rejected {
        id: session.id.to_string(),
        reason: format!("state is {}, expected completed", session.state),
    })
}

/// In-process store, useful where nothing has to outlive the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<Vec<RecordingSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<RecordingSession>>, StoreError> {
        self.sessions
            .lock()
            .map_err(|_| StoreError::Lock("memory store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn append(&self, session: &RecordingSession) -> Result<AppendOutcome, StoreError> {
        ensure_appendable(session)?;
        let mut sessions = self.lock()?;
        if sessions.iter().any(|s| s.id == session.id) {
            debug!("Session {} already stored", session.id);
            return Ok(AppendOutcome::AlreadyStored);
        }
        sessions.push(session.clone());
        Ok(AppendOutcome::Stored)
    }

    async fn list(&self) -> Result<Vec<RecordingSession>, StoreError> {
        Ok(self.lock()?.clone())
    }

    async fn get(&self, id: &SessionId) -> Result<Option<RecordingSession>, StoreError> {
        Ok(self.lock()?.iter().find(|s| &s.id == id).cloned())
    }
}
