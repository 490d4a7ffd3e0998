//! SQLite-backed session store.
//!
//! All writes go through one writer thread that owns the write connection, so
//! appends from this process are applied one at a time. Each append also holds
//! an exclusive lock on `<db>.lock` for other processes sharing the file.
//! Reads open their own connection on the blocking pool.

use async_trait::async_trait;
use fs2::FileExt;
use rusqlite::Connection;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::{ensure_appendable, AppendOutcome, SessionStore, StoreError};
use crate::db::{self, SessionRepository};
use crate::session::{RecordingSession, SessionId};

struct WriteRequest {
    session: RecordingSession,
    reply: oneshot::Sender<Result<AppendOutcome, StoreError>>,
}

pub struct SqliteSessionStore {
    db_path: PathBuf,
    writer: mpsc::UnboundedSender<WriteRequest>,
}

impl SqliteSessionStore {
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let db_path = db_path.into();
        let conn = db::open(&db_path).map_err(StoreError::sqlite)?;
        let lock_path = db_path.with_extension("lock");

        let (writer, requests) = mpsc::unbounded_channel();
        thread::Builder::new()
            .name("fieldrec-store".to_string())
            .spawn(move || run_writer(conn, lock_path, requests))?;

        info!("Session store opened at {:?}", db_path);
        Ok(Self { db_path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn read<T, F>(&self, query: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db::open_existing(&path)?;
            query(&conn)
        })
        .await
        .map_err(|e| StoreError::Sqlite(format!("read task failed: {}", e)))?
        .map_err(StoreError::sqlite)
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn append(&self, session: &RecordingSession) -> Result<AppendOutcome, StoreError> {
        ensure_appendable(session)?;

        let (reply, outcome) = oneshot::channel();
        self.writer
            .send(WriteRequest {
                session: session.clone(),
                reply,
            })
            .map_err(|_| StoreError::WriterClosed)?;

        outcome.await.map_err(|_| StoreError::WriterClosed)?
    }

    async fn list(&self) -> Result<Vec<RecordingSession>, StoreError> {
        self.read(SessionRepository::list).await
    }

    async fn get(&self, id: &SessionId) -> Result<Option<RecordingSession>, StoreError> {
        let id = id.clone();
        self.read(move |conn| SessionRepository::get(conn, &id)).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<RecordingSession>, StoreError> {
        self.read(move |conn| SessionRepository::list_recent(conn, limit))
            .await
    }
}

fn run_writer(
    mut conn: Connection,
    lock_path: PathBuf,
    mut requests: mpsc::UnboundedReceiver<WriteRequest>,
) {
    while let Some(WriteRequest { session, reply }) = requests.blocking_recv() {
        let result = append_locked(&mut conn, &lock_path, &session);
        match &result {
            Ok(AppendOutcome::Stored) => info!(
                "Stored session {} ({} photos)",
                session.id,
                session.photos.len()
            ),
            Ok(AppendOutcome::AlreadyStored) => {
                debug!("Session {} was already stored", session.id)
            }
            Err(e) => error!("Failed to store session {}: {}", session.id, e),
        }
        // The caller may have given up waiting; the write stands either way.
        let _ = reply.send(result);
    }
    debug!("Store writer stopped");
}

fn append_locked(
    conn: &mut Connection,
    lock_path: &Path,
    session: &RecordingSession,
) -> Result<AppendOutcome, StoreError> {
    let _lock = StoreLock::acquire(lock_path)?;
    match SessionRepository::insert(conn, session) {
        Ok(true) => Ok(AppendOutcome::Stored),
        Ok(false) => Ok(AppendOutcome::AlreadyStored),
        Err(e) => Err(StoreError::sqlite(e)),
    }
}

struct StoreLock {
    file: File,
}

impl StoreLock {
    fn acquire(path: &Path) -> Result<Self, StoreError> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        file.lock_exclusive()
            .map_err(|e| StoreError::Lock(format!("{}: {}", path.display(), e)))?;
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            debug!("Failed to release store lock: {err:?}");
        }
    }
}
