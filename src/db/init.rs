use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the session database at `path` and bring the
/// schema up to date.
pub fn open(path: &Path) -> Result<Connection> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(path).context("Failed to open database connection")?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("Failed to set busy timeout")?;
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .context("Failed to enable WAL journal")?;
    debug!("Opened {:?} (journal_mode={})", path, mode);
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("Failed to enable foreign keys")?;

    migrate(&conn)?;

    Ok(conn)
}

/// Open a database that `open` has already initialised, for reading.
pub fn open_existing(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .context("Failed to open database connection")?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("Failed to set busy timeout")?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    // `seq` records append order; `id` is the session's own identifier.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            project_id TEXT NOT NULL,
            state TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT,
            duration_seconds INTEGER NOT NULL,
            audio_ref TEXT,
            stored_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create sessions table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_id)",
        [],
    )
    .context("Failed to create sessions project index")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS session_photos (
            session_id TEXT NOT NULL REFERENCES sessions(id),
            position INTEGER NOT NULL,
            image_ref TEXT NOT NULL,
            captured_at TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            accuracy_meters REAL,
            caption TEXT,
            PRIMARY KEY (session_id, position)
        )",
        [],
    )
    .context("Failed to create session_photos table")?;

    Ok(())
}
