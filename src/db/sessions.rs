//! Session record persistence.
//!
//! A session is one row in `sessions` plus one row per photo in
//! `session_photos`, written in a single transaction.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::capture::{AudioRef, GeoLocation, ImageRef};
use crate::session::{PhotoCapture, RecordingSession, SessionId, SessionState};

const SESSION_COLUMNS: &str =
    "id, project_id, state, start_time, end_time, duration_seconds, audio_ref";

/// Raw `sessions` row before parsing.
struct SessionRow {
    id: String,
    project_id: String,
    state: String,
    start_time: String,
    end_time: Option<String>,
    duration_seconds: i64,
    audio_ref: Option<String>,
}

impl SessionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            state: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            duration_seconds: row.get(5)?,
            audio_ref: row.get(6)?,
        })
    }

    fn into_session(self, photos: Vec<PhotoCapture>) -> Result<RecordingSession> {
        let state = SessionState::parse(&self.state)
            .ok_or_else(|| anyhow!("Unknown session state {:?}", self.state))?;
        Ok(RecordingSession {
            id: SessionId::from(self.id),
            project_id: self.project_id,
            state,
            start_time: parse_time(&self.start_time)?,
            end_time: self.end_time.as_deref().map(parse_time).transpose()?,
            duration_seconds: u64::try_from(self.duration_seconds)
                .context("Negative duration in database")?,
            audio_ref: self.audio_ref.map(AudioRef),
            photos,
        })
    }
}

pub struct SessionRepository;

impl SessionRepository {
    /// Insert a session and its photos atomically. Returns `false` without
    /// writing anything if a session with the same id is already stored.
    pub fn insert(conn: &mut Connection, session: &RecordingSession) -> Result<bool> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to begin transaction")?;

        let exists = tx
            .query_row(
                "SELECT 1 FROM sessions WHERE id = ?1",
                [session.id.as_str()],
                |_| Ok(()),
            )
            .optional()
            .context("Failed to check for existing session")?
            .is_some();
        if exists {
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO sessions (id, project_id, state, start_time, end_time, duration_seconds, audio_ref) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session.id.as_str(),
                session.project_id,
                session.state.as_str(),
                format_time(&session.start_time),
                session.end_time.as_ref().map(format_time),
                i64::try_from(session.duration_seconds).context("Duration out of range")?,
                session.audio_ref.as_ref().map(|a| a.0.as_str()),
            ],
        )
        .context("Failed to insert session")?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO session_photos \
                     (session_id, position, image_ref, captured_at, latitude, longitude, accuracy_meters, caption) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .context("Failed to prepare photo insert")?;

            for (position, photo) in session.photos.iter().enumerate() {
                let geo = photo.geolocation;
                stmt.execute(params![
                    session.id.as_str(),
                    position as i64,
                    photo.reference.0,
                    format_time(&photo.timestamp),
                    geo.map(|g| g.latitude),
                    geo.map(|g| g.longitude),
                    geo.and_then(|g| g.accuracy_meters),
                    photo.caption,
                ])
                .with_context(|| format!("Failed to insert photo {}", position))?;
            }
        }

        tx.commit().context("Failed to commit session")?;
        Ok(true)
    }

    pub fn get(conn: &Connection, id: &SessionId) -> Result<Option<RecordingSession>> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS),
                [id.as_str()],
                SessionRow::from_row,
            )
            .optional()
            .context("Failed to query session")?;

        match row {
            Some(row) => {
                let photos = Self::photos(conn, &row.id)?;
                Ok(Some(row.into_session(photos)?))
            }
            None => Ok(None),
        }
    }

    /// All sessions in the order they were stored.
    pub fn list(conn: &Connection) -> Result<Vec<RecordingSession>> {
        Self::query_sessions(
            conn,
            &format!("SELECT {} FROM sessions ORDER BY seq ASC", SESSION_COLUMNS),
            None,
        )
    }

    /// The `limit` most recently stored sessions, newest first.
    pub fn list_recent(conn: &Connection, limit: usize) -> Result<Vec<RecordingSession>> {
        Self::query_sessions(
            conn,
            &format!(
                "SELECT {} FROM sessions ORDER BY seq DESC LIMIT ?1",
                SESSION_COLUMNS
            ),
            Some(limit as i64),
        )
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .context("Failed to count sessions")?;

        Ok(count)
    }

    fn query_sessions(
        conn: &Connection,
        sql: &str,
        limit: Option<i64>,
    ) -> Result<Vec<RecordingSession>> {
        let mut stmt = conn.prepare(sql).context("Failed to prepare query")?;
        let rows = match limit {
            Some(limit) => stmt.query_map([limit], SessionRow::from_row),
            None => stmt.query_map([], SessionRow::from_row),
        }
        .context("Failed to query sessions")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to map sessions")?;

        rows.into_iter()
            .map(|row| {
                let photos = Self::photos(conn, &row.id)?;
                row.into_session(photos)
            })
            .collect()
    }

    fn photos(conn: &Connection, session_id: &str) -> Result<Vec<PhotoCapture>> {
        let mut stmt = conn
            .prepare(
                "SELECT image_ref, captured_at, latitude, longitude, accuracy_meters, caption \
                 FROM session_photos WHERE session_id = ?1 ORDER BY position ASC",
            )
            .context("Failed to prepare photo query")?;

        let rows = stmt
            .query_map([session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })
            .context("Failed to query photos")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to map photos")?;

        rows.into_iter()
            .map(|(reference, captured_at, latitude, longitude, accuracy_meters, caption)| {
                let geolocation = match (latitude, longitude) {
                    (Some(latitude), Some(longitude)) => Some(GeoLocation {
                        latitude,
                        longitude,
                        accuracy_meters,
                    }),
                    _ => None,
                };
                Ok(PhotoCapture {
                    reference: ImageRef(reference),
                    timestamp: parse_time(&captured_at)?,
                    geolocation,
                    caption,
                })
            })
            .collect()
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp {:?}", value))?
        .with_timezone(&Utc))
}
