mod common;

use common::Harness;
use fieldrec::session::{Outcome, RecordingSession, SessionManager, SessionState};
use fieldrec::store::{AppendOutcome, SessionStore, SqliteSessionStore};
use std::sync::Arc;
use tempfile::TempDir;

fn completed(project: &str) -> RecordingSession {
    let mut session = RecordingSession::new(project);
    session.state = SessionState::Terminated(Outcome::Success);
    session.duration_seconds = 12;
    session
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_stop_stores_one_entry() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteSessionStore::open(dir.path().join("sessions.db")).unwrap());
    let session = completed("dup");

    let (a, b) = tokio::join!(
        {
            let store = store.clone();
            let session = session.clone();
            tokio::spawn(async move { store.append(&session).await })
        },
        {
            let store = store.clone();
            let session = session.clone();
            tokio::spawn(async move { store.append(&session).await })
        }
    );

    let mut outcomes = vec![a.unwrap().unwrap(), b.unwrap().unwrap()];
    outcomes.sort_by_key(|o| matches!(o, AppendOutcome::AlreadyStored));
    assert_eq!(outcomes, vec![AppendOutcome::Stored, AppendOutcome::AlreadyStored]);

    let listed = store.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0], session);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_handles_on_one_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sessions.db");
    let left = Arc::new(SqliteSessionStore::open(&path).unwrap());
    let right = Arc::new(SqliteSessionStore::open(&path).unwrap());

    let mut tasks = Vec::new();
    for i in 0..10 {
        let store = if i % 2 == 0 { left.clone() } else { right.clone() };
        tasks.push(tokio::spawn(async move {
            store.append(&completed(&format!("p{}", i))).await
        }));
    }
    // The same session through both handles.
    let shared = completed("shared");
    let first = left.append(&shared).await.unwrap();
    let second = right.append(&shared).await.unwrap();
    assert_eq!(first, AppendOutcome::Stored);
    assert_eq!(second, AppendOutcome::AlreadyStored);

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), AppendOutcome::Stored);
    }

    assert_eq!(left.list().await.unwrap().len(), 11);
    assert_eq!(right.list_recent(3).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_recorded_session_round_trips_through_sqlite() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteSessionStore::open(dir.path().join("sessions.db")).unwrap());
    let h = Harness::new();
    let manager = SessionManager::new(h.backends(), store.clone());

    manager.start_session("round-trip").await.unwrap();
    for caption in ["one", "", "three"] {
        manager.capture_photo(Some(caption.to_string())).await.unwrap();
    }
    let in_memory = manager.stop_session().await.unwrap();

    let stored = store.list().await.unwrap();
    assert_eq!(stored, vec![in_memory.clone()]);
    assert_eq!(
        stored[0].photos.iter().map(|p| p.timestamp).collect::<Vec<_>>(),
        in_memory.photos.iter().map(|p| p.timestamp).collect::<Vec<_>>()
    );
    assert!(stored[0].photos[1].caption.is_none());

    let reopened = SqliteSessionStore::open(dir.path().join("sessions.db")).unwrap();
    assert_eq!(reopened.get(&in_memory.id).await.unwrap(), Some(in_memory));
}
