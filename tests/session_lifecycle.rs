mod common;

use common::{site, Harness};
use fieldrec::capture::{Capability, DeviceError};
use fieldrec::session::{ActiveSessionSlot, Outcome, SessionError, SessionManager, SessionState};
use fieldrec::store::SessionStore;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_field_visit_scenario() {
    let h = Harness::new();
    let manager = h.manager();

    let id = manager.start_session("proj-42").await.unwrap();
    assert_eq!(manager.state().await, SessionState::Recording);

    manager.capture_photo(Some("north wall".into())).await.unwrap();
    manager.capture_photo(None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(3500)).await;

    manager.pause_session().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    manager.resume_session().await.unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    manager.capture_photo(None).await.unwrap();

    let session = manager.stop_session().await.unwrap();
    assert_eq!(session.id, id);
    assert_eq!(session.state, SessionState::Terminated(Outcome::Success));
    assert_eq!(manager.state().await, SessionState::Terminated(Outcome::Success));

    let stored = manager.list_stored_sessions().await.unwrap();
    assert_eq!(stored.len(), 1);
    let stored = &stored[0];
    assert_eq!(stored.project_id, "proj-42");
    assert_eq!(stored.duration_seconds, 6);
    let refs: Vec<_> = stored.photos.iter().map(|p| p.reference.0.as_str()).collect();
    assert_eq!(refs, vec!["photo-1", "photo-2", "photo-3"]);
    assert_eq!(stored.photos[0].caption.as_deref(), Some("north wall"));
    assert_eq!(stored.photos[0].geolocation, Some(site()));
    assert!(stored.photos[0].timestamp <= stored.photos[2].timestamp);
    assert!(stored.audio_ref.is_some());
    assert!(stored.end_time.is_some());

    assert_eq!(h.recorder.releases(), 1);
    assert_eq!(h.gate.outstanding(Capability::Microphone), 0);
    assert_eq!(h.gate.outstanding(Capability::Camera), 0);
    assert!(manager.slot().is_free());
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_duration_and_keeps_photos() {
    let h = Harness::new();
    let manager = h.manager();
    manager.start_session("p").await.unwrap();
    manager.capture_photo(None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    manager.pause_session().await.unwrap();
    assert_eq!(manager.duration_seconds().await, 2);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(manager.duration_seconds().await, 2);

    manager.resume_session().await.unwrap();
    let snapshot = manager.snapshot().await.unwrap();
    assert_eq!(snapshot.photos.len(), 1);
    assert_eq!(snapshot.duration_seconds, 2);
    assert_eq!(snapshot.state, SessionState::Recording);
}

#[tokio::test]
async fn test_photo_while_paused_is_rejected() {
    let h = Harness::new();
    let manager = h.manager();
    manager.start_session("p").await.unwrap();
    manager.capture_photo(None).await.unwrap();
    manager.pause_session().await.unwrap();

    let err = manager.capture_photo(None).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidState {
            state: SessionState::Paused,
            ..
        }
    ));
    assert_eq!(manager.snapshot().await.unwrap().photos.len(), 1);
    assert_eq!(manager.state().await, SessionState::Paused);
}

#[tokio::test]
async fn test_denied_microphone_leaves_nothing_behind() {
    let h = Harness::new();
    h.gate.deny(Capability::Microphone);
    let manager = h.manager();

    let err = manager.start_session("p").await.unwrap_err();
    assert!(matches!(err, SessionError::PermissionDenied(Capability::Microphone)));
    assert_eq!(manager.state().await, SessionState::Idle);
    assert!(manager.slot().is_free());
    assert_eq!(h.recorder.starts.load(Ordering::SeqCst), 0);
    assert!(h.store.list().await.unwrap().is_empty());

    assert!(manager.stop_session().await.is_err());
    assert!(h.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_denied_camera_at_start_releases_microphone() {
    let h = Harness::new();
    h.gate.deny(Capability::Camera);
    let manager = h.manager();

    let err = manager.start_session("p").await.unwrap_err();
    assert!(matches!(err, SessionError::PermissionDenied(Capability::Camera)));
    assert_eq!(h.gate.outstanding(Capability::Microphone), 0);
    assert_eq!(manager.state().await, SessionState::Idle);
}

#[tokio::test]
async fn test_second_start_is_rejected_and_first_untouched() {
    let h = Harness::new();
    let manager = h.manager();
    let first = manager.start_session("a").await.unwrap();

    let err = manager.start_session("b").await.unwrap_err();
    match err {
        SessionError::SessionAlreadyActive { active } => assert_eq!(active, first.to_string()),
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(manager.state().await, SessionState::Recording);
    assert_eq!(manager.snapshot().await.unwrap().id, first);
    assert_eq!(h.recorder.starts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_starts_on_shared_slot() {
    let h = Harness::new();
    let slot = ActiveSessionSlot::new();
    let left = h.manager().with_slot(slot.clone());
    let right = h.manager().with_slot(slot.clone());

    let (a, b) = tokio::join!(left.start_session("a"), right.start_session("b"));
    let started = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(started, 1);
    let rejected = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert!(matches!(rejected, SessionError::SessionAlreadyActive { .. }));

    let active = [left.state().await, right.state().await]
        .iter()
        .filter(|s| s.is_active())
        .count();
    assert_eq!(active, 1);
    assert_eq!(h.recorder.open_handles(), 1);
}

#[tokio::test]
async fn test_storage_failure_retains_session_and_releases_device() {
    let h = Harness::new();
    h.store.fail_next.store(1, Ordering::SeqCst);
    let manager = h.manager();
    manager.start_session("p").await.unwrap();
    manager.capture_photo(None).await.unwrap();

    let err = manager.stop_session().await.unwrap_err();
    let retained = err.retained_session().cloned().unwrap();
    assert_eq!(retained.photos.len(), 1);
    assert!(retained.audio_ref.is_some());
    assert_eq!(manager.state().await, SessionState::Terminated(Outcome::Failed));
    assert!(manager.has_retained_session().await);
    assert_eq!(h.recorder.releases(), 1);
    assert_eq!(h.recorder.open_handles(), 0);
    assert_eq!(h.gate.outstanding(Capability::Microphone), 0);
    assert!(manager.slot().is_free());
    assert!(h.store.list().await.unwrap().is_empty());

    // A new session cannot start over an unsaved one.
    assert!(matches!(
        manager.start_session("q").await,
        Err(SessionError::InvalidState { .. })
    ));

    let saved = manager.stop_session().await.unwrap();
    assert_eq!(saved.id, retained.id);
    assert_eq!(h.recorder.releases(), 1);
    assert_eq!(h.store.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(h.store.list().await.unwrap().len(), 1);
    assert_eq!(manager.state().await, SessionState::Terminated(Outcome::Success));
    assert!(!manager.has_retained_session().await);
}

#[tokio::test]
async fn test_discard_retained_allows_new_session() {
    let h = Harness::new();
    h.store.fail_next.store(1, Ordering::SeqCst);
    let manager = h.manager();
    manager.start_session("p").await.unwrap();
    assert!(manager.stop_session().await.is_err());

    let discarded = manager.discard_retained().await.unwrap();
    assert_eq!(discarded.project_id, "p");
    assert!(manager.discard_retained().await.is_none());

    manager.start_session("q").await.unwrap();
    assert_eq!(manager.state().await, SessionState::Recording);
}

#[tokio::test]
async fn test_device_failure_on_stop() {
    let h = Harness::new();
    *h.recorder.stop_error.lock().unwrap() = Some(DeviceError::Fault("unplugged".into()));
    let manager = h.manager();
    manager.start_session("p").await.unwrap();

    let err = manager.stop_session().await.unwrap_err();
    assert!(matches!(err, SessionError::CaptureDevice(DeviceError::Fault(_))));
    assert_eq!(manager.state().await, SessionState::Terminated(Outcome::Failed));
    assert_eq!(h.recorder.releases(), 1);
    assert!(h.store.list().await.unwrap().is_empty());
    assert!(manager.slot().is_free());
}

#[tokio::test]
async fn test_fatal_pause_error_closes_session() {
    let h = Harness::new();
    *h.recorder.pause_error.lock().unwrap() = Some(DeviceError::Fault("buffer overrun".into()));
    let manager = h.manager();
    manager.start_session("p").await.unwrap();

    let err = manager.pause_session().await.unwrap_err();
    assert!(matches!(err, SessionError::CaptureDevice(_)));
    assert_eq!(manager.state().await, SessionState::Terminated(Outcome::Failed));
    assert_eq!(h.recorder.aborts.load(Ordering::SeqCst), 1);
    assert_eq!(h.recorder.releases(), 1);
    assert_eq!(h.gate.outstanding(Capability::Microphone), 0);
    assert!(manager.slot().is_free());

    assert!(matches!(
        manager.stop_session().await,
        Err(SessionError::InvalidState { .. })
    ));
    assert_eq!(h.recorder.releases(), 1);
}

#[tokio::test]
async fn test_recoverable_errors_keep_session_running() {
    let h = Harness::new();
    *h.recorder.resume_error.lock().unwrap() = Some(DeviceError::Unavailable("busy".into()));
    let manager = h.manager();
    manager.start_session("p").await.unwrap();

    *h.camera.next_error.lock().unwrap() = Some(DeviceError::Unavailable("no image".into()));
    assert!(manager.capture_photo(None).await.is_err());
    assert_eq!(manager.state().await, SessionState::Recording);
    assert_eq!(manager.snapshot().await.unwrap().photos.len(), 0);

    manager.pause_session().await.unwrap();
    assert!(manager.resume_session().await.is_err());
    assert_eq!(manager.state().await, SessionState::Paused);
    manager.resume_session().await.unwrap();

    manager.stop_session().await.unwrap();
    assert_eq!(h.recorder.stops.load(Ordering::SeqCst), 1);
    assert_eq!(h.recorder.aborts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_camera_denied_mid_session() {
    let h = Harness::new();
    let manager = h.manager();
    manager.start_session("p").await.unwrap();
    h.gate.deny(Capability::Camera);

    let err = manager.capture_photo(None).await.unwrap_err();
    assert!(matches!(err, SessionError::PermissionDenied(Capability::Camera)));
    assert_eq!(manager.state().await, SessionState::Recording);
}

#[tokio::test]
async fn test_untagged_photo_when_geolocation_denied() {
    let h = Harness::new();
    h.gate.deny(Capability::Geolocation);
    let manager = h.manager();
    manager.start_session("p").await.unwrap();

    let photo = manager.capture_photo(None).await.unwrap();
    assert!(photo.geolocation.is_none());
}

#[tokio::test]
async fn test_invalid_transitions() {
    let h = Harness::new();
    let manager = h.manager();

    assert!(matches!(
        manager.pause_session().await,
        Err(SessionError::InvalidState { .. })
    ));
    assert!(matches!(
        manager.capture_photo(None).await,
        Err(SessionError::InvalidState { .. })
    ));

    manager.start_session("p").await.unwrap();
    assert!(matches!(
        manager.resume_session().await,
        Err(SessionError::InvalidState { .. })
    ));
    assert_eq!(manager.state().await, SessionState::Recording);
}

#[tokio::test]
async fn test_sessions_run_back_to_back() {
    let h = Harness::new();
    let manager = h.manager();

    manager.start_session("a").await.unwrap();
    manager.stop_session().await.unwrap();
    manager.start_session("b").await.unwrap();
    manager.stop_session().await.unwrap();

    let stored = manager.list_stored_sessions().await.unwrap();
    let projects: Vec<_> = stored.iter().map(|s| s.project_id.as_str()).collect();
    assert_eq!(projects, vec!["a", "b"]);
    assert_eq!(h.recorder.releases(), 2);
}

#[tokio::test]
async fn test_dropping_manager_frees_shared_slot() {
    let h = Harness::new();
    let slot = ActiveSessionSlot::new();
    let manager: SessionManager = h.manager().with_slot(slot.clone());
    manager.start_session("p").await.unwrap();
    assert!(!slot.is_free());

    drop(manager);
    assert!(slot.is_free());

    for _ in 0..10 {
        if h.recorder.open_handles() == 0 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(h.recorder.open_handles(), 0);
    assert_eq!(h.recorder.aborts.load(Ordering::SeqCst), 1);
    assert_eq!(h.gate.outstanding(Capability::Microphone), 0);
}

#[tokio::test]
async fn test_shutdown_aborts_unfinished_session() {
    let h = Harness::new();
    let manager = h.manager();
    manager.start_session("p").await.unwrap();
    manager.pause_session().await.unwrap();

    manager.shutdown().await;
    assert_eq!(manager.state().await, SessionState::Terminated(Outcome::Failed));
    assert_eq!(h.recorder.open_handles(), 0);
    assert_eq!(h.recorder.aborts.load(Ordering::SeqCst), 1);
    assert!(manager.slot().is_free());
    assert!(h.store.list().await.unwrap().is_empty());

    manager.shutdown().await;
    assert_eq!(h.recorder.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_short_recording_stretches_add_up() {
    let h = Harness::new();
    let manager = h.manager();
    manager.start_session("p").await.unwrap();

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(900)).await;
        manager.pause_session().await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        manager.resume_session().await.unwrap();
    }

    let session = manager.stop_session().await.unwrap();
    assert_eq!(session.duration_seconds, 4);
}

#[tokio::test]
async fn test_retried_save_leaves_other_session_holding_slot() {
    let slot = ActiveSessionSlot::new();
    let (ha, hb, hc) = (Harness::new(), Harness::new(), Harness::new());
    ha.store.fail_next.store(1, Ordering::SeqCst);
    let a = ha.manager().with_slot(slot.clone());
    let b = hb.manager().with_slot(slot.clone());
    let c = hc.manager().with_slot(slot.clone());

    a.start_session("a").await.unwrap();
    assert!(a.stop_session().await.is_err());
    assert!(slot.is_free());

    let b_id = b.start_session("b").await.unwrap();
    a.stop_session().await.unwrap();
    assert_eq!(slot.active_session(), Some(b_id.clone()));

    match c.start_session("c").await {
        Err(SessionError::SessionAlreadyActive { active }) => assert_eq!(active, b_id.to_string()),
        other => panic!("unexpected start result {other:?}"),
    }
    assert_eq!(c.state().await, SessionState::Idle);
    assert_eq!(b.state().await, SessionState::Recording);

    b.stop_session().await.unwrap();
    assert!(slot.is_free());
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Start,
    Pause,
    Resume,
    Photo,
    Stop,
    StopWithFailedSave,
}

const COMMANDS: [Command; 6] = [
    Command::Start,
    Command::Pause,
    Command::Resume,
    Command::Photo,
    Command::Stop,
    Command::StopWithFailedSave,
];

async fn run_command(h: &Harness, manager: &SessionManager, command: Command) {
    let _ = match command {
        Command::Start => manager.start_session("walk").await.map(|_| ()),
        Command::Pause => manager.pause_session().await,
        Command::Resume => manager.resume_session().await,
        Command::Photo => manager.capture_photo(None).await.map(|_| ()),
        Command::Stop => manager.stop_session().await.map(|_| ()),
        Command::StopWithFailedSave => {
            h.store.fail_next.store(1, Ordering::SeqCst);
            let result = manager.stop_session().await.map(|_| ());
            h.store.fail_next.store(0, Ordering::SeqCst);
            result
        }
    };
}

/// Every four-step sequence of commands spread over two managers sharing a
/// slot keeps at most one session recording or paused.
#[tokio::test]
async fn test_every_short_sequence_keeps_one_active_session() {
    const STEPS: u32 = 4;
    let choices = 2 * COMMANDS.len();

    for sequence in 0..choices.pow(STEPS) {
        let slot = ActiveSessionSlot::new();
        let harnesses = [Harness::new(), Harness::new()];
        let managers = [
            harnesses[0].manager().with_slot(slot.clone()),
            harnesses[1].manager().with_slot(slot.clone()),
        ];

        let mut code = sequence;
        let mut history = Vec::new();
        for _ in 0..STEPS {
            let choice = code % choices;
            code /= choices;
            let (who, command) = (choice / COMMANDS.len(), COMMANDS[choice % COMMANDS.len()]);
            history.push((who, command));
            run_command(&harnesses[who], &managers[who], command).await;

            let mut active = Vec::new();
            for manager in &managers {
                if manager.state().await.is_active() {
                    active.push(manager.snapshot().await.unwrap().id);
                }
            }
            let open: usize = harnesses.iter().map(|h| h.recorder.open_handles()).sum();

            assert!(active.len() <= 1, "two active sessions after {history:?}");
            assert_eq!(slot.active_session(), active.first().cloned(), "after {history:?}");
            assert_eq!(slot.is_free(), active.is_empty(), "after {history:?}");
            assert_eq!(open, active.len(), "open devices after {history:?}");
        }
    }
}
