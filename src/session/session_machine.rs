//! Recording session lifecycle orchestrator.
//!
//! idle → recording ⇄ paused → stopping → terminated(success | failed)
//!
//! All hardware and storage dependencies are injected via the constructor.
//! The device handle is released exactly once on every path into
//! `Terminated`, and the duration timer is stopped on every path out of
//! `Recording`.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::error::SessionError;
use super::model::{Outcome, PhotoCapture, RecordingSession, SessionId, SessionState};
use super::photo::PhotoPipeline;
use super::slot::ActiveSessionSlot;
use super::timer::DurationTimer;
use crate::capture::{
    AudioRecorder, Camera, Capability, CapabilityGate, CaptureOptions, DeviceError, DeviceHandle,
    LocationProvider, ScopedCapability,
};
use crate::store::{SessionStore, StoreError};

/// Hardware collaborators of the session machine.
#[derive(Clone)]
pub struct SessionBackends {
    pub gate: Arc<dyn CapabilityGate>,
    pub recorder: Arc<dyn AudioRecorder>,
    pub camera: Arc<dyn Camera>,
    pub location: Arc<dyn LocationProvider>,
}

#[derive(Debug, Clone, Copy)]
pub struct RecordingOptions {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
        }
    }
}

#[derive(Default)]
struct Inner {
    state: SessionState,
    session: Option<RecordingSession>,
    handle: Option<DeviceHandle>,
    microphone: Option<ScopedCapability>,
    timer: DurationTimer,
    /// The session in `session` failed to save and awaits a retry.
    retained: bool,
    /// Session id this manager holds the active slot for.
    holding: Option<SessionId>,
}

pub struct SessionManager {
    recorder: Arc<dyn AudioRecorder>,
    gate: Arc<dyn CapabilityGate>,
    photos: PhotoPipeline,
    store: Arc<dyn SessionStore>,
    slot: ActiveSessionSlot,
    options: RecordingOptions,
    inner: Mutex<Inner>,
}

impl SessionManager {
    pub fn new(backends: SessionBackends, store: Arc<dyn SessionStore>) -> Self {
        Self {
            recorder: backends.recorder,
            photos: PhotoPipeline::new(Arc::clone(&backends.gate), backends.camera, backends.location),
            gate: backends.gate,
            store,
            slot: ActiveSessionSlot::new(),
            options: RecordingOptions::default(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Share an active-session slot with other managers so that at most one
    /// of them records at a time.
    pub fn with_slot(mut self, slot: ActiveSessionSlot) -> Self {
        self.slot = slot;
        self
    }

    pub fn with_options(mut self, options: RecordingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn slot(&self) -> &ActiveSessionSlot {
        &self.slot
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Seconds spent in `Recording` for the current or last session.
    pub async fn duration_seconds(&self) -> u64 {
        self.inner.lock().await.timer.seconds()
    }

    /// The current (or last finished) session with its live duration.
    pub async fn snapshot(&self) -> Option<RecordingSession> {
        let inner = self.inner.lock().await;
        inner.session.clone().map(|mut session| {
            if !inner.state.is_terminated() {
                session.duration_seconds = inner.timer.seconds();
                session.state = inner.state;
            }
            session
        })
    }

    /// Start a new session for `project_id`.
    pub async fn start_session(&self, project_id: &str) -> Result<SessionId, SessionError> {
        if let Err(holder) = self.slot.try_claim() {
            warn!("Start rejected, a session is already active");
            return Err(SessionError::already_active(holder.as_ref()));
        }

        let mut inner = self.inner.lock().await;
        match self.start_locked(&mut inner, project_id).await {
            Ok(id) => {
                self.slot.activate(id.clone());
                inner.holding = Some(id.clone());
                info!("Session {} recording for project {}", id, project_id);
                Ok(id)
            }
            Err(e) => {
                self.slot.abandon_claim();
                warn!("Session start failed: {}", e);
                Err(e)
            }
        }
    }

    async fn start_locked(&self, inner: &mut Inner, project_id: &str) -> Result<SessionId, SessionError> {
        let startable = matches!(inner.state, SessionState::Idle | SessionState::Terminated(_));
        if !startable || inner.retained {
            return Err(SessionError::InvalidState {
                operation: "start a session",
                state: inner.state,
            });
        }

        let microphone = ScopedCapability::acquire(&self.gate, Capability::Microphone)
            .await
            .map_err(SessionError::PermissionDenied)?;
        // Camera access is checked up front and re-acquired for each photo.
        drop(
            ScopedCapability::acquire(&self.gate, Capability::Camera)
                .await
                .map_err(SessionError::PermissionDenied)?,
        );

        let mut session = RecordingSession::new(project_id);
        let options = CaptureOptions {
            session_id: session.id.to_string(),
            sample_rate: self.options.sample_rate,
            channels: self.options.channels,
        };
        let handle = self.recorder.start(&options).await?;

        session.state = SessionState::Recording;
        let id = session.id.clone();
        inner.timer.reset();
        inner.timer.start();
        inner.session = Some(session);
        inner.handle = Some(handle);
        inner.microphone = Some(microphone);
        inner.state = SessionState::Recording;
        Ok(id)
    }

    pub async fn pause_session(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Recording {
            return Err(SessionError::InvalidState {
                operation: "pause",
                state: inner.state,
            });
        }

        let result = match inner.handle.as_ref() {
            Some(handle) => self.recorder.pause(handle).await,
            None => Err(DeviceError::Fault("no open device handle".to_string())),
        };

        match result {
            Ok(()) => {
                inner.timer.stop();
                self.set_state(&mut inner, SessionState::Paused);
                info!("Session paused at {}s", inner.timer.seconds());
                Ok(())
            }
            Err(e) => Err(self.device_failure(&mut inner, e).await),
        }
    }

    pub async fn resume_session(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Paused {
            return Err(SessionError::InvalidState {
                operation: "resume",
                state: inner.state,
            });
        }

        let result = match inner.handle.as_ref() {
            Some(handle) => self.recorder.resume(handle).await,
            None => Err(DeviceError::Fault("no open device handle".to_string())),
        };

        match result {
            Ok(()) => {
                inner.timer.start();
                self.set_state(&mut inner, SessionState::Recording);
                info!("Session resumed");
                Ok(())
            }
            Err(e) => Err(self.device_failure(&mut inner, e).await),
        }
    }

    /// Take a photo and append it to the active session. Only valid while
    /// recording; a paused session does not accept photos.
    pub async fn capture_photo(&self, caption: Option<String>) -> Result<PhotoCapture, SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Recording {
            return Err(SessionError::InvalidState {
                operation: "capture a photo",
                state: inner.state,
            });
        }

        match self.photos.capture(caption).await {
            Ok(photo) => {
                let Some(session) = inner.session.as_mut() else {
                    return Err(SessionError::InvalidState {
                        operation: "capture a photo",
                        state: inner.state,
                    });
                };
                session.photos.push(photo.clone());
                info!("Session {} now has {} photos", session.id, session.photos.len());
                Ok(photo)
            }
            Err(SessionError::CaptureDevice(e)) => Err(self.device_failure(&mut inner, e).await),
            Err(e) => Err(e),
        }
    }

    /// Stop the active session and save it.
    ///
    /// After a storage failure the session is kept in memory and calling this
    /// again retries the save without touching the device.
    pub async fn stop_session(&self) -> Result<RecordingSession, SessionError> {
        let mut inner = self.inner.lock().await;
        let state = inner.state;
        match state {
            SessionState::Recording | SessionState::Paused => self.stop_locked(&mut inner).await,
            SessionState::Terminated(Outcome::Failed) if inner.retained => {
                info!("Retrying save of retained session");
                match inner.session.clone() {
                    Some(session) => self.persist_locked(&mut inner, session).await,
                    None => Err(SessionError::InvalidState {
                        operation: "stop",
                        state,
                    }),
                }
            }
            _ => Err(SessionError::InvalidState {
                operation: "stop",
                state,
            }),
        }
    }

    async fn stop_locked(&self, inner: &mut Inner) -> Result<RecordingSession, SessionError> {
        inner.timer.stop();
        inner.state = SessionState::Stopping;

        let stopped = match inner.handle.take() {
            Some(handle) => self.recorder.stop(handle).await,
            None => Err(DeviceError::Fault("no open device handle".to_string())),
        };
        inner.microphone = None;

        let Some(mut session) = inner.session.take() else {
            self.terminate(inner, Outcome::Failed);
            return Err(SessionError::InvalidState {
                operation: "stop",
                state: SessionState::Stopping,
            });
        };
        session.duration_seconds = inner.timer.seconds();
        session.end_time = Some(Utc::now());

        match stopped {
            Ok(audio) => {
                session.audio_ref = Some(audio);
                self.persist_locked(inner, session).await
            }
            Err(e) => {
                error!("Capture device failed while stopping session {}: {}", session.id, e);
                session.state = SessionState::Terminated(Outcome::Failed);
                inner.session = Some(session);
                self.terminate(inner, Outcome::Failed);
                Err(e.into())
            }
        }
    }

    async fn persist_locked(
        &self,
        inner: &mut Inner,
        mut session: RecordingSession,
    ) -> Result<RecordingSession, SessionError> {
        session.state = SessionState::Terminated(Outcome::Success);

        match self.store.append(&session).await {
            Ok(outcome) => {
                info!(
                    "Session {} saved ({:?}): {}s, {} photos",
                    session.id,
                    outcome,
                    session.duration_seconds,
                    session.photos.len()
                );
                inner.retained = false;
                inner.session = Some(session.clone());
                self.terminate(inner, Outcome::Success);
                Ok(session)
            }
            Err(source) => Err(self.storage_failure(inner, session, source)),
        }
    }

    fn storage_failure(
        &self,
        inner: &mut Inner,
        mut session: RecordingSession,
        source: StoreError,
    ) -> SessionError {
        error!("Failed to save session {}: {}", session.id, source);
        session.state = SessionState::Terminated(Outcome::Failed);
        inner.retained = true;
        inner.session = Some(session.clone());
        self.terminate(inner, Outcome::Failed);
        SessionError::Storage {
            source,
            session: Box::new(session),
        }
    }

    /// Handle a device error from pause, resume or photo capture. Faults close
    /// the session; recoverable errors leave the state as it was.
    async fn device_failure(&self, inner: &mut Inner, e: DeviceError) -> SessionError {
        if !e.is_fatal() {
            warn!("Recoverable capture device error: {}", e);
            return e.into();
        }

        error!("Capture device fault, closing session: {}", e);
        inner.timer.stop();
        if let Some(handle) = inner.handle.take() {
            self.recorder.abort(handle).await;
        }
        inner.microphone = None;
        if let Some(session) = inner.session.as_mut() {
            session.duration_seconds = inner.timer.seconds();
            session.end_time = Some(Utc::now());
            session.state = SessionState::Terminated(Outcome::Failed);
        }
        self.terminate(inner, Outcome::Failed);
        e.into()
    }

    fn set_state(&self, inner: &mut Inner, state: SessionState) {
        inner.state = state;
        if let Some(session) = inner.session.as_mut() {
            session.state = state;
        }
    }

    fn terminate(&self, inner: &mut Inner, outcome: Outcome) {
        inner.timer.stop();
        inner.state = SessionState::Terminated(outcome);
        if let Some(id) = inner.holding.take() {
            self.slot.release(&id);
        }
    }

    /// Give up on a session whose save failed, returning it to the caller.
    pub async fn discard_retained(&self) -> Option<RecordingSession> {
        let mut inner = self.inner.lock().await;
        if !inner.retained {
            return None;
        }
        inner.retained = false;
        warn!("Retained session discarded by caller");
        inner.session.clone()
    }

    pub async fn has_retained_session(&self) -> bool {
        self.inner.lock().await.retained
    }

    /// Abort an unfinished session: the capture device is closed without
    /// saving and the session ends as failed. Nothing happens once the
    /// session has terminated.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_active() {
            return;
        }

        warn!("Shutting down with an unfinished session");
        inner.timer.stop();
        if let Some(handle) = inner.handle.take() {
            self.recorder.abort(handle).await;
        }
        inner.microphone = None;
        let duration_seconds = inner.timer.seconds();
        if let Some(session) = inner.session.as_mut() {
            session.duration_seconds = duration_seconds;
            session.end_time = Some(Utc::now());
            session.state = SessionState::Terminated(Outcome::Failed);
        }
        self.terminate(&mut inner, Outcome::Failed);
    }

    /// All sessions saved so far, in the order they were saved.
    pub async fn list_stored_sessions(&self) -> Result<Vec<RecordingSession>, StoreError> {
        self.store.list().await
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if let Some(handle) = inner.handle.take() {
            warn!("Session manager dropped with an open capture device, aborting it");
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let recorder = Arc::clone(&self.recorder);
                    runtime.spawn(async move { recorder.abort(handle).await });
                }
                Err(_) => error!("No runtime to abort the capture device on drop"),
            }
        }
        if let Some(id) = inner.holding.take() {
            self.slot.release(&id);
        }
    }
}
