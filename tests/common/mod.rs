//! Fakes for driving the session manager without hardware.

#![allow(dead_code)]

use async_trait::async_trait;
use fieldrec::capture::{
    AudioRecorder, AudioRef, Camera, Capability, CapabilityDecision, CapabilityGate,
    CaptureOptions, DeviceError, DeviceHandle, GeoLocation, ImageRef, LocationProvider,
};
use fieldrec::session::{RecordingSession, SessionBackends, SessionId, SessionManager};
use fieldrec::store::{AppendOutcome, MemorySessionStore, SessionStore, StoreError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeGate {
    denied: Mutex<HashSet<Capability>>,
    outstanding: Mutex<HashMap<Capability, i64>>,
}

impl FakeGate {
    pub fn deny(&self, capability: Capability) {
        self.denied.lock().unwrap().insert(capability);
    }

    pub fn outstanding(&self, capability: Capability) -> i64 {
        self.outstanding
            .lock()
            .unwrap()
            .get(&capability)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CapabilityGate for FakeGate {
    async fn request(&self, capability: Capability) -> CapabilityDecision {
        if self.denied.lock().unwrap().contains(&capability) {
            return CapabilityDecision::Denied;
        }
        *self.outstanding.lock().unwrap().entry(capability).or_insert(0) += 1;
        CapabilityDecision::Granted
    }

    fn release(&self, capability: Capability) {
        *self.outstanding.lock().unwrap().entry(capability).or_insert(0) -= 1;
    }
}

/// Records every handle it opens and how each one was released.
#[derive(Default)]
pub struct FakeRecorder {
    next_id: AtomicU64,
    open: Mutex<HashSet<u64>>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub aborts: AtomicUsize,
    pub pause_error: Mutex<Option<DeviceError>>,
    pub resume_error: Mutex<Option<DeviceError>>,
    pub stop_error: Mutex<Option<DeviceError>>,
}

impl FakeRecorder {
    pub fn open_handles(&self) -> usize {
        self.open.lock().unwrap().len()
    }

    /// Handles released through either `stop` or `abort`.
    pub fn releases(&self) -> usize {
        self.stops.load(Ordering::SeqCst) + self.aborts.load(Ordering::SeqCst)
    }

    fn check_open(&self, handle: &DeviceHandle) -> Result<(), DeviceError> {
        if self.open.lock().unwrap().contains(&handle.id()) {
            Ok(())
        } else {
            Err(DeviceError::Fault(format!("handle {} not open", handle.id())))
        }
    }
}

#[async_trait]
impl AudioRecorder for FakeRecorder {
    async fn start(&self, options: &CaptureOptions) -> Result<DeviceHandle, DeviceError> {
        tokio::task::yield_now().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.open.lock().unwrap().insert(id);
        self.starts.fetch_add(1, Ordering::SeqCst);
        assert!(!options.session_id.is_empty());
        Ok(DeviceHandle::new(id))
    }

    async fn pause(&self, handle: &DeviceHandle) -> Result<(), DeviceError> {
        self.check_open(handle)?;
        match self.pause_error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn resume(&self, handle: &DeviceHandle) -> Result<(), DeviceError> {
        self.check_open(handle)?;
        match self.resume_error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn stop(&self, handle: DeviceHandle) -> Result<AudioRef, DeviceError> {
        assert!(
            self.open.lock().unwrap().remove(&handle.id()),
            "handle released twice"
        );
        self.stops.fetch_add(1, Ordering::SeqCst);
        match self.stop_error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(AudioRef(format!("/recordings/{}.wav", handle.id()))),
        }
    }

    async fn abort(&self, handle: DeviceHandle) {
        assert!(
            self.open.lock().unwrap().remove(&handle.id()),
            "handle released twice"
        );
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeCamera {
    taken: AtomicUsize,
    pub next_error: Mutex<Option<DeviceError>>,
}

#[async_trait]
impl Camera for FakeCamera {
    async fn capture_photo(&self) -> Result<ImageRef, DeviceError> {
        if let Some(e) = self.next_error.lock().unwrap().take() {
            return Err(e);
        }
        let n = self.taken.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ImageRef(format!("photo-{}", n)))
    }
}

pub struct FakeLocation(pub Option<GeoLocation>);

#[async_trait]
impl LocationProvider for FakeLocation {
    async fn current_location(&self) -> Option<GeoLocation> {
        self.0
    }
}

/// Memory store whose next `fail_next` appends fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemorySessionStore,
    pub fail_next: AtomicUsize,
    pub attempts: AtomicUsize,
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn append(&self, session: &RecordingSession) -> Result<AppendOutcome, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Sqlite("disk full".to_string()));
        }
        self.inner.append(session).await
    }

    async fn list(&self) -> Result<Vec<RecordingSession>, StoreError> {
        self.inner.list().await
    }

    async fn get(&self, id: &SessionId) -> Result<Option<RecordingSession>, StoreError> {
        self.inner.get(id).await
    }
}

pub struct Harness {
    pub gate: Arc<FakeGate>,
    pub recorder: Arc<FakeRecorder>,
    pub camera: Arc<FakeCamera>,
    pub store: Arc<FlakyStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(FakeGate::default()),
            recorder: Arc::new(FakeRecorder::default()),
            camera: Arc::new(FakeCamera::default()),
            store: Arc::new(FlakyStore::default()),
        }
    }

    pub fn backends(&self) -> SessionBackends {
        SessionBackends {
            gate: self.gate.clone(),
            recorder: self.recorder.clone(),
            camera: self.camera.clone(),
            location: Arc::new(FakeLocation(Some(site()))),
        }
    }

    pub fn manager(&self) -> SessionManager {
        SessionManager::new(self.backends(), self.store.clone())
    }
}

pub fn site() -> GeoLocation {
    GeoLocation {
        latitude: 48.8566,
        longitude: 2.3522,
        accuracy_meters: Some(5.0),
    }
}
