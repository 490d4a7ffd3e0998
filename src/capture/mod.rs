//! Hardware seams: capability gate and capture devices.
//!
//! Every hardware call returns an explicit `Result`, so permission and device
//! failures reach the session machine as data. Concrete implementations:
//! - `gate::ConfigCapabilityGate`: grants from the config file
//! - `mic_recorder::MicRecorder`: cpal microphone, WAV output via hound
//! - `inbox_camera::InboxCamera`: tethered-camera drop folder
//! - `location::FixedLocation`: configured coordinates

pub mod gate;
pub mod inbox_camera;
pub mod location;
pub mod mic_recorder;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub use gate::ConfigCapabilityGate;
pub use inbox_camera::InboxCamera;
pub use location::FixedLocation;
pub use mic_recorder::MicRecorder;

/// A hardware permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Microphone,
    Camera,
    Geolocation,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Microphone => "microphone",
            Self::Camera => "camera",
            Self::Geolocation => "geolocation",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityDecision {
    Granted,
    Denied,
}

/// Grants or denies hardware access. A denial is final for that request.
#[async_trait]
pub trait CapabilityGate: Send + Sync {
    async fn request(&self, capability: Capability) -> CapabilityDecision;

    /// Give back a previously granted capability.
    fn release(&self, _capability: Capability) {}
}

/// A granted capability that is released when dropped.
pub struct ScopedCapability {
    gate: Arc<dyn CapabilityGate>,
    capability: Capability,
}

impl ScopedCapability {
    /// Request `capability`; `Err` carries the denied capability.
    pub async fn acquire(
        gate: &Arc<dyn CapabilityGate>,
        capability: Capability,
    ) -> Result<Self, Capability> {
        match gate.request(capability).await {
            CapabilityDecision::Granted => Ok(Self {
                gate: Arc::clone(gate),
                capability,
            }),
            CapabilityDecision::Denied => Err(capability),
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }
}

impl Drop for ScopedCapability {
    fn drop(&mut self) {
        debug!("Releasing {} capability", self.capability);
        self.gate.release(self.capability);
    }
}

/// Opaque reference to a finished audio recording (a file path for the
/// bundled recorder).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioRef(pub String);

/// Opaque reference to a captured image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

impl fmt::Display for AudioRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
}

/// Handle to an open recording. Not `Clone`: `stop`/`abort` consume it, so a
/// handle can be released only once.
#[derive(Debug, PartialEq, Eq)]
pub struct DeviceHandle {
    id: u64,
}

impl DeviceHandle {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Used by recorders to name their output.
    pub session_id: String,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The device refused this call but is still usable.
    #[error("capture device unavailable: {0}")]
    Unavailable(String),

    /// The device is broken; the open recording cannot continue.
    #[error("capture device fault: {0}")]
    Fault(String),
}

impl DeviceError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fault(_))
    }
}

/// Audio capture device.
#[async_trait]
pub trait AudioRecorder: Send + Sync {
    async fn start(&self, options: &CaptureOptions) -> Result<DeviceHandle, DeviceError>;

    /// Suspend capture, keeping what has been buffered.
    async fn pause(&self, handle: &DeviceHandle) -> Result<(), DeviceError>;

    async fn resume(&self, handle: &DeviceHandle) -> Result<(), DeviceError>;

    /// Finish the recording and release the device.
    async fn stop(&self, handle: DeviceHandle) -> Result<AudioRef, DeviceError>;

    /// Release the device without producing a recording.
    async fn abort(&self, handle: DeviceHandle);
}

/// Still camera.
#[async_trait]
pub trait Camera: Send + Sync {
    async fn capture_photo(&self) -> Result<ImageRef, DeviceError>;
}

/// Best-effort position source.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Option<GeoLocation>;
}
