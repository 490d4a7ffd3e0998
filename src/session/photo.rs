//! Photo capture pipeline: one scoped camera grant per photo, best-effort
//! geotag.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::SessionError;
use super::model::PhotoCapture;
use crate::capture::{Camera, Capability, CapabilityGate, GeoLocation, LocationProvider, ScopedCapability};

#[derive(Clone)]
pub(crate) struct PhotoPipeline {
    gate: Arc<dyn CapabilityGate>,
    camera: Arc<dyn Camera>,
    location: Arc<dyn LocationProvider>,
}

impl PhotoPipeline {
    pub(crate) fn new(
        gate: Arc<dyn CapabilityGate>,
        camera: Arc<dyn Camera>,
        location: Arc<dyn LocationProvider>,
    ) -> Self {
        Self {
            gate,
            camera,
            location,
        }
    }

    /// Capture one photo. The camera grant is released before this returns,
    /// on success and on error.
    pub(crate) async fn capture(&self, caption: Option<String>) -> Result<PhotoCapture, SessionError> {
        let reference = {
            let _camera = ScopedCapability::acquire(&self.gate, Capability::Camera)
                .await
                .map_err(SessionError::PermissionDenied)?;
            self.camera.capture_photo().await?
        };
        let timestamp = Utc::now();
        let geolocation = self.locate().await;

        info!(
            "Photo {} captured (geotagged: {})",
            reference,
            geolocation.is_some()
        );

        Ok(PhotoCapture {
            reference,
            timestamp,
            geolocation,
            caption: caption.filter(|c| !c.trim().is_empty()),
        })
    }

    async fn locate(&self) -> Option<GeoLocation> {
        let Ok(_grant) = ScopedCapability::acquire(&self.gate, Capability::Geolocation).await else {
            debug!("Geolocation denied, photo left untagged");
            return None;
        };
        self.location.current_location().await
    }
}
