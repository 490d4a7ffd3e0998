use async_trait::async_trait;

use super::{GeoLocation, LocationProvider};
use crate::config::LocationConfig;

/// Reports a fixed position, or nothing when no coordinates are configured.
#[derive(Debug, Clone, Default)]
pub struct FixedLocation {
    position: Option<GeoLocation>,
}

impl FixedLocation {
    pub fn new(position: Option<GeoLocation>) -> Self {
        Self { position }
    }

    pub fn from_config(config: &LocationConfig) -> Self {
        let position = match (config.latitude, config.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoLocation {
                latitude,
                longitude,
                accuracy_meters: config.accuracy_meters,
            }),
            _ => None,
        };
        Self { position }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_location(&self) -> Option<GeoLocation> {
        self.position
    }
}
