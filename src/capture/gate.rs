//! Capability gate backed by the `[capabilities]` config section.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};

use super::{Capability, CapabilityDecision, CapabilityGate};
use crate::config::CapabilitiesConfig;

pub struct ConfigCapabilityGate {
    allowed: CapabilitiesConfig,
    outstanding: Mutex<HashMap<Capability, usize>>,
}

impl ConfigCapabilityGate {
    pub fn new(allowed: CapabilitiesConfig) -> Self {
        Self {
            allowed,
            outstanding: Mutex::new(HashMap::new()),
        }
    }

    fn is_allowed(&self, capability: Capability) -> bool {
        match capability {
            Capability::Microphone => self.allowed.microphone,
            Capability::Camera => self.allowed.camera,
            Capability::Geolocation => self.allowed.geolocation,
        }
    }

    /// Grants handed out and not yet released.
    pub fn outstanding(&self, capability: Capability) -> usize {
        self.outstanding
            .lock()
            .map(|grants| grants.get(&capability).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl CapabilityGate for ConfigCapabilityGate {
    async fn request(&self, capability: Capability) -> CapabilityDecision {
        if !self.is_allowed(capability) {
            info!("{} access denied by configuration", capability);
            return CapabilityDecision::Denied;
        }

        if let Ok(mut grants) = self.outstanding.lock() {
            *grants.entry(capability).or_insert(0) += 1;
        }
        CapabilityDecision::Granted
    }

    fn release(&self, capability: Capability) {
        let Ok(mut grants) = self.outstanding.lock() else {
            return;
        };
        match grants.get_mut(&capability) {
            Some(count) if *count > 0 => *count -= 1,
            _ => warn!("Release of {} without an outstanding grant", capability),
        }
    }
}
