//! Process-wide "active session" slot.
//!
//! Claimed synchronously before any hardware call so a second start fails fast
//! instead of queueing. Managers that must exclude each other share one slot.

use std::sync::{Arc, Mutex};
use tracing::debug;

use super::model::SessionId;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SlotState {
    Free,
    Starting,
    Active(SessionId),
}

#[derive(Debug, Clone)]
pub struct ActiveSessionSlot {
    inner: Arc<Mutex<SlotState>>,
}

impl Default for ActiveSessionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveSessionSlot {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SlotState::Free)),
        }
    }

    /// Reserve the slot for a pending start. `Err` carries the current holder
    /// (`None` while another start is still pending).
    pub(crate) fn try_claim(&self) -> Result<(), Option<SessionId>> {
        let mut state = self.lock();
        match &*state {
            SlotState::Free => {
                *state = SlotState::Starting;
                Ok(())
            }
            SlotState::Starting => Err(None),
            SlotState::Active(id) => Err(Some(id.clone())),
        }
    }

    pub(crate) fn activate(&self, id: SessionId) {
        debug!("Active session slot held by {}", id);
        *self.lock() = SlotState::Active(id);
    }

    /// Drop a pending claim that never became active.
    pub(crate) fn abandon_claim(&self) {
        let mut state = self.lock();
        if *state == SlotState::Starting {
            *state = SlotState::Free;
        }
    }

    /// Free the slot if `id` still holds it. Another session's hold is left
    /// alone.
    pub(crate) fn release(&self, id: &SessionId) -> bool {
        let mut state = self.lock();
        match &*state {
            SlotState::Active(holder) if holder == id => {
                debug!("Active session slot released by {}", id);
                *state = SlotState::Free;
                true
            }
            _ => false,
        }
    }

    pub fn is_free(&self) -> bool {
        *self.lock() == SlotState::Free
    }

    pub fn active_session(&self) -> Option<SessionId> {
        match &*self.lock() {
            SlotState::Active(id) => Some(id.clone()),
            _ => None,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        // The state is a plain enum; a poisoned lock still holds a valid value.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
