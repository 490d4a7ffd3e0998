//! Recording sessions: the lifecycle state machine and the types it produces.

mod error;
mod model;
mod photo;
mod session_machine;
mod slot;
mod timer;

pub use error::SessionError;
pub use model::{Outcome, PhotoCapture, RecordingSession, SessionId, SessionState};
pub use session_machine::{RecordingOptions, SessionBackends, SessionManager};
pub use slot::ActiveSessionSlot;
pub use timer::DurationTimer;
