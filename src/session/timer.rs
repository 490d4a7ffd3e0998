//! Recording-time accumulator.
//!
//! Elapsed time is carried across stop/start, so partial seconds from
//! short recording stretches add up instead of being dropped at each pause.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct DurationTimer {
    recorded: Duration,
    running_since: Option<Instant>,
}

impl DurationTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue counting from the current value. No-op if already running.
    pub fn start(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    pub fn stop(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.recorded += since.elapsed();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        self.recorded
            + self
                .running_since
                .map(|since| since.elapsed())
                .unwrap_or_default()
    }

    /// Whole seconds spent running.
    pub fn seconds(&self) -> u64 {
        self.elapsed().as_secs()
    }

    /// Stop and zero the counter for a new session.
    pub fn reset(&mut self) {
        self.recorded = Duration::ZERO;
        self.running_since = None;
    }
}
