//! Heartbeat supervisor configuration (spec §4.6).

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub skipped_threshold: u32,
    pub report_when_debugger_attached: bool,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            skipped_threshold: 10,
            report_when_debugger_attached: false,
        }
    }
}

impl HeartbeatConfig {
    /// Total time without a successful probe before a failure is raised.
    #[must_use]
    pub fn failure_window(&self) -> Duration {
        self.interval * self.skipped_threshold
    }
}
