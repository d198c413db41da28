//! Periodic liveness supervision of a remote peer (spec §4.6).

pub mod config;
pub mod probe;
pub mod supervisor;

pub use config::HeartbeatConfig;
pub use probe::{DebuggerOracle, HeartbeatProbe, NeverDebugging};
pub use supervisor::{HeartbeatFailureReason, HeartbeatSupervisor};
