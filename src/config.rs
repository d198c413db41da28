//! Endpoint configuration and its defaults (spec §4.1, §4.3, §6).

use remoting_heartbeat::HeartbeatConfig;

/// 64 MiB: the default cap on a single frame's body (spec §4.1).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;
/// The default soft cap on outstanding calls per endpoint (spec §6).
pub const DEFAULT_MAX_IN_FLIGHT_CALLS: usize = 1000;
/// The default bound on concurrently-dispatching incoming calls.
pub const DEFAULT_DISPATCH_WORKERS: usize = 16;

/// Tunables for one [`crate::endpoint::Endpoint`].
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub max_frame_size: u32,
    pub max_in_flight_calls: usize,
    pub dispatch_workers: usize,
    pub heartbeat: HeartbeatConfig,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_in_flight_calls: DEFAULT_MAX_IN_FLIGHT_CALLS,
            dispatch_workers: DEFAULT_DISPATCH_WORKERS,
            heartbeat: HeartbeatConfig::default(),
        }
    }
}
