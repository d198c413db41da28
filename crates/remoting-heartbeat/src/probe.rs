//! The probe and debugger-oracle contracts the supervisor depends on.

/// A remote liveness check — in practice a call through a weak handle to the
/// peer's `Heartbeat` proxy (reserved grain id, spec §3), injected here so
/// the supervisor can be tested without a real endpoint.
#[async_trait::async_trait]
pub trait HeartbeatProbe: Send + Sync {
    async fn probe(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Whether a debugger is attached to the peer process. A debugger pausing
/// the peer is otherwise indistinguishable from a crash (spec §4.6).
pub trait DebuggerOracle: Send + Sync {
    fn is_debugger_attached(&self) -> bool;
}

/// The default oracle for production use: never reports a debugger attached.
pub struct NeverDebugging;

impl DebuggerOracle for NeverDebugging {
    fn is_debugger_attached(&self) -> bool {
        false
    }
}
