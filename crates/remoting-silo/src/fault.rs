//! Failure classification and the endpoint → silo fault mapping (spec §4.5, §6).

/// The endpoint-side disconnect taxonomy (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndPointDisconnectReason {
    ReadFailure,
    RpcInvalidResponse,
    RequestedByEndPoint,
    RequestedByRemoteEndPoint,
    UnhandledException,
}

/// The silo-side fault taxonomy (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiloFaultReason {
    ConnectionFailure,
    ConnectionClosed,
    UnhandledException,
    HeartbeatFailure,
}

/// How a detected fault was handled. Only `Shutdown` exists today (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultHandling {
    Shutdown,
}

impl From<EndPointDisconnectReason> for SiloFaultReason {
    fn from(reason: EndPointDisconnectReason) -> Self {
        match reason {
            EndPointDisconnectReason::ReadFailure | EndPointDisconnectReason::RpcInvalidResponse => {
                SiloFaultReason::ConnectionFailure
            }
            EndPointDisconnectReason::RequestedByEndPoint
            | EndPointDisconnectReason::RequestedByRemoteEndPoint => SiloFaultReason::ConnectionClosed,
            EndPointDisconnectReason::UnhandledException => SiloFaultReason::UnhandledException,
        }
    }
}
