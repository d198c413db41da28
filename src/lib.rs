//! `sharp-remote`: a typed RPC runtime over a reliable byte stream, with a
//! proxy/servant object registry, heartbeat supervision, and out-of-process
//! host lifecycle management.
//!
//! The crate is split so each concern is independently testable:
//! [`remoting_wire`] owns the wire format, [`remoting_registry`] the
//! proxy/servant tables, [`remoting_heartbeat`] liveness supervision, and
//! [`remoting_silo`] out-of-process host spawning. This crate wires them
//! together into [`Endpoint`], the thing an application actually holds.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod pending;
pub mod silo_integration;

pub use config::EndpointConfig;
pub use endpoint::{Endpoint, EndpointState};
pub use error::RemotingError;
pub use pending::{PendingCallGuard, PendingCalls};

pub use remoting_heartbeat::{HeartbeatConfig, HeartbeatFailureReason, HeartbeatProbe, HeartbeatSupervisor};
pub use remoting_registry::{
    EndpointHandle, InterfaceFingerprint, InvokeError, ObjectRegistry, Proxy, ProxyOrLocal, Servant,
    Subject, SubjectHost,
};
pub use remoting_silo::{
    EndPointDisconnectReason, FaultHandling, OutOfProcessSilo, SiloCallbacks, SiloError, SiloFaultReason,
    SiloOptions,
};
pub use remoting_wire::{
    read_handshake, write_handshake, ByReferenceHint, CallHeader, Frame, FrameCodec, GrainId,
    HandshakePayload, IdAllocator, MessageKind, PayloadReader, PayloadWriter, RpcId, ValueSerializer,
    WireError, MAGIC, PROTOCOL_VERSION,
};
