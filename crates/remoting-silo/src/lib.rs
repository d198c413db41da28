//! Out-of-process host lifecycle: child spawn, stdout handshake, and fault
//! aggregation (spec §4.7).

pub mod child_protocol;
mod error;
mod fault;
mod handshake;
mod silo;

pub use error::SiloError;
pub use fault::{EndPointDisconnectReason, FaultHandling, SiloFaultReason};
pub use silo::{OutOfProcessSilo, SiloCallbacks, SiloOptions};
