//! The runtime's top-level error type (spec §7), composed from the
//! lower-level errors its dependent crates already define.

use remoting_registry::RegistryError;
use remoting_silo::EndPointDisconnectReason;
use remoting_wire::{GrainId, WireError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemotingError {
    #[error("no such servant: {0}")]
    NoSuchServant(GrainId),

    #[error("endpoint is not connected")]
    NotConnected,

    #[error("connection lost: {0:?}")]
    ConnectionLost(EndPointDisconnectReason),

    /// The remote raised an exception the serializer could not marshal back
    /// to its original type (spec §7). The caller only gets the original
    /// type name and message, never a fully rehydrated exception object.
    #[error("unserializable remote exception (original type: {original_typename}): {original_message}")]
    UnserializableException { original_typename: String, original_message: String },

    /// The remote raised an exception the serializer *could* marshal.
    #[error("remote exception: {0}")]
    RemoteException(String),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
