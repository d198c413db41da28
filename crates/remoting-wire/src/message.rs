//! Frame envelope and message-kind bitflags (spec §3, §6).

use crate::ids::{GrainId, RpcId};

/// Bitflag set over `{Call, Return, Exception, Goodbye, Heartbeat}`.
///
/// The only valid composites are `Call`, `Return`, and `Return | Exception`;
/// `Goodbye` and `Heartbeat` are always sent alone. Validity is enforced by
/// [`MessageKind::decode`] rather than by the type system, since the wire
/// representation is a single `u8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageKind(u8);

impl MessageKind {
    pub const CALL: MessageKind = MessageKind(0b0000_0001);
    pub const RETURN: MessageKind = MessageKind(0b0000_0010);
    pub const EXCEPTION: MessageKind = MessageKind(0b0000_0100);
    pub const GOODBYE: MessageKind = MessageKind(0b0000_1000);
    pub const HEARTBEAT: MessageKind = MessageKind(0b0001_0000);

    pub const RETURN_EXCEPTION: MessageKind = MessageKind(Self::RETURN.0 | Self::EXCEPTION.0);

    #[must_use]
    pub const fn contains(self, other: MessageKind) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Decode a raw byte, rejecting composites other than the three valid ones.
    pub fn decode(byte: u8) -> Result<Self, crate::error::WireError> {
        match byte {
            b if b == Self::CALL.0 => Ok(Self::CALL),
            b if b == Self::RETURN.0 => Ok(Self::RETURN),
            b if b == Self::RETURN_EXCEPTION.0 => Ok(Self::RETURN_EXCEPTION),
            b if b == Self::GOODBYE.0 => Ok(Self::GOODBYE),
            b if b == Self::HEARTBEAT.0 => Ok(Self::HEARTBEAT),
            other => Err(crate::error::WireError::RpcInvalidResponse(format!(
                "unrecognised message kind 0b{other:08b}"
            ))),
        }
    }

    pub fn is_exception(self) -> bool {
        self.contains(Self::EXCEPTION)
    }
}

/// Header fields present on a `Call` frame in addition to the common prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHeader {
    pub servant_id: GrainId,
    pub interface_name: String,
    pub method_name: String,
}

/// A single length-prefixed frame, decoded from the wire.
///
/// `length` is not stored explicitly — it is a property of the encoding,
/// recomputed on write from `payload.len()` plus whatever header fields are
/// present for this frame's `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub rpc_id: RpcId,
    pub kind: MessageKind,
    /// Present only for `Call` frames; `None` for `Return`/`Goodbye`/`Heartbeat`.
    pub call: Option<CallHeader>,
    pub payload: Vec<u8>,
}

impl Frame {
    #[must_use]
    pub fn call(rpc_id: RpcId, servant_id: GrainId, interface_name: impl Into<String>, method_name: impl Into<String>, payload: Vec<u8>) -> Self {
        Frame {
            rpc_id,
            kind: MessageKind::CALL,
            call: Some(CallHeader {
                servant_id,
                interface_name: interface_name.into(),
                method_name: method_name.into(),
            }),
            payload,
        }
    }

    #[must_use]
    pub fn returns(rpc_id: RpcId, payload: Vec<u8>) -> Self {
        Frame { rpc_id, kind: MessageKind::RETURN, call: None, payload }
    }

    #[must_use]
    pub fn exception(rpc_id: RpcId, payload: Vec<u8>) -> Self {
        Frame { rpc_id, kind: MessageKind::RETURN_EXCEPTION, call: None, payload }
    }

    #[must_use]
    pub fn goodbye(rpc_id: RpcId) -> Self {
        Frame { rpc_id, kind: MessageKind::GOODBYE, call: None, payload: Vec::new() }
    }

    #[must_use]
    pub fn heartbeat(rpc_id: RpcId) -> Self {
        Frame { rpc_id, kind: MessageKind::HEARTBEAT, call: None, payload: Vec::new() }
    }
}
