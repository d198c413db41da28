//! Wire-level error kinds (spec §4.1, §7).

/// Errors arising from decoding, encoding, or validating a frame.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("I/O error reading frame: {0}")]
    ReadFailure(#[from] std::io::Error),

    #[error("malformed frame: {0}")]
    RpcInvalidResponse(String),

    #[error("frame of {actual} bytes exceeds the configured cap of {cap} bytes")]
    FrameTooLarge { actual: u32, cap: u32 },

    #[error("handshake failed: {0}")]
    HandshakeFailure(String),

    #[error("string field of {actual} bytes exceeds the {cap}-byte wire limit")]
    StringTooLong { actual: usize, cap: usize },
}
