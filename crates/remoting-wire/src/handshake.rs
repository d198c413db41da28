//! Endpoint handshake (spec §4.5, §6): 16-byte magic, u16 version, peer name.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::codec::MAX_STRING_BYTES;
use crate::error::WireError;

pub const MAGIC: &[u8; 16] = b"SharpRemote\0\0\0\0\0";
pub const PROTOCOL_VERSION: u16 = 1;
pub const MAX_PEER_NAME_BYTES: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakePayload {
    pub peer_name: String,
}

/// Write this side's handshake payload to `stream`.
///
/// # Errors
/// Returns [`WireError::ReadFailure`] (reused for I/O errors on the write
/// path too — spec.md has no separate write-failure handshake variant) if
/// the underlying write fails, or [`WireError::StringTooLong`] if
/// `peer_name` exceeds [`MAX_PEER_NAME_BYTES`].
pub async fn write_handshake<W: AsyncWriteExt + Unpin>(
    stream: &mut W,
    payload: &HandshakePayload,
) -> Result<(), WireError> {
    let name_bytes = payload.peer_name.as_bytes();
    if name_bytes.len() > MAX_PEER_NAME_BYTES {
        return Err(WireError::StringTooLong { actual: name_bytes.len(), cap: MAX_PEER_NAME_BYTES });
    }
    if name_bytes.len() > MAX_STRING_BYTES {
        return Err(WireError::StringTooLong { actual: name_bytes.len(), cap: MAX_STRING_BYTES });
    }

    stream.write_all(MAGIC).await?;
    stream.write_all(&PROTOCOL_VERSION.to_le_bytes()).await?;
    stream.write_all(&u16::try_from(name_bytes.len()).unwrap().to_le_bytes()).await?;
    stream.write_all(name_bytes).await?;
    stream.flush().await?;
    Ok(())
}

/// Read and validate the peer's handshake payload from `stream`.
///
/// # Errors
/// Returns [`WireError::HandshakeFailure`] if the magic or version does not
/// match, or [`WireError::ReadFailure`] on I/O error.
pub async fn read_handshake<R: AsyncReadExt + Unpin>(
    stream: &mut R,
) -> Result<HandshakePayload, WireError> {
    let mut magic = [0u8; 16];
    stream.read_exact(&mut magic).await?;
    if &magic != MAGIC {
        return Err(WireError::HandshakeFailure("magic mismatch".to_owned()));
    }

    let mut version_bytes = [0u8; 2];
    stream.read_exact(&mut version_bytes).await?;
    let version = u16::from_le_bytes(version_bytes);
    if version != PROTOCOL_VERSION {
        return Err(WireError::HandshakeFailure(format!(
            "unsupported protocol version {version}, expected {PROTOCOL_VERSION}"
        )));
    }

    let mut len_bytes = [0u8; 2];
    stream.read_exact(&mut len_bytes).await?;
    let len = u16::from_le_bytes(len_bytes) as usize;
    if len > MAX_PEER_NAME_BYTES {
        return Err(WireError::HandshakeFailure(format!(
            "peer name of {len} bytes exceeds the {MAX_PEER_NAME_BYTES}-byte limit"
        )));
    }

    let mut name_buf = vec![0u8; len];
    stream.read_exact(&mut name_buf).await?;
    let peer_name = String::from_utf8(name_buf)
        .map_err(|e| WireError::HandshakeFailure(format!("peer name is not valid UTF-8: {e}")))?;

    Ok(HandshakePayload { peer_name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handshake_roundtrips_over_a_duplex_stream() {
        let (mut a, mut b) = tokio::io::duplex(256);
        let payload = HandshakePayload { peer_name: "endpoint-a".to_owned() };
        write_handshake(&mut a, &payload).await.unwrap();
        let read_back = read_handshake(&mut b).await.unwrap();
        assert_eq!(read_back, payload);
    }

    #[tokio::test]
    async fn wrong_magic_fails_handshake() {
        let (mut a, mut b) = tokio::io::duplex(256);
        a.write_all(b"NotSharpRemote!!").await.unwrap();
        a.write_all(&PROTOCOL_VERSION.to_le_bytes()).await.unwrap();
        a.write_all(&0u16.to_le_bytes()).await.unwrap();
        drop(a);

        let err = read_handshake(&mut b).await.unwrap_err();
        assert!(matches!(err, WireError::HandshakeFailure(_)));
    }

    #[tokio::test]
    async fn wrong_version_fails_handshake() {
        let (mut a, mut b) = tokio::io::duplex(256);
        a.write_all(MAGIC).await.unwrap();
        a.write_all(&99u16.to_le_bytes()).await.unwrap();
        a.write_all(&0u16.to_le_bytes()).await.unwrap();
        drop(a);

        let err = read_handshake(&mut b).await.unwrap_err();
        assert!(matches!(err, WireError::HandshakeFailure(_)));
    }

    #[tokio::test]
    async fn oversized_peer_name_is_rejected_on_write() {
        let (mut a, _b) = tokio::io::duplex(256);
        let payload = HandshakePayload { peer_name: "x".repeat(MAX_PEER_NAME_BYTES + 1) };
        let err = write_handshake(&mut a, &payload).await.unwrap_err();
        assert!(matches!(err, WireError::StringTooLong { .. }));
    }
}
