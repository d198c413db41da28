//! Length-prefixed frame codec (spec §4.1, §6).
//!
//! Wire layout, little-endian throughout:
//!
//! ```text
//! length:u32 | rpc_id:i64 | kind:u8 | [servant_id:u64 | interface:str | method:str]? | payload:bytes
//! ```
//!
//! `length` counts every byte that follows it, i.e. `rpc_id` onward. The
//! `[..]?` block is present only when `kind` is `Call`.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::WireError;
use crate::ids::{GrainId, RpcId};
use crate::message::{CallHeader, Frame, MessageKind};

/// Strings on the wire are u16-length-prefixed UTF-8, capped at this many bytes.
pub const MAX_STRING_BYTES: usize = 1024;

/// Default maximum frame size: 64 MiB (spec §4.1).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

/// Decodes and encodes [`Frame`]s on a reliable ordered byte stream.
///
/// One instance is owned per direction of one endpoint's connection; it is
/// not shared across connections and carries no other state than the
/// configured size cap.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: u32,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl FrameCodec {
    #[must_use]
    pub fn new(max_frame_size: u32) -> Self {
        Self { max_frame_size }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, WireError> {
        if src.len() < 4 {
            return Ok(None);
        }
        let length = u32::from_le_bytes(src[..4].try_into().unwrap());
        if length > self.max_frame_size {
            return Err(WireError::FrameTooLarge { actual: length, cap: self.max_frame_size });
        }
        let total = 4 + length as usize;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(4);
        let mut body = src.split_to(length as usize);

        if body.len() < 9 {
            return Err(WireError::RpcInvalidResponse(
                "frame shorter than the mandatory rpc_id + kind prefix".to_owned(),
            ));
        }
        let rpc_id = RpcId(body.get_i64_le());
        let kind = MessageKind::decode(body.get_u8())?;

        let call = if kind.contains(MessageKind::CALL) {
            Some(decode_call_header(&mut body)?)
        } else {
            None
        };

        let payload = body.to_vec();
        Ok(Some(Frame { rpc_id, kind, call, payload }))
    }

    /// A stream that ends with bytes still buffered (a partial frame) is a
    /// protocol failure, never a silent truncation (spec §4.1).
    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, WireError> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(WireError::RpcInvalidResponse(
                "stream ended with a partial frame buffered".to_owned(),
            )),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = WireError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), WireError> {
        let mut body = BytesMut::new();
        body.put_i64_le(frame.rpc_id.0);
        body.put_u8(frame.kind.as_u8());
        if let Some(call) = &frame.call {
            encode_call_header(call, &mut body)?;
        }
        body.extend_from_slice(&frame.payload);

        let length = u32::try_from(body.len()).map_err(|_| WireError::FrameTooLarge {
            actual: u32::MAX,
            cap: self.max_frame_size,
        })?;
        if length > self.max_frame_size {
            return Err(WireError::FrameTooLarge { actual: length, cap: self.max_frame_size });
        }

        dst.reserve(4 + body.len());
        dst.put_u32_le(length);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

fn encode_call_header(call: &CallHeader, out: &mut BytesMut) -> Result<(), WireError> {
    out.put_u64_le(call.servant_id.0);
    encode_string(&call.interface_name, out)?;
    encode_string(&call.method_name, out)?;
    Ok(())
}

fn decode_call_header(body: &mut BytesMut) -> Result<CallHeader, WireError> {
    if body.len() < 8 {
        return Err(WireError::RpcInvalidResponse("call frame missing servant_id".to_owned()));
    }
    let servant_id = GrainId(body.get_u64_le());
    let interface_name = decode_string(body)?;
    let method_name = decode_string(body)?;
    Ok(CallHeader { servant_id, interface_name, method_name })
}

pub fn encode_string(s: &str, out: &mut BytesMut) -> Result<(), WireError> {
    let bytes = s.as_bytes();
    if bytes.len() > MAX_STRING_BYTES {
        return Err(WireError::StringTooLong { actual: bytes.len(), cap: MAX_STRING_BYTES });
    }
    out.put_u16_le(u16::try_from(bytes.len()).unwrap());
    out.extend_from_slice(bytes);
    Ok(())
}

pub fn decode_string(body: &mut BytesMut) -> Result<String, WireError> {
    if body.len() < 2 {
        return Err(WireError::RpcInvalidResponse("string missing length prefix".to_owned()));
    }
    let len = body.get_u16_le() as usize;
    if body.len() < len {
        return Err(WireError::RpcInvalidResponse("string shorter than its declared length".to_owned()));
    }
    let raw = body.split_to(len);
    String::from_utf8(raw.to_vec())
        .map_err(|e| WireError::RpcInvalidResponse(format!("string is not valid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(frame: Frame) -> Frame {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(frame, &mut buf).unwrap();
        codec.decode(&mut buf).unwrap().expect("one complete frame")
    }

    #[test]
    fn call_frame_roundtrips() {
        let frame = Frame::call(RpcId(42), GrainId(100), "IAdder", "Add", vec![1, 2, 3, 4]);
        assert_eq!(roundtrip(frame.clone()), frame);
    }

    #[test]
    fn return_frame_roundtrips() {
        let frame = Frame::returns(RpcId(7), vec![9, 9]);
        assert_eq!(roundtrip(frame.clone()), frame);
    }

    #[test]
    fn exception_frame_roundtrips() {
        let frame = Frame::exception(RpcId(-1), vec![0xde, 0xad]);
        assert_eq!(roundtrip(frame.clone()), frame);
    }

    #[test]
    fn heartbeat_and_goodbye_have_empty_payload() {
        assert_eq!(roundtrip(Frame::heartbeat(RpcId(0))).payload, Vec::<u8>::new());
        assert_eq!(roundtrip(Frame::goodbye(RpcId(0))).payload, Vec::<u8>::new());
    }

    #[test]
    fn partial_frame_returns_none_until_complete() {
        let mut codec = FrameCodec::default();
        let mut full = BytesMut::new();
        codec.encode(Frame::returns(RpcId(1), vec![1, 2, 3]), &mut full).unwrap();

        let mut partial = full.split_to(full.len() - 2);
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut codec = FrameCodec::new(8);
        let mut buf = BytesMut::new();
        // length header claiming far more than the 8-byte cap.
        buf.put_u32_le(1_000);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, WireError::FrameTooLarge { .. }));
    }

    #[test]
    fn partial_frame_at_eof_is_a_read_failure_not_silent_truncation() {
        let mut codec = FrameCodec::default();
        let mut full = BytesMut::new();
        codec.encode(Frame::returns(RpcId(1), vec![1, 2, 3]), &mut full).unwrap();
        let mut partial = full.split_to(full.len() - 1);

        let err = codec.decode_eof(&mut partial).unwrap_err();
        assert!(matches!(err, WireError::RpcInvalidResponse(_)));
    }

    #[test]
    fn unknown_message_kind_is_rejected() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        let mut body = BytesMut::new();
        body.put_i64_le(0);
        body.put_u8(0b0110_0000); // not a valid composite
        buf.put_u32_le(u32::try_from(body.len()).unwrap());
        buf.extend_from_slice(&body);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn string_over_the_wire_limit_is_rejected_on_encode() {
        let huge = "x".repeat(MAX_STRING_BYTES + 1);
        let mut out = BytesMut::new();
        let err = encode_string(&huge, &mut out).unwrap_err();
        assert!(matches!(err, WireError::StringTooLong { .. }));
    }
}
