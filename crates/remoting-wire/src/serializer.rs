//! The value-serializer contract (spec §4.2).
//!
//! The runtime never picks a concrete wire format for user values — it
//! consumes whatever the host application plugs in through [`ValueSerializer`].
//! This module defines that contract plus the small cursor types
//! implementations read and write through, so a serializer never has to
//! parse a frame envelope itself.

use rust_decimal::Decimal;

use crate::error::WireError;
use crate::ids::GrainId;

/// A one-byte tag telling the receiving side how to resolve a grain id that
/// crossed the wire by reference (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByReferenceHint {
    /// The receiver should create (or reuse) a proxy for this grain id.
    CreateProxy,
    /// The receiver already owns the subject locally; look it up directly.
    RetrieveSubject,
}

impl ByReferenceHint {
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            ByReferenceHint::CreateProxy => 0,
            ByReferenceHint::RetrieveSubject => 1,
        }
    }

    pub fn decode(byte: u8) -> Result<Self, WireError> {
        match byte {
            0 => Ok(ByReferenceHint::CreateProxy),
            1 => Ok(ByReferenceHint::RetrieveSubject),
            other => Err(WireError::RpcInvalidResponse(format!(
                "invalid ByReferenceHint byte {other}"
            ))),
        }
    }
}

/// A forward-only cursor over a payload being decoded.
pub struct PayloadReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::RpcInvalidResponse(format!(
                "payload exhausted: wanted {n} bytes, {} remain",
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Reads the single-byte nullability flag shared by every reference value
    /// (`0` = null, `1` = present).
    pub fn read_null_flag(&mut self) -> Result<bool, WireError> {
        Ok(self.take(1)?[0] != 0)
    }

    pub fn read_by_reference_hint(&mut self) -> Result<(ByReferenceHint, GrainId), WireError> {
        let hint = ByReferenceHint::decode(self.take(1)?[0])?;
        let grain_id = GrainId(u64::from_le_bytes(self.take(8)?.try_into().unwrap()));
        Ok((hint, grain_id))
    }
}

/// An append-only cursor over a payload being encoded.
#[derive(Default)]
pub struct PayloadWriter {
    bytes: Vec<u8>,
}

impl PayloadWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn write_null_flag(&mut self, present: bool) {
        self.put(&[u8::from(present)]);
    }

    pub fn write_by_reference_hint(&mut self, hint: ByReferenceHint, grain_id: GrainId) {
        self.put(&[hint.as_byte()]);
        self.put(&grain_id.0.to_le_bytes());
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

/// Declares a pair of trait methods for one primitive width, with a default
/// body backed by fixed-width little-endian encoding. One row per width
/// avoids twelve hand-written copies of the same four lines.
macro_rules! primitive_rw {
    ($read:ident, $write:ident, $ty:ty, $width:literal) => {
        fn $read(&self, r: &mut PayloadReader<'_>) -> Result<$ty, WireError> {
            Ok(<$ty>::from_le_bytes(r.take($width)?.try_into().unwrap()))
        }

        fn $write(&self, w: &mut PayloadWriter, value: $ty) {
            w.put(&value.to_le_bytes());
        }
    };
}

/// The contract the runtime requires of a pluggable value serializer
/// (spec §4.2). Implementations are stateless per call — one instance is
/// shared across all frames on an endpoint — and deterministic: the wire
/// form of a value tree depends only on the value and its declared
/// interface, never on registry table state.
///
/// Implementations that materialize a user object which declares
/// `BeforeDeserialize`/`AfterDeserialize` hooks are responsible for invoking
/// them; this trait has no knowledge of user types and cannot call them for
/// you. Those hooks must run on the thread driving deserialization (the read
/// pump), never off to another task, since they may touch state the user
/// type assumes is single-threaded at construction time.
pub trait ValueSerializer: Send + Sync {
    primitive_rw!(read_i8, write_i8, i8, 1);
    primitive_rw!(read_u8, write_u8, u8, 1);
    primitive_rw!(read_i16, write_i16, i16, 2);
    primitive_rw!(read_u16, write_u16, u16, 2);
    primitive_rw!(read_i32, write_i32, i32, 4);
    primitive_rw!(read_u32, write_u32, u32, 4);
    primitive_rw!(read_i64, write_i64, i64, 8);
    primitive_rw!(read_u64, write_u64, u64, 8);
    primitive_rw!(read_f32, write_f32, f32, 4);
    primitive_rw!(read_f64, write_f64, f64, 8);

    fn read_decimal(&self, r: &mut PayloadReader<'_>) -> Result<Decimal, WireError> {
        let raw = i128::from_le_bytes(r.take(16)?.try_into().unwrap());
        Ok(Decimal::deserialize(raw.to_le_bytes()))
    }

    fn write_decimal(&self, w: &mut PayloadWriter, value: Decimal) {
        w.put(&i128::from_le_bytes(value.serialize()).to_le_bytes());
    }

    /// Strings are nullable: a `0/1` flag precedes the u16-length-prefixed
    /// UTF-8 payload (spec §3, §6).
    fn read_string(&self, r: &mut PayloadReader<'_>) -> Result<Option<String>, WireError> {
        if !r.read_null_flag()? {
            return Ok(None);
        }
        let len = u16::from_le_bytes(r.take(2)?.try_into().unwrap()) as usize;
        let raw = r.take(len)?;
        String::from_utf8(raw.to_vec())
            .map(Some)
            .map_err(|e| WireError::RpcInvalidResponse(format!("string is not valid UTF-8: {e}")))
    }

    fn write_string(&self, w: &mut PayloadWriter, value: Option<&str>) -> Result<(), WireError> {
        w.write_null_flag(value.is_some());
        let Some(value) = value else { return Ok(()) };
        let bytes = value.as_bytes();
        if bytes.len() > crate::codec::MAX_STRING_BYTES {
            return Err(WireError::StringTooLong {
                actual: bytes.len(),
                cap: crate::codec::MAX_STRING_BYTES,
            });
        }
        w.put(&u16::try_from(bytes.len()).unwrap().to_le_bytes());
        w.put(bytes);
        Ok(())
    }
}
