//! Wire types, frame codec, handshake, and the value-serializer contract for
//! sharp-remote's remoting endpoint runtime.

pub mod codec;
pub mod error;
pub mod handshake;
pub mod ids;
pub mod message;
pub mod serializer;

pub use codec::FrameCodec;
pub use error::WireError;
pub use handshake::{HandshakePayload, MAGIC, PROTOCOL_VERSION, read_handshake, write_handshake};
pub use ids::{GrainId, IdAllocator, RpcId};
pub use message::{CallHeader, Frame, MessageKind};
pub use serializer::{ByReferenceHint, PayloadReader, PayloadWriter, ValueSerializer};
