//! Test doubles shared across `sharp-remote`'s crates.

pub mod duplex;
pub mod oracle;
pub mod probe;
pub mod serializer;

pub use duplex::{transport_pair, DEFAULT_BUFFER_SIZE};
pub use oracle::FixedDebuggerOracle;
pub use probe::ScriptedProbe;
pub use serializer::DefaultTestSerializer;
