//! An in-memory transport pair standing in for a real TCP connection
//! (grounded on `rt-test-utils`'s preference for driving real protocol code
//! over a real local transport rather than mocking the transport itself).

use tokio::io::DuplexStream;

/// A connected pair of in-memory streams. Each end reads what the other end
/// writes, so a test can run the real codec and handshake logic over it
/// without binding a socket.
pub fn transport_pair(buffer_size: usize) -> (DuplexStream, DuplexStream) {
    tokio::io::duplex(buffer_size)
}

/// The buffer size used by [`transport_pair`] when a test has no reason to
/// pick a specific one.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
