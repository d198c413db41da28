//! Errors raised while spawning and supervising an out-of-process host.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SiloError {
    #[error("failed to spawn the host process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("host process exited before completing its handshake (status: {0})")]
    ProcessExitedDuringHandshake(std::process::ExitStatus),

    #[error("host process closed stdout before completing its handshake")]
    StdoutClosedDuringHandshake,

    #[error("host did not complete its handshake within {0:?}")]
    HandshakeTimeout(std::time::Duration),

    #[error("unexpected line from host during handshake: {0:?}")]
    UnexpectedLine(String),

    #[error("host reported a port outside u16 range: {0:?}")]
    InvalidPortLine(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
