//! The child stdout handshake state machine (spec §4.7, REDESIGN FLAGS #2).
//!
//! The child writes exactly three lines before it is considered ready:
//! `booting`, a decimal port number, then `ready`. The port line must
//! immediately precede `ready` — any other line in that slot is a protocol
//! violation, not a host log line to forward.

use crate::error::SiloError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakeState {
    WaitingForBooting,
    WaitingForPort,
    WaitingForReady(u16),
    Done(u16),
}

/// Feed stdout lines one at a time until the handshake completes.
pub(crate) struct HandshakeReader {
    state: HandshakeState,
}

impl HandshakeReader {
    pub(crate) fn new() -> Self {
        Self { state: HandshakeState::WaitingForBooting }
    }

    /// Returns `Some(port)` once `line` completes the handshake.
    pub(crate) fn feed(&mut self, line: &str) -> Result<Option<u16>, SiloError> {
        match self.state {
            HandshakeState::WaitingForBooting => {
                if line == "booting" {
                    self.state = HandshakeState::WaitingForPort;
                    Ok(None)
                } else {
                    Err(SiloError::UnexpectedLine(line.to_owned()))
                }
            }
            HandshakeState::WaitingForPort => {
                let port: u16 =
                    line.trim().parse().map_err(|_| SiloError::InvalidPortLine(line.to_owned()))?;
                self.state = HandshakeState::WaitingForReady(port);
                Ok(None)
            }
            HandshakeState::WaitingForReady(port) => {
                if line == "ready" {
                    self.state = HandshakeState::Done(port);
                    Ok(Some(port))
                } else {
                    Err(SiloError::UnexpectedLine(line.to_owned()))
                }
            }
            HandshakeState::Done(port) => Ok(Some(port)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_canonical_sequence() {
        let mut reader = HandshakeReader::new();
        assert_eq!(reader.feed("booting").unwrap(), None);
        assert_eq!(reader.feed("54321").unwrap(), None);
        assert_eq!(reader.feed("ready").unwrap(), Some(54321));
    }

    #[test]
    fn rejects_a_log_line_between_port_and_ready() {
        let mut reader = HandshakeReader::new();
        reader.feed("booting").unwrap();
        reader.feed("54321").unwrap();
        assert!(matches!(reader.feed("initializing database..."), Err(SiloError::UnexpectedLine(_))));
    }

    #[test]
    fn rejects_a_non_numeric_port_line() {
        let mut reader = HandshakeReader::new();
        reader.feed("booting").unwrap();
        assert!(matches!(reader.feed("not-a-port"), Err(SiloError::InvalidPortLine(_))));
    }

    #[test]
    fn rejects_a_missing_booting_line() {
        let mut reader = HandshakeReader::new();
        assert!(matches!(reader.feed("54321"), Err(SiloError::UnexpectedLine(_))));
    }
}
