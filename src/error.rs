//! Error types for the upgrade handshake, the framing engine and the send path.
//!
//! Handshake errors decline the upgrade, protocol errors terminate the
//! session, and I/O errors on the send path are reported to the caller only.

use thiserror::Error;

use crate::message::CloseCode;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while upgrading or serving a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Protocol violation detected (bad opcode sequencing, negative length).
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Declared frame payload exceeds the configured payload limit.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared payload length.
        size: u64,
        /// Maximum allowed payload length.
        max: u64,
    },

    /// Accumulated message exceeds the configured message limit.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Size the message would reach.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// Connection has been closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Invalid WebSocket handshake.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Upgrade request head exceeds the configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Actual size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// The client did not finish its request head in time.
    #[error("Handshake timed out")]
    HandshakeTimeout,

    /// No handler is registered for the request path.
    #[error("No handler for path: {0}")]
    NoHandler(String),

    /// A response header value would break the HTTP framing.
    #[error("Invalid value for header {header}: {reason}")]
    InvalidHeaderValue {
        /// Header name.
        header: String,
        /// Why the value was refused.
        reason: String,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// Close code that must not be put on the wire.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Control frame without the FIN bit.
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload larger than 125 bytes.
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(u64),

    /// Client frame without the mask bit.
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Reserved bits set; no extension is ever negotiated.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Invalid opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),
}

impl Error {
    /// Returns `true` for errors caused by what the peer sent: frame
    /// violations and invalid close status codes.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::ProtocolViolation(_)
                | Error::InvalidCloseCode(_)
                | Error::FrameTooLarge { .. }
                | Error::MessageTooLarge { .. }
                | Error::ReservedOpcode(_)
                | Error::FragmentedControlFrame
                | Error::ControlFrameTooLarge(_)
                | Error::UnmaskedClientFrame
                | Error::ReservedBitsSet
                | Error::InvalidOpcode(_)
        )
    }

    /// Close code to report to the peer when this error ends a session.
    ///
    /// Size violations map to 1009, every other protocol error to 1002.
    /// Non-protocol errors have no close code.
    #[must_use]
    pub const fn close_code(&self) -> Option<CloseCode> {
        match self {
            Error::FrameTooLarge { .. } | Error::MessageTooLarge { .. } => {
                Some(CloseCode::MessageTooBig)
            }
            e if e.is_protocol() => Some(CloseCode::ProtocolError),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::FrameTooLarge {
            size: 33_554_433,
            max: 33_554_432,
        };
        assert_eq!(
            err.to_string(),
            "Frame too large: 33554433 bytes (max: 33554432)"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let ws_err: Error = io_err.into();
        assert!(matches!(ws_err, Error::Io(_)));
        assert_eq!(ws_err.close_code(), None);
    }

    #[test]
    fn test_close_code_mapping() {
        assert_eq!(
            Error::MessageTooLarge { size: 5, max: 4 }.close_code(),
            Some(CloseCode::MessageTooBig)
        );
        assert_eq!(
            Error::UnmaskedClientFrame.close_code(),
            Some(CloseCode::ProtocolError)
        );
        assert_eq!(
            Error::ReservedOpcode(0x3).close_code(),
            Some(CloseCode::ProtocolError)
        );
        assert_eq!(
            Error::InvalidCloseCode(1005).close_code(),
            Some(CloseCode::ProtocolError)
        );
        assert_eq!(Error::InvalidHandshake("x".into()).close_code(), None);
    }
}
