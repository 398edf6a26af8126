//! Message types exchanged with handlers, and close status codes.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::OpCode;

/// Maximum UTF-8 length of a close reason (125 minus the 2-byte code).
pub const MAX_CLOSE_REASON: usize = 123;

/// Kind of message delivered to or sent by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// UTF-8 text message. Payloads are passed through unvalidated.
    Text,
    /// Binary message.
    Binary,
    /// Ping control frame.
    Ping,
    /// Pong control frame.
    Pong,
    /// Close control frame.
    Close,
}

impl MessageType {
    /// Opcode used on the wire for this message type.
    #[inline]
    #[must_use]
    pub const fn opcode(self) -> OpCode {
        match self {
            MessageType::Text => OpCode::Text,
            MessageType::Binary => OpCode::Binary,
            MessageType::Ping => OpCode::Ping,
            MessageType::Pong => OpCode::Pong,
            MessageType::Close => OpCode::Close,
        }
    }

    /// Returns `true` for ping, pong and close.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        self.opcode().is_control()
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MessageType::Text => "text",
            MessageType::Binary => "binary",
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::Close => "close",
        })
    }
}

/// Close status code carried in the first two bytes of a close payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000).
    #[default]
    Normal,
    /// Going away (1001).
    GoingAway,
    /// Protocol error (1002). Sent when the reassembler fails.
    ProtocolError,
    /// Unsupported data (1003).
    UnsupportedData,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009). Sent when a size limit is exceeded.
    MessageTooBig,
    /// Internal error (1011).
    InternalError,
    /// Any other code.
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Codes that an endpoint must never put in a close frame:
    /// 1004, 1005 (no status), 1006 (abnormal closure) and 1015 (TLS).
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        matches!(self.as_u16(), 1004..=1006 | 1015)
    }

    /// Whether a peer may put this code in its close frame.
    ///
    /// 1005, 1006 and 1015 are never valid on the wire. Codes held back for
    /// future protocol use (1004, 1012-1014, 1016-2999) are accepted only
    /// when `allow_reserved` is set. Codes below 1000 or above 4999 are
    /// always invalid.
    #[must_use]
    pub const fn is_valid_inbound(&self, allow_reserved: bool) -> bool {
        match self.as_u16() {
            1005 | 1006 | 1015 => false,
            1000..=1003 | 1007..=1011 | 3000..=4999 => true,
            1004 | 1012..=1014 | 1016..=2999 => allow_reserved,
            _ => false,
        }
    }
}

/// Decoded close payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Reason bytes following the code, lossily decoded.
    pub reason: String,
}

impl CloseFrame {
    /// Create a new close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Decode a close payload. An empty payload carries no status and
    /// yields `None`, as does a malformed single-byte payload.
    #[must_use]
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < 2 {
            return None;
        }
        let code = u16::from_be_bytes([payload[0], payload[1]]);
        Some(Self::new(
            CloseCode::from_u16(code),
            String::from_utf8_lossy(&payload[2..]),
        ))
    }

    /// Encode into a close payload.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCloseCode` for reserved codes
    /// - `Error::ControlFrameTooLarge` if the reason exceeds 123 bytes
    pub fn encode(&self) -> Result<Bytes> {
        if self.code.is_reserved() {
            return Err(Error::InvalidCloseCode(self.code.as_u16()));
        }
        if self.reason.len() > MAX_CLOSE_REASON {
            return Err(Error::ControlFrameTooLarge(self.reason.len() as u64 + 2));
        }
        let mut buf = BytesMut::with_capacity(2 + self.reason.len());
        buf.put_u16(self.code.as_u16());
        buf.put_slice(self.reason.as_bytes());
        Ok(buf.freeze())
    }
}
