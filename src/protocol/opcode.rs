//! Frame opcodes.

use crate::error::Error;
use crate::message::MessageType;

/// Frame opcode, the low nibble of the first header byte.
///
/// Only the six defined values are representable; reserved values are
/// rejected when the first header byte is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Next chunk of a fragmented message.
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    /// Answered with a pong carrying the same payload.
    Ping = 0x9,
    Pong = 0xA,
}

impl OpCode {
    /// Wire value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Close, ping and pong. These are never fragmented and carry at most
    /// 125 bytes.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        self.as_u8() & 0x8 != 0
    }

    /// Message type a frame with this opcode starts, or `None` for a
    /// continuation.
    #[must_use]
    pub const fn message_type(self) -> Option<MessageType> {
        match self {
            OpCode::Continuation => None,
            OpCode::Text => Some(MessageType::Text),
            OpCode::Binary => Some(MessageType::Binary),
            OpCode::Close => Some(MessageType::Close),
            OpCode::Ping => Some(MessageType::Ping),
            OpCode::Pong => Some(MessageType::Pong),
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = Error;

    /// Decode the low nibble of a header byte.
    fn try_from(nibble: u8) -> Result<Self, Error> {
        Ok(match nibble {
            0x0 => OpCode::Continuation,
            0x1 => OpCode::Text,
            0x2 => OpCode::Binary,
            0x8 => OpCode::Close,
            0x9 => OpCode::Ping,
            0xA => OpCode::Pong,
            0x3..=0x7 | 0xB..=0xF => return Err(Error::ReservedOpcode(nibble)),
            _ => return Err(Error::InvalidOpcode(nibble)),
        })
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.message_type() {
            Some(kind) => write!(f, "{kind}"),
            None => f.write_str("continuation"),
        }
    }
}
