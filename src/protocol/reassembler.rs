//! Incremental frame parser and message reassembler.
//!
//! [`FrameReassembler`] consumes inbound bytes in blocks of any size and
//! boundary, including one byte at a time, and never re-parses a byte.
//! Every phase of the frame header keeps its partial progress in the
//! reassembler so parsing resumes exactly where the previous block ended.
//!
//! Completed work is reported as [`Event`]s in wire order. Data frames are
//! collected in one accumulator until the final fragment arrives; control
//! frames use a second accumulator so a ping in the middle of a fragmented
//! message leaves the partial message untouched.

use bytes::{Bytes, BytesMut};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::MessageType;
use crate::protocol::OpCode;
use crate::protocol::frame::MAX_CONTROL_FRAME_PAYLOAD;
use crate::protocol::mask::apply_mask_at;

/// Parse phase of the frame currently being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the FIN/RSV/opcode byte.
    Start,
    /// Waiting for the MASK/length byte.
    PayloadLength,
    /// Collecting the 2- or 8-byte extended length.
    ExtendedLength,
    /// Collecting the 4-byte masking key.
    MaskKey,
    /// Extension data; always empty since no extension is negotiated.
    ExtensionData,
    /// Copying and unmasking payload bytes.
    ApplicationData,
    /// Terminal: a close frame arrived or the stream violated the protocol.
    Closing,
}

/// Something the connection has to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A complete, unmasked text or binary message.
    Message {
        /// Type of the first fragment.
        kind: MessageType,
        /// Concatenated payload of every fragment.
        payload: Bytes,
    },
    /// A ping; the payload must be echoed in a pong.
    Ping(Bytes),
    /// A close frame. No further events follow.
    Close(Bytes),
}

/// Result of one phase transition.
enum Step {
    /// The block is exhausted; resume in the same phase next time.
    NeedInput,
    /// The phase changed; keep going with the remaining bytes.
    Advance,
}

/// Buffer for the message currently in progress.
#[derive(Debug, Default)]
struct Accumulator {
    buffer: BytesMut,
    /// Opcode of the first fragment; `None` when no message is in progress.
    opcode: Option<OpCode>,
}

impl Accumulator {
    fn take(&mut self) -> Bytes {
        self.opcode = None;
        self.buffer.split().freeze()
    }

    fn release(&mut self) {
        self.opcode = None;
        self.buffer = BytesMut::new();
    }
}

/// Resumable frame parser for one inbound stream.
#[derive(Debug)]
pub struct FrameReassembler {
    limits: Limits,
    phase: Phase,

    fin: bool,
    opcode: OpCode,
    payload_len: u64,
    length_bytes_remaining: u8,
    remaining: u64,

    mask: [u8; 4],
    mask_index: u8,
    masked: bool,
    mask_offset: usize,

    control: Accumulator,
    message: Accumulator,
}

impl FrameReassembler {
    /// Create a reassembler in the `Start` phase.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            phase: Phase::Start,
            fin: false,
            opcode: OpCode::Continuation,
            payload_len: 0,
            length_bytes_remaining: 0,
            remaining: 0,
            mask: [0; 4],
            mask_index: 0,
            masked: false,
            mask_offset: 0,
            control: Accumulator::default(),
            message: Accumulator::default(),
        }
    }

    /// Current parse phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns `true` once a close frame was read or parsing failed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closing
    }

    /// Returns `true` while a fragmented data message is incomplete.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.message.opcode.is_some()
    }

    /// Bytes held for the data message in progress.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.message.buffer.len()
    }

    /// Feed one block of inbound bytes.
    ///
    /// Events are appended to `events` in wire order. Once the reassembler
    /// reaches `Closing` the rest of the block, and every later block, is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Any protocol violation. The reassembler is then in `Closing`, and
    /// events produced earlier in the same block remain in `events`.
    pub fn feed(&mut self, block: &[u8], events: &mut Vec<Event>) -> Result<()> {
        let mut input = block;
        loop {
            let step = match self.phase {
                Phase::Start => self.read_start(&mut input),
                Phase::PayloadLength => self.read_payload_length(&mut input),
                Phase::ExtendedLength => self.read_extended_length(&mut input),
                Phase::MaskKey => self.read_mask_key(&mut input),
                Phase::ExtensionData => self.reserve_payload(),
                Phase::ApplicationData => self.read_application_data(&mut input, events),
                Phase::Closing => Ok(Step::NeedInput),
            };
            match step {
                Ok(Step::Advance) => {}
                Ok(Step::NeedInput) => return Ok(()),
                Err(e) => {
                    tracing::trace!(error = %e, phase = ?self.phase, "frame rejected");
                    self.phase = Phase::Closing;
                    self.release();
                    return Err(e);
                }
            }
        }
    }

    /// Drop both accumulators' buffers.
    pub fn release(&mut self) {
        self.control.release();
        self.message.release();
    }

    fn read_start(&mut self, input: &mut &[u8]) -> Result<Step> {
        let Some(byte) = next_byte(input) else {
            return Ok(Step::NeedInput);
        };

        if byte & 0x70 != 0 {
            return Err(Error::ReservedBitsSet);
        }
        let fin = byte & 0x80 != 0;
        let opcode = OpCode::try_from(byte & 0x0F)?;

        if opcode.is_control() {
            if !fin {
                return Err(Error::FragmentedControlFrame);
            }
        } else if opcode == OpCode::Continuation {
            if self.message.opcode.is_none() {
                return Err(Error::ProtocolViolation(
                    "Continuation frame without a message in progress".into(),
                ));
            }
        } else if self.message.opcode.is_some() {
            return Err(Error::ProtocolViolation(
                "New message started before the previous one finished".into(),
            ));
        } else {
            self.message.opcode = Some(opcode);
        }

        self.fin = fin;
        self.opcode = opcode;
        self.phase = Phase::PayloadLength;
        Ok(Step::Advance)
    }

    fn read_payload_length(&mut self, input: &mut &[u8]) -> Result<Step> {
        let Some(byte) = next_byte(input) else {
            return Ok(Step::NeedInput);
        };

        if byte & 0x80 == 0 {
            return Err(Error::UnmaskedClientFrame);
        }
        match byte & 0x7F {
            126 => {
                self.payload_len = 0;
                self.length_bytes_remaining = 2;
            }
            127 => {
                self.payload_len = 0;
                self.length_bytes_remaining = 8;
            }
            len => {
                self.payload_len = u64::from(len);
                self.length_bytes_remaining = 0;
            }
        }
        self.phase = Phase::ExtendedLength;
        Ok(Step::Advance)
    }

    fn read_extended_length(&mut self, input: &mut &[u8]) -> Result<Step> {
        while self.length_bytes_remaining > 0 {
            let Some(byte) = next_byte(input) else {
                return Ok(Step::NeedInput);
            };
            self.payload_len = (self.payload_len << 8) | u64::from(byte);
            self.length_bytes_remaining -= 1;
        }

        let len = self.payload_len;
        if len > i64::MAX as u64 {
            return Err(Error::ProtocolViolation(format!(
                "Negative payload length: {}",
                len as i64
            )));
        }
        self.limits.check_payload_size(len)?;

        if self.opcode.is_control() {
            if len > MAX_CONTROL_FRAME_PAYLOAD as u64 {
                return Err(Error::ControlFrameTooLarge(len));
            }
            self.limits.check_message_size(len)?;
        } else {
            let total = (self.message.buffer.len() as u64).saturating_add(len);
            self.limits.check_message_size(total)?;
        }

        self.remaining = len;
        self.mask_index = 0;
        self.phase = Phase::MaskKey;
        Ok(Step::Advance)
    }

    fn read_mask_key(&mut self, input: &mut &[u8]) -> Result<Step> {
        while self.mask_index < 4 {
            let Some(byte) = next_byte(input) else {
                return Ok(Step::NeedInput);
            };
            self.mask[usize::from(self.mask_index)] = byte;
            self.mask_index += 1;
        }
        self.mask_index = 0;
        self.mask_offset = 0;
        // An all-zero key leaves the payload unchanged.
        self.masked = self.mask != [0; 4];
        self.phase = Phase::ExtensionData;
        Ok(Step::Advance)
    }

    fn reserve_payload(&mut self) -> Result<Step> {
        let additional = usize::try_from(self.payload_len).map_err(|_| Error::FrameTooLarge {
            size: self.payload_len,
            max: usize::MAX as u64,
        })?;
        if additional > 0 {
            self.target().buffer.reserve(additional);
        }
        self.phase = Phase::ApplicationData;
        Ok(Step::Advance)
    }

    fn read_application_data(&mut self, input: &mut &[u8], events: &mut Vec<Event>) -> Result<Step> {
        // remaining never exceeds the payload limit, which fits in usize
        // once reserve_payload has succeeded.
        let take = input.len().min(self.remaining as usize);
        if take > 0 {
            let (mask, masked, offset) = (self.mask, self.masked, self.mask_offset);
            let buffer = &mut self.target().buffer;
            let start = buffer.len();
            buffer.extend_from_slice(&input[..take]);
            if masked {
                apply_mask_at(&mut buffer[start..], mask, offset);
            }
            self.mask_offset += take;
            self.remaining -= take as u64;
            *input = &input[take..];
        }

        if self.remaining > 0 {
            return Ok(Step::NeedInput);
        }
        self.complete_frame(events);
        Ok(Step::Advance)
    }

    fn complete_frame(&mut self, events: &mut Vec<Event>) {
        tracing::trace!(
            opcode = %self.opcode,
            fin = self.fin,
            len = self.payload_len,
            "frame complete"
        );
        self.phase = Phase::Start;
        match self.opcode {
            OpCode::Close => {
                events.push(Event::Close(self.control.take()));
                self.phase = Phase::Closing;
            }
            OpCode::Ping => events.push(Event::Ping(self.control.take())),
            OpCode::Pong => self.control.buffer.clear(),
            OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                if self.fin {
                    let kind = self
                        .message
                        .opcode
                        .and_then(OpCode::message_type)
                        .unwrap_or(MessageType::Text);
                    let payload = self.message.take();
                    events.push(Event::Message { kind, payload });
                }
            }
        }
    }

    fn target(&mut self) -> &mut Accumulator {
        if self.opcode.is_control() {
            &mut self.control
        } else {
            &mut self.message
        }
    }
}

#[inline]
fn next_byte(input: &mut &[u8]) -> Option<u8> {
    let (&byte, rest) = input.split_first()?;
    *input = rest;
    Some(byte)
}
