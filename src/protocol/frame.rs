//! Frame header encoding.
//!
//! Server frames are always final and never masked. Client frames (masked)
//! can be produced with [`encode_client_frame`] for tooling and tests.

use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask;

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Largest server frame header: 2 bytes + 8-byte extended length.
pub const MAX_HEADER_LEN: usize = 10;

/// Encode an unmasked, final frame header for `payload_len` bytes.
///
/// Lengths below 126 are stored inline; below 65536 use the 126 escape and
/// two big-endian bytes; anything larger uses the 127 escape and eight.
/// Returns the number of header bytes written to `buf`.
#[inline]
pub fn encode_header(opcode: OpCode, payload_len: u64, buf: &mut [u8; MAX_HEADER_LEN]) -> usize {
    buf[0] = 0x80 | opcode.as_u8();
    if payload_len < 126 {
        buf[1] = payload_len as u8;
        2
    } else if payload_len < 65536 {
        buf[1] = 126;
        buf[2..4].copy_from_slice(&(payload_len as u16).to_be_bytes());
        4
    } else {
        buf[1] = 127;
        buf[2..10].copy_from_slice(&payload_len.to_be_bytes());
        10
    }
}

/// Encode a masked frame the way a client would send it.
#[must_use]
pub fn encode_client_frame(fin: bool, opcode: OpCode, payload: &[u8], mask: [u8; 4]) -> Vec<u8> {
    let mut header = [0u8; MAX_HEADER_LEN];
    let header_len = encode_header(opcode, payload.len() as u64, &mut header);
    if !fin {
        header[0] &= 0x7F;
    }
    header[1] |= 0x80;

    let mut out = Vec::with_capacity(header_len + 4 + payload.len());
    out.extend_from_slice(&header[..header_len]);
    out.extend_from_slice(&mask);
    let start = out.len();
    out.extend_from_slice(payload);
    apply_mask(&mut out[start..], mask);
    out
}
