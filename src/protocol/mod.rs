//! Runtime-agnostic protocol core: handshake derivation, frame encoding and
//! the incremental reassembler.

pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;
pub mod reassembler;

pub use frame::{MAX_CONTROL_FRAME_PAYLOAD, MAX_HEADER_LEN, encode_header};
pub use handshake::{HandshakeRequest, HandshakeResponse, WS_GUID, compute_accept_key};
pub use mask::{apply_mask, apply_mask_at};
pub use opcode::OpCode;
pub use reassembler::{Event, FrameReassembler, Phase};
