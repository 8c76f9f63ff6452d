//! Fixed-length frame codec for the EShim power-supply protocol.
//!
//! Every frame is 8 bytes:
//! - 2 sync bytes (`A5 5A` host to device, `5A A5` device to host)
//! - 1 operation byte (Read, Write, Feedback)
//! - 1 register address byte
//! - 4 payload bytes, little-endian
//!
//! Replies are recovered from the raw byte stream by scanning for the
//! swapped sync and Feedback prefix, so echoed commands and line noise are
//! skipped without any buffer management in user code.

pub mod address;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use address::{Channel, ChannelRegister, Register, CHANNEL_COUNT};
pub use codec::{
    decode_i32_le, encode_frame, encode_i32_le, hex_dump, scan, Frame, Operation, Scan, FRAME_LEN,
    PAYLOAD_LEN, REPLY_PREFIX, SYNC_A, SYNC_B,
};
pub use error::{FrameError, Result};
pub use reader::{FrameBuffer, FrameConfig, FrameReader, DEFAULT_MAX_BUFFERED};
pub use writer::FrameWriter;
