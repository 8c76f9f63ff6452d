use bytes::{Buf, BytesMut};

use crate::address::Register;

/// Every frame is exactly 8 bytes: sync (2) + operation (1) + address (1) + payload (4).
pub const FRAME_LEN: usize = 8;

/// Payload bytes per frame.
pub const PAYLOAD_LEN: usize = 4;

/// First sync byte of host-to-device frames.
pub const SYNC_A: u8 = 0xA5;

/// Second sync byte of host-to-device frames.
pub const SYNC_B: u8 = 0x5A;

/// Leading bytes of every device reply: swapped sync, then Feedback.
pub const REPLY_PREFIX: [u8; 3] = [SYNC_B, SYNC_A, Operation::Feedback as u8];

/// Frame operation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    Read = 0x20,
    Write = 0x30,
    Feedback = 0x40,
}

impl Operation {
    /// Decode an operation byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x20 => Some(Operation::Read),
            0x30 => Some(Operation::Write),
            0x40 => Some(Operation::Feedback),
            _ => None,
        }
    }

    /// Sync bytes for this direction. Replies swap them.
    pub fn sync(self) -> [u8; 2] {
        match self {
            Operation::Feedback => [SYNC_B, SYNC_A],
            Operation::Read | Operation::Write => [SYNC_A, SYNC_B],
        }
    }
}

/// One protocol frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub operation: Operation,
    pub address: u8,
    pub payload: [u8; PAYLOAD_LEN],
}

impl Frame {
    /// Build a frame; `payload` is zero-padded or truncated to 4 bytes.
    pub fn new(operation: Operation, address: u8, payload: &[u8]) -> Self {
        let mut fixed = [0u8; PAYLOAD_LEN];
        let len = payload.len().min(PAYLOAD_LEN);
        fixed[..len].copy_from_slice(&payload[..len]);
        Self {
            operation,
            address,
            payload: fixed,
        }
    }

    /// A read request for `register` with an all-zero payload.
    pub fn read(register: Register) -> Self {
        Self::new(Operation::Read, register.address(), &[])
    }

    /// A write of a little-endian signed value to `register`.
    pub fn write_value(register: Register, value: i32) -> Self {
        Self::new(Operation::Write, register.address(), &encode_i32_le(value))
    }

    /// A write whose first payload byte is `flag` and the rest zero.
    pub fn write_flag(register: Register, flag: u8) -> Self {
        Self::new(Operation::Write, register.address(), &[flag])
    }

    /// A device reply for `register`, as the device would send it.
    pub fn reply(register: Register, payload: [u8; PAYLOAD_LEN]) -> Self {
        Self {
            operation: Operation::Feedback,
            address: register.address(),
            payload,
        }
    }

    /// Register addressed by this frame, if the address is known.
    pub fn register(&self) -> Option<Register> {
        Register::from_address(self.address)
    }

    /// Payload as a little-endian signed integer.
    pub fn value(&self) -> i32 {
        decode_i32_le(self.payload)
    }

    /// Wire bytes of this frame.
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        encode_frame(self.operation, self.address, &self.payload)
    }
}

/// Encode a frame into its 8-byte wire form.
///
/// Wire format:
/// ```text
/// ┌────────┬────────┬───────────┬─────────┬──────────────────┐
/// │ Sync A │ Sync B │ Operation │ Address │ Payload (4B LE)  │
/// │ 0xA5   │ 0x5A   │ 0x20/0x30 │         │                  │
/// └────────┴────────┴───────────┴─────────┴──────────────────┘
/// ```
/// Feedback frames (device to host) carry the sync bytes in the opposite
/// order: `5A A5 40`.
pub fn encode_frame(operation: Operation, address: u8, payload: &[u8]) -> [u8; FRAME_LEN] {
    let mut out = [0u8; FRAME_LEN];
    out[..2].copy_from_slice(&operation.sync());
    out[2] = operation as u8;
    out[3] = address;
    let len = payload.len().min(PAYLOAD_LEN);
    out[4..4 + len].copy_from_slice(&payload[..len]);
    out
}

/// Little-endian bytes of `value`.
pub fn encode_i32_le(value: i32) -> [u8; PAYLOAD_LEN] {
    value.to_le_bytes()
}

/// Signed value of a little-endian payload; byte `i` contributes `byte << (8 * i)`.
pub fn decode_i32_le(payload: [u8; PAYLOAD_LEN]) -> i32 {
    payload
        .iter()
        .enumerate()
        .fold(0u32, |acc, (i, byte)| acc | (u32::from(*byte) << (8 * i))) as i32
}

/// Scan `buf` for device replies.
///
/// Each yielded frame consumes itself and every byte before it; bytes that
/// precede a reply are discarded, not retried. Iteration ends at the first
/// position where no complete reply follows, leaving that remainder in
/// `buf` for the next read.
pub fn scan(buf: &mut BytesMut) -> Scan<'_> {
    Scan { buf }
}

/// Lazy iterator returned by [`scan`].
pub struct Scan<'a> {
    buf: &'a mut BytesMut,
}

impl Iterator for Scan<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.buf.len() < FRAME_LEN {
            return None;
        }
        let start = find_reply(&self.buf[..])?;
        if self.buf.len() - start < FRAME_LEN {
            return None;
        }

        self.buf.advance(start);
        let address = self.buf[3];
        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&self.buf[4..FRAME_LEN]);
        self.buf.advance(FRAME_LEN);

        Some(Frame {
            operation: Operation::Feedback,
            address,
            payload,
        })
    }
}

fn find_reply(buf: &[u8]) -> Option<usize> {
    buf.windows(REPLY_PREFIX.len())
        .position(|window| window == REPLY_PREFIX)
}

/// Render bytes as space-separated uppercase hex pairs, e.g. `A5 5A 20 01`.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Channel, ChannelRegister};

    fn reply_bytes(address: u8, payload: [u8; 4]) -> [u8; FRAME_LEN] {
        encode_frame(Operation::Feedback, address, &payload)
    }

    #[test]
    fn read_frame_is_zero_padded() {
        let frame = Frame::read(Register::Status);
        assert_eq!(
            frame.to_bytes(),
            [0xA5, 0x5A, 0x20, 0x25, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn write_value_is_little_endian() {
        let ch2 = Channel::new(2).unwrap();
        let frame = Frame::write_value(Register::Channel(ChannelRegister::SetCurrent, ch2), -1000);
        assert_eq!(
            frame.to_bytes(),
            [0xA5, 0x5A, 0x30, 0x02, 0x18, 0xFC, 0xFF, 0xFF]
        );
    }

    #[test]
    fn write_flag_fills_first_payload_byte() {
        let frame = Frame::write_flag(Register::OnOff, 0x01);
        assert_eq!(
            frame.to_bytes(),
            [0xA5, 0x5A, 0x30, 0x23, 0x01, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn long_payload_is_truncated() {
        let bytes = encode_frame(Operation::Write, 0x27, &[1, 2, 3, 4, 5, 6]);
        assert_eq!(bytes, [0xA5, 0x5A, 0x30, 0x27, 1, 2, 3, 4]);
    }

    #[test]
    fn feedback_frames_swap_sync_bytes() {
        let bytes = reply_bytes(0x22, [0x10, 0, 0, 0]);
        assert_eq!(&bytes[..3], &REPLY_PREFIX);
    }

    #[test]
    fn i32_le_inverse_holds_at_the_edges() {
        for value in [0, 1, -1, 5000, -5000, 0x1234_5678, i32::MIN, i32::MAX] {
            assert_eq!(decode_i32_le(encode_i32_le(value)), value);
        }
    }

    #[test]
    fn decode_i32_le_weights_bytes_by_position() {
        assert_eq!(decode_i32_le([0x01, 0x00, 0x00, 0x00]), 1);
        assert_eq!(decode_i32_le([0x00, 0x01, 0x00, 0x00]), 256);
        assert_eq!(decode_i32_le([0xFF, 0xFF, 0xFF, 0xFF]), -1);
    }

    #[test]
    fn scan_yields_single_reply_and_empties_buffer() {
        let mut buf = BytesMut::from(&reply_bytes(0x22, [0x2C, 0x01, 0, 0])[..]);
        let frames: Vec<Frame> = scan(&mut buf).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].address, 0x22);
        assert_eq!(frames[0].value(), 300);
        assert!(buf.is_empty());
    }

    #[test]
    fn scan_skips_garbage_between_replies() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&reply_bytes(0x07, [0x64, 0, 0, 0]));
        buf.extend_from_slice(&[0x13, 0x37, 0x99]);
        buf.extend_from_slice(&reply_bytes(0x08, [0xC8, 0, 0, 0]));

        let frames: Vec<Frame> = scan(&mut buf).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!((frames[0].address, frames[0].value()), (0x07, 100));
        assert_eq!((frames[1].address, frames[1].value()), (0x08, 200));
        assert!(buf.is_empty());
    }

    #[test]
    fn scan_ignores_echoed_commands() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&Frame::read(Register::BusVoltage).to_bytes());
        buf.extend_from_slice(&reply_bytes(0x22, [0x05, 0, 0, 0]));

        let frames: Vec<Frame> = scan(&mut buf).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].value(), 5);
        assert!(buf.is_empty());
    }

    #[test]
    fn scan_keeps_partial_trailing_reply() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&reply_bytes(0x22, [0x01, 0, 0, 0]));
        let second = reply_bytes(0x25, [0x01, 0, 0, 0]);
        buf.extend_from_slice(&second[..5]);

        let frames: Vec<Frame> = scan(&mut buf).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(buf.as_ref(), &second[..5]);

        buf.extend_from_slice(&second[5..]);
        let frames: Vec<Frame> = scan(&mut buf).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].address, 0x25);
        assert!(buf.is_empty());
    }

    #[test]
    fn scan_leaves_unmatched_bytes_alone() {
        let mut buf = BytesMut::from(&[0u8, 1, 2, 3, 4, 5, 6, 7, 8][..]);
        assert_eq!(scan(&mut buf).count(), 0);
        assert_eq!(buf.len(), 9);
    }

    #[test]
    fn scan_is_restartable_after_partial_consumption() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&reply_bytes(0x01, [1, 0, 0, 0]));
        buf.extend_from_slice(&reply_bytes(0x02, [2, 0, 0, 0]));

        let first = scan(&mut buf).next().unwrap();
        assert_eq!(first.address, 0x01);
        assert_eq!(buf.len(), FRAME_LEN);

        let rest: Vec<Frame> = scan(&mut buf).collect();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].address, 0x02);
    }

    #[test]
    fn hex_dump_formats_uppercase_pairs() {
        assert_eq!(hex_dump(&[0xA5, 0x5A, 0x0b]), "A5 5A 0B");
        assert_eq!(hex_dump(&[]), "");
    }

    #[test]
    fn operation_byte_roundtrip() {
        for op in [Operation::Read, Operation::Write, Operation::Feedback] {
            assert_eq!(Operation::from_byte(op as u8), Some(op));
        }
        assert_eq!(Operation::from_byte(0x50), None);
    }
}
