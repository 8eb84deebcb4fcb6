//! Control frame codec
//!
//! Every session starts with one of two frame shapes, all addresses
//! big-endian:
//!
//! | Frame | Bytes |
//! |---|---|
//! | load header | `00 AA AA AA AA` |
//! | save header | `01 AA AA AA AA 00` |
//! | register command | `00 00 10 00 08 VV` |
//!
//! The register command is a load of one byte to a fixed pseudo-address; it
//! must stay bit-exact for the device to recognise it.

use crate::error::{Error, Result};

/// Opcode byte of a load (host to device) header
pub const LOAD_OPCODE: u8 = 0x00;
/// Opcode byte of a save (device to host) header
pub const SAVE_OPCODE: u8 = 0x01;

/// Pseudo-address of the control register
pub const CONTROL_ADDRESS: u32 = 0x0010_0008;

/// Register value that asserts the remote CPU reset line
pub const RESET_ASSERT: u8 = 0xFC;
/// Register value that releases the remote CPU reset line
pub const RESET_RELEASE: u8 = 0xFF;

/// Length of a load header
pub const LOAD_HEADER_LEN: usize = 5;
/// Length of a save header, including the reserved byte
pub const SAVE_HEADER_LEN: usize = 6;
/// Length of a register command
pub const REGISTER_FRAME_LEN: usize = 6;
/// Longest encoded frame
pub const MAX_FRAME_LEN: usize = 6;

/// Encoded frame bytes
pub type FrameBytes = heapless::Vec<u8, MAX_FRAME_LEN>;

/// A frame sent at the start of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFrame {
    /// Host writes payload to device memory starting at `address`
    Load {
        /// Destination address
        address: u32,
    },
    /// Device emits memory contents starting at `address`
    Save {
        /// Source address
        address: u32,
    },
    /// Write `value` to the control register
    RegisterWrite {
        /// Register value
        value: u8,
    },
}

impl ControlFrame {
    /// Load header for `address`
    pub fn load(address: u32) -> Self {
        Self::Load { address }
    }

    /// Save header for `address`
    pub fn save(address: u32) -> Self {
        Self::Save { address }
    }

    /// Register command carrying `value`
    pub fn register(value: u8) -> Self {
        Self::RegisterWrite { value }
    }

    /// Opcode byte of this frame
    pub fn opcode(&self) -> u8 {
        match self {
            Self::Load { .. } | Self::RegisterWrite { .. } => LOAD_OPCODE,
            Self::Save { .. } => SAVE_OPCODE,
        }
    }

    /// Address carried in bytes 1..5
    pub fn address(&self) -> u32 {
        match *self {
            Self::Load { address } | Self::Save { address } => address,
            Self::RegisterWrite { .. } => CONTROL_ADDRESS,
        }
    }

    /// Number of bytes `encode` produces
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Load { .. } => LOAD_HEADER_LEN,
            Self::Save { .. } => SAVE_HEADER_LEN,
            Self::RegisterWrite { .. } => REGISTER_FRAME_LEN,
        }
    }

    /// Encode into `buf`, returning the number of bytes written
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.encoded_len();
        if buf.len() < len {
            return Err(Error::BufferTooSmall);
        }

        buf[0] = self.opcode();
        buf[1..5].copy_from_slice(&self.address().to_be_bytes());
        match *self {
            Self::Load { .. } => {}
            Self::Save { .. } => buf[5] = 0,
            Self::RegisterWrite { value } => buf[5] = value,
        }
        Ok(len)
    }

    /// Encode into an owned fixed-capacity buffer
    pub fn to_bytes(&self) -> FrameBytes {
        let mut raw = [0u8; MAX_FRAME_LEN];
        let encoded = self.encode(&mut raw);
        debug_assert!(encoded.is_ok(), "MAX_FRAME_LEN too small for {:?}", self);
        let len = encoded.unwrap_or(0);
        let mut out = FrameBytes::new();
        let copied = out.extend_from_slice(&raw[..len]);
        debug_assert!(copied.is_ok(), "FrameBytes capacity below MAX_FRAME_LEN");
        out
    }

    /// Decode a frame from the start of `bytes`
    ///
    /// Returns the frame and the number of bytes consumed. A load header
    /// addressed to [`CONTROL_ADDRESS`] followed by a value byte decodes as
    /// a register command.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < LOAD_HEADER_LEN {
            return Err(Error::MalformedFrame);
        }

        let address = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        match bytes[0] {
            LOAD_OPCODE if address == CONTROL_ADDRESS && bytes.len() >= REGISTER_FRAME_LEN => {
                Ok((Self::RegisterWrite { value: bytes[5] }, REGISTER_FRAME_LEN))
            }
            LOAD_OPCODE => Ok((Self::Load { address }, LOAD_HEADER_LEN)),
            SAVE_OPCODE => match bytes.get(5) {
                Some(0) => Ok((Self::Save { address }, SAVE_HEADER_LEN)),
                _ => Err(Error::MalformedFrame),
            },
            _ => Err(Error::MalformedFrame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_header_layout() {
        let bytes = ControlFrame::load(0x0004_2000).to_bytes();
        assert_eq!(bytes.as_slice(), &[0x00, 0x00, 0x04, 0x20, 0x00]);
    }

    #[test]
    fn test_to_bytes_matches_encode() {
        for frame in [
            ControlFrame::load(0x0001_6000),
            ControlFrame::save(0x0001_6000),
            ControlFrame::register(RESET_ASSERT),
        ] {
            let mut raw = [0u8; MAX_FRAME_LEN];
            let len = frame.encode(&mut raw).unwrap();
            assert_eq!(frame.to_bytes().as_slice(), &raw[..len]);
        }
    }

    #[test]
    fn test_save_header_has_reserved_zero() {
        let bytes = ControlFrame::save(0x1234_5678).to_bytes();
        assert_eq!(bytes.as_slice(), &[0x01, 0x12, 0x34, 0x56, 0x78, 0x00]);
    }

    #[test]
    fn test_register_commands_are_bit_exact() {
        assert_eq!(
            ControlFrame::register(RESET_ASSERT).to_bytes().as_slice(),
            &[0x00, 0x00, 0x10, 0x00, 0x08, 0xFC]
        );
        assert_eq!(
            ControlFrame::register(RESET_RELEASE).to_bytes().as_slice(),
            &[0x00, 0x00, 0x10, 0x00, 0x08, 0xFF]
        );
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        let mut buf = [0u8; 5];
        assert_eq!(
            ControlFrame::save(0).encode(&mut buf),
            Err(Error::BufferTooSmall)
        );
        assert_eq!(ControlFrame::load(0).encode(&mut buf), Ok(5));
    }

    #[test]
    fn test_decode_distinguishes_register_write() {
        let (frame, used) = ControlFrame::decode(&[0, 0, 0x10, 0, 8, 0xFC, 0xAA]).unwrap();
        assert_eq!(frame, ControlFrame::register(RESET_ASSERT));
        assert_eq!(used, 6);

        let (frame, used) = ControlFrame::decode(&[0, 0, 0x01, 0x60, 0x00, 0xAA]).unwrap();
        assert_eq!(frame, ControlFrame::load(0x16000));
        assert_eq!(used, 5);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert_eq!(ControlFrame::decode(&[0, 0, 0]), Err(Error::MalformedFrame));
        assert_eq!(
            ControlFrame::decode(&[0x02, 0, 0, 0, 0]),
            Err(Error::MalformedFrame)
        );
        // Save header without, or with a nonzero, reserved byte
        assert_eq!(
            ControlFrame::decode(&[0x01, 0, 0, 0, 0]),
            Err(Error::MalformedFrame)
        );
        assert_eq!(
            ControlFrame::decode(&[0x01, 0, 0, 0, 0, 0x55]),
            Err(Error::MalformedFrame)
        );
    }
}
