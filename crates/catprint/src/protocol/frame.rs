//! Frame encoding and decoding.
//!
//! Layout: `MAGIC + opcode + 0x00 + len + 0x00 + payload + crc8(payload) + 0x00`.
//! The checksum covers the payload only.

use super::Command;
use crate::{CatPrintError, Result};

/// Frame magic bytes ("Qx").
pub const MAGIC: [u8; 2] = [0x51, 0x78];

/// Bytes a frame adds around its payload.
pub const FRAME_OVERHEAD: usize = 8;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// CRC8 lookup table (polynomial 0x07).
#[rustfmt::skip]
const CRC8_TABLE: [u8; 256] = [
    0,   7,  14,   9,  28,  27,  18,  21,  56,  63,  54,  49,  36,  35,  42,  45,
  112, 119, 126, 121, 108, 107,  98, 101,  72,  79,  70,  65,  84,  83,  90,  93,
  224, 231, 238, 233, 252, 251, 242, 245, 216, 223, 214, 209, 196, 195, 202, 205,
  144, 151, 158, 153, 140, 139, 130, 133, 168, 175, 166, 161, 180, 179, 186, 189,
  199, 192, 201, 206, 219, 220, 213, 210, 255, 248, 241, 246, 227, 228, 237, 234,
  183, 176, 185, 190, 171, 172, 165, 162, 143, 136, 129, 134, 147, 148, 157, 154,
   39,  32,  41,  46,  59,  60,  53,  50,  31,  24,  17,  22,   3,   4,  13,  10,
   87,  80,  89,  94,  75,  76,  69,  66, 111, 104,  97, 102, 115, 116, 125, 122,
  137, 142, 135, 128, 149, 146, 155, 156, 177, 182, 191, 184, 173, 170, 163, 164,
  249, 254, 247, 240, 229, 226, 235, 236, 193, 198, 207, 200, 221, 218, 211, 212,
  105, 110, 103,  96, 117, 114, 123, 124,  81,  86,  95,  88,  77,  74,  67,  68,
   25,  30,  23,  16,   5,   2,  11,  12,  33,  38,  47,  40,  61,  58,  51,  52,
   78,  73,  64,  71,  82,  85,  92,  91, 118, 113, 120, 127, 106, 109, 100,  99,
   62,  57,  48,  55,  34,  37,  44,  43,   6,   1,   8,  15,  26,  29,  20,  19,
  174, 169, 160, 167, 178, 181, 188, 187, 150, 145, 152, 159, 138, 141, 132, 131,
  222, 217, 208, 215, 194, 197, 204, 203, 230, 225, 232, 239, 250, 253, 244, 243,
];

/// Compute CRC8 checksum over a byte slice.
pub fn crc8(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |crc, &b| CRC8_TABLE[(crc ^ b) as usize])
}

/// Command argument: raw bytes or a 16-bit value sent little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    Bytes(&'a [u8]),
    Word(u16),
}

impl<'a> From<&'a [u8]> for Payload<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Payload::Bytes(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Payload<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<u16> for Payload<'_> {
    fn from(value: u16) -> Self {
        Payload::Word(value)
    }
}

/// Encode one command frame.
///
/// # Panics
/// Panics if the payload is longer than 255 bytes. Callers split data
/// upstream; a bitmap frame always carries exactly one raster line.
pub fn encode<'a>(command: Command, payload: impl Into<Payload<'a>>) -> Vec<u8> {
    let word;
    let data: &[u8] = match payload.into() {
        Payload::Bytes(bytes) => bytes,
        Payload::Word(value) => {
            word = value.to_le_bytes();
            &word
        }
    };
    assert!(
        data.len() <= MAX_PAYLOAD,
        "Frame payload must be at most {MAX_PAYLOAD} bytes, got {}",
        data.len()
    );

    let mut buf = Vec::with_capacity(FRAME_OVERHEAD + data.len());
    buf.extend_from_slice(&MAGIC);
    buf.push(command.code());
    buf.push(0x00);
    buf.push(data.len() as u8);
    buf.push(0x00);
    buf.extend_from_slice(data);
    buf.push(crc8(data));
    buf.push(0x00);
    buf
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub payload: Vec<u8>,
}

/// Decode the frame at the start of `buf`.
///
/// Returns the frame and the number of bytes it occupied.
pub fn decode(buf: &[u8]) -> Result<(Frame, usize)> {
    if buf.len() < FRAME_OVERHEAD {
        return Err(CatPrintError::Protocol(format!(
            "truncated frame: {} bytes",
            buf.len()
        )));
    }
    if buf[..2] != MAGIC {
        return Err(CatPrintError::Protocol(format!(
            "bad magic {:02x} {:02x}",
            buf[0], buf[1]
        )));
    }
    let command = Command::from_code(buf[2])
        .ok_or_else(|| CatPrintError::Protocol(format!("unknown opcode 0x{:02x}", buf[2])))?;

    let len = buf[4] as usize;
    let total = FRAME_OVERHEAD + len;
    if buf.len() < total {
        return Err(CatPrintError::Protocol(format!(
            "frame declares {len} payload bytes but only {} remain",
            buf.len() - FRAME_OVERHEAD
        )));
    }

    let payload = &buf[6..6 + len];
    let checksum = buf[6 + len];
    if checksum != crc8(payload) {
        return Err(CatPrintError::Protocol(format!(
            "checksum mismatch for {command:?}: got 0x{checksum:02x}, expected 0x{:02x}",
            crc8(payload)
        )));
    }

    Ok((
        Frame {
            command,
            payload: payload.to_vec(),
        },
        total,
    ))
}

/// Decode a concatenated command stream into frames.
pub fn decode_stream(mut buf: &[u8]) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    while !buf.is_empty() {
        let (frame, used) = decode(buf)?;
        frames.push(frame);
        buf = &buf[used..];
    }
    Ok(frames)
}
