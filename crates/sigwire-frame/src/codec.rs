use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::timing::TimingConfig;

/// Frame delimiter.
pub const FLAG: u8 = 0x7E;

/// Escape byte; the following byte is XORed with [`ESCAPE_XOR`].
pub const ESCAPE: u8 = 0x7D;

/// Mask applied to an escaped byte.
pub const ESCAPE_XOR: u8 = 0x20;

/// Sequence number width.
pub const SEQUENCE_LEN: usize = 1;

/// CRC-32 width.
pub const CHECKSUM_LEN: usize = 4;

/// Smallest valid unstuffed body: sequence + empty payload + checksum.
pub const MIN_BODY_LEN: usize = SEQUENCE_LEN + CHECKSUM_LEN;

/// Default bound on a partial frame held by a receiver: 64 KiB.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// A verified frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Stop-and-wait sequence number.
    pub sequence: u8,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(sequence: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            payload: payload.into(),
        }
    }

    /// Encode this frame into its delimited wire form.
    pub fn to_wire(&self) -> Bytes {
        build_frame(self.sequence, &self.payload)
    }
}

/// Escape every [`FLAG`] and [`ESCAPE`] byte in `src`, appending to `dst`.
pub fn stuff(src: &[u8], dst: &mut BytesMut) {
    dst.reserve(src.len());
    for &byte in src {
        if byte == FLAG || byte == ESCAPE {
            dst.put_u8(ESCAPE);
            dst.put_u8(byte ^ ESCAPE_XOR);
        } else {
            dst.put_u8(byte);
        }
    }
}

/// Reverse [`stuff`], appending to `dst`.
///
/// A trailing escape byte with nothing after it is dropped.
pub fn unstuff(src: &[u8], dst: &mut BytesMut) {
    dst.reserve(src.len());
    let mut bytes = src.iter().copied();
    while let Some(byte) = bytes.next() {
        if byte == ESCAPE {
            if let Some(escaped) = bytes.next() {
                dst.put_u8(escaped ^ ESCAPE_XOR);
            }
        } else {
            dst.put_u8(byte);
        }
    }
}

fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬──────────────────────────────────────────────┬──────┐
/// │ 0x7E │ stuffed( seq (1B) | payload | CRC-32 (4B BE) ) │ 0x7E │
/// └──────┴──────────────────────────────────────────────┴──────┘
/// ```
///
/// The CRC covers the sequence byte and the payload.
pub fn encode_frame(sequence: u8, payload: &[u8], dst: &mut BytesMut) {
    let mut body = BytesMut::with_capacity(MIN_BODY_LEN + payload.len());
    body.put_u8(sequence);
    body.put_slice(payload);
    let crc = checksum(&body);
    body.put_u32(crc);

    dst.reserve(body.len() + 2);
    dst.put_u8(FLAG);
    stuff(&body, dst);
    dst.put_u8(FLAG);
}

/// Build a standalone wire frame.
pub fn build_frame(sequence: u8, payload: &[u8]) -> Bytes {
    let mut wire = BytesMut::new();
    encode_frame(sequence, payload, &mut wire);
    wire.freeze()
}

/// Decode one complete, delimited frame.
///
/// Any malformed input (missing delimiters, short body, checksum mismatch)
/// is an error; nothing is ever returned from a frame that fails
/// verification.
pub fn decode_frame(wire: &[u8]) -> Result<Frame> {
    let interior = match wire {
        [FLAG, interior @ .., FLAG] => interior,
        _ => return Err(FrameError::MissingDelimiter),
    };

    let mut body = BytesMut::with_capacity(interior.len());
    unstuff(interior, &mut body);

    if body.len() < MIN_BODY_LEN {
        return Err(FrameError::Truncated { len: body.len() });
    }

    let split = body.len() - CHECKSUM_LEN;
    let mut carried = [0u8; CHECKSUM_LEN];
    carried.copy_from_slice(&body[split..]);
    let expected = u32::from_be_bytes(carried);
    let actual = checksum(&body[..split]);
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    body.truncate(split);
    let sequence = body.get_u8();
    Ok(Frame {
        sequence,
        payload: body.freeze(),
    })
}

/// Configuration for the pulse/frame layer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Pulse timing shared by both ends.
    pub timing: TimingConfig,
    /// Maximum stuffed size of a partial frame. Default: 64 KiB.
    pub max_frame_len: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}
