//! Pulse timing and byte framing for sigwire.
//!
//! Two layers live here:
//! - [`timing`] turns one byte into a burst of pulses positioned at integer
//!   multiples of an interval `T`, and back
//! - [`codec`] wraps a sequence number, payload and CRC-32 into a
//!   `0x7E`-delimited, byte-stuffed frame, and back
//!
//! [`PulseWriter`] drives the timing plan through a notifier; the
//! [`FrameAssembler`] consumes timestamped pulses and yields whole frames.

pub mod codec;
pub mod error;
pub mod reader;
pub mod timing;
pub mod writer;

pub use codec::{
    build_frame, decode_frame, encode_frame, stuff, unstuff, Frame, FrameConfig, CHECKSUM_LEN,
    DEFAULT_MAX_FRAME_LEN, ESCAPE, ESCAPE_XOR, FLAG, MIN_BODY_LEN, SEQUENCE_LEN,
};
pub use error::{FrameError, Result};
pub use reader::FrameAssembler;
pub use timing::{
    decode_burst, encode_byte, pulse_offsets, BurstDecoder, Slot, TimingConfig, BYTE_INTERVALS,
    DEFAULT_INTERVAL, DEFAULT_STOP_THRESHOLD,
};
pub use writer::PulseWriter;
