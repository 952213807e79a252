use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tracing::trace;

use crate::codec::{decode_frame, Frame, FrameConfig, FLAG};
use crate::error::{FrameError, Result};
use crate::timing::BurstDecoder;

const INITIAL_BUFFER_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for an opening delimiter.
    Idle,
    /// Inside a frame, collecting stuffed body bytes.
    Accumulating,
}

/// Reassembles frames from timestamped pulses.
///
/// Handles burst decoding and delimiter scanning internally. A closing
/// delimiter also opens the next frame, so back-to-back frames may share one
/// `0x7E`. Failures never stop the assembler: the partial frame is dropped
/// and scanning resumes.
#[derive(Debug)]
pub struct FrameAssembler {
    bursts: BurstDecoder,
    state: State,
    buf: BytesMut,
    config: FrameConfig,
}

impl FrameAssembler {
    /// Create a new assembler with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a new assembler with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            bursts: BurstDecoder::new(config.timing.clone()),
            state: State::Idle,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Feed one pulse arrival time.
    ///
    /// Returns `None` until a frame boundary is reached, then the parsed
    /// frame or the reason it was discarded.
    pub fn push_pulse(&mut self, at: Duration) -> Option<Result<Frame>> {
        let byte = self.bursts.push(at)?;
        trace!(byte = format_args!("{byte:#04x}"), "byte decoded");
        self.push_byte(byte)
    }

    /// Feed one already decoded byte.
    pub fn push_byte(&mut self, byte: u8) -> Option<Result<Frame>> {
        if byte == FLAG {
            let closed = (self.state == State::Accumulating && !self.buf.is_empty())
                .then(|| self.close_frame());
            self.buf.clear();
            self.state = State::Accumulating;
            return closed;
        }

        if self.state == State::Idle {
            return None;
        }

        if self.buf.len() >= self.config.max_frame_len {
            self.buf.clear();
            self.state = State::Idle;
            return Some(Err(FrameError::FrameTooLarge {
                max: self.config.max_frame_len,
            }));
        }

        self.buf.put_u8(byte);
        None
    }

    fn close_frame(&self) -> Result<Frame> {
        let mut wire = BytesMut::with_capacity(self.buf.len() + 2);
        wire.put_u8(FLAG);
        wire.put_slice(&self.buf);
        wire.put_u8(FLAG);
        decode_frame(&wire)
    }

    /// Whether an opening delimiter has been seen.
    pub fn in_frame(&self) -> bool {
        self.state == State::Accumulating
    }

    /// Stuffed body bytes collected for the frame in progress.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop all partial state and go back to scanning for a delimiter.
    pub fn reset(&mut self) {
        self.bursts.reset();
        self.buf.clear();
        self.state = State::Idle;
    }

    /// Current assembler configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
