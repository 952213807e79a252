/// Errors that can occur during frame encoding/decoding.
///
/// Every decode variant means the same thing to a receiver: there is no
/// valid frame, discard and keep scanning.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame does not start and end with the delimiter byte.
    #[error("frame not delimited by 0x7E")]
    MissingDelimiter,

    /// The unstuffed frame body is shorter than sequence + checksum.
    #[error("frame truncated ({len} bytes, need at least 5)")]
    Truncated { len: usize },

    /// The CRC-32 carried by the frame does not match its contents.
    #[error("checksum mismatch (frame says {expected:#010x}, computed {actual:#010x})")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// The partial frame grew past the configured maximum.
    #[error("frame exceeds {max} bytes without a closing delimiter")]
    FrameTooLarge { max: usize },

    /// Emitting pulses through the notification channel failed.
    #[error("transport error: {0}")]
    Transport(#[from] sigwire_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
