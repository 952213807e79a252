/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] sigwire_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] sigwire_frame::FrameError),

    /// No acknowledgment arrived within the retry budget.
    #[error("delivery of sequence {sequence} failed after {attempts} attempts")]
    DeliveryExhausted { sequence: u8, attempts: u32 },
}

pub type Result<T> = std::result::Result<T, PeerError>;
