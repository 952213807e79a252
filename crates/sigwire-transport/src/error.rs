use crate::traits::ProcessId;

/// Errors that can occur in notification transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Delivering a notification to the target failed.
    #[error("failed to notify {target}: {source}")]
    Notify {
        target: ProcessId,
        source: std::io::Error,
    },

    /// The target process no longer exists.
    #[error("peer {0} is unreachable")]
    PeerUnreachable(ProcessId),

    /// The identifier cannot name a single process.
    #[error("invalid peer process id {0}")]
    InvalidPeer(u32),

    /// A signal listener is already installed in this process.
    #[error("signal listener already installed")]
    AlreadyInstalled,

    /// An I/O error occurred on the event queue.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The event queue was closed.
    #[error("event queue closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
