use std::time::Duration;

use sigwire_frame::{FrameConfig, TimingConfig};

/// Default time to wait for an acknowledgment after each transmission.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of transmissions per message.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default acknowledgment polling period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for a [`Sender`](crate::Sender).
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Pulse timing; must match the receiver's.
    pub timing: TimingConfig,
    /// How long to wait for an acknowledgment after each transmission.
    pub ack_timeout: Duration,
    /// Transmissions per message before giving up. Zero never transmits.
    pub max_retries: u32,
    /// How often the acknowledgment flag is polled.
    pub poll_interval: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Configuration for a [`Receiver`](crate::Receiver).
#[derive(Debug, Clone, Default)]
pub struct ReceiverConfig {
    /// Pulse timing and partial-frame bound; timing must match the sender's.
    pub frame: FrameConfig,
}

impl ReceiverConfig {
    pub fn with_timing(timing: TimingConfig) -> Self {
        Self {
            frame: FrameConfig {
                timing,
                ..FrameConfig::default()
            },
        }
    }
}
