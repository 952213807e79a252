//! Reliable byte messaging between processes over POSIX signals.
//!
//! Two processes that share nothing but the ability to signal each other can
//! still exchange arbitrary messages: bytes are encoded as timed `SIGUSR1`
//! pulses, grouped into checksummed frames and acknowledged with `SIGUSR2`.
//!
//! # Crate Structure
//!
//! - [`transport`]: notification channel (signals, event timestamps, clocks)
//! - [`frame`]: bit timing codec and byte-stuffed, CRC-32 protected framing
//! - [`peer`]: stop-and-wait sender and deduplicating receiver (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use sigwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sigwire_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use sigwire_peer::*;
}
