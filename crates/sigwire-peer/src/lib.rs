//! Reliable message endpoints for sigwire.
//!
//! This is the "just works" layer. A [`Sender`] frames each message, pulses
//! it out and retries until the [`Receiver`] acknowledges it; the receiver
//! reassembles frames, suppresses retransmitted duplicates and learns who to
//! acknowledge from the first message it sees.

pub mod ack;
pub mod config;
pub mod error;
pub mod identity;
pub mod receiver;
pub mod sender;

pub use ack::AckLatch;
pub use config::{
    ReceiverConfig, SenderConfig, DEFAULT_ACK_TIMEOUT, DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL,
};
pub use error::{PeerError, Result};
pub use receiver::{Message, MessageHandler, Receiver};
pub use sender::{dispatch_acks, Delivery, Sender};
