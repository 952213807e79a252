//! Notification channel abstraction for sigwire.
//!
//! The only thing two sigwire processes exchange is a stream of payload-free
//! events, each stamped with its arrival time:
//! - [`EventKind::Pulse`] carries data (delivered as `SIGUSR1`)
//! - [`EventKind::Ack`] acknowledges a frame (delivered as `SIGUSR2`)
//!
//! This is the lowest layer of sigwire. Everything else builds on top of
//! the [`Notifier`] trait and the [`Event`] stream provided here.

pub mod clock;
pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod signal;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, TransportError};
pub use traits::{Event, EventKind, Notifier, ProcessId};

#[cfg(unix)]
pub use signal::{SignalListener, SignalNotifier};
