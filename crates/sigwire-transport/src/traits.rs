use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Operating-system process identifier of a sigwire endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// Width of the identifier on the wire.
    pub const WIRE_LEN: usize = 4;

    /// Identifier of the calling process.
    pub fn current() -> Self {
        Self(std::process::id())
    }

    /// Big-endian wire encoding.
    pub fn to_be_bytes(self) -> [u8; Self::WIRE_LEN] {
        self.0.to_be_bytes()
    }

    /// Decode from big-endian wire bytes.
    pub fn from_be_bytes(bytes: [u8; Self::WIRE_LEN]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/// The two kinds of notification a peer can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A data pulse; its timing encodes bits.
    Pulse,
    /// A frame acknowledgment travelling back to the sender.
    Ack,
}

impl EventKind {
    /// Compact tag used on the in-process event queue.
    pub(crate) fn tag(self) -> u8 {
        match self {
            EventKind::Pulse => 0,
            EventKind::Ack => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(EventKind::Pulse),
            1 => Some(EventKind::Ack),
            _ => None,
        }
    }
}

/// A notification observed by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Monotonic arrival time. Only differences between events are meaningful.
    pub at: Duration,
}

impl Event {
    pub fn pulse(at: Duration) -> Self {
        Self {
            kind: EventKind::Pulse,
            at,
        }
    }

    pub fn ack(at: Duration) -> Self {
        Self {
            kind: EventKind::Ack,
            at,
        }
    }
}

/// Fire-and-forget delivery of a single event to another process.
///
/// Implementations carry no payload and make no delivery guarantee. A target
/// that has exited must be reported as
/// [`TransportError::PeerUnreachable`](crate::TransportError::PeerUnreachable)
/// so callers can treat it like a lost event.
pub trait Notifier {
    fn notify(&self, target: ProcessId, kind: EventKind) -> Result<()>;
}

impl<N: Notifier + ?Sized> Notifier for &N {
    fn notify(&self, target: ProcessId, kind: EventKind) -> Result<()> {
        (**self).notify(target, kind)
    }
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, target: ProcessId, kind: EventKind) -> Result<()> {
        (**self).notify(target, kind)
    }
}
