use std::sync::atomic::{AtomicBool, Ordering};

use tracing::trace;

/// Acknowledgment flag shared between the sender and whatever delivers
/// `Ack` events to it.
///
/// Acks only count while the latch is armed, i.e. while a transmission
/// attempt is in flight. Anything arriving outside that window belongs to an
/// attempt that has already been settled and is dropped.
#[derive(Debug, Default)]
pub struct AckLatch {
    armed: AtomicBool,
    acked: AtomicBool,
}

impl AckLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the window for a new attempt, forgetting any earlier ack.
    pub fn arm(&self) {
        self.acked.store(false, Ordering::SeqCst);
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Close the window.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Record an incoming ack. Returns whether it was accepted.
    pub fn on_ack(&self) -> bool {
        if !self.armed.load(Ordering::SeqCst) {
            trace!("dropping unexpected ack");
            return false;
        }
        self.acked.store(true, Ordering::SeqCst);
        true
    }

    /// Consume a recorded ack.
    pub fn take(&self) -> bool {
        self.acked.swap(false, Ordering::SeqCst)
    }
}
