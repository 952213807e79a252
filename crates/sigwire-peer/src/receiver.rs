use std::time::Duration;

use bytes::Bytes;
use sigwire_frame::{Frame, FrameAssembler};
use sigwire_transport::{Event, EventKind, Notifier, ProcessId, TransportError};
use tracing::{debug, info, trace, warn};

use crate::config::ReceiverConfig;
use crate::error::Result;
use crate::identity;

/// A newly accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sequence: u8,
    pub payload: Bytes,
}

/// Application callback for accepted messages.
pub trait MessageHandler {
    fn on_message(&mut self, payload: Bytes, sequence: u8);
}

impl<F: FnMut(Bytes, u8)> MessageHandler for F {
    fn on_message(&mut self, payload: Bytes, sequence: u8) {
        self(payload, sequence)
    }
}

/// Receiving endpoint.
///
/// Every event is processed to completion before the next one, so all state
/// lives here without locking. Each verified frame is acknowledged, but a
/// frame repeating the previous sequence number is not delivered again.
pub struct Receiver<N> {
    notifier: N,
    assembler: FrameAssembler,
    peer: Option<ProcessId>,
    identified: bool,
    last_sequence: Option<u8>,
}

impl<N: Notifier> Receiver<N> {
    pub fn new(notifier: N, config: ReceiverConfig) -> Self {
        Self {
            notifier,
            assembler: FrameAssembler::with_config(config.frame),
            peer: None,
            identified: false,
            last_sequence: None,
        }
    }

    /// Acknowledge `peer` until a sender announces itself.
    pub fn with_peer(mut self, peer: ProcessId) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Process currently receiving acknowledgments, if any.
    pub fn peer(&self) -> Option<ProcessId> {
        self.peer
    }

    /// Sequence number of the last delivered message.
    pub fn last_sequence(&self) -> Option<u8> {
        self.last_sequence
    }

    /// Handle one notification.
    pub fn on_event(&mut self, event: Event) -> Option<Message> {
        match event.kind {
            EventKind::Pulse => self.on_pulse(event.at),
            EventKind::Ack => {
                trace!("ignoring ack on receiving side");
                None
            }
        }
    }

    /// Handle one data pulse arrival.
    pub fn on_pulse(&mut self, at: Duration) -> Option<Message> {
        let result = self.assembler.push_pulse(at)?;
        self.accept(result)
    }

    /// Handle one decoded byte.
    pub fn on_byte(&mut self, byte: u8) -> Option<Message> {
        let result = self.assembler.push_byte(byte)?;
        self.accept(result)
    }

    fn accept(&mut self, result: sigwire_frame::Result<Frame>) -> Option<Message> {
        match result {
            Ok(frame) => self.on_frame(frame),
            Err(err) => {
                debug!(%err, "discarding frame");
                None
            }
        }
    }

    /// Handle one verified frame: bind the sender, deduplicate, acknowledge.
    pub fn on_frame(&mut self, frame: Frame) -> Option<Message> {
        let Frame {
            sequence,
            mut payload,
        } = frame;

        if sequence == 0 && !self.identified {
            if let Some((pid, message)) = identity::extract(&payload) {
                info!(peer = %pid, "peer identified");
                self.peer = Some(pid);
                self.identified = true;
                payload = message;
            }
        }

        let delivered = if self.last_sequence == Some(sequence) {
            debug!(sequence, "duplicate frame");
            None
        } else {
            self.last_sequence = Some(sequence);
            info!(sequence, len = payload.len(), "message received");
            Some(Message { sequence, payload })
        };

        self.acknowledge();
        delivered
    }

    fn acknowledge(&self) {
        let Some(peer) = self.peer else {
            trace!("no peer bound; skipping ack");
            return;
        };

        match self.notifier.notify(peer, EventKind::Ack) {
            Ok(()) => trace!(%peer, "ack sent"),
            Err(TransportError::PeerUnreachable(_)) => debug!(%peer, "ack target gone"),
            Err(err) => warn!(%peer, %err, "ack failed"),
        }
    }

    /// Drive the receiver from an event source until it ends, invoking
    /// `handler` for every accepted message.
    pub fn run<I, H>(&mut self, events: I, handler: &mut H) -> Result<()>
    where
        I: IntoIterator<Item = sigwire_transport::Result<Event>>,
        H: MessageHandler + ?Sized,
    {
        for event in events {
            if let Some(message) = self.on_event(event?) {
                handler.on_message(message.payload, message.sequence);
            }
        }
        Ok(())
    }
}
