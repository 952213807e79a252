use std::sync::Arc;

use bytes::Bytes;
use sigwire_frame::{build_frame, FrameError, PulseWriter};
use sigwire_transport::{
    Clock, Event, EventKind, Notifier, ProcessId, SystemClock, TransportError,
};
use tracing::{debug, info, trace, warn};

use crate::ack::AckLatch;
use crate::config::SenderConfig;
use crate::error::{PeerError, Result};
use crate::identity;

/// Outcome of a successful [`Sender::send_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Sequence number the message travelled under.
    pub sequence: u8,
    /// Transmissions it took, starting at 1.
    pub attempts: u32,
}

/// Stop-and-wait sender.
///
/// One message is in flight at a time. Each attempt transmits the identical
/// frame, then waits up to `ack_timeout` for an acknowledgment. The
/// sequence number only advances once a message is acknowledged, so a
/// message that exhausts its retries is resent under the same number by the
/// next call.
pub struct Sender<N, C = SystemClock> {
    writer: PulseWriter<N, C>,
    config: SenderConfig,
    local: ProcessId,
    sequence: u8,
    announced: bool,
    latch: Arc<AckLatch>,
}

impl<N: Notifier> Sender<N, SystemClock> {
    /// Create a sender paced by the system clock.
    pub fn new(notifier: N, target: ProcessId, config: SenderConfig) -> Self {
        Self::with_clock(notifier, SystemClock::new(), target, config)
    }
}

impl<N: Notifier, C: Clock> Sender<N, C> {
    /// Create a sender paced by an explicit clock.
    pub fn with_clock(notifier: N, clock: C, target: ProcessId, config: SenderConfig) -> Self {
        let writer = PulseWriter::new(notifier, clock, target, config.timing.clone());
        Self {
            writer,
            config,
            local: ProcessId::current(),
            sequence: 0,
            announced: false,
            latch: Arc::new(AckLatch::new()),
        }
    }

    /// Announce a different identity than the calling process.
    pub fn with_local_id(mut self, local: ProcessId) -> Self {
        self.local = local;
        self
    }

    /// Use an externally created acknowledgment latch.
    pub fn with_ack_latch(mut self, latch: Arc<AckLatch>) -> Self {
        self.latch = latch;
        self
    }

    /// The latch that incoming `Ack` events must be delivered to.
    pub fn ack_latch(&self) -> Arc<AckLatch> {
        Arc::clone(&self.latch)
    }

    /// Sequence number the next message will use.
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// The receiving process.
    pub fn target(&self) -> ProcessId {
        self.writer.target()
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// The wire frame the next `send_message(message)` would transmit.
    pub fn frame_for(&self, message: &[u8]) -> Bytes {
        if self.announced {
            build_frame(self.sequence, message)
        } else {
            build_frame(self.sequence, &identity::announce(self.local, message))
        }
    }

    /// Deliver one message reliably (blocking).
    ///
    /// Returns [`PeerError::DeliveryExhausted`] when every attempt timed
    /// out. An unreachable target is not an error by itself; its attempts
    /// simply never get acknowledged.
    pub fn send_message(&mut self, message: &[u8]) -> Result<Delivery> {
        let wire = self.frame_for(message);
        let sequence = self.sequence;

        for attempt in 1..=self.config.max_retries {
            debug!(sequence, attempt, len = wire.len(), "transmitting frame");

            self.latch.arm();
            let acked = self
                .transmit(&wire)
                .map(|()| self.await_ack());
            self.latch.disarm();

            if acked? {
                self.sequence = self.sequence.wrapping_add(1);
                self.announced = true;
                info!(sequence, attempt, "message acknowledged");
                return Ok(Delivery {
                    sequence,
                    attempts: attempt,
                });
            }

            debug!(sequence, attempt, "acknowledgment timed out");
        }

        warn!(
            sequence,
            attempts = self.config.max_retries,
            target = %self.target(),
            "delivery exhausted"
        );
        Err(PeerError::DeliveryExhausted {
            sequence,
            attempts: self.config.max_retries,
        })
    }

    fn transmit(&mut self, wire: &[u8]) -> Result<()> {
        match self.writer.write_all(wire) {
            Ok(()) => Ok(()),
            Err(FrameError::Transport(TransportError::PeerUnreachable(target))) => {
                debug!(%target, "target unreachable; waiting out the attempt");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn await_ack(&self) -> bool {
        let clock = self.writer.clock();
        let started = clock.now();
        loop {
            if self.latch.take() {
                return true;
            }
            if clock.now().saturating_sub(started) >= self.config.ack_timeout {
                return false;
            }
            clock.sleep(self.config.poll_interval);
        }
    }
}

/// Forward `Ack` events from an event source to a sender's latch.
///
/// Runs until the source ends or fails. Pulses are ignored; a sending
/// process has no use for them.
pub fn dispatch_acks<I>(events: I, latch: &AckLatch) -> Result<()>
where
    I: IntoIterator<Item = sigwire_transport::Result<Event>>,
{
    for event in events {
        match event?.kind {
            EventKind::Ack => {
                latch.on_ack();
            }
            EventKind::Pulse => trace!("ignoring pulse on sending side"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use sigwire_frame::{decode_frame, BurstDecoder, TimingConfig};
    use sigwire_transport::ManualClock;

    use super::*;

    fn config() -> SenderConfig {
        SenderConfig {
            timing: TimingConfig::with_interval(Duration::from_millis(10)),
            ack_timeout: Duration::from_millis(200),
            max_retries: 3,
            poll_interval: Duration::from_millis(5),
        }
    }

    /// Records pulse times and never acknowledges.
    struct SilentPeer {
        clock: ManualClock,
        pulses: Mutex<Vec<Duration>>,
    }

    impl Notifier for SilentPeer {
        fn notify(&self, _target: ProcessId, kind: EventKind) -> sigwire_transport::Result<()> {
            assert_eq!(kind, EventKind::Pulse);
            self.pulses.lock().unwrap().push(self.clock.now());
            Ok(())
        }
    }

    impl SilentPeer {
        fn decoded(&self, timing: &TimingConfig) -> Vec<u8> {
            let mut decoder = BurstDecoder::new(timing.clone());
            self.pulses
                .lock()
                .unwrap()
                .iter()
                .filter_map(|at| decoder.push(*at))
                .collect()
        }
    }

    fn silent_sender() -> Sender<Arc<SilentPeer>, ManualClock> {
        let clock = ManualClock::new();
        let peer = Arc::new(SilentPeer {
            clock: clock.clone(),
            pulses: Mutex::new(Vec::new()),
        });
        Sender::with_clock(peer, clock, ProcessId(900), config()).with_local_id(ProcessId(77))
    }

    /// Acknowledges through the latch after every `ack_after` pulses.
    struct AckingPeer {
        latch: Arc<AckLatch>,
        ack_after: usize,
        pulses: AtomicUsize,
    }

    impl Notifier for AckingPeer {
        fn notify(&self, _target: ProcessId, _kind: EventKind) -> sigwire_transport::Result<()> {
            let seen = self.pulses.fetch_add(1, Ordering::SeqCst) + 1;
            if seen % self.ack_after == 0 {
                self.latch.on_ack();
            }
            Ok(())
        }
    }

    #[test]
    fn exhausts_after_identical_transmissions() {
        let mut sender = silent_sender();
        let expected = sender.frame_for(b"lost");

        let err = sender.send_message(b"lost").unwrap_err();
        assert!(matches!(
            err,
            PeerError::DeliveryExhausted {
                sequence: 0,
                attempts: 3
            }
        ));
        assert_eq!(sender.sequence(), 0);

        let peer = Arc::clone(sender.writer.get_ref());
        assert_eq!(peer.decoded(&sender.config().timing), expected.repeat(3));
    }

    #[test]
    fn first_message_announces_local_id() {
        let sender = silent_sender();
        let frame = decode_frame(&sender.frame_for(b"hi")).unwrap();
        assert_eq!(frame.sequence, 0);
        assert_eq!(&frame.payload[..4], &77u32.to_be_bytes());
        assert_eq!(&frame.payload[4..], b"hi");
    }

    #[test]
    fn failed_first_message_is_announced_again() {
        let mut sender = silent_sender();
        assert!(sender.send_message(b"a").is_err());

        let frame = decode_frame(&sender.frame_for(b"a")).unwrap();
        assert_eq!(frame.sequence, 0);
        assert_eq!(frame.payload.len(), 5);
    }

    #[test]
    fn acknowledged_message_advances_sequence_once() {
        let latch = Arc::new(AckLatch::new());
        let peer = AckingPeer {
            latch: Arc::clone(&latch),
            ack_after: 1,
            pulses: AtomicUsize::new(0),
        };
        let mut sender = Sender::with_clock(peer, ManualClock::new(), ProcessId(900), config())
            .with_local_id(ProcessId(77))
            .with_ack_latch(latch);

        let delivery = sender.send_message(b"one").unwrap();
        assert_eq!(
            delivery,
            Delivery {
                sequence: 0,
                attempts: 1
            }
        );
        assert_eq!(sender.sequence(), 1);

        let frame = decode_frame(&sender.frame_for(b"two")).unwrap();
        assert_eq!(frame.sequence, 1);
        assert_eq!(frame.payload.as_ref(), b"two");
    }

    #[test]
    fn ack_before_attempt_is_ignored() {
        let mut sender = silent_sender();
        let latch = sender.ack_latch();
        assert!(!latch.on_ack());

        assert!(sender.send_message(b"x").is_err());
        assert!(!latch.is_armed());
    }

    struct GonePeer;

    impl Notifier for GonePeer {
        fn notify(&self, target: ProcessId, _kind: EventKind) -> sigwire_transport::Result<()> {
            Err(TransportError::PeerUnreachable(target))
        }
    }

    #[test]
    fn unreachable_target_times_out_like_a_lost_ack() {
        let clock = ManualClock::new();
        let mut sender = Sender::with_clock(GonePeer, clock.clone(), ProcessId(900), config());

        let err = sender.send_message(b"anyone?").unwrap_err();
        assert!(matches!(err, PeerError::DeliveryExhausted { attempts: 3, .. }));
        assert!(clock.now() >= config().ack_timeout * 3);
    }

    struct DeniedPeer;

    impl Notifier for DeniedPeer {
        fn notify(&self, target: ProcessId, _kind: EventKind) -> sigwire_transport::Result<()> {
            Err(TransportError::Notify {
                target,
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
    }

    #[test]
    fn other_transport_errors_propagate() {
        let mut sender = Sender::with_clock(DeniedPeer, ManualClock::new(), ProcessId(1), config());
        let err = sender.send_message(b"x").unwrap_err();
        assert!(matches!(
            err,
            PeerError::Frame(FrameError::Transport(TransportError::Notify { .. }))
        ));
        assert!(!sender.ack_latch().is_armed());
    }

    #[test]
    fn zero_retries_never_transmits() {
        let mut sender = silent_sender();
        sender.config.max_retries = 0;

        let err = sender.send_message(b"x").unwrap_err();
        assert!(matches!(err, PeerError::DeliveryExhausted { attempts: 0, .. }));
        assert!(sender.writer.get_ref().pulses.lock().unwrap().is_empty());
    }

    #[test]
    fn dispatch_forwards_only_acks() {
        let latch = AckLatch::new();
        latch.arm();

        let events = vec![
            Ok(Event::pulse(Duration::ZERO)),
            Ok(Event::ack(Duration::from_millis(1))),
        ];
        dispatch_acks(events, &latch).unwrap();
        assert!(latch.take());

        let failing = vec![Err(TransportError::Closed)];
        assert!(matches!(
            dispatch_acks(failing, &latch),
            Err(PeerError::Transport(TransportError::Closed))
        ));
    }
}
