use sigwire_transport::{Clock, EventKind, Notifier, ProcessId};
use tracing::trace;

use crate::error::Result;
use crate::timing::{encode_byte, TimingConfig};

/// Emits bytes to one target as timed pulse bursts.
pub struct PulseWriter<N, C> {
    notifier: N,
    clock: C,
    target: ProcessId,
    timing: TimingConfig,
}

impl<N: Notifier, C: Clock> PulseWriter<N, C> {
    pub fn new(notifier: N, clock: C, target: ProcessId, timing: TimingConfig) -> Self {
        Self {
            notifier,
            clock,
            target,
            timing,
        }
    }

    /// Send one byte (blocking for [`TimingConfig::byte_duration`]).
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        for slot in encode_byte(byte) {
            if slot.pulse {
                self.notifier.notify(self.target, EventKind::Pulse)?;
            }
            self.clock.sleep(self.timing.interval * slot.wait);
        }
        Ok(())
    }

    /// Send every byte of `bytes` in order.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }
        trace!(target = %self.target, len = bytes.len(), "bytes written");
        Ok(())
    }

    /// The process receiving the pulses.
    pub fn target(&self) -> ProcessId {
        self.target
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// The clock pacing the pulses.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Borrow the underlying notifier.
    pub fn get_ref(&self) -> &N {
        &self.notifier
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use sigwire_transport::{ManualClock, TransportError};

    use super::*;
    use crate::codec::{build_frame, decode_frame};
    use crate::error::FrameError;
    use crate::timing::{BurstDecoder, BYTE_INTERVALS};

    struct RecordingNotifier {
        clock: ManualClock,
        sent: Mutex<Vec<(Duration, ProcessId, EventKind)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, target: ProcessId, kind: EventKind) -> sigwire_transport::Result<()> {
            self.sent.lock().unwrap().push((self.clock.now(), target, kind));
            Ok(())
        }
    }

    fn writer() -> PulseWriter<RecordingNotifier, ManualClock> {
        let clock = ManualClock::new();
        let notifier = RecordingNotifier {
            clock: clock.clone(),
            sent: Mutex::new(Vec::new()),
        };
        PulseWriter::new(notifier, clock, ProcessId(42), TimingConfig::default())
    }

    #[test]
    fn byte_pulses_land_on_the_grid() {
        let mut writer = writer();
        writer.write_byte(0b1000_0001).unwrap();

        let interval = writer.timing().interval;
        let sent = writer.get_ref().sent.lock().unwrap().clone();
        let times: Vec<Duration> = sent.iter().map(|(at, _, _)| *at).collect();
        assert_eq!(times, [Duration::ZERO, interval, interval * 8, interval * 9]);
        assert!(sent
            .iter()
            .all(|(_, target, kind)| *target == ProcessId(42) && *kind == EventKind::Pulse));
        assert_eq!(writer.clock().now(), interval * BYTE_INTERVALS);
    }

    #[test]
    fn written_frame_decodes() {
        let mut writer = writer();
        let wire = build_frame(5, b"hi");
        writer.write_all(&wire).unwrap();

        let mut decoder = BurstDecoder::new(writer.timing().clone());
        let bytes: Vec<u8> = writer
            .get_ref()
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(at, _, _)| decoder.push(*at))
            .collect();

        assert_eq!(bytes, wire.as_ref());
        let frame = decode_frame(&bytes).unwrap();
        assert_eq!((frame.sequence, frame.payload.as_ref()), (5, b"hi".as_ref()));
    }

    struct GoneNotifier;

    impl Notifier for GoneNotifier {
        fn notify(&self, target: ProcessId, _kind: EventKind) -> sigwire_transport::Result<()> {
            Err(TransportError::PeerUnreachable(target))
        }
    }

    #[test]
    fn notifier_errors_propagate() {
        let mut writer = PulseWriter::new(
            GoneNotifier,
            ManualClock::new(),
            ProcessId(7),
            TimingConfig::default(),
        );
        let err = writer.write_all(&[0x00, 0x01]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Transport(TransportError::PeerUnreachable(ProcessId(7)))
        ));
        assert_eq!(writer.clock().now(), Duration::ZERO);
    }
}
