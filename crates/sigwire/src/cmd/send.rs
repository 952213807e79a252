use std::fs;
use std::io::{self, BufRead, Write};
use std::thread;

use sigwire_peer::{dispatch_acks, Delivery, PeerError, Sender};
use sigwire_transport::{Clock, Notifier, ProcessId, SignalListener, SignalNotifier};
use tracing::debug;

use crate::cmd::{SendArgs, TuningArgs};
use crate::exit::{io_error, peer_error, transport_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_delivery, OutputFormat};

pub fn run(args: SendArgs, tuning: &TuningArgs, format: OutputFormat) -> CliResult<i32> {
    let target = ProcessId(args.pid);
    let payload = resolve_payload(&args)?;

    let listener =
        SignalListener::install().map_err(|err| transport_error("listener setup failed", err))?;
    let mut sender = Sender::new(SignalNotifier::new(), target, tuning.sender_config());
    spawn_ack_dispatcher(listener, &sender)?;

    match payload {
        Some(payload) => send_once(&mut sender, &payload, format),
        None => interactive(&mut sender, io::stdin().lock(), format),
    }
}

fn resolve_payload(args: &SendArgs) -> CliResult<Option<Vec<u8>>> {
    if let Some(message) = &args.message {
        return Ok(Some(message.as_bytes().to_vec()));
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map(Some)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(None)
}

/// Acks arrive as signals on this process; forward them to the sender.
fn spawn_ack_dispatcher<N: Notifier, C: Clock>(
    listener: SignalListener,
    sender: &Sender<N, C>,
) -> CliResult<()> {
    let latch = sender.ack_latch();
    thread::Builder::new()
        .name("sigwire-acks".to_string())
        .spawn(move || {
            if let Err(err) = dispatch_acks(listener, &latch) {
                debug!(%err, "ack dispatch stopped");
            }
        })
        .map(drop)
        .map_err(|err| io_error("failed to start ack dispatcher", err))
}

fn send_once<N: Notifier, C: Clock>(
    sender: &mut Sender<N, C>,
    payload: &[u8],
    format: OutputFormat,
) -> CliResult<i32> {
    let outcome = deliver(sender, payload)?;
    print_delivery(sender.target(), &outcome, format);
    Ok(if outcome.is_ok() { SUCCESS } else { FAILURE })
}

/// Send each non-empty input line as its own message until end of input.
fn interactive<N: Notifier, C: Clock, R: BufRead>(
    sender: &mut Sender<N, C>,
    input: R,
    format: OutputFormat,
) -> CliResult<i32> {
    let prompt = matches!(format, OutputFormat::Pretty | OutputFormat::Table);
    if prompt {
        println!("Sending to PID {}", sender.target().as_u32());
    }

    let mut lines = input.lines();
    loop {
        if prompt {
            print!("> ");
            let _ = io::stdout().flush();
        }

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.map_err(|err| io_error("failed reading stdin", err))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let outcome = deliver(sender, line.as_bytes())?;
        print_delivery(sender.target(), &outcome, format);
    }

    if prompt {
        println!();
    }
    Ok(SUCCESS)
}

/// Only exhausted retries count as an ordinary failed send; anything else
/// aborts the command.
fn deliver<N: Notifier, C: Clock>(
    sender: &mut Sender<N, C>,
    payload: &[u8],
) -> CliResult<Result<Delivery, PeerError>> {
    match sender.send_message(payload) {
        Ok(delivery) => Ok(Ok(delivery)),
        Err(err @ PeerError::DeliveryExhausted { .. }) => Ok(Err(err)),
        Err(err) => Err(peer_error("send failed", err)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use sigwire_frame::TimingConfig;
    use sigwire_peer::{AckLatch, SenderConfig};
    use sigwire_transport::{EventKind, ManualClock, TransportError};

    use super::*;

    /// Acknowledges on the first pulse of every attempt when `acking`.
    struct Peer {
        latch: Arc<AckLatch>,
        acking: bool,
        pulses: AtomicUsize,
    }

    impl Notifier for Peer {
        fn notify(&self, _target: ProcessId, kind: EventKind) -> sigwire_transport::Result<()> {
            assert_eq!(kind, EventKind::Pulse);
            self.pulses.fetch_add(1, Ordering::SeqCst);
            if self.acking {
                self.latch.on_ack();
            }
            Ok(())
        }
    }

    fn sender(acking: bool) -> Sender<Peer, ManualClock> {
        let latch = Arc::new(AckLatch::new());
        let peer = Peer {
            latch: Arc::clone(&latch),
            acking,
            pulses: AtomicUsize::new(0),
        };
        let config = SenderConfig {
            timing: TimingConfig::with_interval(Duration::from_millis(1)),
            ack_timeout: Duration::from_millis(50),
            max_retries: 2,
            ..SenderConfig::default()
        };
        Sender::with_clock(peer, ManualClock::new(), ProcessId(77), config).with_ack_latch(latch)
    }

    #[test]
    fn one_shot_exit_codes() {
        let mut acked = sender(true);
        assert_eq!(send_once(&mut acked, b"hi", OutputFormat::Json).unwrap(), SUCCESS);

        let mut ignored = sender(false);
        assert_eq!(send_once(&mut ignored, b"hi", OutputFormat::Json).unwrap(), FAILURE);
    }

    #[test]
    fn interactive_sends_each_non_empty_line() {
        let mut sender = sender(true);
        let input = Cursor::new("first\n\n   \n  second  \n");

        assert_eq!(interactive(&mut sender, input, OutputFormat::Json).unwrap(), SUCCESS);
        assert_eq!(sender.sequence(), 2);
    }

    #[test]
    fn interactive_keeps_going_after_a_failed_line() {
        let mut sender = sender(false);
        let input = Cursor::new("lost\nalso lost\n");

        assert_eq!(interactive(&mut sender, input, OutputFormat::Json).unwrap(), SUCCESS);
        assert_eq!(sender.sequence(), 0);
    }

    struct Denied;

    impl Notifier for Denied {
        fn notify(&self, target: ProcessId, _kind: EventKind) -> sigwire_transport::Result<()> {
            Err(TransportError::Notify {
                target,
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            })
        }
    }

    #[test]
    fn transport_failures_abort() {
        let mut sender = Sender::with_clock(
            Denied,
            ManualClock::new(),
            ProcessId(1),
            SenderConfig::default(),
        );
        let err = send_once(&mut sender, b"x", OutputFormat::Json).unwrap_err();
        assert_eq!(err.code, crate::exit::PERMISSION_DENIED);
    }
}
