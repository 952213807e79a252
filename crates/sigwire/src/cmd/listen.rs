use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sigwire_peer::Receiver;
use sigwire_transport::{
    EventKind, Notifier, ProcessId, SignalListener, SignalNotifier, TransportError,
};
use tracing::debug;

use crate::cmd::{ListenArgs, TuningArgs};
use crate::exit::{transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_listening, print_message, print_stopped, OutputFormat};

pub fn run(args: ListenArgs, tuning: &TuningArgs, format: OutputFormat) -> CliResult<i32> {
    let mut listener =
        SignalListener::install().map_err(|err| transport_error("listener setup failed", err))?;
    let local = ProcessId::current();

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), local)?;

    print_listening(local, format);

    let mut receiver = Receiver::new(SignalNotifier::new(), tuning.receiver_config());
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let event = match listener.recv() {
            Ok(event) => event,
            Err(TransportError::Closed) => break,
            Err(err) => return Err(transport_error("receive failed", err)),
        };

        if let Some(message) = receiver.on_event(event) {
            print_message(&message, receiver.peer(), format);
            printed = printed.saturating_add(1);

            if args.count.is_some_and(|count| printed >= count) {
                return Ok(SUCCESS);
            }
        }
    }

    print_stopped(format);
    Ok(SUCCESS)
}

/// Stop on Ctrl-C. The listener blocks in `recv`, so the handler also sends
/// this process an ack, which the receiving side ignores, to wake it up.
fn install_ctrlc_handler(running: Arc<AtomicBool>, local: ProcessId) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        if let Err(err) = SignalNotifier::new().notify(local, EventKind::Ack) {
            debug!(%err, "wake-up signal failed");
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
