use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::error::{Result, TransportError};
use crate::traits::{Event, EventKind, Notifier, ProcessId};

/// One queued event: kind tag (1) + arrival nanoseconds (8, LE).
const EVENT_RECORD_LEN: usize = 9;

const HANDLED_SIGNALS: [libc::c_int; 2] = [libc::SIGUSR1, libc::SIGUSR2];

/// Write end of the self-pipe, read by the signal handler. -1 when idle.
static EVENT_FD: AtomicI32 = AtomicI32::new(-1);
static INSTALLED: AtomicBool = AtomicBool::new(false);

fn signal_for(kind: EventKind) -> libc::c_int {
    match kind {
        EventKind::Pulse => libc::SIGUSR1,
        EventKind::Ack => libc::SIGUSR2,
    }
}

/// Delivers events with `kill(2)`: pulses as `SIGUSR1`, acks as `SIGUSR2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalNotifier;

impl SignalNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for SignalNotifier {
    fn notify(&self, target: ProcessId, kind: EventKind) -> Result<()> {
        // 0 and negative pids address process groups, never a single peer.
        let pid = libc::pid_t::try_from(target.as_u32())
            .ok()
            .filter(|pid| *pid > 0)
            .ok_or(TransportError::InvalidPeer(target.as_u32()))?;

        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid, signal_for(kind)) };
        if rc == 0 {
            trace!(%target, ?kind, "notified");
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            debug!(%target, ?kind, "peer gone");
            Err(TransportError::PeerUnreachable(target))
        } else {
            Err(TransportError::Notify {
                target,
                source: err,
            })
        }
    }
}

/// Receives timestamped `SIGUSR1`/`SIGUSR2` notifications.
///
/// The signal handler only stamps the arrival time and appends a fixed-size
/// record to a non-blocking self-pipe. [`SignalListener::recv`] hands the
/// records out one at a time, so protocol code always runs on an ordinary
/// thread and never re-entrantly. If the pipe is full the event is dropped,
/// exactly as if the signal had been lost.
///
/// Only one listener can be installed per process. Dropping it restores the
/// previous signal dispositions.
pub struct SignalListener {
    reader: File,
    previous: Vec<(libc::c_int, libc::sigaction)>,
    _writer: OwnedFd,
}

impl SignalListener {
    /// Install handlers for both event kinds.
    pub fn install() -> Result<Self> {
        if INSTALLED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TransportError::AlreadyInstalled);
        }

        Self::install_handlers().inspect_err(|_| INSTALLED.store(false, Ordering::SeqCst))
    }

    fn install_handlers() -> Result<Self> {
        let (reader, writer) = event_pipe()?;
        EVENT_FD.store(writer.as_raw_fd(), Ordering::SeqCst);

        let mut previous = Vec::with_capacity(HANDLED_SIGNALS.len());
        for signo in HANDLED_SIGNALS {
            match install_handler(signo) {
                Ok(old) => previous.push((signo, old)),
                Err(err) => {
                    restore_handlers(&previous);
                    EVENT_FD.store(-1, Ordering::SeqCst);
                    return Err(err.into());
                }
            }
        }

        info!(pid = std::process::id(), "signal listener installed");

        Ok(Self {
            reader,
            previous,
            _writer: writer,
        })
    }

    /// Block until the next event arrives.
    pub fn recv(&mut self) -> Result<Event> {
        loop {
            let mut record = [0u8; EVENT_RECORD_LEN];
            match self.reader.read_exact(&mut record) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                    return Err(TransportError::Closed)
                }
                Err(err) => return Err(TransportError::Io(err)),
            }

            if let Some(event) = decode_record(&record) {
                trace!(kind = ?event.kind, at = ?event.at, "event");
                return Ok(event);
            }
        }
    }
}

impl Iterator for SignalListener {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.recv() {
            Err(TransportError::Closed) => None,
            other => Some(other),
        }
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        restore_handlers(&self.previous);
        EVENT_FD.store(-1, Ordering::SeqCst);
        INSTALLED.store(false, Ordering::SeqCst);
        debug!("signal listener removed");
    }
}

impl std::fmt::Debug for SignalListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalListener")
            .field("signals", &HANDLED_SIGNALS)
            .finish()
    }
}

extern "C" fn on_signal(signo: libc::c_int) {
    let fd = EVENT_FD.load(Ordering::SeqCst);
    if fd < 0 {
        return;
    }

    let kind = if signo == libc::SIGUSR1 {
        EventKind::Pulse
    } else {
        EventKind::Ack
    };
    let record = encode_record(kind, monotonic_now());

    let errno = errno_location();
    // SAFETY: the errno pointer is valid for the current thread.
    let saved = errno.map(|ptr| unsafe { *ptr });

    // SAFETY: write(2) is async-signal-safe and `record` outlives the call.
    unsafe {
        libc::write(fd, record.as_ptr().cast::<libc::c_void>(), record.len());
    }

    if let (Some(ptr), Some(value)) = (errno, saved) {
        // SAFETY: see above.
        unsafe { *ptr = value };
    }
}

fn monotonic_now() -> Duration {
    // SAFETY: an all-zero timespec is a valid value.
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    // SAFETY: `ts` is a valid writable timespec; clock_gettime is async-signal-safe.
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
}

fn encode_record(kind: EventKind, at: Duration) -> [u8; EVENT_RECORD_LEN] {
    let mut record = [0u8; EVENT_RECORD_LEN];
    record[0] = kind.tag();
    record[1..].copy_from_slice(&(at.as_nanos() as u64).to_le_bytes());
    record
}

fn decode_record(record: &[u8; EVENT_RECORD_LEN]) -> Option<Event> {
    let kind = EventKind::from_tag(record[0])?;
    let mut nanos = [0u8; 8];
    nanos.copy_from_slice(&record[1..]);
    Some(Event {
        kind,
        at: Duration::from_nanos(u64::from_le_bytes(nanos)),
    })
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn errno_location() -> Option<*mut libc::c_int> {
    // SAFETY: always returns the calling thread's errno slot.
    Some(unsafe { libc::__errno_location() })
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
fn errno_location() -> Option<*mut libc::c_int> {
    // SAFETY: always returns the calling thread's errno slot.
    Some(unsafe { libc::__error() })
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd"
)))]
fn errno_location() -> Option<*mut libc::c_int> {
    None
}

fn install_handler(signo: libc::c_int) -> io::Result<libc::sigaction> {
    // SAFETY: an all-zero sigaction is a valid starting value.
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    action.sa_flags = libc::SA_RESTART;
    // SAFETY: `action.sa_mask` is a valid sigset_t.
    unsafe { libc::sigemptyset(&mut action.sa_mask) };

    // SAFETY: see above.
    let mut previous: libc::sigaction = unsafe { std::mem::zeroed() };
    // SAFETY: both pointers reference valid sigaction values for the duration of the call.
    if unsafe { libc::sigaction(signo, &action, &mut previous) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(previous)
}

fn restore_handlers(previous: &[(libc::c_int, libc::sigaction)]) {
    for (signo, action) in previous {
        // SAFETY: `action` was produced by a prior sigaction call.
        unsafe { libc::sigaction(*signo, action, std::ptr::null_mut()) };
    }
}

fn event_pipe() -> io::Result<(File, OwnedFd)> {
    let mut fds = [0 as libc::c_int; 2];
    // SAFETY: `fds` is a valid array of two descriptors.
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: pipe(2) returned two freshly opened descriptors that nothing else owns.
    let (read_end, write_end) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    set_flag(read_end.as_raw_fd(), libc::F_GETFD, libc::F_SETFD, libc::FD_CLOEXEC)?;
    set_flag(write_end.as_raw_fd(), libc::F_GETFD, libc::F_SETFD, libc::FD_CLOEXEC)?;
    set_flag(write_end.as_raw_fd(), libc::F_GETFL, libc::F_SETFL, libc::O_NONBLOCK)?;

    Ok((File::from(read_end), write_end))
}

fn set_flag(fd: RawFd, get: libc::c_int, set: libc::c_int, flag: libc::c_int) -> io::Result<()> {
    // SAFETY: `fd` is an open descriptor owned by the caller.
    let current = unsafe { libc::fcntl(fd, get) };
    if current < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, set, current | flag) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
