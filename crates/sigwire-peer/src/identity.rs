//! Peer identity announcement.
//!
//! The first message a sender transmits starts with its own process id
//! (4 bytes, big-endian). The receiver strips it and acknowledges that
//! process from then on, so neither side needs prior configuration beyond
//! the sender knowing where to send.

use bytes::{BufMut, Bytes, BytesMut};
use sigwire_transport::ProcessId;

/// Prefix `payload` with `pid`.
pub fn announce(pid: ProcessId, payload: &[u8]) -> Bytes {
    let mut announced = BytesMut::with_capacity(ProcessId::WIRE_LEN + payload.len());
    announced.put_slice(&pid.to_be_bytes());
    announced.put_slice(payload);
    announced.freeze()
}

/// Split an announced payload into the sender's pid and the message.
///
/// Returns `None` if the payload is too short to carry an identifier.
pub fn extract(payload: &Bytes) -> Option<(ProcessId, Bytes)> {
    let mut prefix = [0u8; ProcessId::WIRE_LEN];
    prefix.copy_from_slice(payload.get(..ProcessId::WIRE_LEN)?);
    Some((
        ProcessId::from_be_bytes(prefix),
        payload.slice(ProcessId::WIRE_LEN..),
    ))
}
