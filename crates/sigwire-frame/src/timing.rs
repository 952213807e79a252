//! Pulse-timing bit codec.
//!
//! A byte is sent as a burst of pulses on a grid of interval `T`:
//!
//! ```text
//! offset (T):  0      1   2   3   4   5   6   7   8      9      11
//!              start  b7  b6  b5  b4  b3  b2  b1  b0     stop   next start
//! ```
//!
//! A data slot carries a pulse for a 1 bit and silence for a 0 bit. The
//! receiver measures every pulse against the start pulse; anything at or
//! beyond [`TimingConfig::stop_threshold`] intervals ends the burst.

use std::time::Duration;

/// Default interval between pulse slots.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(50);

/// Default stop detection threshold, in intervals.
pub const DEFAULT_STOP_THRESHOLD: f64 = 8.5;

/// Slots consumed by one byte including the trailing gap:
/// start + 8 data + stop held for two intervals.
pub const BYTE_INTERVALS: u32 = 11;

const DATA_BITS: usize = 8;

/// Pulse timing shared by sender and receiver. Not negotiated: both ends
/// must be configured identically.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingConfig {
    /// Slot width `T`. Must be non-zero.
    pub interval: Duration,
    /// Elapsed intervals at which a pulse counts as the stop pulse.
    pub stop_threshold: f64,
}

impl TimingConfig {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Elapsed time expressed in (fractional) intervals.
    pub fn intervals(&self, elapsed: Duration) -> f64 {
        elapsed.as_secs_f64() / self.interval.as_secs_f64()
    }

    /// Time on the wire for one byte, trailing gap included.
    pub fn byte_duration(&self) -> Duration {
        self.interval * BYTE_INTERVALS
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            stop_threshold: DEFAULT_STOP_THRESHOLD,
        }
    }
}

/// One step of a transmission plan: optionally pulse, then wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub pulse: bool,
    /// Intervals to wait after the (optional) pulse.
    pub wait: u32,
}

/// Transmission plan for one byte: start, eight data slots MSB first, stop.
pub fn encode_byte(byte: u8) -> [Slot; DATA_BITS + 2] {
    let mut plan = [Slot {
        pulse: true,
        wait: 1,
    }; DATA_BITS + 2];
    for (i, slot) in plan[1..=DATA_BITS].iter_mut().enumerate() {
        slot.pulse = (byte >> (DATA_BITS - 1 - i)) & 1 == 1;
    }
    plan[DATA_BITS + 1].wait = 2;
    plan
}

/// Offsets, in intervals from the start pulse, at which `byte` pulses.
pub fn pulse_offsets(byte: u8) -> impl Iterator<Item = u32> {
    encode_byte(byte)
        .into_iter()
        .scan(0u32, |offset, slot| {
            let at = *offset;
            *offset += slot.wait;
            Some((at, slot.pulse))
        })
        .filter_map(|(at, pulse)| pulse.then_some(at))
}

/// Decode one burst of pulse timestamps.
///
/// The first timestamp is the start reference. Returns `None` for a burst
/// with no pulse after the start. Pulses that land outside the data slots
/// are ignored, and a pulse that rounds to the wrong slot yields a wrong bit;
/// the frame checksum is what catches that.
pub fn decode_burst(pulses: &[Duration], config: &TimingConfig) -> Option<u8> {
    let (&start, rest) = pulses.split_first()?;
    if rest.is_empty() {
        return None;
    }

    let mut byte = 0u8;
    for &at in rest {
        let count = config.intervals(at.saturating_sub(start));
        if count >= 1.0 && count < config.stop_threshold {
            let position = (count.round_ties_even() as i64 - 1).clamp(0, DATA_BITS as i64 - 1);
            byte |= 0x80u8 >> position as u32;
        }
    }
    Some(byte)
}

/// Incremental burst decoder.
///
/// Holds the start reference and the pulses seen since, and re-evaluates the
/// stop condition on every new pulse: pulses are indistinguishable from each
/// other, so the burst ends as soon as one lands at or past the threshold.
#[derive(Debug, Clone)]
pub struct BurstDecoder {
    config: TimingConfig,
    pulses: Vec<Duration>,
}

impl BurstDecoder {
    pub fn new(config: TimingConfig) -> Self {
        Self {
            config,
            pulses: Vec::with_capacity(DATA_BITS + 2),
        }
    }

    /// Record one pulse; returns the byte once its burst is complete.
    pub fn push(&mut self, at: Duration) -> Option<u8> {
        self.pulses.push(at);
        let start = *self.pulses.first()?;
        if self.pulses.len() < 2 {
            return None;
        }

        if self.config.intervals(at.saturating_sub(start)) < self.config.stop_threshold {
            return None;
        }

        let byte = decode_burst(&self.pulses, &self.config);
        self.pulses.clear();
        byte
    }

    /// Forget any partially received burst.
    pub fn reset(&mut self) {
        self.pulses.clear();
    }

    /// Pulses collected for the burst in progress.
    pub fn pending(&self) -> usize {
        self.pulses.len()
    }

    pub fn config(&self) -> &TimingConfig {
        &self.config
    }
}
