//! Property tests for the frame codec and pulse timing codec.

use std::time::Duration;

use bytes::BytesMut;
use proptest::prelude::*;
use sigwire_frame::{
    build_frame, decode_burst, decode_frame, pulse_offsets, stuff, unstuff, FrameAssembler,
    TimingConfig, ESCAPE, FLAG,
};

/// Byte strings biased towards the reserved values.
fn reserved_heavy_bytes(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![Just(FLAG), Just(ESCAPE), Just(FLAG ^ 0x20), any::<u8>()],
        0..max_len,
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Stuffing
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_unstuff_inverts_stuff(data in reserved_heavy_bytes(512)) {
        let mut stuffed = BytesMut::new();
        stuff(&data, &mut stuffed);
        prop_assert!(!stuffed.contains(&FLAG));

        let mut plain = BytesMut::new();
        unstuff(&stuffed, &mut plain);
        prop_assert_eq!(plain.as_ref(), data.as_slice());
    }
}

#[test]
fn stuffing_roundtrips_every_byte_value() {
    let all: Vec<u8> = (0..=u8::MAX).collect();
    let mut stuffed = BytesMut::new();
    stuff(&all, &mut stuffed);
    assert_eq!(stuffed.len(), all.len() + 2);

    let mut plain = BytesMut::new();
    unstuff(&stuffed, &mut plain);
    assert_eq!(plain.as_ref(), all.as_slice());

    for byte in 0..=u8::MAX {
        let mut stuffed = BytesMut::new();
        stuff(&[byte], &mut stuffed);
        let mut plain = BytesMut::new();
        unstuff(&stuffed, &mut plain);
        assert_eq!(plain.as_ref(), &[byte]);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Framing
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_frame_roundtrip(payload in reserved_heavy_bytes(300), sequence in any::<u8>()) {
        let wire = build_frame(sequence, &payload);
        prop_assert!(!wire[1..wire.len() - 1].contains(&FLAG));

        let frame = decode_frame(&wire).expect("built frame should parse");
        prop_assert_eq!(frame.sequence, sequence);
        prop_assert_eq!(frame.payload.as_ref(), payload.as_slice());
    }

    #[test]
    fn prop_single_bit_flip_is_rejected(
        payload in reserved_heavy_bytes(64),
        sequence in any::<u8>(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut wire = build_frame(sequence, &payload).to_vec();
        let interior = 1 + position.index(wire.len() - 2);
        wire[interior] ^= 1 << bit;

        prop_assert!(decode_frame(&wire).is_err());
    }

    #[test]
    fn prop_every_prefix_is_rejected(payload in reserved_heavy_bytes(64), sequence in any::<u8>()) {
        let wire = build_frame(sequence, &payload);
        for len in 0..wire.len() {
            prop_assert!(decode_frame(&wire[..len]).is_err(), "prefix of {} bytes parsed", len);
        }
    }

    #[test]
    fn prop_random_bytes_are_rejected(noise in prop::collection::vec(any::<u8>(), 0..128)) {
        prop_assert!(decode_frame(&noise).is_err());
    }

    #[test]
    fn prop_assembler_recovers_frame_sequences(
        messages in prop::collection::vec((any::<u8>(), reserved_heavy_bytes(32)), 1..8),
    ) {
        let mut assembler = FrameAssembler::new();
        let mut received = Vec::new();
        for (sequence, payload) in &messages {
            for &byte in build_frame(*sequence, payload).iter() {
                if let Some(result) = assembler.push_byte(byte) {
                    let frame = result.expect("clean stream should parse");
                    received.push((frame.sequence, frame.payload.to_vec()));
                }
            }
        }
        prop_assert_eq!(received, messages);
    }
}

#[test]
fn all_payload_lengths_and_sequences_roundtrip() {
    for len in 0..=256usize {
        let payload: Vec<u8> = (0..len).map(|i| (i * 31 % 256) as u8).collect();
        let sequence = (len % 256) as u8;
        let frame = decode_frame(&build_frame(sequence, &payload)).unwrap();
        assert_eq!(frame.sequence, sequence);
        assert_eq!(frame.payload.as_ref(), payload.as_slice());
    }
    for sequence in 0..=u8::MAX {
        let frame = decode_frame(&build_frame(sequence, b"seq")).unwrap();
        assert_eq!(frame.sequence, sequence);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pulse timing
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_burst_roundtrip_any_interval(
        byte in any::<u8>(),
        interval_ms in 1u64..200,
        base_ms in 0u64..1_000_000,
    ) {
        let config = TimingConfig::with_interval(Duration::from_millis(interval_ms));
        let base = Duration::from_millis(base_ms);
        let pulses: Vec<Duration> = pulse_offsets(byte)
            .map(|offset| base + config.interval * offset)
            .collect();

        prop_assert_eq!(decode_burst(&pulses, &config), Some(byte));
    }
}
