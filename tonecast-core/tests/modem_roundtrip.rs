//! End-to-end tests for the tonecast modem: encode a payload to PCM,
//! stream it back through the decoder in blocks, and compare.

use rand::prelude::*;

use tonecast_core::config::{AudioMode, MAX_PAYLOAD_BYTES};
use tonecast_core::crypto;
use tonecast_core::decoder::{Decoder, DecoderOptions, DecoderState};
use tonecast_core::diagnostics::DecodeResult;
use tonecast_core::encoder::{EncodeOptions, Encoder};
use tonecast_core::errors::{DecodeError, ModemError};
use tonecast_core::signal_processing::Modulator;

const CHUNK: usize = 4096;

fn decoder_for(sample_rate: u32, password: Option<&str>) -> Decoder {
    Decoder::new(DecoderOptions {
        sample_rate,
        password: password.map(str::to_string),
        ..Default::default()
    })
    .unwrap()
}

/// Stream PCM into a decoder in modest blocks, with a little trailing
/// silence so the final symbol windows complete.
fn run_decode(decoder: &mut Decoder, pcm: &[f32]) -> Option<DecodeResult> {
    decoder.start();
    for block in pcm.chunks(CHUNK) {
        if let Some(result) = decoder.process_samples(block).unwrap() {
            return Some(result);
        }
    }
    let silence = vec![0.0f32; CHUNK];
    for _ in 0..4 {
        if let Some(result) = decoder.process_samples(&silence).unwrap() {
            return Some(result);
        }
    }
    None
}

// ----------------------------------------------------------------------
// Short text, phone mode
// ----------------------------------------------------------------------

#[test]
fn short_text_roundtrip_phone() {
    let payload = b"hello world";
    let mut encoder = Encoder::default();
    let encoded = encoder.encode(payload, None).unwrap();

    assert_eq!(encoded.stats.frame_count, 1);
    assert_eq!(encoded.checksum, crypto::sha256_hex(payload));

    let mut decoder = decoder_for(encoded.sample_rate, None);
    let result = run_decode(&mut decoder, &encoded.pcm).expect("decode should complete");

    assert_eq!(result.bytes, payload);
    assert_eq!(result.text.as_deref(), Some("hello world"));
    assert_eq!(result.checksum, encoded.checksum);
    assert_eq!(result.stats.frame_count, 1);
    assert!(!result.encrypted);
    assert_eq!(decoder.state(), DecoderState::Complete);
}

// ----------------------------------------------------------------------
// Boundary payload at the hard cap
// ----------------------------------------------------------------------

#[test]
fn max_payload_roundtrip_wideband() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let payload: Vec<u8> = (0..MAX_PAYLOAD_BYTES).map(|_| rng.gen()).collect();

    let sample_rate = 12_000;
    let mut encoder = Encoder::new(EncodeOptions {
        mode: AudioMode::Wideband,
        sample_rate,
        ..Default::default()
    });
    let encoded = encoder.encode(&payload, None).unwrap();

    let mut decoder = decoder_for(sample_rate, None);
    let result = run_decode(&mut decoder, &encoded.pcm).expect("decode should complete");

    assert_eq!(result.bytes, payload);
    assert_eq!(result.checksum, crypto::sha256_hex(&payload));
}

// ----------------------------------------------------------------------
// Oversize payload
// ----------------------------------------------------------------------

#[test]
fn oversize_payload_fails_before_any_audio() {
    let mut encoder = Encoder::default();
    let payload = vec![0u8; MAX_PAYLOAD_BYTES + 1];
    let err = encoder.encode(&payload, None).unwrap_err();
    let message = err.to_string();
    assert!(
        message.contains(&MAX_PAYLOAD_BYTES.to_string()),
        "error should name the cap: {message}"
    );
}

// ----------------------------------------------------------------------
// Encrypted payload and the password retry path
// ----------------------------------------------------------------------

#[test]
fn encrypted_roundtrip_with_password_retry() {
    let payload = b"secret";
    let mut encoder = Encoder::default();
    let encoded = encoder.encode(payload, Some("hunter2")).unwrap();
    assert!(encoded.stats.encrypted);

    // No password: reception completes but the payload stays sealed.
    let mut decoder = decoder_for(encoded.sample_rate, None);
    let sealed = run_decode(&mut decoder, &encoded.pcm);
    assert!(sealed.is_none());
    assert!(decoder.progress().needs_password);
    assert_eq!(decoder.state(), DecoderState::Complete);

    // A wrong password fails without consuming the pending payload.
    let err = decoder.retry_with_password("wrong").unwrap_err();
    match err {
        ModemError::Decode(inner) => {
            assert!(matches!(inner, DecodeError::DecryptionFailed));
            assert!(!inner.recoverable());
        }
        other => panic!("unexpected error: {other}"),
    }

    let result = decoder.retry_with_password("hunter2").unwrap();
    assert_eq!(result.bytes, payload);
    assert!(result.encrypted);
    assert_eq!(result.checksum, crypto::sha256_hex(payload));
}

#[test]
fn encrypted_roundtrip_with_upfront_password() {
    let payload = b"keyed in advance";
    let mut encoder = Encoder::default();
    let encoded = encoder.encode(payload, Some("swordfish")).unwrap();

    let mut decoder = decoder_for(encoded.sample_rate, Some("swordfish"));
    let result = run_decode(&mut decoder, &encoded.pcm).expect("decode should complete");
    assert_eq!(result.bytes, payload);
}

// ----------------------------------------------------------------------
// Burst error in the middle of a data frame
// ----------------------------------------------------------------------

#[test]
fn burst_error_is_absorbed_by_fec() {
    let payload = vec![0xFFu8; 200];
    let sample_rate = 48_000;
    let mut encoder = Encoder::new(EncodeOptions {
        compression: false,
        ..Default::default()
    });
    let mut encoded = encoder.encode(&payload, None).unwrap();

    // Silence four symbol windows inside the first data frame.
    let modulator = Modulator::new(AudioMode::Phone, sample_rate);
    let table = AudioMode::Phone.table();
    let symbol_samples = table.symbol_samples(sample_rate);
    let header_symbols = table.symbols_for_bytes(44);
    let data_start = modulator.preamble_samples() + 2 * header_symbols * symbol_samples;
    let burst_start = data_start + 100 * symbol_samples;
    for sample in &mut encoded.pcm[burst_start..burst_start + 4 * symbol_samples] {
        *sample = 0.0;
    }

    let mut decoder = decoder_for(sample_rate, None);
    let result = run_decode(&mut decoder, &encoded.pcm).expect("decode should complete");
    assert_eq!(result.bytes, payload);
    assert!(result.stats.errors_fixed > 0, "the burst should cost corrections");
}

// ----------------------------------------------------------------------
// Unknown sender phase
// ----------------------------------------------------------------------

#[test]
fn phase_offset_is_recovered() {
    let payload = b"phase offset test payload";
    let mut encoder = Encoder::default();
    let encoded = encoder.encode(payload, None).unwrap();

    for dropped in [137usize, 700, 1411] {
        let mut decoder = decoder_for(encoded.sample_rate, None);
        let result = run_decode(&mut decoder, &encoded.pcm[dropped..])
            .unwrap_or_else(|| panic!("decode failed with {dropped} samples dropped"));
        assert_eq!(result.bytes, payload);
    }
}

// ----------------------------------------------------------------------
// Wideband auto-detection
// ----------------------------------------------------------------------

#[test]
fn wideband_mode_is_autodetected() {
    let mut rng = StdRng::seed_from_u64(42);
    let payload: Vec<u8> = (0..2048).map(|_| rng.gen()).collect();

    let sample_rate = 16_000;
    let mut encoder = Encoder::new(EncodeOptions {
        mode: AudioMode::Wideband,
        sample_rate,
        ..Default::default()
    });
    let encoded = encoder.encode(&payload, None).unwrap();

    // The decoder is never told the mode.
    let mut decoder = decoder_for(sample_rate, None);
    let result = run_decode(&mut decoder, &encoded.pcm).expect("decode should complete");
    assert_eq!(result.bytes, payload);
    assert_eq!(result.stats.frame_count, 16);
}

// ----------------------------------------------------------------------
// Compressible payloads
// ----------------------------------------------------------------------

#[test]
fn compressed_roundtrip() {
    let payload = "tonecast ".repeat(120).into_bytes();
    let mut encoder = Encoder::default();
    let encoded = encoder.encode(&payload, None).unwrap();
    assert!(encoded.stats.compressed);
    assert!(encoded.stats.transmitted_payload_bytes < payload.len());

    let mut decoder = decoder_for(encoded.sample_rate, None);
    let result = run_decode(&mut decoder, &encoded.pcm).expect("decode should complete");
    assert_eq!(result.bytes, payload);
    assert!(result.stats.compressed);
    assert_eq!(result.checksum, crypto::sha256_hex(&payload));
}

// ----------------------------------------------------------------------
// Lifecycle
// ----------------------------------------------------------------------

#[test]
fn stopped_decoder_ignores_samples() {
    let mut encoder = Encoder::default();
    let encoded = encoder.encode(b"ignored", None).unwrap();

    let mut decoder = decoder_for(encoded.sample_rate, None);
    decoder.start();
    decoder.stop();
    for block in encoded.pcm.chunks(CHUNK) {
        assert!(decoder.process_samples(block).unwrap().is_none());
    }
    assert_eq!(decoder.state(), DecoderState::Idle);

    // A restart decodes the same audio from scratch.
    let result = run_decode(&mut decoder, &encoded.pcm).expect("decode should complete");
    assert_eq!(result.bytes, b"ignored");
}

#[test]
fn retry_without_pending_payload_is_an_error() {
    let mut decoder = decoder_for(48_000, None);
    decoder.start();
    let err = decoder.retry_with_password("anything").unwrap_err();
    assert!(matches!(
        err,
        ModemError::Decode(DecodeError::NoPendingPayload)
    ));
}
