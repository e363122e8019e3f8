//! Progress reporting and pipeline result types.

use serde::Serialize;

use crate::decoder::DecoderState;

/// Snapshot of receive-side progress pushed to the observer after every
/// sample batch and on state transitions.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeProgress {
    pub state: DecoderState,
    /// Signal presence, 0-100.
    pub signal_level: f32,
    /// Quality of the matched preamble pattern, 0.0-1.0.
    pub sync_confidence: f32,
    pub frames_received: usize,
    pub frames_expected: usize,
    pub errors_corrected: usize,
    /// Human-readable hint for diagnostics UIs.
    pub debug: Option<String>,
    /// The payload is encrypted and no password was supplied.
    pub needs_password: bool,
    /// Repeated header failures suggest a poor channel.
    pub signal_warning: bool,
}

impl Default for DecodeProgress {
    fn default() -> Self {
        Self {
            state: DecoderState::Idle,
            signal_level: 0.0,
            sync_confidence: 0.0,
            frames_received: 0,
            frames_expected: 0,
            errors_corrected: 0,
            debug: None,
            needs_password: false,
            signal_warning: false,
        }
    }
}

/// Write-only observer of decode progress. Implementations must not
/// call back into the decoder.
pub trait ProgressObserver {
    fn update(&mut self, progress: &DecodeProgress);
}

/// Observer that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn update(&mut self, _progress: &DecodeProgress) {}
}

/// Transmit-side statistics reported alongside the waveform.
#[derive(Debug, Clone, Serialize)]
pub struct EncodeStats {
    /// Data frames in the transmission.
    pub frame_count: usize,
    pub compressed: bool,
    pub encrypted: bool,
    /// Payload bytes handed to the encoder.
    pub payload_bytes: usize,
    /// Payload bytes after compression and encryption, as framed.
    pub transmitted_payload_bytes: usize,
    /// Total bytes on air across header and data frames, post FEC.
    pub encoded_bytes: usize,
}

/// Result of one encode call.
#[derive(Debug, Clone)]
pub struct EncodeResult {
    pub pcm: Vec<f32>,
    pub sample_rate: u32,
    /// Waveform duration in seconds, exact to within one sample.
    pub duration: f64,
    /// SHA-256 of the original payload, lowercase hex.
    pub checksum: String,
    pub stats: EncodeStats,
}

/// Receive-side statistics.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeStats {
    pub frame_count: usize,
    /// Byte errors repaired by the outer code across the session.
    pub errors_fixed: usize,
    pub compressed: bool,
    pub encrypted: bool,
}

/// Result of a completed decode.
#[derive(Debug, Clone)]
pub struct DecodeResult {
    pub bytes: Vec<u8>,
    /// UTF-8 view of the payload when it is valid text.
    pub text: Option<String>,
    /// SHA-256 of the recovered payload, lowercase hex.
    pub checksum: String,
    pub encrypted: bool,
    pub stats: DecodeStats,
}
