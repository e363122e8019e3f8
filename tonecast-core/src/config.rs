//! Mode tables and fixed numeric constants for the tonecast link.
//!
//! The two audio modes pin every physical-layer parameter: tone count,
//! bits per symbol, symbol and guard timing, calibration and sync
//! patterns, and the tone frequency table. These are protocol constants
//! and are NOT configurable at runtime; a sender and receiver only
//! interoperate when they agree on them.

use serde::{Deserialize, Serialize};

/// Hard cap on payload size accepted by the encoder.
pub const MAX_PAYLOAD_BYTES: usize = 4096;

/// Bytes added by the encryption layer: 16-byte salt + 12-byte nonce +
/// 16-byte authentication tag.
pub const ENCRYPTION_OVERHEAD: usize = 44;

/// Default output sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Minimum samples per symbol the decoder will accept.
pub const MIN_SAMPLES_PER_SYMBOL: usize = 8;

/// Linear chirp sweep bounds, shared by both modes.
pub const CHIRP_START_HZ: f32 = 800.0;
pub const CHIRP_PEAK_HZ: f32 = 3000.0;

/// Warmup tone preceding the chirp: 200 ms at a mid-range frequency.
pub const WARMUP_HZ: f32 = 1800.0;
pub const WARMUP_MS: u32 = 200;

/// Up-chirp plus down-chirp duration.
pub const CHIRP_MS: u32 = 400;

/// Peak deviation of the per-symbol frequency jitter in Hz.
pub const FREQUENCY_JITTER_HZ: f32 = 2.0;

/// Amplitude of every emitted tone.
pub const TONE_AMPLITUDE: f32 = 0.85;

/// Candidate symbol alignments tracked by the receiver.
pub const NUM_PHASES: usize = 4;

/// Block interleaver depth applied to every encoded frame.
pub const INTERLEAVE_DEPTH: usize = 8;

/// Seed for the jitter PRNG at the start of every transmission.
pub const JITTER_SEED: u32 = 12345;

/// Receive buffer length in seconds of audio.
pub const DECODE_BUFFER_SECS: u32 = 10;

/// Consecutive header decode failures before a poor-signal warning.
pub const MAX_HEADER_FAILURES: u32 = 3;

/// The two supported transmission modes. The sender picks one; the
/// receiver identifies it from the preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    /// 8 tones, 3 bits/symbol, telephone-grade 600-3050 Hz band.
    Phone,
    /// 16 tones, 4 bits/symbol, 600-4350 Hz band.
    Wideband,
}

impl AudioMode {
    pub const ALL: [AudioMode; 2] = [AudioMode::Phone, AudioMode::Wideband];

    pub fn table(self) -> &'static ModeTable {
        match self {
            AudioMode::Phone => &PHONE,
            AudioMode::Wideband => &WIDEBAND,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AudioMode::Phone => "phone",
            AudioMode::Wideband => "wideband",
        }
    }
}

impl std::fmt::Display for AudioMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Physical-layer parameters of one mode. All tone tables are strictly
/// increasing; sync patterns strictly alternate low/high tone indices.
#[derive(Debug)]
pub struct ModeTable {
    pub mode: AudioMode,
    pub tone_count: usize,
    pub bits_per_symbol: usize,
    pub symbol_ms: u32,
    pub guard_ms: u32,
    /// Calibration tones, transmitted twice in the preamble.
    pub calibration: [u16; 4],
    /// Sync word fixing symbol-boundary alignment.
    pub sync_pattern: [u16; 8],
    pub tone_hz: &'static [f32],
    /// Off-by-N tone indices still counted as a near match during
    /// preamble search.
    pub tone_tolerance: u16,
}

impl ModeTable {
    pub fn symbol_samples(&self, sample_rate: u32) -> usize {
        (sample_rate as u64 * self.symbol_ms as u64 / 1000) as usize
    }

    pub fn guard_samples(&self, sample_rate: u32) -> usize {
        (sample_rate as u64 * self.guard_ms as u64 / 1000) as usize
    }

    /// Symbols needed to carry `bytes` bytes, trailing bits zero padded.
    pub fn symbols_for_bytes(&self, bytes: usize) -> usize {
        (bytes * 8).div_ceil(self.bits_per_symbol)
    }
}

static PHONE_TONES: [f32; 8] = [
    600.0, 950.0, 1300.0, 1650.0, 2000.0, 2350.0, 2700.0, 3050.0,
];

static WIDEBAND_TONES: [f32; 16] = [
    600.0, 850.0, 1100.0, 1350.0, 1600.0, 1850.0, 2100.0, 2350.0, 2600.0, 2850.0, 3100.0, 3350.0,
    3600.0, 3850.0, 4100.0, 4350.0,
];

static PHONE: ModeTable = ModeTable {
    mode: AudioMode::Phone,
    tone_count: 8,
    bits_per_symbol: 3,
    symbol_ms: 40,
    guard_ms: 8,
    calibration: [0, 2, 5, 7],
    sync_pattern: [0, 7, 1, 6, 0, 7, 1, 6],
    tone_hz: &PHONE_TONES,
    tone_tolerance: 1,
};

static WIDEBAND: ModeTable = ModeTable {
    mode: AudioMode::Wideband,
    tone_count: 16,
    bits_per_symbol: 4,
    symbol_ms: 25,
    guard_ms: 5,
    calibration: [0, 4, 11, 15],
    sync_pattern: [0, 15, 1, 14, 0, 15, 1, 14],
    tone_hz: &WIDEBAND_TONES,
    tone_tolerance: 2,
};

/// Empirical detection thresholds. Tunable per mode; the defaults match
/// both built-in tone tables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectorTuning {
    /// Normalised peak energy required for a confident symbol decision.
    pub confidence: f32,
    /// Relaxed threshold tried when the confident one rejects.
    pub confidence_fallback: f32,
    /// RMS level above which the receiver considers a signal present.
    pub energy_gate: f32,
}

impl Default for DetectorTuning {
    fn default() -> Self {
        Self {
            confidence: 0.10,
            confidence_fallback: 0.05,
            energy_gate: 0.05,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_tables_strictly_increasing() {
        for mode in AudioMode::ALL {
            let table = mode.table();
            assert_eq!(table.tone_hz.len(), table.tone_count);
            for pair in table.tone_hz.windows(2) {
                assert!(pair[0] < pair[1], "{mode} tones must increase");
            }
        }
    }

    #[test]
    fn sync_patterns_alternate_low_high() {
        for mode in AudioMode::ALL {
            let table = mode.table();
            let mid = table.tone_count as u16 / 2;
            for (i, &tone) in table.sync_pattern.iter().enumerate() {
                assert!(tone < table.tone_count as u16);
                if i % 2 == 0 {
                    assert!(tone < mid, "{mode} sync[{i}] should be a low tone");
                } else {
                    assert!(tone >= mid, "{mode} sync[{i}] should be a high tone");
                }
            }
        }
    }

    #[test]
    fn bits_per_symbol_match_tone_count() {
        for mode in AudioMode::ALL {
            let table = mode.table();
            assert_eq!(1usize << table.bits_per_symbol, table.tone_count);
        }
    }

    #[test]
    fn preamble_sections_are_whole_symbols() {
        for mode in AudioMode::ALL {
            let table = mode.table();
            assert_eq!(WARMUP_MS % table.symbol_ms, 0);
            assert_eq!(CHIRP_MS % table.symbol_ms, 0);
        }
    }

    #[test]
    fn symbol_sample_counts() {
        let table = AudioMode::Phone.table();
        assert_eq!(table.symbol_samples(48_000), 1920);
        assert_eq!(table.guard_samples(48_000), 384);
        assert_eq!(table.symbols_for_bytes(12), 32);
    }
}
