//! Tone detection: Goertzel energies per candidate tone, the signal
//! presence gate, and the zero-crossing chirp estimator.

use std::f32::consts::TAU;

use crate::config::{AudioMode, DetectorTuning, ModeTable, CHIRP_PEAK_HZ, CHIRP_START_HZ};

/// Outcome of examining one symbol window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolDetection {
    /// Best tone index; a best guess when `confident` is false.
    pub index: u16,
    /// Peak energy over total energy across the tone bank, 0.0-1.0.
    pub confidence: f32,
    pub confident: bool,
}

/// Goertzel energy of `samples` at one frequency, normalised so window
/// length does not change the scale.
fn goertzel_energy(samples: &[f32], freq: f32, sample_rate: u32) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let omega = TAU * freq / sample_rate as f32;
    let coeff = 2.0 * omega.cos();

    let mut s_prev = 0.0f32;
    let mut s_prev2 = 0.0f32;
    for &x in samples {
        let s = x + coeff * s_prev - s_prev2;
        s_prev2 = s_prev;
        s_prev = s;
    }

    let power = s_prev * s_prev + s_prev2 * s_prev2 - coeff * s_prev * s_prev2;
    power.max(0.0) / (samples.len() * samples.len()) as f32
}

/// Per-mode symbol detector.
#[derive(Debug, Clone)]
pub struct SymbolDetector {
    table: &'static ModeTable,
    sample_rate: u32,
    tuning: DetectorTuning,
}

impl SymbolDetector {
    pub fn new(mode: AudioMode, sample_rate: u32, tuning: DetectorTuning) -> Self {
        Self {
            table: mode.table(),
            sample_rate,
            tuning,
        }
    }

    pub fn symbol_samples(&self) -> usize {
        self.table.symbol_samples(self.sample_rate)
    }

    /// Examine one full symbol window. Energy is measured over the
    /// non-guard core so the Hann fades of neighbouring symbols do not
    /// leak into the decision.
    pub fn detect(&self, window: &[f32]) -> SymbolDetection {
        let guard = self.table.guard_samples(self.sample_rate);
        let core = if window.len() > 2 * guard {
            &window[guard..window.len() - guard]
        } else {
            window
        };

        let mut best_index = 0u16;
        let mut best_energy = 0.0f32;
        let mut total = 0.0f32;
        for (index, &freq) in self.table.tone_hz.iter().enumerate() {
            let energy = goertzel_energy(core, freq, self.sample_rate);
            total += energy;
            if energy > best_energy {
                best_energy = energy;
                best_index = index as u16;
            }
        }

        let confidence = if total > 0.0 { best_energy / total } else { 0.0 };
        let confident =
            confidence >= self.tuning.confidence || confidence >= self.tuning.confidence_fallback;

        SymbolDetection {
            index: best_index,
            confidence,
            confident,
        }
    }
}

/// RMS level of a sample block, the "signal present" gate metric.
pub fn calculate_signal_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|&v| v * v).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Purely observational chirp spotter: a zero-crossing-rate frequency
/// estimate per block, flagged after three rising estimates inside the
/// chirp sweep band. Never gates decoder progress.
#[derive(Debug, Clone, Default)]
pub struct ChirpDetector {
    previous_estimate: f32,
    rising: u8,
    detected: bool,
}

impl ChirpDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detected(&self) -> bool {
        self.detected
    }

    pub fn feed(&mut self, block: &[f32], sample_rate: u32) {
        if self.detected || block.len() < 256 {
            return;
        }

        let crossings = block
            .windows(2)
            .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
            .count();
        let duration = block.len() as f32 / sample_rate as f32;
        let estimate = crossings as f32 / 2.0 / duration;

        let in_band = (CHIRP_START_HZ..=CHIRP_PEAK_HZ).contains(&estimate);
        if in_band && estimate > self.previous_estimate {
            self.rising += 1;
            if self.rising >= 3 {
                self.detected = true;
            }
        } else {
            self.rising = 0;
        }
        self.previous_estimate = estimate;
    }
}
