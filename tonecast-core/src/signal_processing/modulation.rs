//! MFSK tone synthesis: symbols, chirps, preamble and whole
//! transmissions.
//!
//! Every symbol is a Hann-faded sinusoid at the tone table frequency
//! for the mode's symbol duration. Data tones get a small deterministic
//! frequency jitter to decorrelate repeated symbols; preamble and end
//! marker tones do not. Frames are concatenated back to back with no
//! inter-frame silence, so the waveform length is an exact function of
//! the symbol counts.

use std::f32::consts::TAU;

use crate::bitpack;
use crate::config::{
    AudioMode, ModeTable, CHIRP_MS, CHIRP_PEAK_HZ, CHIRP_START_HZ, FREQUENCY_JITTER_HZ,
    JITTER_SEED, TONE_AMPLITUDE, WARMUP_HZ, WARMUP_MS,
};

/// Linear congruential generator for tone jitter. Deterministic and
/// owned by the encoder instance, so concurrent encoders in one process
/// never perturb each other.
#[derive(Debug, Clone)]
pub struct JitterPrng {
    state: u32,
}

impl JitterPrng {
    pub fn new(seed: u32) -> Self {
        Self {
            state: seed & 0x7FFF_FFFF,
        }
    }

    pub fn reseed(&mut self, seed: u32) {
        self.state = seed & 0x7FFF_FFFF;
    }

    fn next(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(1_103_515_245)
            .wrapping_add(12_345)
            & 0x7FFF_FFFF;
        self.state
    }

    /// Uniform draw in [-1, 1).
    pub fn next_unit(&mut self) -> f32 {
        (self.next() as f64 / (1u64 << 31) as f64 * 2.0 - 1.0) as f32
    }
}

impl Default for JitterPrng {
    fn default() -> Self {
        Self::new(JITTER_SEED)
    }
}

/// Tone synthesizer for one audio mode at a fixed sample rate.
#[derive(Debug)]
pub struct Modulator {
    table: &'static ModeTable,
    sample_rate: u32,
}

impl Modulator {
    pub fn new(mode: AudioMode, sample_rate: u32) -> Self {
        Self {
            table: mode.table(),
            sample_rate,
        }
    }

    pub fn table(&self) -> &'static ModeTable {
        self.table
    }

    pub fn symbol_samples(&self) -> usize {
        self.table.symbol_samples(self.sample_rate)
    }

    fn guard_samples(&self) -> usize {
        self.table.guard_samples(self.sample_rate)
    }

    fn fade(&self, i: usize, total: usize) -> f32 {
        let guard = self.guard_samples();
        if guard == 0 {
            return 1.0;
        }
        if i < guard {
            0.5 * (1.0 - (std::f32::consts::PI * i as f32 / guard as f32).cos())
        } else if i >= total - guard {
            0.5 * (1.0 - (std::f32::consts::PI * (total - i) as f32 / guard as f32).cos())
        } else {
            1.0
        }
    }

    fn push_tone(&self, freq: f32, samples: usize, out: &mut Vec<f32>) {
        let step = TAU * freq / self.sample_rate as f32;
        for i in 0..samples {
            let envelope = self.fade(i, samples);
            out.push(TONE_AMPLITUDE * envelope * (step * i as f32).sin());
        }
    }

    fn append_symbols(&self, symbols: &[u16], mut jitter: Option<&mut JitterPrng>, out: &mut Vec<f32>) {
        let samples = self.symbol_samples();
        for &symbol in symbols {
            let base = self.table.tone_hz[symbol as usize % self.table.tone_count];
            let offset = match jitter.as_deref_mut() {
                Some(prng) => prng.next_unit() * FREQUENCY_JITTER_HZ,
                None => 0.0,
            };
            self.push_tone(base + offset, samples, out);
        }
    }

    /// Modulate raw bytes into jittered data tones.
    pub fn modulate_bytes(&self, bytes: &[u8], jitter: &mut JitterPrng, out: &mut Vec<f32>) {
        let symbols = bitpack::pack_symbols(bytes, self.table.bits_per_symbol);
        self.append_symbols(&symbols, Some(jitter), out);
    }

    fn append_chirp(&self, from: f32, to: f32, samples: usize, phase: &mut f32, out: &mut Vec<f32>) {
        for i in 0..samples {
            let freq = from + (to - from) * i as f32 / samples as f32;
            *phase += TAU * freq / self.sample_rate as f32;
            if *phase > TAU {
                *phase -= TAU;
            }
            out.push(TONE_AMPLITUDE * phase.sin());
        }
    }

    fn warmup_samples(&self) -> usize {
        (self.sample_rate as u64 * WARMUP_MS as u64 / 1000) as usize
    }

    fn chirp_samples(&self) -> usize {
        (self.sample_rate as u64 * CHIRP_MS as u64 / 1000) as usize
    }

    /// Warmup tone, up/down chirp, calibration twice, sync word.
    pub fn preamble(&self, out: &mut Vec<f32>) {
        self.push_tone(WARMUP_HZ, self.warmup_samples(), out);

        let half = self.chirp_samples() / 2;
        let mut phase = 0.0f32;
        self.append_chirp(CHIRP_START_HZ, CHIRP_PEAK_HZ, half, &mut phase, out);
        self.append_chirp(CHIRP_PEAK_HZ, CHIRP_START_HZ, half, &mut phase, out);

        self.append_symbols(&self.table.calibration, None, out);
        self.append_symbols(&self.table.calibration, None, out);
        self.append_symbols(&self.table.sync_pattern, None, out);
    }

    /// One sync-pattern repetition closes the transmission.
    pub fn end_marker(&self, out: &mut Vec<f32>) {
        self.append_symbols(&self.table.sync_pattern, None, out);
    }

    pub fn preamble_samples(&self) -> usize {
        self.warmup_samples() + self.chirp_samples() + 16 * self.symbol_samples()
    }

    /// Number of header copies for a transmission with `data_frames`
    /// data frames: redundancy only pays off on multi-frame sessions.
    pub fn header_copies(data_frames: usize) -> usize {
        if data_frames >= 2 {
            2
        } else {
            1
        }
    }

    /// Assemble the whole on-air waveform: preamble, header copy (or
    /// two), every data frame in order, end marker. No silence anywhere.
    pub fn generate_transmission(
        &self,
        header: &[u8],
        data_frames: &[Vec<u8>],
        prng: &mut JitterPrng,
    ) -> Vec<f32> {
        let copies = Self::header_copies(data_frames.len());
        let frame_lens: Vec<usize> = data_frames.iter().map(|f| f.len()).collect();
        let mut out = Vec::with_capacity(self.transmission_samples(header.len(), copies, &frame_lens));

        self.preamble(&mut out);

        prng.reseed(JITTER_SEED);
        self.modulate_bytes(header, prng, &mut out);
        if copies == 2 {
            // Reseeding makes the second copy sample-identical.
            prng.reseed(JITTER_SEED);
            self.modulate_bytes(header, prng, &mut out);
        }

        for frame in data_frames {
            self.modulate_bytes(frame, prng, &mut out);
        }

        self.end_marker(&mut out);
        out
    }

    /// Exact sample count of [`Modulator::generate_transmission`].
    pub fn transmission_samples(
        &self,
        header_len: usize,
        header_copies: usize,
        frame_lens: &[usize],
    ) -> usize {
        let data_symbols: usize = frame_lens
            .iter()
            .map(|&len| self.table.symbols_for_bytes(len))
            .sum();
        let symbols =
            header_copies * self.table.symbols_for_bytes(header_len) + data_symbols + 8;
        self.preamble_samples() + symbols * self.symbol_samples()
    }

    /// Duration in seconds of the assembled waveform, exact to within
    /// one sample.
    pub fn calculate_duration(
        &self,
        header_len: usize,
        header_copies: usize,
        frame_lens: &[usize],
    ) -> f64 {
        self.transmission_samples(header_len, header_copies, frame_lens) as f64
            / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SAMPLE_RATE;

    #[test]
    fn jitter_prng_is_deterministic() {
        let mut a = JitterPrng::new(JITTER_SEED);
        let mut b = JitterPrng::new(JITTER_SEED);
        let draws_a: Vec<f32> = (0..16).map(|_| a.next_unit()).collect();
        let draws_b: Vec<f32> = (0..16).map(|_| b.next_unit()).collect();
        assert_eq!(draws_a, draws_b);
        assert!(draws_a.iter().all(|v| (-1.0..1.0).contains(v)));
        assert!(draws_a.iter().any(|&v| v != draws_a[0]));
    }

    #[test]
    fn symbol_length_and_amplitude() {
        let modulator = Modulator::new(AudioMode::Phone, DEFAULT_SAMPLE_RATE);
        let mut out = Vec::new();
        modulator.append_symbols(&[3], None, &mut out);
        assert_eq!(out.len(), modulator.symbol_samples());
        let peak = out.iter().fold(0.0f32, |m, &v| m.max(v.abs()));
        assert!(peak <= TONE_AMPLITUDE + 1e-3);
        assert!(peak > TONE_AMPLITUDE * 0.9);
    }

    #[test]
    fn guard_edges_fade_to_silence() {
        let modulator = Modulator::new(AudioMode::Phone, DEFAULT_SAMPLE_RATE);
        let mut out = Vec::new();
        modulator.append_symbols(&[5], None, &mut out);
        assert!(out[0].abs() < 1e-4);
        let guard = AudioMode::Phone.table().guard_samples(DEFAULT_SAMPLE_RATE);
        let mid = out.len() / 2;
        assert!(out[mid..mid + guard].iter().any(|v| v.abs() > 0.5));
    }

    #[test]
    fn transmission_length_matches_prediction() {
        let modulator = Modulator::new(AudioMode::Phone, DEFAULT_SAMPLE_RATE);
        let header = vec![0xAB; 44];
        let frames = vec![vec![0x11; 94], vec![0x22; 94], vec![0x33; 40]];
        let mut prng = JitterPrng::default();
        let pcm = modulator.generate_transmission(&header, &frames, &mut prng);
        let lens: Vec<usize> = frames.iter().map(|f| f.len()).collect();
        assert_eq!(pcm.len(), modulator.transmission_samples(44, 2, &lens));
    }

    #[test]
    fn single_frame_sends_one_header_copy() {
        let modulator = Modulator::new(AudioMode::Wideband, DEFAULT_SAMPLE_RATE);
        let header = vec![0xAB; 44];
        let frames = vec![vec![0x11; 94]];
        let mut prng = JitterPrng::default();
        let pcm = modulator.generate_transmission(&header, &frames, &mut prng);
        let lens = vec![94usize];
        assert_eq!(pcm.len(), modulator.transmission_samples(44, 1, &lens));
    }

    #[test]
    fn header_copies_are_sample_identical() {
        let modulator = Modulator::new(AudioMode::Phone, DEFAULT_SAMPLE_RATE);
        let header = vec![0x5A; 44];
        let frames = vec![vec![1u8; 94], vec![2u8; 94]];
        let mut prng = JitterPrng::default();
        let pcm = modulator.generate_transmission(&header, &frames, &mut prng);

        let header_symbols = AudioMode::Phone.table().symbols_for_bytes(44);
        let header_samples = header_symbols * modulator.symbol_samples();
        let start = modulator.preamble_samples();
        let copy_1 = &pcm[start..start + header_samples];
        let copy_2 = &pcm[start + header_samples..start + 2 * header_samples];
        assert_eq!(copy_1, copy_2);
    }
}
