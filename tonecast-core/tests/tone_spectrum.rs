//! Spectral validation of the emitted waveform: every data tone lands
//! on its table frequency and the transmission stays inside the mode's
//! band.

use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;

use tonecast_core::config::{AudioMode, DEFAULT_SAMPLE_RATE};
use tonecast_core::encoder::{EncodeOptions, Encoder};
use tonecast_core::signal_processing::{JitterPrng, Modulator};

/// Dominant frequency of a sample window via an FFT peak pick.
fn dominant_frequency(samples: &[f32], sample_rate: u32) -> f32 {
    let fft_size = samples.len().next_power_of_two();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);

    let mut buffer: Vec<Complex32> = samples
        .iter()
        .map(|&s| Complex32::new(s, 0.0))
        .collect();
    buffer.resize(fft_size, Complex32::new(0.0, 0.0));
    fft.process(&mut buffer);

    let half = fft_size / 2;
    let peak_bin = (1..half)
        .max_by(|&a, &b| {
            buffer[a]
                .norm_sqr()
                .partial_cmp(&buffer[b].norm_sqr())
                .unwrap()
        })
        .unwrap();
    peak_bin as f32 * sample_rate as f32 / fft_size as f32
}

#[test]
fn every_tone_lands_on_its_table_frequency() {
    for mode in AudioMode::ALL {
        let table = mode.table();
        let modulator = Modulator::new(mode, DEFAULT_SAMPLE_RATE);
        let symbol_samples = table.symbol_samples(DEFAULT_SAMPLE_RATE);

        // One byte exercises several symbols per pass; sweep bytes that
        // cover the full tone range at either symbol width.
        let mut prng = JitterPrng::default();
        let mut pcm = Vec::new();
        modulator.modulate_bytes(&[0x00, 0xFF, 0x6D, 0x92], &mut prng, &mut pcm);

        for (i, window) in pcm.chunks(symbol_samples).enumerate() {
            let freq = dominant_frequency(window, DEFAULT_SAMPLE_RATE);
            let nearest = table
                .tone_hz
                .iter()
                .cloned()
                .min_by(|a, b| (a - freq).abs().partial_cmp(&(b - freq).abs()).unwrap())
                .unwrap();
            let bin_width = DEFAULT_SAMPLE_RATE as f32 / symbol_samples.next_power_of_two() as f32;
            assert!(
                (freq - nearest).abs() < bin_width * 2.0 + 5.0,
                "{mode} symbol {i}: dominant {freq} Hz too far from table tone {nearest} Hz"
            );
        }
    }
}

#[test]
fn transmission_energy_stays_in_band() {
    let mut encoder = Encoder::new(EncodeOptions {
        mode: AudioMode::Phone,
        ..Default::default()
    });
    let encoded = encoder.encode(b"band limit check", None).unwrap();

    let freq = dominant_frequency(&encoded.pcm, DEFAULT_SAMPLE_RATE);
    assert!(
        (500.0..3200.0).contains(&freq),
        "phone transmission peak at {freq} Hz is outside the band"
    );
}

#[test]
fn preamble_sweeps_through_the_chirp_band() {
    let modulator = Modulator::new(AudioMode::Phone, DEFAULT_SAMPLE_RATE);
    let mut pcm = Vec::new();
    modulator.preamble(&mut pcm);

    // 100 ms into the up-chirp the sweep sits between start and peak.
    let warmup = DEFAULT_SAMPLE_RATE as usize / 5;
    let probe = warmup + DEFAULT_SAMPLE_RATE as usize / 10;
    let window = &pcm[probe..probe + 2048];
    let freq = dominant_frequency(window, DEFAULT_SAMPLE_RATE);
    assert!(
        (800.0..3000.0).contains(&freq),
        "chirp probe at {freq} Hz is outside the sweep"
    );
}
