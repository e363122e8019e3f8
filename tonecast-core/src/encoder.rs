//! Transmit pipeline: payload bytes to a ready-to-play waveform.
//!
//! The pipeline is pure and synchronous: compress (optional), encrypt
//! (optional), packetize, apply FEC and interleaving per frame, then
//! modulate everything behind the preamble. The jitter PRNG is a field
//! of the encoder instance, so concurrent encoders never share state.

use crate::compress::{self, CompressionAlgo};
use crate::config::{AudioMode, INTERLEAVE_DEPTH, MAX_PAYLOAD_BYTES};
use crate::crypto;
use crate::diagnostics::{EncodeResult, EncodeStats};
use crate::errors::{EncodeError, ModemError, Result};
use crate::fec::{self, FecMode};
use crate::framing;
use crate::interleave::interleave;
use crate::logging::SignalLogger;
use crate::signal_processing::{JitterPrng, Modulator};

/// Transmit-side options.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub mode: AudioMode,
    pub sample_rate: u32,
    /// FEC flavour for the header frame; data frames are always robust.
    pub header_fec: FecMode,
    /// Try to compress the payload before framing.
    pub compression: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            mode: AudioMode::Phone,
            sample_rate: crate::config::DEFAULT_SAMPLE_RATE,
            header_fec: FecMode::Robust,
            compression: true,
        }
    }
}

/// Payload-to-PCM encoder.
pub struct Encoder {
    options: EncodeOptions,
    jitter: JitterPrng,
    logger: SignalLogger,
}

impl Encoder {
    pub fn new(options: EncodeOptions) -> Self {
        Self {
            options,
            jitter: JitterPrng::default(),
            logger: SignalLogger::default(),
        }
    }

    pub fn logger(&self) -> &SignalLogger {
        &self.logger
    }

    /// Encode `payload` into PCM. A password turns on encryption.
    pub fn encode(&mut self, payload: &[u8], password: Option<&str>) -> Result<EncodeResult> {
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(ModemError::Encode(EncodeError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_BYTES,
            }));
        }

        // The reported checksum is always of the original payload.
        let checksum = crypto::sha256_hex(payload);

        let outcome = if self.options.compression {
            compress::try_compress(payload)
        } else {
            compress::CompressOutcome {
                data: payload.to_vec(),
                compressed: false,
                algo: CompressionAlgo::None,
            }
        };

        let encrypted = password.is_some();
        let body = match password {
            Some(password) => crypto::encrypt(&outcome.data, password)?,
            None => outcome.data,
        };

        let packet = framing::packetize(
            &body,
            payload.len(),
            outcome.compressed,
            encrypted,
            outcome.algo,
        )?;

        let header_encoded = {
            let coded = match self.options.header_fec {
                FecMode::Normal => fec::encode_normal(&packet.header_frame),
                FecMode::Robust => fec::encode_robust(&packet.header_frame),
            };
            interleave(&coded, INTERLEAVE_DEPTH)
        };

        let data_encoded: Vec<Vec<u8>> = packet
            .data_frames
            .iter()
            .map(|frame| interleave(&fec::encode_robust(frame), INTERLEAVE_DEPTH))
            .collect();

        let modulator = Modulator::new(self.options.mode, self.options.sample_rate);
        let pcm = modulator.generate_transmission(&header_encoded, &data_encoded, &mut self.jitter);

        let frame_lens: Vec<usize> = data_encoded.iter().map(|f| f.len()).collect();
        let copies = Modulator::header_copies(data_encoded.len());
        let duration = modulator.calculate_duration(header_encoded.len(), copies, &frame_lens);
        debug_assert_eq!(
            pcm.len(),
            modulator.transmission_samples(header_encoded.len(), copies, &frame_lens)
        );

        let encoded_bytes =
            copies * header_encoded.len() + frame_lens.iter().sum::<usize>();
        self.logger.info(
            "FRAME",
            format!(
                "session {:#06x}: {} payload bytes in {} frames, {encoded_bytes} bytes on air, {duration:.2}s",
                packet.session_id,
                body.len(),
                packet.data_frames.len(),
            ),
        );

        Ok(EncodeResult {
            pcm,
            sample_rate: self.options.sample_rate,
            duration,
            checksum,
            stats: EncodeStats {
                frame_count: packet.data_frames.len(),
                compressed: outcome.compressed,
                encrypted,
                payload_bytes: payload.len(),
                transmitted_payload_bytes: body.len(),
                encoded_bytes,
            },
        })
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(EncodeOptions::default())
    }
}
