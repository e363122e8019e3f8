//! tonecast core library
//!
//! Transmits arbitrary byte payloads as audible multi-frequency tones
//! over a narrow-band acoustic channel and recovers them from streaming
//! PCM. The link layer is framed and forward-error-corrected: an inner
//! convolutional code with a byte scrambler, an outer Reed-Solomon code
//! and a block interleaver sit between the frames and the MFSK symbol
//! modulation, tolerating burst errors, unknown start-of-signal and
//! unknown symbol phase.

pub mod bitpack;
pub mod buffer;
pub mod compress;
pub mod config;
pub mod crypto;
pub mod decoder;
pub mod diagnostics;
pub mod encoder;
pub mod errors;
pub mod fec;
pub mod framing;
pub mod interleave;
pub mod logging;
pub mod signal_processing;

pub use config::{AudioMode, DetectorTuning, MAX_PAYLOAD_BYTES};
pub use decoder::{Decoder, DecoderOptions, DecoderState};
pub use diagnostics::{
    DecodeProgress, DecodeResult, DecodeStats, EncodeResult, EncodeStats, NullObserver,
    ProgressObserver,
};
pub use encoder::{EncodeOptions, Encoder};
pub use errors::{DecodeError, EncodeError, ModemError, Result};
pub use fec::FecMode;
