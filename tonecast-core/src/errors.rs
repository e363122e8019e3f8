//! Error types for the tonecast modem, with granular categories.

use thiserror::Error;

/// Top-level error type for all modem operations.
#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),

    #[error("FEC error: {0}")]
    Fec(#[from] FecError),

    #[error("Framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Encode-side errors. All are reported synchronously, before any
/// samples are produced.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Payload of {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Encryption failed: {reason}")]
    EncryptionFailed { reason: String },
}

/// Receive-side errors. `recoverable()` distinguishes failures that a
/// soft reset absorbs from those that must surface to the caller.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Decryption failed: wrong password or corrupted payload")]
    DecryptionFailed,

    #[error("Decompression failed: {reason}")]
    DecompressionFailed { reason: String },

    #[error("Reassembled payload length {actual} does not match header length {expected}")]
    ReassemblyFailed { expected: usize, actual: usize },

    #[error("Recovered payload of {actual} bytes is shorter than original length {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Header frame failed validation")]
    InvalidHeader,

    #[error("Frame carries session id {got:#06x}, expected {expected:#06x}")]
    SessionMismatch { expected: u16, got: u16 },

    #[error("No received payload is pending a password retry")]
    NoPendingPayload,
}

impl DecodeError {
    /// True when the receive loop may continue on the same audio stream
    /// after a soft reset. Decryption failure is explicitly not
    /// recoverable that way; the caller retries with a password instead.
    pub fn recoverable(&self) -> bool {
        match self {
            DecodeError::DecryptionFailed | DecodeError::NoPendingPayload => false,
            DecodeError::DecompressionFailed { .. }
            | DecodeError::ReassemblyFailed { .. }
            | DecodeError::LengthMismatch { .. }
            | DecodeError::InvalidHeader
            | DecodeError::SessionMismatch { .. } => true,
        }
    }
}

/// Forward error correction failures.
#[derive(Debug, Error)]
pub enum FecError {
    #[error("Reed-Solomon block of {errors} errors is uncorrectable")]
    Uncorrectable { errors: usize },

    #[error("Reed-Solomon block too short: {len} bytes")]
    BlockTooShort { len: usize },

    #[error("Viterbi input of {got} bytes does not match expected {expected} bytes")]
    CodedLengthMismatch { expected: usize, got: usize },

    #[error("Viterbi traceback did not reach the flushed state")]
    TracebackFailed,
}

/// Frame construction and parsing failures.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Frame payload of {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Header replacement carries session id {got:#06x}, expected {expected:#06x}")]
    SessionConflict { expected: u16, got: u16 },

    #[error("Header field out of range: {field}")]
    FieldOutOfRange { field: &'static str },
}

/// Configuration errors raised at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Sample rate {rate} Hz yields fewer than {min} samples per symbol")]
    SampleRateTooLow { rate: u32, min: usize },
}

/// Result type alias for modem operations.
pub type Result<T> = std::result::Result<T, ModemError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decryption_failure_is_not_recoverable() {
        assert!(!DecodeError::DecryptionFailed.recoverable());
        assert!(DecodeError::InvalidHeader.recoverable());
        assert!(DecodeError::DecompressionFailed {
            reason: "truncated".into()
        }
        .recoverable());
    }

    #[test]
    fn payload_cap_error_names_the_maximum() {
        let err = EncodeError::PayloadTooLarge {
            size: 5000,
            max: 4096,
        };
        assert!(err.to_string().contains("4096"));
    }
}
