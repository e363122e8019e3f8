//! Pluggable payload compression.
//!
//! The link layer never inspects compressed bytes; it only records a
//! two-bit algorithm tag in the header flags and calls this pair of
//! functions around framing. Tag 0 is uncompressed passthrough, tag 1
//! is raw DEFLATE, tags 2 and 3 are reserved.

use std::io::Write;

use flate2::write::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::errors::DecodeError;

/// Compression algorithm carried in the header's two flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionAlgo {
    None,
    Deflate,
}

impl CompressionAlgo {
    pub fn tag(self) -> u8 {
        match self {
            CompressionAlgo::None => 0,
            CompressionAlgo::Deflate => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CompressionAlgo::None),
            1 => Some(CompressionAlgo::Deflate),
            _ => None,
        }
    }
}

/// Result of [`try_compress`].
#[derive(Debug, Clone)]
pub struct CompressOutcome {
    pub data: Vec<u8>,
    pub compressed: bool,
    pub algo: CompressionAlgo,
}

/// Compress when it helps. Payloads that do not shrink (already dense
/// or tiny) are passed through untouched with tag 0.
pub fn try_compress(data: &[u8]) -> CompressOutcome {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    let deflated = encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .unwrap_or_default();

    if !deflated.is_empty() && deflated.len() < data.len() {
        CompressOutcome {
            data: deflated,
            compressed: true,
            algo: CompressionAlgo::Deflate,
        }
    } else {
        CompressOutcome {
            data: data.to_vec(),
            compressed: false,
            algo: CompressionAlgo::None,
        }
    }
}

/// Reverse [`try_compress`] for the algorithm named by the header.
/// `original_length` bounds the expansion of an untrusted stream.
pub fn decompress(
    data: &[u8],
    algo: CompressionAlgo,
    original_length: usize,
) -> Result<Vec<u8>, DecodeError> {
    match algo {
        CompressionAlgo::None => Ok(data.to_vec()),
        CompressionAlgo::Deflate => {
            let mut decoder = DeflateDecoder::new(Vec::with_capacity(original_length));
            decoder
                .write_all(data)
                .and_then(|_| decoder.finish())
                .map_err(|e| DecodeError::DecompressionFailed {
                    reason: e.to_string(),
                })
                .and_then(|out| {
                    if out.len() > original_length {
                        Err(DecodeError::DecompressionFailed {
                            reason: format!(
                                "inflated to {} bytes, expected at most {}",
                                out.len(),
                                original_length
                            ),
                        })
                    } else {
                        Ok(out)
                    }
                })
        }
    }
}
