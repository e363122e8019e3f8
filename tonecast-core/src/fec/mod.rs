//! Forward error correction stack.
//!
//! Data frames and robust headers use the concatenated "v3" scheme:
//! convolutional encode, scramble, then Reed-Solomon. Normal headers
//! skip the inner code and carry Reed-Solomon parity only. The receiver
//! reverses the layers in lockstep; a failure at any layer is reported
//! as an uncorrectable frame.

pub mod convolutional;
pub mod gf256;
pub mod reed_solomon;
pub mod scrambler;

use serde::{Deserialize, Serialize};

use crate::errors::FecError;

/// Protection level applied to a header frame. Data frames are always
/// [`FecMode::Robust`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FecMode {
    /// Outer Reed-Solomon only.
    Normal,
    /// Convolutional + scrambler + Reed-Solomon.
    Robust,
}

/// Split a stream into near-equal Reed-Solomon datawords. Streams over
/// the single-block limit get one parity run per sub-block.
fn block_lengths(total: usize) -> Vec<usize> {
    let blocks = total.div_ceil(reed_solomon::MAX_DATA).max(1);
    let base = total / blocks;
    let remainder = total % blocks;
    (0..blocks)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

fn rs_encode_stream(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 16);
    let mut offset = 0;
    for len in block_lengths(data.len()) {
        out.extend_from_slice(&reed_solomon::encode(&data[offset..offset + len]));
        offset += len;
    }
    out
}

fn rs_decode_stream(data: &[u8], plain_len: usize) -> Result<(Vec<u8>, usize), FecError> {
    let lengths = block_lengths(plain_len);
    let expected = plain_len + reed_solomon::PARITY * lengths.len();
    if data.len() != expected {
        return Err(FecError::CodedLengthMismatch {
            expected,
            got: data.len(),
        });
    }

    let mut out = Vec::with_capacity(plain_len);
    let mut corrected = 0;
    let mut offset = 0;
    for len in lengths {
        let block = &data[offset..offset + len + reed_solomon::PARITY];
        let (dataword, errors) = reed_solomon::decode(block)?;
        out.extend_from_slice(&dataword);
        corrected += errors;
        offset += len + reed_solomon::PARITY;
    }
    Ok((out, corrected))
}

/// On-air byte count of a robustly encoded frame of `frame_len` bytes.
pub fn robust_len(frame_len: usize) -> usize {
    let conv = convolutional::encoded_len(frame_len);
    conv + reed_solomon::PARITY * block_lengths(conv).len()
}

/// On-air byte count of a normally encoded frame.
pub fn normal_len(frame_len: usize) -> usize {
    frame_len + reed_solomon::PARITY * block_lengths(frame_len).len()
}

/// Transmit-side v3 pipeline: convolutional encode, scramble, then
/// append Reed-Solomon parity.
pub fn encode_robust(frame: &[u8]) -> Vec<u8> {
    let mut coded = convolutional::encode(frame);
    scrambler::scramble(&mut coded);
    rs_encode_stream(&coded)
}

/// Receive-side v3 pipeline, reversing [`encode_robust`]. Returns the
/// frame bytes and the count of Reed-Solomon byte corrections.
pub fn decode_robust(data: &[u8], frame_len: usize) -> Result<(Vec<u8>, usize), FecError> {
    let conv_len = convolutional::encoded_len(frame_len);
    let (mut coded, corrected) = rs_decode_stream(data, conv_len)?;
    scrambler::descramble(&mut coded);
    let frame = convolutional::decode(&coded, frame_len)?;
    Ok((frame, corrected))
}

/// Transmit-side normal pipeline: Reed-Solomon parity only.
pub fn encode_normal(frame: &[u8]) -> Vec<u8> {
    rs_encode_stream(frame)
}

/// Receive-side normal pipeline.
pub fn decode_normal(data: &[u8], frame_len: usize) -> Result<(Vec<u8>, usize), FecError> {
    rs_decode_stream(data, frame_len)
}
