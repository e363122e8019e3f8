//! Rate-1/2 constraint-length-7 convolutional code with the standard
//! NASA polynomials, decoded by a 64-state Viterbi pass over the whole
//! frame.
//!
//! The encoder shifts bits in MSB first and appends [`FLUSH_BYTES`]
//! zero bytes, so the trellis always terminates in the zero state and
//! the coded length is an exact function of the frame length.

use crate::errors::FecError;

pub const CONSTRAINT: usize = 7;
const STATES: usize = 64;
const G1: u8 = 0o171;
const G2: u8 = 0o133;

/// Zero bytes appended before encoding. Two bytes cover the 6-bit tail
/// and keep the coded stream byte aligned at exactly 2 * (n + 2) bytes.
pub const FLUSH_BYTES: usize = 2;

/// Coded byte count for a frame of `len` bytes.
pub fn encoded_len(len: usize) -> usize {
    2 * (len + FLUSH_BYTES)
}

#[inline]
fn parity(v: u8) -> u8 {
    (v.count_ones() & 1) as u8
}

#[inline]
fn branch_output(window: u8) -> u8 {
    (parity(window & G1) << 1) | parity(window & G2)
}

/// Encode bit-serially, two output bits per input bit.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(data.len()));
    let mut window = 0u8;
    let mut acc = 0u8;
    let mut acc_bits = 0u8;

    let bits = data
        .iter()
        .chain(std::iter::repeat(&0u8).take(FLUSH_BYTES))
        .flat_map(|&byte| (0..8).rev().map(move |i| (byte >> i) & 1));

    for bit in bits {
        window = ((window << 1) | bit) & 0x7F;
        acc = (acc << 2) | branch_output(window);
        acc_bits += 2;
        if acc_bits == 8 {
            out.push(acc);
            acc = 0;
            acc_bits = 0;
        }
    }
    out
}

/// Viterbi decode `coded` back to `data_len` bytes. The coded length
/// must match [`encoded_len`] exactly; traceback starts from the zero
/// state the flush bytes force.
pub fn decode(coded: &[u8], data_len: usize) -> Result<Vec<u8>, FecError> {
    let expected = encoded_len(data_len);
    if coded.len() != expected {
        return Err(FecError::CodedLengthMismatch {
            expected,
            got: coded.len(),
        });
    }

    let steps = 8 * (data_len + FLUSH_BYTES);
    const INF: u32 = u32::MAX / 2;

    let mut metrics = [INF; STATES];
    metrics[0] = 0;
    let mut next_metrics = [INF; STATES];
    // Packed decisions: input bit and predecessor state per (step, state).
    let mut decisions = vec![0u8; steps * STATES];

    for step in 0..steps {
        let byte = coded[step / 4];
        let received = (byte >> (6 - 2 * (step % 4))) & 0b11;

        next_metrics.fill(INF);
        let slot = &mut decisions[step * STATES..(step + 1) * STATES];

        for (state, &metric) in metrics.iter().enumerate() {
            if metric >= INF {
                continue;
            }
            for bit in 0..2u8 {
                let window = (((state as u8) << 1) | bit) & 0x7F;
                let next = (window & 0x3F) as usize;
                let cost = (branch_output(window) ^ received).count_ones();
                let candidate = metric + cost;
                if candidate < next_metrics[next] {
                    next_metrics[next] = candidate;
                    slot[next] = (bit << 6) | state as u8;
                }
            }
        }
        metrics.copy_from_slice(&next_metrics);
    }

    if metrics[0] >= INF {
        return Err(FecError::TracebackFailed);
    }

    let mut bits = vec![0u8; steps];
    let mut state = 0usize;
    for step in (0..steps).rev() {
        let decision = decisions[step * STATES + state];
        bits[step] = decision >> 6;
        state = (decision & 0x3F) as usize;
    }

    let mut out = Vec::with_capacity(data_len);
    for chunk in bits.chunks(8).take(data_len) {
        out.push(chunk.iter().fold(0u8, |acc, &b| (acc << 1) | b));
    }
    Ok(out)
}
