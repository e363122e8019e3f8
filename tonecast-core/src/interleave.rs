//! Size-preserving block interleaver.
//!
//! Conceptually the input fills a `rows x ceil(len/rows)` matrix in row
//! major order and is read back column major, skipping positions past
//! the input length. Spreading adjacent bytes apart converts channel
//! burst errors into isolated byte errors the outer code can correct.

/// Interleave `data` with the given row count. Identity for inputs of
/// length <= 1 or `rows` <= 1.
pub fn interleave(data: &[u8], rows: usize) -> Vec<u8> {
    if data.len() <= 1 || rows <= 1 {
        return data.to_vec();
    }

    let cols = data.len().div_ceil(rows);
    let mut out = Vec::with_capacity(data.len());
    for col in 0..cols {
        let mut idx = col;
        while idx < data.len() {
            out.push(data[idx]);
            idx += cols;
        }
    }
    out
}

/// Exact inverse of [`interleave`] for the same `rows` and original
/// length.
pub fn deinterleave(data: &[u8], rows: usize) -> Vec<u8> {
    if data.len() <= 1 || rows <= 1 {
        return data.to_vec();
    }

    let cols = data.len().div_ceil(rows);
    let mut out = vec![0u8; data.len()];
    let mut src = 0usize;
    for col in 0..cols {
        let mut idx = col;
        while idx < data.len() {
            out[idx] = data[src];
            src += 1;
            idx += cols;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn small_inputs_are_identity() {
        assert_eq!(interleave(&[], 8), Vec::<u8>::new());
        assert_eq!(interleave(&[42], 8), vec![42]);
        assert_eq!(interleave(&[1, 2, 3], 1), vec![1, 2, 3]);
        assert_eq!(deinterleave(&[1, 2, 3], 1), vec![1, 2, 3]);
    }

    #[test]
    fn known_permutation() {
        // 8 bytes, 4 rows -> 2 cols: rows are [0 1] [2 3] [4 5] [6 7],
        // column order reads 0 2 4 6 1 3 5 7.
        let data: Vec<u8> = (0..8).collect();
        assert_eq!(interleave(&data, 4), vec![0, 2, 4, 6, 1, 3, 5, 7]);
    }

    #[test]
    fn ragged_tail_preserved() {
        let data: Vec<u8> = (0..10).collect();
        let shuffled = interleave(&data, 8);
        assert_eq!(shuffled.len(), data.len());
        assert_eq!(deinterleave(&shuffled, 8), data);
    }

    #[test]
    fn adjacent_bytes_are_spread() {
        let data: Vec<u8> = (0..64).collect();
        let shuffled = interleave(&data, 8);
        let pos_0 = shuffled.iter().position(|&b| b == 0).unwrap();
        let pos_1 = shuffled.iter().position(|&b| b == 1).unwrap();
        assert!(pos_0.abs_diff(pos_1) >= 8);
    }

    proptest! {
        #[test]
        fn roundtrip(data in proptest::collection::vec(any::<u8>(), 0..512), rows in 1usize..16) {
            let shuffled = interleave(&data, rows);
            prop_assert_eq!(shuffled.len(), data.len());
            prop_assert_eq!(deinterleave(&shuffled, rows), data);
        }
    }
}
