//! Systematic Reed-Solomon code over GF(256) with 16 parity bytes,
//! correcting up to 8 byte errors per block.
//!
//! Polynomials are held with index 0 as the highest-degree coefficient,
//! matching transmit order: the dataword is sent first, parity last.

use super::gf256 as gf;
use crate::errors::FecError;

/// Parity bytes appended to every block.
pub const PARITY: usize = 16;

/// Largest dataword a single block can carry.
pub const MAX_DATA: usize = 255 - PARITY;

/// Generator polynomial, product of (x - alpha^i) for i in 0..16.
fn generator() -> Vec<u8> {
    let mut gen = vec![1u8];
    for i in 0..PARITY as i32 {
        gen = gf::poly_mul(&gen, &[1, gf::alpha_pow(i)]);
    }
    gen
}

/// Encode one dataword, appending [`PARITY`] bytes.
pub fn encode(data: &[u8]) -> Vec<u8> {
    assert!(!data.is_empty() && data.len() <= MAX_DATA);

    let gen = generator();
    let mut work = data.to_vec();
    work.resize(data.len() + PARITY, 0);

    for i in 0..data.len() {
        let coef = work[i];
        if coef != 0 {
            for (j, &g) in gen.iter().enumerate().skip(1) {
                work[i + j] ^= gf::mul(g, coef);
            }
        }
    }

    let mut code = data.to_vec();
    code.extend_from_slice(&work[data.len()..]);
    code
}

fn syndromes(code: &[u8]) -> Vec<u8> {
    (0..PARITY as i32)
        .map(|i| gf::poly_eval(code, gf::alpha_pow(i)))
        .collect()
}

/// Berlekamp-Massey: error locator polynomial from the syndromes.
fn find_error_locator(synd: &[u8]) -> Result<Vec<u8>, FecError> {
    let mut err_loc = vec![1u8];
    let mut old_loc = vec![1u8];

    for i in 0..synd.len() {
        let mut delta = synd[i];
        for j in 1..err_loc.len() {
            delta ^= gf::mul(err_loc[err_loc.len() - 1 - j], synd[i - j]);
        }
        old_loc.push(0);
        if delta != 0 {
            if old_loc.len() > err_loc.len() {
                let new_loc = gf::poly_scale(&old_loc, delta);
                old_loc = gf::poly_scale(&err_loc, gf::inv(delta));
                err_loc = new_loc;
            }
            err_loc = gf::poly_add(&err_loc, &gf::poly_scale(&old_loc, delta));
        }
    }

    while err_loc.first() == Some(&0) {
        err_loc.remove(0);
    }
    let errors = err_loc.len() - 1;
    if errors * 2 > synd.len() {
        return Err(FecError::Uncorrectable { errors });
    }
    Ok(err_loc)
}

/// Chien search: error positions from the locator polynomial. The
/// locator is evaluated in ascending-coefficient order so each root
/// alpha^i lands on coefficient degree i directly.
fn find_errors(err_loc: &[u8], code_len: usize) -> Result<Vec<usize>, FecError> {
    let errors = err_loc.len() - 1;
    let mut ascending = err_loc.to_vec();
    ascending.reverse();

    let mut positions = Vec::with_capacity(errors);
    for i in 0..code_len as i32 {
        if gf::poly_eval(&ascending, gf::pow(2, i)) == 0 {
            positions.push(code_len - 1 - i as usize);
        }
    }
    if positions.len() != errors {
        return Err(FecError::Uncorrectable { errors });
    }
    Ok(positions)
}

fn errata_locator(coef_pos: &[usize]) -> Vec<u8> {
    let mut loc = vec![1u8];
    for &p in coef_pos {
        loc = gf::poly_mul(&loc, &gf::poly_add(&[1], &[gf::pow(2, p as i32), 0]));
    }
    loc
}

fn error_evaluator(synd_rev: &[u8], err_loc: &[u8], nsym: usize) -> Vec<u8> {
    let product = gf::poly_mul(synd_rev, err_loc);
    product[product.len().saturating_sub(nsym + 1)..].to_vec()
}

/// Forney: compute and apply error magnitudes in place.
fn correct_errata(code: &mut [u8], synd: &[u8], err_pos: &[usize]) -> Result<(), FecError> {
    let n = code.len();
    let coef_pos: Vec<usize> = err_pos.iter().map(|&p| n - 1 - p).collect();
    let err_loc = errata_locator(&coef_pos);

    let mut synd_rev = synd.to_vec();
    synd_rev.reverse();
    // The evaluator is built from reversed syndromes and evaluated
    // reversed as well, pairing each root with its coefficient degree.
    let mut eval_horner = error_evaluator(&synd_rev, &err_loc, err_loc.len() - 1);
    eval_horner.reverse();

    let roots: Vec<u8> = coef_pos
        .iter()
        .map(|&p| gf::pow(2, -((255 - p) as i32)))
        .collect();

    for (i, &xi) in roots.iter().enumerate() {
        let xi_inv = gf::inv(xi);

        // Formal derivative of the errata locator evaluated at 1/Xi.
        let mut err_loc_prime = 1u8;
        for (j, &xj) in roots.iter().enumerate() {
            if j != i {
                err_loc_prime = gf::mul(err_loc_prime, 1 ^ gf::mul(xi_inv, xj));
            }
        }
        if err_loc_prime == 0 {
            return Err(FecError::Uncorrectable {
                errors: err_pos.len(),
            });
        }

        let y = gf::mul(xi, gf::poly_eval(&eval_horner, xi_inv));
        code[err_pos[i]] ^= gf::div(y, err_loc_prime);
    }
    Ok(())
}

/// Decode one block. Returns the dataword and the number of corrected
/// byte errors; an uncorrectable block leaves the input untouched.
pub fn decode(block: &[u8]) -> Result<(Vec<u8>, usize), FecError> {
    if block.len() <= PARITY {
        return Err(FecError::BlockTooShort { len: block.len() });
    }

    let synd = syndromes(block);
    if synd.iter().all(|&s| s == 0) {
        return Ok((block[..block.len() - PARITY].to_vec(), 0));
    }

    let err_loc = find_error_locator(&synd)?;
    let positions = find_errors(&err_loc, block.len())?;

    let mut corrected = block.to_vec();
    correct_errata(&mut corrected, &synd, &positions)?;

    if syndromes(&corrected).iter().any(|&s| s != 0) {
        return Err(FecError::Uncorrectable {
            errors: positions.len(),
        });
    }

    let errors = positions.len();
    corrected.truncate(corrected.len() - PARITY);
    Ok((corrected, errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::prelude::*;
    use rand::Rng;

    #[test]
    fn clean_block_decodes_with_zero_corrections() {
        let data: Vec<u8> = (0..40).collect();
        let block = encode(&data);
        assert_eq!(block.len(), data.len() + PARITY);
        let (decoded, corrected) = decode(&block).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(corrected, 0);
    }

    #[test]
    fn corrects_eight_byte_errors() {
        let mut rng = StdRng::seed_from_u64(7);
        let data: Vec<u8> = (0..100).map(|_| rng.gen()).collect();
        let mut block = encode(&data);

        let mut positions: Vec<usize> = (0..block.len()).collect();
        positions.shuffle(&mut rng);
        for &p in positions.iter().take(8) {
            block[p] ^= rng.gen_range(1..=255u8);
        }

        let (decoded, corrected) = decode(&block).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(corrected, 8);
    }

    #[test]
    fn rejects_overloaded_block() {
        let mut rng = StdRng::seed_from_u64(11);
        let data: Vec<u8> = (0..60).map(|_| rng.gen()).collect();
        let mut block = encode(&data);
        for p in 0..12 {
            block[p * 5] ^= 0xA5;
        }
        assert!(decode(&block).is_err());
    }

    #[test]
    fn header_sized_block() {
        let data = [b'N', b'1', 0x34, 0x12, 7, 0, 7, 0, 0, 0b10, 0xAA, 0x55];
        let block = encode(&data);
        assert_eq!(block.len(), 28);
        let (decoded, _) = decode(&block).unwrap();
        assert_eq!(decoded, data);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]
        #[test]
        fn roundtrip_with_random_errors(
            data in proptest::collection::vec(any::<u8>(), 1..MAX_DATA),
            seed in any::<u64>(),
            errors in 0usize..=8,
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut block = encode(&data);
            let mut positions: Vec<usize> = (0..block.len()).collect();
            positions.shuffle(&mut rng);
            for &p in positions.iter().take(errors) {
                block[p] ^= rng.gen_range(1..=255u8);
            }
            let (decoded, corrected) = decode(&block).unwrap();
            prop_assert_eq!(decoded, data);
            prop_assert_eq!(corrected, errors);
        }
    }
}
