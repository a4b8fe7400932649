//! Decomposition of field elements into small digits in base `2^digit_bit_size`, little endian,
//! so that each digit can be encrypted in the exponent and recovered by a small discrete log.

use ark_ff::{BigInteger, One, PrimeField, Zero};
use ark_std::vec::Vec;

pub const MAX_DIGIT_BIT_SIZE: u8 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigitError {
    UnsupportedDigitBitSize(u8),
    DigitTooLarge(usize, u64),
}

/// Return number of digits given the bit size of a digit. Considers the size of the field.
pub fn digits_count<F: PrimeField>(digit_bit_size: u8) -> usize {
    let scalar_size = F::MODULUS_BIT_SIZE as usize;
    let bit_size = digit_bit_size as usize;
    // ceil(scalar_size / bit_size)
    (scalar_size + bit_size - 1) / bit_size
}

/// Given an element `F`, break it into digits where each digit is of `digit_bit_size` bits, least
/// significant digit first.
pub fn decompose<F: PrimeField>(message: &F, digit_bit_size: u8) -> Result<Vec<u64>, DigitError> {
    check_digit_bit_size(digit_bit_size)?;
    let bits = message.into_bigint().to_bits_le();
    let count = digits_count::<F>(digit_bit_size);
    Ok(bits
        .chunks(digit_bit_size as usize)
        .take(count)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u64, |acc, (i, b)| acc | ((*b as u64) << i))
        })
        .collect())
}

/// Recreate a field element back from output of `decompose`
pub fn compose<F: PrimeField>(digits: &[u64], digit_bit_size: u8) -> Result<F, DigitError> {
    check_digit_bit_size(digit_bit_size)?;
    let limit = 1u64 << digit_bit_size;
    let base = F::from(limit);
    let mut result = F::zero();
    for (i, d) in digits.iter().enumerate().rev() {
        if *d >= limit {
            return Err(DigitError::DigitTooLarge(i, *d));
        }
        result = result * base + F::from(*d);
    }
    Ok(result)
}

/// The weights `2^{digit_bit_size * i}` such that `sum(weights[i] * digits[i])` is the composed element
pub fn digit_weights<F: PrimeField>(digit_bit_size: u8) -> Result<Vec<F>, DigitError> {
    check_digit_bit_size(digit_bit_size)?;
    let base = F::from(1u64 << digit_bit_size);
    let mut weights = Vec::with_capacity(digits_count::<F>(digit_bit_size));
    let mut cur = F::one();
    for _ in 0..digits_count::<F>(digit_bit_size) {
        weights.push(cur);
        cur *= base;
    }
    Ok(weights)
}

fn check_digit_bit_size(digit_bit_size: u8) -> Result<(), DigitError> {
    if digit_bit_size == 0 || digit_bit_size > MAX_DIGIT_BIT_SIZE {
        return Err(DigitError::UnsupportedDigitBitSize(digit_bit_size));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bls12_381::Fr;
    use ark_std::{
        rand::{rngs::StdRng, SeedableRng},
        UniformRand,
    };
    use proptest::prelude::*;

    #[test]
    fn compose_decompose() {
        assert_eq!(digits_count::<Fr>(8), 32);
        assert_eq!(digits_count::<Fr>(4), 64);
        assert_eq!(digits_count::<Fr>(16), 16);

        let n = Fr::from(325u64);
        let d = decompose(&n, 8).unwrap();
        assert_eq!(d.len(), 32);
        assert_eq!(d[..2], [69, 1]);
        assert!(d[2..].iter().all(|x| *x == 0));
        assert_eq!(compose::<Fr>(&d, 8).unwrap(), n);

        let d = decompose(&n, 4).unwrap();
        assert_eq!(d[..3], [5, 4, 1]);
        assert_eq!(compose::<Fr>(&d, 4).unwrap(), n);

        let mut rng = StdRng::seed_from_u64(0u64);
        for bits in [1u8, 3, 8, 11, 16] {
            let n = Fr::rand(&mut rng);
            let d = decompose(&n, bits).unwrap();
            assert_eq!(d.len(), digits_count::<Fr>(bits));
            assert!(d.iter().all(|x| *x < (1 << bits)));
            assert_eq!(compose::<Fr>(&d, bits).unwrap(), n);

            let weights = digit_weights::<Fr>(bits).unwrap();
            let sum = weights
                .iter()
                .zip(d.iter())
                .fold(Fr::from(0u64), |acc, (w, x)| acc + *w * Fr::from(*x));
            assert_eq!(sum, n);
        }

        assert_eq!(decompose(&n, 0), Err(DigitError::UnsupportedDigitBitSize(0)));
        assert_eq!(decompose(&n, 17), Err(DigitError::UnsupportedDigitBitSize(17)));
        assert_eq!(compose::<Fr>(&[256], 8), Err(DigitError::DigitTooLarge(0, 256)));
    }

    proptest! {
        #[test]
        fn decompose_small_values(v in any::<u64>(), bits in 1u8..=16) {
            let d = decompose(&Fr::from(v), bits).unwrap();
            prop_assert_eq!(compose::<Fr>(&d, bits).unwrap(), Fr::from(v));
        }
    }
}
