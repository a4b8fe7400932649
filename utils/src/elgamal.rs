//! Elgamal encryption in the exponent. A small message `m` is encrypted as `(r * gen, m * gen + r * pk)`
//! and decryption recovers `m * gen`, from which `m` is found by a small discrete log. Larger messages
//! are first decomposed into digits and each digit is encrypted separately.

use crate::{
    digits::{compose, decompose, DigitError},
    serde_utils::ArkObjectBytes,
    solve_discrete_log::DiscreteLogTable,
};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{cfg_iter, rand::RngCore, vec::Vec, UniformRand};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Elgamal encryption of `m * gen`
#[serde_as]
#[derive(
    Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
pub struct Ciphertext<G: AffineRepr> {
    /// Ephemeral public key `r * gen`
    #[serde_as(as = "ArkObjectBytes")]
    pub eph_pk: G,
    /// `m * gen + r * pk`
    #[serde_as(as = "ArkObjectBytes")]
    pub masked: G,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecryptionError {
    /// Decrypted value of the digit at this index was outside the lookup table
    DigitNotFound(usize),
    Digit(DigitError),
}

impl From<DigitError> for DecryptionError {
    fn from(e: DigitError) -> Self {
        Self::Digit(e)
    }
}

impl<G: AffineRepr> Ciphertext<G> {
    pub fn new<R: RngCore>(
        rng: &mut R,
        msg: &G::ScalarField,
        public_key: &G,
        gen: &G,
    ) -> (Self, G::ScalarField) {
        let r = G::ScalarField::rand(rng);
        (Self::new_with_given_randomness(msg, &r, public_key, gen), r)
    }

    pub fn new_with_given_randomness(
        msg: &G::ScalarField,
        randomness: &G::ScalarField,
        public_key: &G,
        gen: &G,
    ) -> Self {
        let gen = gen.into_group();
        let eph_pk = gen * randomness;
        let masked = gen * msg + *public_key * randomness;
        let [eph_pk, masked] = [eph_pk, masked].map(|g| g.into_affine());
        Self { eph_pk, masked }
    }

    /// Returns `m * gen`
    pub fn decrypt_to_group_elem(&self, secret_key: &G::ScalarField) -> G {
        (self.masked.into_group() - self.eph_pk * secret_key).into_affine()
    }

    /// Returns `m` if it is in the table
    pub fn decrypt_small(
        &self,
        secret_key: &G::ScalarField,
        table: &DiscreteLogTable<G>,
    ) -> Option<u64> {
        table.solve(&self.decrypt_to_group_elem(secret_key))
    }
}

/// Encrypt each of the given digits with the corresponding randomness
pub fn encrypt_digits<G: AffineRepr>(
    digits: &[G::ScalarField],
    randomness: &[G::ScalarField],
    public_key: &G,
    gen: &G,
) -> Vec<Ciphertext<G>> {
    cfg_iter!(digits)
        .zip(cfg_iter!(randomness))
        .map(|(d, r)| Ciphertext::new_with_given_randomness(d, r, public_key, gen))
        .collect()
}

/// Encrypt `message` by decomposing it into digits of `digit_bit_size` bits. Returns the ciphertexts,
/// the digits and the randomness used for each ciphertext.
pub fn encrypt_decomposed_message<R: RngCore, G: AffineRepr>(
    rng: &mut R,
    message: &G::ScalarField,
    digit_bit_size: u8,
    public_key: &G,
    gen: &G,
) -> Result<(Vec<Ciphertext<G>>, Vec<G::ScalarField>, Vec<G::ScalarField>), DigitError> {
    let digits = decompose(message, digit_bit_size)?
        .into_iter()
        .map(G::ScalarField::from)
        .collect::<Vec<_>>();
    let randomness = (0..digits.len())
        .map(|_| G::ScalarField::rand(rng))
        .collect::<Vec<_>>();
    let cts = encrypt_digits(&digits, &randomness, public_key, gen);
    Ok((cts, digits, randomness))
}

/// Decrypt ciphertexts created by `encrypt_decomposed_message` and compose the digits back
pub fn decrypt_decomposed_message<G: AffineRepr>(
    ciphertexts: &[Ciphertext<G>],
    secret_key: &G::ScalarField,
    digit_bit_size: u8,
    table: &DiscreteLogTable<G>,
) -> Result<G::ScalarField, DecryptionError> {
    let digits = ciphertexts
        .iter()
        .enumerate()
        .map(|(i, c)| {
            c.decrypt_small(secret_key, table)
                .ok_or(DecryptionError::DigitNotFound(i))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(compose::<G::ScalarField>(&digits, digit_bit_size)?)
}

/// Public key for the secret key and generator
pub fn public_key<G: AffineRepr>(secret_key: &G::ScalarField, gen: &G) -> G {
    gen.mul_bigint(secret_key.into_bigint()).into_affine()
}
