//! A keyed pseudorandom function built on HKDF-SHA256. Used wherever randomness must be
//! reproducible from a secret key and a public context, so that a party cannot grind for
//! favourable values by retrying a request.

use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::{rngs::StdRng, RngCore, SeedableRng};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use hkdf::InvalidLength;

pub const PRF_KEY_SIZE: usize = 32;

#[derive(
    Clone,
    PartialEq,
    Eq,
    Debug,
    CanonicalSerialize,
    CanonicalDeserialize,
    Serialize,
    Deserialize,
    Zeroize,
    ZeroizeOnDrop,
)]
pub struct PrfKey(pub [u8; PRF_KEY_SIZE]);

impl PrfKey {
    pub fn new<R: RngCore>(rng: &mut R) -> Self {
        let mut key = [0u8; PRF_KEY_SIZE];
        rng.fill_bytes(&mut key);
        Self(key)
    }

    /// Fill `output` with PRF output on `input`. `domain` separates the different uses of the same key.
    pub fn eval_into(&self, domain: &[u8], input: &[u8], output: &mut [u8]) -> Result<(), InvalidLength> {
        let hk = Hkdf::<Sha256>::new(Some(domain), &self.0);
        hk.expand(input, output)
    }

    /// Seed for a deterministic RNG
    pub fn eval_seed(&self, domain: &[u8], input: &[u8]) -> Result<[u8; 32], InvalidLength> {
        let mut seed = [0u8; 32];
        self.eval_into(domain, input, &mut seed)?;
        Ok(seed)
    }

    /// A field element. Twice the field size is expanded before reduction so the output is close to uniform.
    pub fn eval_field_elem<F: PrimeField>(&self, domain: &[u8], input: &[u8]) -> Result<F, InvalidLength> {
        let mut okm = [0u8; 64];
        self.eval_into(domain, input, &mut okm)?;
        let f = F::from_le_bytes_mod_order(&okm);
        okm.zeroize();
        Ok(f)
    }

    /// A ChaCha based RNG whose whole output stream is determined by the key, `domain` and `input`.
    pub fn rng(&self, domain: &[u8], input: &[u8]) -> Result<StdRng, InvalidLength> {
        let mut seed = self.eval_seed(domain, input)?;
        let rng = StdRng::from_seed(seed);
        seed.zeroize();
        Ok(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bls12_381::Fr;
    use ark_std::UniformRand;

    #[test]
    fn prf_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(0u64);
        let key = PrfKey::new(&mut rng);
        let other_key = PrfKey::new(&mut rng);
        assert_ne!(key, other_key);

        let a: Fr = key.eval_field_elem(b"domain", b"input").unwrap();
        let b: Fr = key.eval_field_elem(b"domain", b"input").unwrap();
        let c: Fr = key.eval_field_elem(b"domain", b"other input").unwrap();
        let d: Fr = key.eval_field_elem(b"other domain", b"input").unwrap();
        let e: Fr = other_key.eval_field_elem(b"domain", b"input").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(a, e);

        let mut r1 = key.rng(b"domain", b"input").unwrap();
        let mut r2 = key.rng(b"domain", b"input").unwrap();
        assert_eq!(Fr::rand(&mut r1), Fr::rand(&mut r2));

        let mut too_long = vec![0u8; 255 * 32 + 1];
        assert!(key.eval_into(b"domain", b"input", &mut too_long).is_err());
    }
}
