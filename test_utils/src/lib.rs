use ark_bls12_381::Bls12_381;
use ark_ec::pairing::Pairing;
use ark_std::rand::{rngs::StdRng, SeedableRng};

pub type Fr = <Bls12_381 as Pairing>::ScalarField;
pub type G1 = <Bls12_381 as Pairing>::G1Affine;
pub type G2 = <Bls12_381 as Pairing>::G2Affine;

#[macro_use]
pub mod serialization;

/// Seeded rng so that test failures are reproducible
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
