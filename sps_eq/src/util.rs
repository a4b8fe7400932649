use ark_ec::{pairing::Pairing, AffineRepr};
use ark_std::{rand::RngCore, UniformRand};
use digest::Digest;
use incentive_utils::affine_group_element_from_byte_slices;

pub type GeneratorPair<E> = (<E as Pairing>::G1Affine, <E as Pairing>::G2Affine);

pub fn generator_pair<E: Pairing, R: RngCore>(rng: &mut R) -> GeneratorPair<E> {
    (E::G1Affine::rand(rng), E::G2Affine::rand(rng))
}

/// The G1 element is hashed from `label`. The G2 element is the curve's standard generator.
pub fn generator_pair_deterministic<E: Pairing, D: Digest>(label: &[u8]) -> GeneratorPair<E> {
    (
        affine_group_element_from_byte_slices!(label, b" : G1"),
        E::G2Affine::generator(),
    )
}
