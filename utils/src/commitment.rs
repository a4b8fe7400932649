use crate::{
    concat_slices, hashing_utils::affine_group_elem_from_try_and_incr, msm::WindowTable,
    serde_utils::ArkObjectBytes,
};
use ark_ec::{AffineRepr, CurveGroup, VariableBaseMSM};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{cfg_into_iter, vec::Vec};
use digest::Digest;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A Pedersen commitment key `(g, h)`. The Pedersen commitment will be `g * m + h * r` with opening `(m, r)`
#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
pub struct PedersenCommitmentKey<G: AffineRepr> {
    #[serde_as(as = "ArkObjectBytes")]
    pub g: G,
    #[serde_as(as = "ArkObjectBytes")]
    pub h: G,
}

impl<G: AffineRepr> PedersenCommitmentKey<G> {
    /// Create a new commitment key
    pub fn new<D: Digest>(label: &[u8]) -> Self {
        let g = affine_group_elem_from_try_and_incr::<G, D>(&concat_slices![label, b" : G"]);
        let h = affine_group_elem_from_try_and_incr::<G, D>(&concat_slices![label, b" : H"]);
        Self { g, h }
    }

    /// Commit to a message
    pub fn commit(&self, message: &G::ScalarField, randomness: &G::ScalarField) -> G {
        self.commit_as_projective(message, randomness).into()
    }

    pub fn commit_as_projective(
        &self,
        message: &G::ScalarField,
        randomness: &G::ScalarField,
    ) -> G::Group {
        self.g * message + self.h * randomness
    }

    /// Commit to a batch of messages and output commitments corresponding to each message.
    /// Panics if the slices differ in length.
    pub fn commit_to_a_batch(
        &self,
        messages: &[G::ScalarField],
        randomness: &[G::ScalarField],
    ) -> Vec<G> {
        assert_eq!(messages.len(), randomness.len());
        let g_table = WindowTable::new(messages.len(), self.g.into_group());
        let h_table = WindowTable::new(randomness.len(), self.h.into_group());
        G::Group::normalize_batch(
            &cfg_into_iter!(messages)
                .zip(cfg_into_iter!(randomness))
                .map(|(m_i, r_i)| g_table.multiply(m_i) + h_table.multiply(r_i))
                .collect::<Vec<_>>(),
        )
    }
}

/// Commitment to a vector of messages `bases[0] * messages[0] + bases[1] * messages[1] + ...`.
/// Extra bases are ignored so a prefix of a longer key can be used.
pub fn commit_to_vector<G: AffineRepr>(bases: &[G], messages: &[G::ScalarField]) -> G::Group {
    G::Group::msm_unchecked(&bases[..messages.len().min(bases.len())], messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bls12_381::{Fr, G1Affine};
    use ark_std::{
        rand::{rngs::StdRng, SeedableRng},
        UniformRand,
    };
    use blake2::Blake2b512;

    #[test]
    fn commit_batch_matches_single() {
        let mut rng = StdRng::seed_from_u64(0u64);
        let key = PedersenCommitmentKey::<G1Affine>::new::<Blake2b512>(b"test");
        assert_ne!(key.g, key.h);

        let msgs = (0..5).map(|_| Fr::rand(&mut rng)).collect::<Vec<_>>();
        let rands = (0..5).map(|_| Fr::rand(&mut rng)).collect::<Vec<_>>();
        let batch = key.commit_to_a_batch(&msgs, &rands);
        for i in 0..5 {
            assert_eq!(batch[i], key.commit(&msgs[i], &rands[i]));
        }

        let bases = vec![key.g, key.h];
        assert_eq!(
            commit_to_vector(&bases, &[msgs[0], rands[0]]).into_affine(),
            batch[0]
        );
    }
}
