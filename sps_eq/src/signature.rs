use crate::error::SpsEqError;
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup, Group, VariableBaseMSM};
use ark_ff::{Field, PrimeField, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{cfg_iter, rand::RngCore, vec::Vec, UniformRand};
use incentive_utils::{
    aliases::FullDigest, hashing_utils::hash_to_field_many, msm::WindowTable, serde_utils::*,
};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Secret key used by the signer to sign messages
#[serde_as]
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
#[serde(bound = "")]
pub struct SigningKey<E: Pairing>(#[serde_as(as = "Vec<ArkObjectBytes>")] pub Vec<E::ScalarField>);

/// Public key used to verify `Signature`
#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct VerificationKey<E: Pairing>(#[serde_as(as = "Vec<ArkObjectBytes>")] pub Vec<E::G2Affine>);

/// Prepared version of `VerificationKey` for faster pairing checks
#[derive(Clone, Debug)]
pub struct PreparedVerificationKey<E: Pairing>(pub Vec<E::G2Prepared>);

/// Signature with 2 elements in group G1 and 1 element in G2
#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct Signature<E: Pairing> {
    #[serde_as(as = "ArkObjectBytes")]
    pub Z: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub Y: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub Y_tilde: E::G2Affine,
}

impl<E: Pairing> SigningKey<E> {
    pub const DST: &'static [u8] = b"SPS-EQ-KEYGEN-SALT";

    pub fn new<R: RngCore>(rng: &mut R, size: u32) -> Result<Self, SpsEqError> {
        if size == 0 {
            return Err(SpsEqError::NeedNonZeroSize);
        }
        Ok(Self(
            (0..size)
                .map(|_| E::ScalarField::rand(rng))
                .collect::<Vec<_>>(),
        ))
    }

    pub fn generate_using_seed<D: FullDigest>(seed: &[u8], size: u32) -> Result<Self, SpsEqError> {
        if size == 0 {
            return Err(SpsEqError::NeedNonZeroSize);
        }
        Ok(Self(hash_to_field_many::<E::ScalarField, D>(
            Self::DST,
            seed,
            size,
        )))
    }

    pub fn size(&self) -> usize {
        self.0.len()
    }
}

impl<E: Pairing> VerificationKey<E> {
    pub fn new(signing_key: &SigningKey<E>, g2: &E::G2Affine) -> Self {
        let table = WindowTable::new(signing_key.size(), g2.into_group());
        Self(E::G2::normalize_batch(&table.multiply_many(&signing_key.0)))
    }

    pub fn size(&self) -> usize {
        self.0.len()
    }
}

impl<E: Pairing> From<VerificationKey<E>> for PreparedVerificationKey<E> {
    fn from(vk: VerificationKey<E>) -> Self {
        Self::from(&vk)
    }
}

impl<E: Pairing> From<&VerificationKey<E>> for PreparedVerificationKey<E> {
    fn from(vk: &VerificationKey<E>) -> Self {
        Self(
            cfg_iter!(vk.0)
                .map(|e| E::G2Prepared::from(*e))
                .collect::<Vec<_>>(),
        )
    }
}

impl<E: Pairing> PreparedVerificationKey<E> {
    pub fn size(&self) -> usize {
        self.0.len()
    }
}

impl<E: Pairing> Signature<E> {
    pub fn new<R: RngCore>(
        rng: &mut R,
        messages: &[E::G1Affine],
        signing_key: &SigningKey<E>,
        g1: &E::G1Affine,
        g2: &E::G2Affine,
    ) -> Result<Self, SpsEqError> {
        let y = E::ScalarField::rand(rng);
        Self::new_with_given_randomness(&y, messages, signing_key, g1, g2)
    }

    /// Sign with the given randomness `y`. The signer can derive `y` deterministically from the request
    /// to make signing idempotent.
    pub fn new_with_given_randomness(
        y: &E::ScalarField,
        messages: &[E::G1Affine],
        signing_key: &SigningKey<E>,
        g1: &E::G1Affine,
        g2: &E::G2Affine,
    ) -> Result<Self, SpsEqError> {
        if messages.len() > signing_key.size() {
            return Err(SpsEqError::MessageCountIncompatibleWithKey(
                messages.len(),
                signing_key.size(),
            ));
        }
        let y_inv = y.inverse().ok_or(SpsEqError::ZeroRandomizer)?.into_bigint();
        // Z = \sum_{i}(m_i * sk_i)*y
        // Y = g1 * 1/y
        // Y_tilde = g2 * 1/y
        let Z = E::G1::msm_unchecked(messages, &signing_key.0[..messages.len()])
            .mul_bigint(y.into_bigint())
            .into_affine();
        Ok(Self {
            Z,
            Y: g1.mul_bigint(y_inv).into_affine(),
            Y_tilde: g2.mul_bigint(y_inv).into_affine(),
        })
    }

    /// Returns a signature on `messages * message_converter` along with the converted messages. The
    /// result is distributed like a fresh signature on the new representative.
    pub fn change_rep<R: RngCore>(
        &self,
        rng: &mut R,
        message_converter: &E::ScalarField,
        messages: &[E::G1Affine],
    ) -> Result<(Self, Vec<E::G1Affine>), SpsEqError> {
        let psi = E::ScalarField::rand(rng);
        self.change_rep_with_given_randomness(message_converter, &psi, messages)
    }

    pub fn change_rep_with_given_randomness(
        &self,
        message_converter: &E::ScalarField,
        psi: &E::ScalarField,
        messages: &[E::G1Affine],
    ) -> Result<(Self, Vec<E::G1Affine>), SpsEqError> {
        if message_converter.is_zero() {
            return Err(SpsEqError::ZeroRandomizer);
        }
        let psi_inv_repr = psi.inverse().ok_or(SpsEqError::ZeroRandomizer)?.into_bigint();
        let mu_repr = message_converter.into_bigint();
        let new_msgs = cfg_iter!(messages)
            .map(|m| m.mul_bigint(mu_repr))
            .collect::<Vec<_>>();
        // Z = Z * message_converter * psi
        // Y = Y * 1/psi
        // Y_tilde = Y_tilde * 1/psi
        let new_sig = Self {
            Z: self
                .Z
                .mul_bigint((*message_converter * psi).into_bigint())
                .into_affine(),
            Y: self.Y.mul_bigint(psi_inv_repr).into_affine(),
            Y_tilde: self.Y_tilde.mul_bigint(psi_inv_repr).into_affine(),
        };
        Ok((new_sig, E::G1::normalize_batch(&new_msgs)))
    }

    /// Checks `prod_i e(m_i, vk_i) == e(Z, Y_tilde)` and `e(Y, g2) == e(g1, Y_tilde)`
    pub fn verify(
        &self,
        messages: &[E::G1Affine],
        verification_key: impl Into<PreparedVerificationKey<E>>,
        g1: &E::G1Affine,
        g2: impl Into<E::G2Prepared>,
    ) -> Result<(), SpsEqError> {
        let verification_key = verification_key.into();
        if messages.len() > verification_key.size() {
            return Err(SpsEqError::MessageCountIncompatibleWithKey(
                messages.len(),
                verification_key.size(),
            ));
        }
        if self.Y_tilde.is_zero() || self.Y.is_zero() || messages.iter().any(|m| m.is_zero()) {
            return Err(SpsEqError::InvalidSignature);
        }

        let y_tilde_prep = E::G2Prepared::from(self.Y_tilde);

        let mut a = cfg_iter!(messages)
            .map(|e| E::G1Prepared::from(*e))
            .collect::<Vec<_>>();
        let mut b = verification_key.0[..messages.len()].to_vec();
        a.push(E::G1Prepared::from(-self.Z.into_group()));
        b.push(y_tilde_prep.clone());
        if !E::multi_pairing(a, b).is_zero() {
            return Err(SpsEqError::InvalidSignature);
        }

        if !E::multi_pairing(
            [
                E::G1Prepared::from(self.Y),
                E::G1Prepared::from(-g1.into_group()),
            ],
            [g2.into(), y_tilde_prep],
        )
        .is_zero()
        {
            return Err(SpsEqError::InvalidSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{generator_pair, generator_pair_deterministic};
    use ark_bls12_381::Bls12_381;
    use ark_std::rand::{rngs::StdRng, SeedableRng};
    use blake2::Blake2b512;

    type Fr = <Bls12_381 as Pairing>::ScalarField;
    type G1 = <Bls12_381 as Pairing>::G1Affine;
    type G2Prepared = <Bls12_381 as Pairing>::G2Prepared;

    #[test]
    fn sign_verify_change_rep() {
        let mut rng = StdRng::seed_from_u64(0u64);

        let (P1, P2) = generator_pair::<Bls12_381, StdRng>(&mut rng);
        let prep_P2 = G2Prepared::from(P2);

        let count = 2;
        let sk = SigningKey::new(&mut rng, count).unwrap();
        let vk = VerificationKey::<Bls12_381>::new(&sk, &P2);
        let prep_vk = PreparedVerificationKey::from(&vk);
        assert!(count as usize == sk.size() && sk.size() == vk.size() && vk.size() == prep_vk.size());

        let msgs = (0..count).map(|_| G1::rand(&mut rng)).collect::<Vec<_>>();

        let sig = Signature::new(&mut rng, &msgs, &sk, &P1, &P2).unwrap();
        sig.verify(&msgs, prep_vk.clone(), &P1, prep_P2.clone())
            .unwrap();

        // Any representative of the class verifies with the changed signature
        let mu = Fr::rand(&mut rng);
        let (sig1, msgs1) = sig.change_rep(&mut rng, &mu, &msgs).unwrap();
        assert_eq!(msgs1[0], (msgs[0] * mu).into_affine());
        sig1.verify(&msgs1, prep_vk.clone(), &P1, prep_P2.clone())
            .unwrap();
        assert_ne!(sig1, sig);

        // Changing back recovers the original class representative
        let mu_inv = mu.inverse().unwrap();
        let (sig2, msgs2) = sig1.change_rep(&mut rng, &mu_inv, &msgs1).unwrap();
        assert_eq!(msgs2, msgs);
        sig2.verify(&msgs, prep_vk.clone(), &P1, prep_P2.clone())
            .unwrap();

        // Old signature does not verify on the new representative and a different message fails
        assert!(sig
            .verify(&msgs1, prep_vk.clone(), &P1, prep_P2.clone())
            .is_err());
        let other_msgs = vec![msgs[0], G1::rand(&mut rng)];
        assert!(sig
            .verify(&other_msgs, prep_vk.clone(), &P1, prep_P2.clone())
            .is_err());

        // Too many messages
        let msgs3 = (0..3).map(|_| G1::rand(&mut rng)).collect::<Vec<_>>();
        assert!(matches!(
            Signature::new(&mut rng, &msgs3, &sk, &P1, &P2),
            Err(SpsEqError::MessageCountIncompatibleWithKey(3, 2))
        ));

        assert!(matches!(
            sig.change_rep(&mut rng, &Fr::zero(), &msgs),
            Err(SpsEqError::ZeroRandomizer)
        ));
        assert!(matches!(
            Signature::new_with_given_randomness(&Fr::zero(), &msgs, &sk, &P1, &P2),
            Err(SpsEqError::ZeroRandomizer)
        ));
        assert!(matches!(
            SigningKey::<Bls12_381>::new(&mut rng, 0),
            Err(SpsEqError::NeedNonZeroSize)
        ));
    }

    #[test]
    fn deterministic_signing_and_keys() {
        let (P1, P2) = generator_pair_deterministic::<Bls12_381, Blake2b512>(b"test");
        let sk = SigningKey::<Bls12_381>::generate_using_seed::<Blake2b512>(b"seed", 2).unwrap();
        let sk_again =
            SigningKey::<Bls12_381>::generate_using_seed::<Blake2b512>(b"seed", 2).unwrap();
        assert_eq!(sk, sk_again);
        let vk = VerificationKey::new(&sk, &P2);

        let mut rng = StdRng::seed_from_u64(1u64);
        let msgs = (0..2).map(|_| G1::rand(&mut rng)).collect::<Vec<_>>();
        let y = Fr::rand(&mut rng);
        let sig1 = Signature::new_with_given_randomness(&y, &msgs, &sk, &P1, &P2).unwrap();
        let sig2 = Signature::new_with_given_randomness(&y, &msgs, &sk, &P1, &P2).unwrap();
        assert_eq!(sig1, sig2);
        sig1.verify(&msgs, &vk, &P1, P2).unwrap();

        let ser = serde_json::to_string(&sig1).unwrap();
        assert_eq!(serde_json::from_str::<Signature<Bls12_381>>(&ser).unwrap(), sig1);
        let ser = rmp_serde::to_vec_named(&vk).unwrap();
        assert_eq!(
            rmp_serde::from_slice::<VerificationKey<Bls12_381>>(&ser).unwrap(),
            vk
        );
    }
}
