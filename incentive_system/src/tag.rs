//! Double-spending tag of a spend transaction.
//!
//! For a spend with transaction hash `gamma` the user reveals `c0 = usk * gamma + dsrnd0` and
//! `c1 = esk * gamma + dsrnd1`, where `dsrnd0` and `dsrnd1` are fixed in the spent token. One pair reveals
//! nothing but two pairs with different `gamma` for the same token give `usk` and `esk` as the slope
//! of a line through two points.
//!
//! The tag also carries an Elgamal encryption of the digits of the user's share of the new token's
//! secret key under the public key `dsid = w * esk`. Once `esk` is known the new token's `esk` can be
//! decrypted, and so on along the chain of tokens.

use crate::{error::Result, setup::PublicParameters};
use ark_ec::pairing::Pairing;
use ark_ff::Field;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::vec::Vec;
use incentive_utils::{
    elgamal::{decrypt_decomposed_message, Ciphertext},
    serde_utils::ArkObjectBytes,
    solve_discrete_log::DiscreteLogTable,
};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct DoubleSpendingTag<E: Pairing> {
    /// `usk * gamma + dsrnd0`
    #[serde_as(as = "ArkObjectBytes")]
    pub c0: E::ScalarField,
    /// `esk * gamma + dsrnd1`
    #[serde_as(as = "ArkObjectBytes")]
    pub c1: E::ScalarField,
    #[serde_as(as = "ArkObjectBytes")]
    pub gamma: E::ScalarField,
    /// Provider's share of the new token's secret key
    #[serde_as(as = "ArkObjectBytes")]
    pub esk_provider: E::ScalarField,
    /// Encryptions of the digits of the user's share of the new token's secret key, least significant first
    pub trace_ciphertexts: Vec<Ciphertext<E::G1Affine>>,
}

/// Secrets recovered from two spends of the same token
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveredSecrets<F> {
    pub usk: F,
    pub esk: F,
}

impl<E: Pairing> DoubleSpendingTag<E> {
    /// Recovers `usk` and `esk` from tags of two spends of the same token. Returns `None` when both
    /// tags have the same `gamma` as then they are the same transaction.
    pub fn recover_secrets(&self, other: &Self) -> Option<RecoveredSecrets<E::ScalarField>> {
        let denominator = (self.gamma - other.gamma).inverse()?;
        Some(RecoveredSecrets {
            usk: (self.c0 - other.c0) * denominator,
            esk: (self.c1 - other.c1) * denominator,
        })
    }

    /// Secret key of the token created by this transaction, given the secret key of the spent token
    pub fn trace_new_esk(
        &self,
        esk: &E::ScalarField,
        params: &PublicParameters<E>,
        table: &DiscreteLogTable<E::G1Affine>,
    ) -> Result<E::ScalarField> {
        let esk_user = decrypt_decomposed_message(
            &self.trace_ciphertexts,
            esk,
            params.config.esk_digit_bits,
            table,
        )?;
        Ok(esk_user + self.esk_provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::SystemConfig;
    use ark_bls12_381::{Bls12_381, Fr};
    use ark_ec::CurveGroup;
    use ark_std::{
        rand::{rngs::StdRng, SeedableRng},
        UniformRand,
    };
    use incentive_utils::elgamal::encrypt_decomposed_message;

    #[test]
    fn recover_and_trace() {
        let mut rng = StdRng::seed_from_u64(0u64);
        let config = SystemConfig {
            esk_digit_bits: 4,
            ..SystemConfig::default()
        };
        let params = PublicParameters::<Bls12_381>::new(b"test", config).unwrap();
        let table = DiscreteLogTable::new(&params.w, config.esk_digit_bits);
        let (usk, esk, dsrnd0, dsrnd1) = (
            Fr::rand(&mut rng),
            Fr::rand(&mut rng),
            Fr::rand(&mut rng),
            Fr::rand(&mut rng),
        );
        let dsid = (params.w * esk).into_affine();
        let new_esk_user = Fr::rand(&mut rng);
        let esk_provider = Fr::rand(&mut rng);

        let tag = |gamma: Fr, rng: &mut StdRng| {
            let (trace_ciphertexts, _, _) = encrypt_decomposed_message(
                rng,
                &new_esk_user,
                config.esk_digit_bits,
                &dsid,
                &params.w,
            )
            .unwrap();
            DoubleSpendingTag::<Bls12_381> {
                c0: usk * gamma + dsrnd0,
                c1: esk * gamma + dsrnd1,
                gamma,
                esk_provider,
                trace_ciphertexts,
            }
        };
        let t1 = tag(Fr::rand(&mut rng), &mut rng);
        let t2 = tag(Fr::rand(&mut rng), &mut rng);
        let recovered = t1.recover_secrets(&t2).unwrap();
        assert!(recovered.usk == usk);
        assert!(recovered.esk == esk);
        assert!(t1.recover_secrets(&t1).is_none());

        assert_eq!(
            t1.trace_new_esk(&recovered.esk, &params, &table).unwrap(),
            new_esk_user + esk_provider
        );
        // A wrong key fails to decrypt the digits
        assert!(t1
            .trace_new_esk(&(esk + Fr::from(1u64)), &params, &table)
            .is_err());
    }
}
