//! Keys of the provider and the users.
//!
//! A token commits to the messages `(usk, esk, dsrnd0, dsrnd1, z, t, v_1, ..., v_k)` with the bases
//! `h_i = g1 * q_i` of the provider public key. The provider knows the discrete logs `q_i`, which lets
//! it add to a committed message given only a blinded commitment. `z` and `t` are blinding values
//! which make the commitment hiding.

use crate::{
    error::{IncentiveError, Result},
    setup::PublicParameters,
};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{fmt, rand::RngCore, UniformRand};
use incentive_utils::{msm::WindowTable, prf::PrfKey, serde_utils::ArkObjectBytes};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use sps_eq::prelude::{PreparedVerificationKey, Signature, SigningKey, VerificationKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const USK_INDEX: usize = 0;
pub const ESK_INDEX: usize = 1;
pub const DSRND0_INDEX: usize = 2;
pub const DSRND1_INDEX: usize = 3;
pub const Z_INDEX: usize = 4;
pub const T_INDEX: usize = 5;
/// Number of committed messages before the points
pub const NUM_FIXED_MESSAGES: usize = 6;

/// Messages `(C0, C1)` of an SPS-EQ signature on a token
pub const TOKEN_SIGNATURE_SIZE: u32 = 2;

#[serde_as]
#[derive(
    Clone,
    PartialEq,
    Eq,
    CanonicalSerialize,
    CanonicalDeserialize,
    Serialize,
    Deserialize,
    Zeroize,
    ZeroizeOnDrop,
)]
#[serde(bound = "")]
pub struct ProviderSecretKey<E: Pairing> {
    /// Discrete logs of the commitment bases
    #[serde_as(as = "Vec<ArkObjectBytes>")]
    pub q: Vec<E::ScalarField>,
    /// Signs tokens
    pub signing_key: SigningKey<E>,
    /// Signs `(upk, w)` when a user registers
    pub genesis_signing_key: SigningKey<E>,
    /// Derives the provider's randomness deterministically from requests
    pub prf_key: PrfKey,
}

#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct ProviderPublicKey<E: Pairing> {
    /// Commitment bases `h_i = g1 * q_i`
    #[serde_as(as = "Vec<ArkObjectBytes>")]
    pub bases: Vec<E::G1Affine>,
    pub verification_key: VerificationKey<E>,
    pub genesis_verification_key: VerificationKey<E>,
}

#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct ProviderKeyPair<E: Pairing> {
    pub secret_key: ProviderSecretKey<E>,
    pub public_key: ProviderPublicKey<E>,
}

#[serde_as]
#[derive(
    Clone,
    PartialEq,
    Eq,
    CanonicalSerialize,
    CanonicalDeserialize,
    Serialize,
    Deserialize,
    Zeroize,
    ZeroizeOnDrop,
)]
#[serde(bound = "")]
pub struct UserSecretKey<E: Pairing> {
    #[serde_as(as = "ArkObjectBytes")]
    pub usk: E::ScalarField,
    /// Derives the user's randomness for earn and spend requests
    pub prf_key: PrfKey,
}

/// `upk = w * usk`
#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct UserPublicKey<E: Pairing>(#[serde_as(as = "ArkObjectBytes")] pub E::G1Affine);

/// A registered user: the keys and the provider's signature on `(upk, w)` which lets the user join promotions
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct UserKeyPair<E: Pairing> {
    pub secret_key: UserSecretKey<E>,
    pub public_key: UserPublicKey<E>,
    pub genesis_signature: Signature<E>,
}

impl<E: Pairing> fmt::Debug for ProviderSecretKey<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSecretKey")
            .field("q", &"<redacted>")
            .field("signing_key", &"<redacted>")
            .field("genesis_signing_key", &"<redacted>")
            .field("prf_key", &"<redacted>")
            .finish()
    }
}

impl<E: Pairing> fmt::Debug for UserSecretKey<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSecretKey")
            .field("usk", &"<redacted>")
            .field("prf_key", &"<redacted>")
            .finish()
    }
}

impl<E: Pairing> ProviderKeyPair<E> {
    /// Keys supporting promotions with up to `max_point_dimension` point types
    pub fn new<R: RngCore>(rng: &mut R, params: &PublicParameters<E>) -> Result<Self> {
        let num_bases = NUM_FIXED_MESSAGES + params.config.max_point_dimension as usize;
        let q = (0..num_bases)
            .map(|_| E::ScalarField::rand(rng))
            .collect::<Vec<_>>();
        let table = WindowTable::new(num_bases, params.g1.into_group());
        let bases = E::G1::normalize_batch(&table.multiply_many(&q));
        let signing_key = SigningKey::new(rng, TOKEN_SIGNATURE_SIZE)?;
        let genesis_signing_key = SigningKey::new(rng, TOKEN_SIGNATURE_SIZE)?;
        let public_key = ProviderPublicKey {
            bases,
            verification_key: VerificationKey::new(&signing_key, &params.g2),
            genesis_verification_key: VerificationKey::new(&genesis_signing_key, &params.g2),
        };
        Ok(Self {
            secret_key: ProviderSecretKey {
                q,
                signing_key,
                genesis_signing_key,
                prf_key: PrfKey::new(rng),
            },
            public_key,
        })
    }

    /// Registers a user by signing `(upk, w)`
    pub fn issue_genesis_signature<R: RngCore>(
        &self,
        rng: &mut R,
        params: &PublicParameters<E>,
        user_public_key: &UserPublicKey<E>,
    ) -> Result<Signature<E>> {
        if user_public_key.0.is_zero() {
            return Err(IncentiveError::InvalidGenesisSignature);
        }
        Ok(Signature::new(
            rng,
            &[user_public_key.0, params.w],
            &self.secret_key.genesis_signing_key,
            &params.g1,
            &params.g2,
        )?)
    }
}

impl<E: Pairing> ProviderPublicKey<E> {
    /// Bases for a token with `dimension` point types
    pub fn bases_for(&self, dimension: usize) -> Result<&[E::G1Affine]> {
        let needed = NUM_FIXED_MESSAGES + dimension;
        if needed > self.bases.len() {
            return Err(IncentiveError::UnsupportedPointDimension(
                dimension,
                self.bases.len().saturating_sub(NUM_FIXED_MESSAGES),
            ));
        }
        Ok(&self.bases[..needed])
    }

    pub fn prepared_verification_key(&self) -> PreparedVerificationKey<E> {
        PreparedVerificationKey::from(&self.verification_key)
    }

    pub fn is_valid(&self) -> bool {
        self.bases.len() > NUM_FIXED_MESSAGES
            && self.bases.iter().all(|b| !b.is_zero())
            && self.verification_key.size() == TOKEN_SIGNATURE_SIZE as usize
            && self.genesis_verification_key.size() == TOKEN_SIGNATURE_SIZE as usize
    }

    pub fn verify_genesis_signature(
        &self,
        params: &PublicParameters<E>,
        user_public_key: &UserPublicKey<E>,
        signature: &Signature<E>,
    ) -> Result<()> {
        signature
            .verify(
                &[user_public_key.0, params.w],
                &self.genesis_verification_key,
                &params.g1,
                params.prepared_g2(),
            )
            .map_err(|_| IncentiveError::InvalidGenesisSignature)
    }
}

impl<E: Pairing> UserSecretKey<E> {
    pub fn new<R: RngCore>(rng: &mut R) -> Self {
        Self {
            usk: E::ScalarField::rand(rng),
            prf_key: PrfKey::new(rng),
        }
    }

    pub fn public_key(&self, params: &PublicParameters<E>) -> UserPublicKey<E> {
        UserPublicKey((params.w * self.usk).into_affine())
    }
}

impl<E: Pairing> UserKeyPair<E> {
    /// Completes registration once the provider has signed the public key
    pub fn new(
        secret_key: UserSecretKey<E>,
        genesis_signature: Signature<E>,
        params: &PublicParameters<E>,
        provider_public_key: &ProviderPublicKey<E>,
    ) -> Result<Self> {
        let public_key = secret_key.public_key(params);
        provider_public_key.verify_genesis_signature(params, &public_key, &genesis_signature)?;
        Ok(Self {
            secret_key,
            public_key,
            genesis_signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::SystemConfig;
    use ark_bls12_381::Bls12_381;
    use ark_std::rand::{rngs::StdRng, SeedableRng};
    use test_utils::test_serialization;

    #[test]
    fn registration() {
        let mut rng = StdRng::seed_from_u64(0u64);
        let params = PublicParameters::<Bls12_381>::new(b"test", SystemConfig::default()).unwrap();
        let provider = ProviderKeyPair::new(&mut rng, &params).unwrap();
        assert!(provider.public_key.is_valid());
        assert_eq!(provider.public_key.bases.len(), 10);
        assert_eq!(provider.public_key.bases_for(4).unwrap().len(), 10);
        assert!(matches!(
            provider.public_key.bases_for(5),
            Err(IncentiveError::UnsupportedPointDimension(5, 4))
        ));

        let sk = UserSecretKey::new(&mut rng);
        let pk = sk.public_key(&params);
        let sig = provider
            .issue_genesis_signature(&mut rng, &params, &pk)
            .unwrap();
        let user = UserKeyPair::new(sk.clone(), sig.clone(), &params, &provider.public_key).unwrap();
        assert_eq!(user.public_key, pk);

        // Signature of another provider or on another key is rejected
        let other = ProviderKeyPair::new(&mut rng, &params).unwrap();
        assert!(matches!(
            UserKeyPair::new(sk, sig.clone(), &params, &other.public_key),
            Err(IncentiveError::InvalidGenesisSignature)
        ));
        assert!(matches!(
            UserKeyPair::new(UserSecretKey::new(&mut rng), sig, &params, &provider.public_key),
            Err(IncentiveError::InvalidGenesisSignature)
        ));

        test_serialization!(UserKeyPair<Bls12_381>, user);
        test_serialization!(ProviderPublicKey<Bls12_381>, provider.public_key);
        test_serialization!(ProviderKeyPair<Bls12_381>, provider);
    }
}
