//! The token held by a user. The provider only ever sees blinded versions of its commitment.

use crate::{
    error::{IncentiveError, Result},
    keys::{ProviderPublicKey, UserSecretKey, NUM_FIXED_MESSAGES},
    promotion::PromotionParameters,
    setup::PublicParameters,
};
use ark_ec::{pairing::Pairing, CurveGroup};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{fmt, rand::RngCore, vec::Vec, UniformRand};
use incentive_utils::{commitment::commit_to_vector, serde_utils::ArkObjectBytes};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use sps_eq::prelude::Signature;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The secret values committed in a token besides the user secret key
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
pub struct TokenOpening<E: Pairing> {
    /// Secret key of the token. Its double-spending id is `w * esk`.
    #[serde_as(as = "ArkObjectBytes")]
    pub esk: E::ScalarField,
    /// Randomness of the double-spending tag `c0 = usk * gamma + dsrnd0`
    #[serde_as(as = "ArkObjectBytes")]
    pub dsrnd0: E::ScalarField,
    /// Randomness of the double-spending tag `c1 = esk * gamma + dsrnd1`
    #[serde_as(as = "ArkObjectBytes")]
    pub dsrnd1: E::ScalarField,
    #[serde_as(as = "ArkObjectBytes")]
    pub z: E::ScalarField,
    #[serde_as(as = "ArkObjectBytes")]
    pub t: E::ScalarField,
    pub points: Vec<u64>,
}

#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct Token<E: Pairing> {
    pub promotion_id: u64,
    /// `C0 = h_0 * usk + h_1 * esk + h_2 * dsrnd0 + h_3 * dsrnd1 + h_4 * z + h_5 * t + sum(h_{6+i} * v_i)`
    #[serde_as(as = "ArkObjectBytes")]
    pub commitment0: E::G1Affine,
    /// Always `g1`, the second element of the signed equivalence class
    #[serde_as(as = "ArkObjectBytes")]
    pub commitment1: E::G1Affine,
    pub opening: TokenOpening<E>,
    /// Provider's signature on `(commitment0, commitment1)`
    pub signature: Signature<E>,
}

/// Identifier of a transaction as chosen by the provider. Opaque bytes.
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    CanonicalSerialize,
    CanonicalDeserialize,
    Serialize,
    Deserialize,
)]
pub struct TransactionId(pub Vec<u8>);

impl<E: Pairing> fmt::Debug for TokenOpening<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenOpening")
            .field("esk", &"<redacted>")
            .field("dsrnd0", &"<redacted>")
            .field("dsrnd1", &"<redacted>")
            .field("z", &"<redacted>")
            .field("t", &"<redacted>")
            .field("points", &self.points)
            .finish()
    }
}

impl<E: Pairing> TokenOpening<E> {
    /// Opening with random secrets except `esk` and the given points
    pub fn new<R: RngCore>(rng: &mut R, esk: E::ScalarField, points: Vec<u64>) -> Self {
        Self {
            esk,
            dsrnd0: E::ScalarField::rand(rng),
            dsrnd1: E::ScalarField::rand(rng),
            z: E::ScalarField::rand(rng),
            t: E::ScalarField::rand(rng),
            points,
        }
    }

    /// Committed messages in the order of the provider's bases
    pub fn messages(&self, usk: &E::ScalarField) -> Vec<E::ScalarField> {
        let mut messages = Vec::with_capacity(NUM_FIXED_MESSAGES + self.points.len());
        messages.extend_from_slice(&[*usk, self.esk, self.dsrnd0, self.dsrnd1, self.z, self.t]);
        messages.extend(self.points.iter().map(|v| E::ScalarField::from(*v)));
        messages
    }

    pub fn commit(
        &self,
        usk: &E::ScalarField,
        provider_public_key: &ProviderPublicKey<E>,
    ) -> Result<E::G1> {
        let bases = provider_public_key.bases_for(self.points.len())?;
        Ok(commit_to_vector(bases, &self.messages(usk)))
    }
}

impl<E: Pairing> Token<E> {
    /// Creates the token from its opening and the provider's signature on the commitment and checks it
    pub fn new(
        params: &PublicParameters<E>,
        promotion: &PromotionParameters,
        provider_public_key: &ProviderPublicKey<E>,
        user_secret_key: &UserSecretKey<E>,
        opening: TokenOpening<E>,
        signature: Signature<E>,
    ) -> Result<Self> {
        let commitment0 = opening
            .commit(&user_secret_key.usk, provider_public_key)?
            .into_affine();
        let token = Self {
            promotion_id: promotion.promotion_id,
            commitment0,
            commitment1: params.g1,
            opening,
            signature,
        };
        token.verify(params, promotion, provider_public_key, user_secret_key)?;
        Ok(token)
    }

    /// Checks that the token opens its commitment and carries a valid signature
    pub fn verify(
        &self,
        params: &PublicParameters<E>,
        promotion: &PromotionParameters,
        provider_public_key: &ProviderPublicKey<E>,
        user_secret_key: &UserSecretKey<E>,
    ) -> Result<()> {
        promotion.check_id(self.promotion_id)?;
        promotion.check_dimension(self.opening.points.len())?;
        if self.commitment1 != params.g1
            || self
                .opening
                .commit(&user_secret_key.usk, provider_public_key)?
                .into_affine()
                != self.commitment0
        {
            return Err(IncentiveError::InvalidToken);
        }
        self.signature
            .verify(
                &[self.commitment0, self.commitment1],
                provider_public_key.prepared_verification_key(),
                &params.g1,
                params.prepared_g2(),
            )
            .map_err(|_| IncentiveError::InvalidSignature)
    }

    pub fn points(&self) -> &[u64] {
        &self.opening.points
    }

    /// Double-spending id `w * esk`, revealed when the token is spent
    pub fn dsid(&self, params: &PublicParameters<E>) -> E::G1Affine {
        (params.w * self.opening.esk).into_affine()
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self {
        Self(id.as_bytes().to_vec())
    }
}

impl From<u64> for TransactionId {
    fn from(id: u64) -> Self {
        Self(id.to_be_bytes().to_vec())
    }
}

impl From<Vec<u8>> for TransactionId {
    fn from(id: Vec<u8>) -> Self {
        Self(id)
    }
}

impl AsRef<[u8]> for TransactionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}
