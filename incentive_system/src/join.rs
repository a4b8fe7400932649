//! Issue of the first token of a promotion.
//!
//! The user picks the token secrets, commits to them with zero points and sends the commitment
//! `(C * u, g1 * u)` blinded by a random `u`, together with a proof that it knows the opening and that
//! the committed `usk` belongs to its registered public key. The provider adds its share of `esk` to
//! the committed value, which it can do as it knows `q_1`, and signs. The user unblinds with `1 / u`.
//!
//! The witnesses of the proof are `(1/u, usk, esk_usr, dsrnd0, dsrnd1, z, t)` and the relations:
//! - `0 = cPre0 * (1/u) - h_0 * usk - h_1 * esk_usr - h_2 * dsrnd0 - h_3 * dsrnd1 - h_4 * z - h_5 * t`
//! - `g1 = cPre1 * (1/u)`
//! - `upk = w * usk`

use crate::{
    error::{IncentiveError, Result},
    keys::{ProviderKeyPair, ProviderPublicKey, UserKeyPair, UserPublicKey, ESK_INDEX, NUM_FIXED_MESSAGES},
    promotion::PromotionParameters,
    setup::PublicParameters,
    token::{Token, TokenOpening},
    util::{negate_all, rand_non_zero},
    HashDigest,
};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup};
use ark_ff::{Field, One};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{fmt, rand::RngCore, vec, vec::Vec, UniformRand};
use incentive_utils::{concat_slices, serde_utils::ArkObjectBytes};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use sigma_proofs::{LinearRelation, SigmaProof, SigmaStatement};
use sps_eq::prelude::Signature;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct JoinRequest<E: Pairing> {
    pub promotion_id: u64,
    pub user_public_key: UserPublicKey<E>,
    pub genesis_signature: Signature<E>,
    /// `C * u`
    #[serde_as(as = "ArkObjectBytes")]
    pub pre_commitment0: E::G1Affine,
    /// `g1 * u`
    #[serde_as(as = "ArkObjectBytes")]
    pub pre_commitment1: E::G1Affine,
    pub proof: SigmaProof<E::G1Affine>,
}

#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct JoinResponse<E: Pairing> {
    /// Signature on the pre-commitment with the provider's share of `esk` added
    pub signature: Signature<E>,
    #[serde_as(as = "ArkObjectBytes")]
    pub esk_provider: E::ScalarField,
}

/// User state between sending the request and receiving the response
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
pub struct PendingJoin<E: Pairing> {
    pub promotion_id: u64,
    #[serde_as(as = "ArkObjectBytes")]
    pub blinding: E::ScalarField,
    /// Opening with the user's share of `esk`
    pub opening: TokenOpening<E>,
}

impl<E: Pairing> fmt::Debug for PendingJoin<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingJoin")
            .field("promotion_id", &self.promotion_id)
            .field("blinding", &"<redacted>")
            .field("opening", &self.opening)
            .finish()
    }
}

impl<E: Pairing> JoinRequest<E> {
    pub const CONTEXT_DST: &'static [u8] = b"INCENTIVE-SYSTEM-JOIN";

    pub fn new<R: RngCore>(
        rng: &mut R,
        params: &PublicParameters<E>,
        promotion: &PromotionParameters,
        provider_public_key: &ProviderPublicKey<E>,
        user: &UserKeyPair<E>,
    ) -> Result<(Self, PendingJoin<E>)> {
        promotion.validate(params)?;
        let blinding = rand_non_zero::<E::ScalarField, _>(rng);
        let esk = E::ScalarField::rand(rng);
        let opening = TokenOpening::new(rng, esk, vec![0; promotion.dimension()]);
        let commitment = opening.commit(&user.secret_key.usk, provider_public_key)?;
        let pre_commitment0 = (commitment * blinding).into_affine();
        let pre_commitment1 = (params.g1 * blinding).into_affine();

        let statement = Self::statement(
            params,
            provider_public_key,
            &user.public_key,
            &pre_commitment0,
            &pre_commitment1,
        )?;
        let blinding_inv = blinding.inverse().ok_or(IncentiveError::InvalidJoinProof)?;
        let witness = vec![
            blinding_inv,
            user.secret_key.usk,
            opening.esk,
            opening.dsrnd0,
            opening.dsrnd1,
            opening.z,
            opening.t,
        ];
        let proof = statement.prove::<_, HashDigest>(
            rng,
            &[Some(witness)],
            &Self::context(promotion.promotion_id),
        )?;
        debug!(promotion_id = promotion.promotion_id, "created join request");
        Ok((
            Self {
                promotion_id: promotion.promotion_id,
                user_public_key: user.public_key.clone(),
                genesis_signature: user.genesis_signature.clone(),
                pre_commitment0,
                pre_commitment1,
                proof,
            },
            PendingJoin {
                promotion_id: promotion.promotion_id,
                blinding,
                opening,
            },
        ))
    }

    /// Checks the genesis signature and the proof
    pub fn verify(
        &self,
        params: &PublicParameters<E>,
        promotion: &PromotionParameters,
        provider_public_key: &ProviderPublicKey<E>,
    ) -> Result<()> {
        promotion.check_id(self.promotion_id)?;
        provider_public_key.verify_genesis_signature(
            params,
            &self.user_public_key,
            &self.genesis_signature,
        )?;
        if self.pre_commitment0.is_zero() || self.pre_commitment1.is_zero() {
            return Err(IncentiveError::InvalidJoinProof);
        }
        let statement = Self::statement(
            params,
            provider_public_key,
            &self.user_public_key,
            &self.pre_commitment0,
            &self.pre_commitment1,
        )?;
        statement
            .verify::<HashDigest>(&self.proof, &Self::context(self.promotion_id))
            .map_err(|_| IncentiveError::InvalidJoinProof)
    }

    fn statement(
        params: &PublicParameters<E>,
        provider_public_key: &ProviderPublicKey<E>,
        user_public_key: &UserPublicKey<E>,
        pre_commitment0: &E::G1Affine,
        pre_commitment1: &E::G1Affine,
    ) -> Result<SigmaStatement<E::G1Affine>> {
        let neg_bases = negate_all(provider_public_key.bases_for(0)?);
        let mut relation = LinearRelation::new(1 + NUM_FIXED_MESSAGES);
        let mut terms = vec![(0, *pre_commitment0)];
        terms.extend(neg_bases.into_iter().enumerate().map(|(i, b)| (i + 1, b)));
        relation.add_equation(E::G1Affine::zero(), terms)?;
        relation.add_equation(params.g1, vec![(0, *pre_commitment1)])?;
        relation.add_equation(user_public_key.0, vec![(1, params.w)])?;
        Ok(SigmaStatement::leaf(relation))
    }

    fn context(promotion_id: u64) -> Vec<u8> {
        concat_slices!(Self::CONTEXT_DST, promotion_id.to_le_bytes())
    }
}

impl<E: Pairing> JoinResponse<E> {
    /// Provider's side. Verifies the request and signs the pre-commitment after adding a random share of `esk`.
    pub fn new<R: RngCore>(
        rng: &mut R,
        params: &PublicParameters<E>,
        promotion: &PromotionParameters,
        provider: &ProviderKeyPair<E>,
        request: &JoinRequest<E>,
    ) -> Result<Self> {
        request.verify(params, promotion, &provider.public_key)?;
        let esk_provider = E::ScalarField::rand(rng);
        // cPre1 * q_1 = h_1 * u so this adds h_1 * esk_provider to the blinded commitment
        let commitment0 = (request.pre_commitment0.into_group()
            + request.pre_commitment1 * (provider.secret_key.q[ESK_INDEX] * esk_provider))
            .into_affine();
        let signature = Signature::new(
            rng,
            &[commitment0, request.pre_commitment1],
            &provider.secret_key.signing_key,
            &params.g1,
            &params.g2,
        )?;
        info!(promotion_id = promotion.promotion_id, "issued token on join");
        Ok(Self {
            signature,
            esk_provider,
        })
    }
}

impl<E: Pairing> PendingJoin<E> {
    /// Unblinds the provider's signature and returns the checked token
    pub fn finalize(
        &self,
        params: &PublicParameters<E>,
        promotion: &PromotionParameters,
        provider_public_key: &ProviderPublicKey<E>,
        user: &UserKeyPair<E>,
        response: &JoinResponse<E>,
    ) -> Result<Token<E>> {
        promotion.check_id(self.promotion_id)?;
        let blinding_inv = self
            .blinding
            .inverse()
            .ok_or(IncentiveError::InvalidSignature)?;
        let (signature, _) = response.signature.change_rep_with_given_randomness(
            &blinding_inv,
            &E::ScalarField::one(),
            &[],
        )?;
        let mut opening = self.opening.clone();
        opening.esk += response.esk_provider;
        Token::new(
            params,
            promotion,
            provider_public_key,
            &user.secret_key,
            opening,
            signature,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{keys::UserSecretKey, setup::SystemConfig};
    use ark_bls12_381::Bls12_381;
    use ark_std::rand::{rngs::StdRng, SeedableRng};
    use test_utils::test_serialization;

    #[test]
    fn join() {
        let mut rng = StdRng::seed_from_u64(0u64);
        let params = PublicParameters::<Bls12_381>::new(b"test", SystemConfig::default()).unwrap();
        let provider = ProviderKeyPair::new(&mut rng, &params).unwrap();
        let promotion = PromotionParameters::new(1, 3, &params).unwrap();
        let sk = UserSecretKey::new(&mut rng);
        let sig = provider
            .issue_genesis_signature(&mut rng, &params, &sk.public_key(&params))
            .unwrap();
        let user = UserKeyPair::new(sk, sig, &params, &provider.public_key).unwrap();

        let (request, pending) =
            JoinRequest::new(&mut rng, &params, &promotion, &provider.public_key, &user).unwrap();
        test_serialization!(JoinRequest<Bls12_381>, request);
        let response =
            JoinResponse::new(&mut rng, &params, &promotion, &provider, &request).unwrap();
        let token = pending
            .finalize(&params, &promotion, &provider.public_key, &user, &response)
            .unwrap();
        assert_eq!(token.points(), &[0, 0, 0]);
        assert_eq!(token.commitment1, params.g1);
        token
            .verify(&params, &promotion, &provider.public_key, &user.secret_key)
            .unwrap();

        // The request is bound to the promotion
        let other_promotion = PromotionParameters::new(2, 3, &params).unwrap();
        let mut moved = request.clone();
        moved.promotion_id = 2;
        assert!(matches!(
            JoinResponse::new(&mut rng, &params, &other_promotion, &provider, &moved),
            Err(IncentiveError::InvalidJoinProof)
        ));

        // Another user's public key with a valid genesis signature can't be used
        let sk2 = UserSecretKey::new(&mut rng);
        let pk2 = sk2.public_key(&params);
        let sig2 = provider
            .issue_genesis_signature(&mut rng, &params, &pk2)
            .unwrap();
        let mut stolen = request.clone();
        stolen.user_public_key = pk2;
        stolen.genesis_signature = sig2;
        assert!(matches!(
            JoinResponse::new(&mut rng, &params, &promotion, &provider, &stolen),
            Err(IncentiveError::InvalidJoinProof)
        ));

        // Without a genesis signature from the provider
        let other_provider = ProviderKeyPair::new(&mut rng, &params).unwrap();
        assert!(matches!(
            JoinResponse::new(&mut rng, &params, &promotion, &other_provider, &request),
            Err(IncentiveError::InvalidGenesisSignature)
        ));

        // A tampered response gives no token
        let mut tampered = response.clone();
        tampered.esk_provider += ark_bls12_381::Fr::from(1u64);
        assert!(matches!(
            pending.finalize(&params, &promotion, &provider.public_key, &user, &tampered),
            Err(IncentiveError::InvalidSignature)
        ));
        assert!(matches!(
            pending.finalize(&params, &promotion, &other_provider.public_key, &user, &response),
            Err(IncentiveError::InvalidSignature)
        ));
        test_serialization!(JoinResponse<Bls12_381>, response);
    }
}
