//! Adding points to a token.
//!
//! The user shows the token's commitment and signature moved to a random representative
//! `(C0 * s, g1 * s)`. The provider checks the signature and, knowing the discrete logs `q_{6+i}` of the
//! point bases, adds `sum(h_{6+i} * v_i) * s = (g1 * s) * sum(q_{6+i} * v_i)` to the blinded commitment
//! and signs the result. The user unblinds with `1 / s`.
//!
//! Both sides derive their randomness with a PRF from the request, so sending the same request again
//! gives the same response.

use crate::{
    error::{IncentiveError, Result},
    keys::{ProviderKeyPair, ProviderPublicKey, UserKeyPair, UserSecretKey, NUM_FIXED_MESSAGES},
    promotion::PromotionParameters,
    setup::PublicParameters,
    token::Token,
    util::{rand_non_zero, to_bytes},
};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup};
use ark_ff::{Field, One};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::vec::Vec;
use incentive_utils::serde_utils::ArkObjectBytes;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use sps_eq::prelude::Signature;
use tracing::{debug, info};

#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct EarnRequest<E: Pairing> {
    pub promotion_id: u64,
    /// `C0 * s`
    #[serde_as(as = "ArkObjectBytes")]
    pub blinded_commitment0: E::G1Affine,
    /// `g1 * s`
    #[serde_as(as = "ArkObjectBytes")]
    pub blinded_commitment1: E::G1Affine,
    /// Token signature adapted to the blinded commitment
    pub signature: Signature<E>,
    /// Points to add, authorized outside the protocol
    pub earn_amount: Vec<u64>,
    /// Identifier of the purchase the points are earned for
    pub basket_id: Vec<u8>,
}

#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct EarnResponse<E: Pairing> {
    /// Signature on the blinded commitment with the points added
    pub signature: Signature<E>,
}

impl<E: Pairing> EarnRequest<E> {
    pub const USER_PRF_DOMAIN: &'static [u8] = b"INCENTIVE-SYSTEM-EARN-USER";
    pub const PROVIDER_PRF_DOMAIN: &'static [u8] = b"INCENTIVE-SYSTEM-EARN-PROVIDER";

    pub fn new(
        promotion: &PromotionParameters,
        user: &UserKeyPair<E>,
        token: &Token<E>,
        earn_amount: Vec<u64>,
        basket_id: Vec<u8>,
    ) -> Result<Self> {
        promotion.check_id(token.promotion_id)?;
        promotion.check_dimension(earn_amount.len())?;
        promotion.check_dimension(token.points().len())?;
        new_points(token.points(), &earn_amount)?;
        let (s, psi) = Self::blindings(&user.secret_key, token, &earn_amount, &basket_id)?;
        let (signature, blinded) = token.signature.change_rep_with_given_randomness(
            &s,
            &psi,
            &[token.commitment0, token.commitment1],
        )?;
        debug!(promotion_id = promotion.promotion_id, "created earn request");
        Ok(Self {
            promotion_id: promotion.promotion_id,
            blinded_commitment0: blinded[0],
            blinded_commitment1: blinded[1],
            signature,
            earn_amount,
            basket_id,
        })
    }

    /// Unblinds the provider's signature and returns the token with the points added
    pub fn finalize(
        &self,
        params: &PublicParameters<E>,
        promotion: &PromotionParameters,
        provider_public_key: &ProviderPublicKey<E>,
        user: &UserKeyPair<E>,
        token: &Token<E>,
        response: &EarnResponse<E>,
    ) -> Result<Token<E>> {
        promotion.check_id(self.promotion_id)?;
        let (s, _) = Self::blindings(&user.secret_key, token, &self.earn_amount, &self.basket_id)?;
        let s_inv = s.inverse().ok_or(IncentiveError::InvalidSignature)?;
        let (signature, _) = response.signature.change_rep_with_given_randomness(
            &s_inv,
            &E::ScalarField::one(),
            &[],
        )?;
        let mut opening = token.opening.clone();
        opening.points = new_points(token.points(), &self.earn_amount)?;
        Token::new(
            params,
            promotion,
            provider_public_key,
            &user.secret_key,
            opening,
            signature,
        )
    }

    /// The blinding `s` of the commitment and `psi` of the signature
    fn blindings(
        user_secret_key: &UserSecretKey<E>,
        token: &Token<E>,
        earn_amount: &[u64],
        basket_id: &[u8],
    ) -> Result<(E::ScalarField, E::ScalarField)> {
        let mut input = to_bytes(token)?;
        input.extend(to_bytes(&earn_amount.to_vec())?);
        input.extend(to_bytes(&basket_id.to_vec())?);
        let mut rng = user_secret_key
            .prf_key
            .rng(Self::USER_PRF_DOMAIN, &input)?;
        Ok((rand_non_zero(&mut rng), rand_non_zero(&mut rng)))
    }
}

impl<E: Pairing> EarnResponse<E> {
    /// Provider's side. Checks the blinded signature and signs the commitment with the points added.
    pub fn new(
        params: &PublicParameters<E>,
        promotion: &PromotionParameters,
        provider: &ProviderKeyPair<E>,
        request: &EarnRequest<E>,
    ) -> Result<Self> {
        promotion.check_id(request.promotion_id)?;
        promotion.check_dimension(request.earn_amount.len())?;
        if request.blinded_commitment0.is_zero() || request.blinded_commitment1.is_zero() {
            return Err(IncentiveError::InvalidEarnRequest("blinded commitment is zero"));
        }
        request
            .signature
            .verify(
                &[request.blinded_commitment0, request.blinded_commitment1],
                provider.public_key.prepared_verification_key(),
                &params.g1,
                params.prepared_g2(),
            )
            .map_err(|_| IncentiveError::InvalidSignature)?;

        let q = &provider.secret_key.q[NUM_FIXED_MESSAGES..];
        let increment = request
            .earn_amount
            .iter()
            .zip(q)
            .fold(E::ScalarField::from(0u64), |acc, (v, q_i)| {
                acc + E::ScalarField::from(*v) * q_i
            });
        let commitment0 = (request.blinded_commitment0.into_group()
            + request.blinded_commitment1 * increment)
            .into_affine();

        let mut rng = provider
            .secret_key
            .prf_key
            .rng(EarnRequest::<E>::PROVIDER_PRF_DOMAIN, &to_bytes(request)?)?;
        let y = rand_non_zero::<E::ScalarField, _>(&mut rng);
        let signature = Signature::new_with_given_randomness(
            &y,
            &[commitment0, request.blinded_commitment1],
            &provider.secret_key.signing_key,
            &params.g1,
            &params.g2,
        )?;
        info!(
            promotion_id = promotion.promotion_id,
            earn_amount = ?request.earn_amount,
            "signed earn request"
        );
        Ok(Self { signature })
    }
}

fn new_points(points: &[u64], earn_amount: &[u64]) -> Result<Vec<u64>> {
    points
        .iter()
        .zip(earn_amount)
        .map(|(v, e)| v.checked_add(*e).ok_or(IncentiveError::PointsOverflow))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        join::{JoinRequest, JoinResponse},
        keys::UserSecretKey,
        setup::SystemConfig,
    };
    use ark_bls12_381::Bls12_381;
    use ark_std::rand::{rngs::StdRng, SeedableRng};
    use test_utils::test_serialization;

    #[test]
    fn earn() {
        let mut rng = StdRng::seed_from_u64(0u64);
        let params = PublicParameters::<Bls12_381>::new(b"test", SystemConfig::default()).unwrap();
        let provider = ProviderKeyPair::new(&mut rng, &params).unwrap();
        let promotion = PromotionParameters::new(7, 2, &params).unwrap();
        let sk = UserSecretKey::new(&mut rng);
        let sig = provider
            .issue_genesis_signature(&mut rng, &params, &sk.public_key(&params))
            .unwrap();
        let user = UserKeyPair::new(sk, sig, &params, &provider.public_key).unwrap();
        let (request, pending) =
            JoinRequest::new(&mut rng, &params, &promotion, &provider.public_key, &user).unwrap();
        let response =
            JoinResponse::new(&mut rng, &params, &promotion, &provider, &request).unwrap();
        let token = pending
            .finalize(&params, &promotion, &provider.public_key, &user, &response)
            .unwrap();

        let request = EarnRequest::new(&promotion, &user, &token, vec![5, 1], b"basket-1".to_vec())
            .unwrap();
        test_serialization!(EarnRequest<Bls12_381>, request);
        // Same request twice gives the same bytes and the same response
        assert_eq!(
            request,
            EarnRequest::new(&promotion, &user, &token, vec![5, 1], b"basket-1".to_vec()).unwrap()
        );
        let response = EarnResponse::new(&params, &promotion, &provider, &request).unwrap();
        assert_eq!(
            response,
            EarnResponse::new(&params, &promotion, &provider, &request).unwrap()
        );
        test_serialization!(EarnResponse<Bls12_381>, response);

        let token2 = request
            .finalize(&params, &promotion, &provider.public_key, &user, &token, &response)
            .unwrap();
        assert_eq!(token2.points(), &[5, 1]);
        assert_eq!(token2.opening.esk, token.opening.esk);
        assert_eq!(token2.opening.dsrnd0, token.opening.dsrnd0);
        assert_ne!(token2.commitment0, token.commitment0);

        // The blinded commitment is not the token's commitment
        assert_ne!(request.blinded_commitment0, token.commitment0);

        let request = EarnRequest::new(&promotion, &user, &token2, vec![0, 3], b"basket-2".to_vec())
            .unwrap();
        let response = EarnResponse::new(&params, &promotion, &provider, &request).unwrap();
        let token3 = request
            .finalize(&params, &promotion, &provider.public_key, &user, &token2, &response)
            .unwrap();
        assert_eq!(token3.points(), &[5, 4]);

        // A response for a different amount does not match the points the user expects
        let mut inflated = request.clone();
        inflated.earn_amount = vec![100, 3];
        let response = EarnResponse::new(&params, &promotion, &provider, &inflated).unwrap();
        assert!(request
            .finalize(&params, &promotion, &provider.public_key, &user, &token2, &response)
            .is_err());

        // Forged signature
        let mut forged = request.clone();
        forged.blinded_commitment0 = token3.commitment0;
        assert!(matches!(
            EarnResponse::new(&params, &promotion, &provider, &forged),
            Err(IncentiveError::InvalidSignature)
        ));

        // Dimension and overflow checks
        assert!(matches!(
            EarnRequest::new(&promotion, &user, &token3, vec![1], vec![]),
            Err(IncentiveError::DimensionMismatch { expected: 2, found: 1 })
        ));
        assert!(matches!(
            EarnRequest::new(&promotion, &user, &token3, vec![u64::MAX, 0], vec![]),
            Err(IncentiveError::PointsOverflow)
        ));
    }
}
