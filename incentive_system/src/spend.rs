//! Spending points of a token and getting a new token with the remaining points.
//!
//! The user shows the old token blinded by `s` as in earn, reveals its double-spending id
//! `dsid = w * esk` and the double-spending tag `(c0, c1)` for the transaction hash `gamma`, and sends
//! a blinded pre-commitment to the new token like in join. It proves with a single proof that
//! - it knows the opening of the blinded old commitment and of the new pre-commitment with the same `usk`,
//! - `dsid`, `c0` and `c1` are computed from the old token's secrets,
//! - the trace ciphertexts encrypt the digits of the new token's `esk` share under `dsid` and every
//!   digit has `esk_digit_bits` bits, so the provider can always decrypt them,
//! - the Pedersen commitments `P_i` and `P*_i` commit to the old and new points,
//! - all new points are in `[0, 2^range_bits)`,
//! - the old and new points satisfy the spend policy.
//!
//! The provider checks the proof and that the token was not spent before, then signs the new
//! commitment after adding its share of the new `esk`, like in join.

use crate::{
    error::{IncentiveError, Result},
    graph::SharedDoubleSpendingGraph,
    keys::{ProviderKeyPair, ProviderPublicKey, UserKeyPair, ESK_INDEX, NUM_FIXED_MESSAGES},
    policy::{PointCommitments, PointOpenings, SpendDeductTree},
    promotion::PromotionParameters,
    setup::PublicParameters,
    tag::DoubleSpendingTag,
    token::{Token, TokenOpening, TransactionId},
    util::{group_elem_to_hex, hash_bytes_to_field, negate_all, rand_non_zero, to_bytes},
    HashDigest,
};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup};
use ark_ff::{Field, One};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{fmt, vec, vec::Vec, UniformRand};
use incentive_utils::{
    concat_slices,
    digits::{decompose, digit_weights},
    elgamal::{encrypt_digits, Ciphertext},
    serde_utils::ArkObjectBytes,
    serialize_all,
};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use sigma_proofs::{
    range::{fits_in_bits, RangeClaim},
    LinearRelation, SigmaError, SigmaProof, SigmaStatement,
};
use sps_eq::prelude::Signature;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Public values of a spend request that the proof is about
#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct SpendInstance<E: Pairing> {
    pub promotion_id: u64,
    /// Double-spending id `w * esk` of the spent token
    #[serde_as(as = "ArkObjectBytes")]
    pub dsid: E::G1Affine,
    /// `usk * gamma + dsrnd0`
    #[serde_as(as = "ArkObjectBytes")]
    pub c0: E::ScalarField,
    /// `esk * gamma + dsrnd1`
    #[serde_as(as = "ArkObjectBytes")]
    pub c1: E::ScalarField,
    /// Old commitment blinded by `s`
    #[serde_as(as = "ArkObjectBytes")]
    pub blinded_commitment0: E::G1Affine,
    /// `g1 * s`
    #[serde_as(as = "ArkObjectBytes")]
    pub blinded_commitment1: E::G1Affine,
    /// Old token's signature adapted to the blinded commitment
    pub signature: Signature<E>,
    /// New commitment blinded by `u*`
    #[serde_as(as = "ArkObjectBytes")]
    pub pre_commitment0: E::G1Affine,
    /// `g1 * u*`
    #[serde_as(as = "ArkObjectBytes")]
    pub pre_commitment1: E::G1Affine,
    /// Encryptions of the digits of the user's share of the new `esk` under `dsid`
    pub trace_ciphertexts: Vec<Ciphertext<E::G1Affine>>,
    /// Pedersen commitments to the encrypted digits
    #[serde_as(as = "Vec<ArkObjectBytes>")]
    pub digit_commitments: Vec<E::G1Affine>,
    /// Bit commitments of the range proofs of the digits
    #[serde_as(as = "Vec<Vec<ArkObjectBytes>>")]
    pub digit_range_commitments: Vec<Vec<E::G1Affine>>,
    /// Pedersen commitments to the old points
    #[serde_as(as = "Vec<ArkObjectBytes>")]
    pub old_point_commitments: Vec<E::G1Affine>,
    /// Pedersen commitments to the new points
    #[serde_as(as = "Vec<ArkObjectBytes>")]
    pub new_point_commitments: Vec<E::G1Affine>,
    /// Bit commitments of the range proofs. First one per new point for non-negativity and then the
    /// ones of the policy in compilation order.
    #[serde_as(as = "Vec<Vec<ArkObjectBytes>>")]
    pub range_commitments: Vec<Vec<E::G1Affine>>,
}

#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct SpendRequest<E: Pairing> {
    pub instance: SpendInstance<E>,
    pub proof: SigmaProof<E::G1Affine>,
}

#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct SpendResponse<E: Pairing> {
    /// Signature on the new pre-commitment with the provider's share of `esk` added
    pub signature: Signature<E>,
    #[serde_as(as = "ArkObjectBytes")]
    pub esk_provider: E::ScalarField,
}

/// What the provider records about an accepted spend for double-spending detection
#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct SpendTransaction<E: Pairing> {
    pub promotion_id: u64,
    pub transaction_id: TransactionId,
    #[serde_as(as = "ArkObjectBytes")]
    pub dsid: E::G1Affine,
    pub tag: DoubleSpendingTag<E>,
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
pub struct PendingSpend<E: Pairing> {
    pub promotion_id: u64,
    #[serde_as(as = "ArkObjectBytes")]
    pub blinding: E::ScalarField,
    /// Opening of the new token with the user's share of `esk`
    pub opening: TokenOpening<E>,
}

impl<E: Pairing> fmt::Debug for PendingSpend<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSpend")
            .field("promotion_id", &self.promotion_id)
            .field("blinding", &"<redacted>")
            .field("opening", &self.opening)
            .finish()
    }
}

/// Positions of the witnesses in the metadata relation for `k` points and `L` digits:
/// `1/s, usk, esk, dsrnd0, dsrnd1, z, t, v_0..v_k, 1/u*, dsrnd0*, dsrnd1*, z*, t*, v*_0..v*_k,
/// d_0..d_L, e_0..e_L, rho_0..rho_k, rho*_0..rho*_k, sigma_0..sigma_L`
struct WitnessLayout {
    dimension: usize,
    digits: usize,
}

impl WitnessLayout {
    const BLINDING_INV: usize = 0;
    const USK: usize = 1;
    const ESK: usize = 2;
    const DSRND0: usize = 3;
    const DSRND1: usize = 4;

    /// Witness of the `j`-th committed message of the old token, `j < 6 + k`
    fn message(&self, j: usize) -> usize {
        1 + j
    }

    fn new_blinding_inv(&self) -> usize {
        1 + NUM_FIXED_MESSAGES + self.dimension
    }

    /// Witness of `dsrnd0*, dsrnd1*, z*, t*` for `j` in `2..6`
    fn new_fixed_message(&self, j: usize) -> usize {
        self.new_blinding_inv() + j - 1
    }

    fn new_point(&self, i: usize) -> usize {
        self.new_blinding_inv() + 5 + i
    }

    fn digit(&self, l: usize) -> usize {
        self.new_point(self.dimension) + l
    }

    fn trace_randomness(&self, l: usize) -> usize {
        self.digit(self.digits) + l
    }

    fn old_point_randomness(&self, i: usize) -> usize {
        self.trace_randomness(self.digits) + i
    }

    fn new_point_randomness(&self, i: usize) -> usize {
        self.old_point_randomness(self.dimension) + i
    }

    fn digit_randomness(&self, l: usize) -> usize {
        self.new_point_randomness(self.dimension) + l
    }

    fn count(&self) -> usize {
        self.digit_randomness(self.digits)
    }
}

impl<E: Pairing> SpendRequest<E> {
    pub const CONTEXT_DST: &'static [u8] = b"INCENTIVE-SYSTEM-SPEND";
    pub const GAMMA_DST: &'static [u8] = b"INCENTIVE-SYSTEM-SPEND-GAMMA";
    pub const USER_PRF_DOMAIN: &'static [u8] = b"INCENTIVE-SYSTEM-SPEND-USER";
    pub const PROVIDER_PRF_DOMAIN: &'static [u8] = b"INCENTIVE-SYSTEM-SPEND-PROVIDER";

    /// Creates a request to replace `token` by a token with `new_points` in the transaction
    /// `transaction_id`, proving that the points satisfy `policy`. All randomness is derived from the
    /// user's PRF key so the same call gives the same request.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        params: &PublicParameters<E>,
        promotion: &PromotionParameters,
        provider_public_key: &ProviderPublicKey<E>,
        user: &UserKeyPair<E>,
        token: &Token<E>,
        new_points: Vec<u64>,
        policy: &SpendDeductTree,
        transaction_id: &TransactionId,
    ) -> Result<(Self, PendingSpend<E>)> {
        let esk_digit_bits = params.config.esk_digit_bits;
        Self::new_with_digits(
            params,
            promotion,
            provider_public_key,
            user,
            token,
            new_points,
            policy,
            transaction_id,
            |esk| {
                Ok(decompose(esk, esk_digit_bits)?
                    .into_iter()
                    .map(E::ScalarField::from)
                    .collect())
            },
        )
    }

    /// Like `new` but with the digits of the new `esk` share given by `to_digits`
    #[allow(clippy::too_many_arguments)]
    fn new_with_digits(
        params: &PublicParameters<E>,
        promotion: &PromotionParameters,
        provider_public_key: &ProviderPublicKey<E>,
        user: &UserKeyPair<E>,
        token: &Token<E>,
        new_points: Vec<u64>,
        policy: &SpendDeductTree,
        transaction_id: &TransactionId,
        to_digits: impl Fn(&E::ScalarField) -> Result<Vec<E::ScalarField>>,
    ) -> Result<(Self, PendingSpend<E>)> {
        promotion.check_id(token.promotion_id)?;
        let k = promotion.dimension();
        promotion.check_dimension(token.points().len())?;
        promotion.check_dimension(new_points.len())?;
        let range_bits = params.config.range_bits;
        policy.validate(k, range_bits)?;
        if !new_points
            .iter()
            .all(|v| fits_in_bits(&E::ScalarField::from(*v), range_bits))
        {
            return Err(IncentiveError::PointsOutOfRange(range_bits));
        }
        if !policy.is_satisfied_by(token.points(), &new_points) {
            return Err(IncentiveError::PolicyNotSatisfied);
        }

        let mut input = to_bytes(token)?;
        input.extend(to_bytes(transaction_id)?);
        input.extend(to_bytes(&new_points)?);
        input.extend(policy.to_bytes()?);
        let mut rng = user
            .secret_key
            .prf_key
            .rng(Self::USER_PRF_DOMAIN, &input)?;

        let usk = user.secret_key.usk;
        let old = &token.opening;
        let s = rand_non_zero::<E::ScalarField, _>(&mut rng);
        let psi = rand_non_zero::<E::ScalarField, _>(&mut rng);
        let blinding = rand_non_zero::<E::ScalarField, _>(&mut rng);
        let esk_user = E::ScalarField::rand(&mut rng);
        let new_opening = TokenOpening::<E>::new(&mut rng, esk_user, new_points);
        let digit_count = params.esk_digit_count();
        let trace_randomness = (0..digit_count)
            .map(|_| E::ScalarField::rand(&mut rng))
            .collect::<Vec<_>>();
        let old_randomness = (0..k)
            .map(|_| E::ScalarField::rand(&mut rng))
            .collect::<Vec<_>>();
        let new_randomness = (0..k)
            .map(|_| E::ScalarField::rand(&mut rng))
            .collect::<Vec<_>>();
        let digit_randomness = (0..digit_count)
            .map(|_| E::ScalarField::rand(&mut rng))
            .collect::<Vec<_>>();

        let dsid = token.dsid(params);
        let new_commitment = new_opening.commit(&usk, provider_public_key)?;
        let pre_commitment0 = (new_commitment * blinding).into_affine();
        let pre_commitment1 = (params.g1 * blinding).into_affine();
        let gamma = Self::compute_gamma(
            promotion.promotion_id,
            &dsid,
            transaction_id,
            &pre_commitment0,
            &pre_commitment1,
        )?;

        let digits = to_digits(&new_opening.esk)?;
        if digits.len() != digit_count {
            return Err(IncentiveError::DimensionMismatch {
                expected: digit_count,
                found: digits.len(),
            });
        }
        let trace_ciphertexts = encrypt_digits(&digits, &trace_randomness, &dsid, &params.w);

        let (signature, blinded) = token.signature.change_rep_with_given_randomness(
            &s,
            &psi,
            &[token.commitment0, token.commitment1],
        )?;

        let to_field = |points: &[u64]| {
            points
                .iter()
                .map(|v| E::ScalarField::from(*v))
                .collect::<Vec<_>>()
        };
        let old_values = to_field(&old.points);
        let new_values = to_field(&new_opening.points);
        let old_point_commitments = params
            .pedersen_key
            .commit_to_a_batch(&old_values, &old_randomness);
        let new_point_commitments = params
            .pedersen_key
            .commit_to_a_batch(&new_values, &new_randomness);

        let mut range_commitments = Vec::with_capacity(k);
        let mut non_negative = Vec::with_capacity(k);
        let mut range_witnesses = Vec::new();
        for i in 0..k {
            let (comms, statement, witnesses) = non_negative_claim(params, new_point_commitments[i])
                .prover_statement(&mut rng, &new_values[i], &new_randomness[i])?;
            range_commitments.push(comms);
            non_negative.push(statement);
            range_witnesses.extend(witnesses);
        }
        let compiled = policy.compile_for_prover(
            &mut rng,
            params,
            &PointCommitments {
                old: &old_point_commitments,
                new: &new_point_commitments,
            },
            &PointOpenings {
                old_values: &old_values,
                old_randomness: &old_randomness,
                new_values: &new_values,
                new_randomness: &new_randomness,
            },
        )?;
        range_commitments.extend(compiled.bit_commitments);

        let digit_commitments = params
            .pedersen_key
            .commit_to_a_batch(&digits, &digit_randomness);
        let mut digit_range_commitments = Vec::with_capacity(digit_count);
        let mut digit_ranges = Vec::with_capacity(digit_count);
        let mut digit_witnesses = Vec::new();
        for l in 0..digit_count {
            let (comms, statement, witnesses) = digit_claim(params, digit_commitments[l])
                .prover_statement(&mut rng, &digits[l], &digit_randomness[l])?;
            digit_range_commitments.push(comms);
            digit_ranges.push(statement);
            digit_witnesses.extend(witnesses);
        }

        let instance = SpendInstance {
            promotion_id: promotion.promotion_id,
            dsid,
            c0: usk * gamma + old.dsrnd0,
            c1: old.esk * gamma + old.dsrnd1,
            blinded_commitment0: blinded[0],
            blinded_commitment1: blinded[1],
            signature,
            pre_commitment0,
            pre_commitment1,
            trace_ciphertexts,
            digit_commitments,
            digit_range_commitments,
            old_point_commitments,
            new_point_commitments,
            range_commitments,
        };

        let layout = WitnessLayout {
            dimension: k,
            digits: digit_count,
        };
        let mut witness = Vec::with_capacity(layout.count());
        witness.push(s.inverse().ok_or(IncentiveError::InvalidSpendProof)?);
        witness.extend(old.messages(&usk));
        witness.push(blinding.inverse().ok_or(IncentiveError::InvalidSpendProof)?);
        witness.extend_from_slice(&[
            new_opening.dsrnd0,
            new_opening.dsrnd1,
            new_opening.z,
            new_opening.t,
        ]);
        witness.extend_from_slice(&new_values);
        witness.extend(digits);
        witness.extend(trace_randomness);
        witness.extend(old_randomness);
        witness.extend(new_randomness);
        witness.extend(digit_randomness);

        let statement = SigmaStatement::and(vec![
            SigmaStatement::leaf(instance.metadata_relation(
                params,
                provider_public_key,
                &layout,
                &gamma,
            )?),
            SigmaStatement::and(non_negative),
            SigmaStatement::and(digit_ranges),
            compiled.statement,
        ]);
        let mut witnesses = vec![Some(witness)];
        witnesses.extend(range_witnesses);
        witnesses.extend(digit_witnesses);
        witnesses.extend(compiled.witnesses);
        let proof = statement
            .prove::<_, HashDigest>(
                &mut rng,
                &witnesses,
                &Self::context(promotion.promotion_id, transaction_id),
            )
            .map_err(|e| match e {
                SigmaError::UnsatisfiedStatement => IncentiveError::PolicyNotSatisfied,
                e => e.into(),
            })?;
        debug!(
            promotion_id = promotion.promotion_id,
            transaction_id = %transaction_id,
            "created spend request"
        );
        Ok((
            Self { instance, proof },
            PendingSpend {
                promotion_id: promotion.promotion_id,
                blinding,
                opening: new_opening,
            },
        ))
    }

    /// Checks the signature on the blinded old token and the proof. Returns `gamma`.
    pub fn verify(
        &self,
        params: &PublicParameters<E>,
        promotion: &PromotionParameters,
        provider_public_key: &ProviderPublicKey<E>,
        policy: &SpendDeductTree,
        transaction_id: &TransactionId,
    ) -> Result<E::ScalarField> {
        let instance = &self.instance;
        promotion.check_id(instance.promotion_id)?;
        let k = promotion.dimension();
        policy.validate(k, params.config.range_bits)?;
        promotion.check_dimension(instance.old_point_commitments.len())?;
        promotion.check_dimension(instance.new_point_commitments.len())?;
        let digit_count = params.esk_digit_count();
        for found in [
            instance.trace_ciphertexts.len(),
            instance.digit_commitments.len(),
            instance.digit_range_commitments.len(),
        ] {
            if found != digit_count {
                return Err(IncentiveError::DimensionMismatch {
                    expected: digit_count,
                    found,
                });
            }
        }
        if instance.range_commitments.len() < k
            || instance.dsid.is_zero()
            || instance.blinded_commitment0.is_zero()
            || instance.blinded_commitment1.is_zero()
            || instance.pre_commitment0.is_zero()
            || instance.pre_commitment1.is_zero()
        {
            return Err(IncentiveError::InvalidSpendProof);
        }
        instance
            .signature
            .verify(
                &[instance.blinded_commitment0, instance.blinded_commitment1],
                provider_public_key.prepared_verification_key(),
                &params.g1,
                params.prepared_g2(),
            )
            .map_err(|_| IncentiveError::InvalidSignature)?;

        let gamma = self.gamma(transaction_id)?;
        let layout = WitnessLayout {
            dimension: k,
            digits: digit_count,
        };
        let (non_negative_commitments, policy_commitments) = instance.range_commitments.split_at(k);
        let non_negative = instance
            .new_point_commitments
            .iter()
            .zip(non_negative_commitments)
            .map(|(c, bits)| {
                non_negative_claim(params, *c)
                    .verifier_statement(bits)
                    .map_err(|_| IncentiveError::InvalidSpendProof)
            })
            .collect::<Result<Vec<_>>>()?;
        let digit_ranges = instance
            .digit_commitments
            .iter()
            .zip(instance.digit_range_commitments.iter())
            .map(|(c, bits)| {
                digit_claim(params, *c)
                    .verifier_statement(bits)
                    .map_err(|_| IncentiveError::InvalidSpendProof)
            })
            .collect::<Result<Vec<_>>>()?;
        let policy_statement = policy.compile_for_verifier(
            params,
            &PointCommitments {
                old: &instance.old_point_commitments,
                new: &instance.new_point_commitments,
            },
            policy_commitments,
        )?;
        let statement = SigmaStatement::and(vec![
            SigmaStatement::leaf(instance.metadata_relation(
                params,
                provider_public_key,
                &layout,
                &gamma,
            )?),
            SigmaStatement::and(non_negative),
            SigmaStatement::and(digit_ranges),
            policy_statement,
        ]);
        statement
            .verify::<HashDigest>(
                &self.proof,
                &Self::context(instance.promotion_id, transaction_id),
            )
            .map_err(|_| IncentiveError::InvalidSpendProof)?;
        Ok(gamma)
    }

    /// The transaction hash `gamma` the double-spending tag is computed for
    pub fn gamma(&self, transaction_id: &TransactionId) -> Result<E::ScalarField> {
        Self::compute_gamma(
            self.instance.promotion_id,
            &self.instance.dsid,
            transaction_id,
            &self.instance.pre_commitment0,
            &self.instance.pre_commitment1,
        )
    }

    fn compute_gamma(
        promotion_id: u64,
        dsid: &E::G1Affine,
        transaction_id: &TransactionId,
        pre_commitment0: &E::G1Affine,
        pre_commitment1: &E::G1Affine,
    ) -> Result<E::ScalarField> {
        let mut bytes = Vec::new();
        serialize_all!(
            bytes,
            &promotion_id,
            dsid,
            transaction_id,
            pre_commitment0,
            pre_commitment1
        );
        Ok(hash_bytes_to_field(Self::GAMMA_DST, &bytes))
    }

    fn context(promotion_id: u64, transaction_id: &TransactionId) -> Vec<u8> {
        concat_slices!(
            Self::CONTEXT_DST,
            promotion_id.to_le_bytes(),
            transaction_id.0
        )
    }
}

impl<E: Pairing> SpendInstance<E> {
    fn metadata_relation(
        &self,
        params: &PublicParameters<E>,
        provider_public_key: &ProviderPublicKey<E>,
        layout: &WitnessLayout,
        gamma: &E::ScalarField,
    ) -> Result<LinearRelation<E::G1Affine>> {
        let k = layout.dimension;
        let neg_bases = negate_all(provider_public_key.bases_for(k)?);
        let neg_digit_bases = E::G1::normalize_batch(
            &digit_weights::<E::ScalarField>(params.config.esk_digit_bits)?
                .iter()
                .map(|weight| neg_bases[ESK_INDEX] * weight)
                .collect::<Vec<_>>(),
        );
        let g1_gamma = (params.g1 * gamma).into_affine();
        let zero = E::G1Affine::zero();
        let key = &params.pedersen_key;
        let mut relation = LinearRelation::new(layout.count());

        // Opening of the blinded old commitment
        let mut terms = vec![(WitnessLayout::BLINDING_INV, self.blinded_commitment0)];
        terms.extend(
            neg_bases
                .iter()
                .enumerate()
                .map(|(j, b)| (layout.message(j), *b)),
        );
        relation.add_equation(zero, terms)?;
        relation.add_equation(
            params.g1,
            vec![(WitnessLayout::BLINDING_INV, self.blinded_commitment1)],
        )?;

        // Double-spending id and tag
        relation.add_equation(self.dsid, vec![(WitnessLayout::ESK, params.w)])?;
        relation.add_equation(
            (params.g1 * self.c0).into_affine(),
            vec![(WitnessLayout::USK, g1_gamma), (WitnessLayout::DSRND0, params.g1)],
        )?;
        relation.add_equation(
            (params.g1 * self.c1).into_affine(),
            vec![(WitnessLayout::ESK, g1_gamma), (WitnessLayout::DSRND1, params.g1)],
        )?;

        // Opening of the new pre-commitment with the same usk and esk given by its digits
        let mut terms = vec![
            (layout.new_blinding_inv(), self.pre_commitment0),
            (WitnessLayout::USK, neg_bases[0]),
        ];
        terms.extend(
            neg_digit_bases
                .iter()
                .enumerate()
                .map(|(l, b)| (layout.digit(l), *b)),
        );
        terms.extend((2..NUM_FIXED_MESSAGES).map(|j| (layout.new_fixed_message(j), neg_bases[j])));
        terms.extend(
            neg_bases[NUM_FIXED_MESSAGES..]
                .iter()
                .enumerate()
                .map(|(i, b)| (layout.new_point(i), *b)),
        );
        relation.add_equation(zero, terms)?;
        relation.add_equation(
            params.g1,
            vec![(layout.new_blinding_inv(), self.pre_commitment1)],
        )?;

        // Trace ciphertexts and commitments to the same digits
        for (l, c) in self.digit_commitments.iter().enumerate() {
            relation.add_equation(
                *c,
                vec![(layout.digit(l), key.g), (layout.digit_randomness(l), key.h)],
            )?;
        }
        for (l, ct) in self.trace_ciphertexts.iter().enumerate() {
            relation.add_equation(ct.eph_pk, vec![(layout.trace_randomness(l), params.w)])?;
            relation.add_equation(
                ct.masked,
                vec![
                    (layout.trace_randomness(l), self.dsid),
                    (layout.digit(l), params.w),
                ],
            )?;
        }

        // Point commitments
        for (i, c) in self.old_point_commitments.iter().enumerate() {
            relation.add_equation(
                *c,
                vec![
                    (layout.message(NUM_FIXED_MESSAGES + i), key.g),
                    (layout.old_point_randomness(i), key.h),
                ],
            )?;
        }
        for (i, c) in self.new_point_commitments.iter().enumerate() {
            relation.add_equation(
                *c,
                vec![
                    (layout.new_point(i), key.g),
                    (layout.new_point_randomness(i), key.h),
                ],
            )?;
        }
        Ok(relation)
    }
}

impl<E: Pairing> SpendResponse<E> {
    /// Provider's side. Verifies the request, checks online that the token was not spent in
    /// another transaction and signs the new token. Returns the response for the user and the
    /// transaction to record with `db_sync`.
    ///
    /// The online check does not record anything. The returned transaction must be passed to
    /// `db_sync` before the next spend is served, otherwise the same token can be spent again.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        params: &PublicParameters<E>,
        promotion: &PromotionParameters,
        provider: &ProviderKeyPair<E>,
        request: &SpendRequest<E>,
        policy: &SpendDeductTree,
        transaction_id: &TransactionId,
        graph: &SharedDoubleSpendingGraph<E>,
    ) -> Result<(Self, SpendTransaction<E>)> {
        let instance = &request.instance;
        let gamma = request
            .verify(params, promotion, &provider.public_key, policy, transaction_id)
            .map_err(|e| {
                warn!(
                    transaction_id = %transaction_id,
                    error = %e,
                    "rejected spend request"
                );
                e
            })?;
        graph.check_online(&instance.dsid, transaction_id, &gamma)?;

        let mut input = to_bytes(request)?;
        input.extend(to_bytes(transaction_id)?);
        let mut rng = provider
            .secret_key
            .prf_key
            .rng(SpendRequest::<E>::PROVIDER_PRF_DOMAIN, &input)?;
        let esk_provider = E::ScalarField::rand(&mut rng);
        let y = rand_non_zero::<E::ScalarField, _>(&mut rng);
        let commitment0 = (instance.pre_commitment0.into_group()
            + instance.pre_commitment1 * (provider.secret_key.q[ESK_INDEX] * esk_provider))
            .into_affine();
        let signature = Signature::new_with_given_randomness(
            &y,
            &[commitment0, instance.pre_commitment1],
            &provider.secret_key.signing_key,
            &params.g1,
            &params.g2,
        )?;
        info!(
            promotion_id = promotion.promotion_id,
            transaction_id = %transaction_id,
            dsid = %group_elem_to_hex(&instance.dsid),
            "accepted spend request"
        );
        let transaction = SpendTransaction {
            promotion_id: promotion.promotion_id,
            transaction_id: transaction_id.clone(),
            dsid: instance.dsid,
            tag: DoubleSpendingTag {
                c0: instance.c0,
                c1: instance.c1,
                gamma,
                esk_provider,
                trace_ciphertexts: instance.trace_ciphertexts.clone(),
            },
        };
        Ok((
            Self {
                signature,
                esk_provider,
            },
            transaction,
        ))
    }
}

impl<E: Pairing> PendingSpend<E> {
    /// Unblinds the provider's signature and returns the new token
    pub fn finalize(
        &self,
        params: &PublicParameters<E>,
        promotion: &PromotionParameters,
        provider_public_key: &ProviderPublicKey<E>,
        user: &UserKeyPair<E>,
        response: &SpendResponse<E>,
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

/// `P*_i` commits to a value in `[0, 2^range_bits)`
fn non_negative_claim<E: Pairing>(
    params: &PublicParameters<E>,
    commitment: E::G1Affine,
) -> RangeClaim<E::G1Affine> {
    RangeClaim::lower_bound(
        params.pedersen_key.clone(),
        commitment,
        E::ScalarField::from(0u64),
        params.config.range_bits,
    )
}

/// `D_l` commits to a digit in `[0, 2^esk_digit_bits)`
fn digit_claim<E: Pairing>(
    params: &PublicParameters<E>,
    commitment: E::G1Affine,
) -> RangeClaim<E::G1Affine> {
    RangeClaim::lower_bound(
        params.pedersen_key.clone(),
        commitment,
        E::ScalarField::from(0u64),
        params.config.esk_digit_bits,
    )
}
