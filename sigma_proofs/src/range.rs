//! Statements about values committed in Pedersen commitments `P = g * v + h * r`.
//!
//! A range claim states that `a * v + b` is in `[0, 2^bits)` for public `a` and `b`, which covers both
//! lower bounds (`a = 1, b = -lower`) and upper bounds (`a = -1, b = upper`). The prover commits to
//! each bit of `x = a * v + b` as `C_j = g * x_j + h * r_j` and proves
//! - `sum(2^j * C_j) - a * P - g * b = h * (sum(2^j * r_j) - a * r)`, so the bits add up to `x`, and
//! - for each `j`, `C_j = h * r_j` OR `C_j - g = h * r_j`, so each bit is 0 or 1.
//!
//! An affine update claim states that the values in `P` and `P'` satisfy `v' = a * v + b`, proven as
//! knowledge of `r' - a * r` in `P' - a * P - g * b = h * (r' - a * r)`.

use crate::{
    composite::{LeafWitnesses, SigmaStatement},
    error::SigmaError,
    linear::LinearRelation,
};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{BigInteger, Field, One, PrimeField};
use ark_std::{rand::RngCore, vec, vec::Vec, UniformRand};
use incentive_utils::commitment::PedersenCommitmentKey;

pub const MAX_RANGE_BITS: u8 = 64;

/// Claim that `a * v + b` lies in `[0, 2^bits)` where `v` is the value committed in `commitment`
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RangeClaim<G: AffineRepr> {
    pub key: PedersenCommitmentKey<G>,
    pub commitment: G,
    pub a: G::ScalarField,
    pub b: G::ScalarField,
    pub bits: u8,
}

/// Claim that the values `v` in `old_commitment` and `v'` in `new_commitment` satisfy `v' = a * v + b`
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AffineUpdateClaim<G: AffineRepr> {
    pub key: PedersenCommitmentKey<G>,
    pub old_commitment: G,
    pub new_commitment: G,
    pub a: G::ScalarField,
    pub b: G::ScalarField,
}

impl<G: AffineRepr> RangeClaim<G> {
    /// Claim `v >= lower`
    pub fn lower_bound(
        key: PedersenCommitmentKey<G>,
        commitment: G,
        lower: G::ScalarField,
        bits: u8,
    ) -> Self {
        Self {
            key,
            commitment,
            a: G::ScalarField::one(),
            b: -lower,
            bits,
        }
    }

    /// Claim `v <= upper`
    pub fn upper_bound(
        key: PedersenCommitmentKey<G>,
        commitment: G,
        upper: G::ScalarField,
        bits: u8,
    ) -> Self {
        Self {
            key,
            commitment,
            a: -G::ScalarField::one(),
            b: upper,
            bits,
        }
    }

    /// Returns the bit commitments that must be sent to the verifier, the statement and its leaf witnesses.
    /// Fails if `a * value + b` is not in the range, so no unverifiable proof can be created.
    pub fn prover_statement<R: RngCore>(
        &self,
        rng: &mut R,
        value: &G::ScalarField,
        randomness: &G::ScalarField,
    ) -> Result<(Vec<G>, SigmaStatement<G>, LeafWitnesses<G::ScalarField>), SigmaError> {
        check_bits(self.bits)?;
        let x = self.a * value + self.b;
        let x_bits = x.into_bigint().to_bits_le();
        if x_bits[self.bits as usize..].iter().any(|b| *b) {
            return Err(SigmaError::ValueOutOfRange);
        }
        let bit_randomness = (0..self.bits)
            .map(|_| G::ScalarField::rand(rng))
            .collect::<Vec<_>>();
        let bit_commitments = G::Group::normalize_batch(
            &x_bits[..self.bits as usize]
                .iter()
                .zip(bit_randomness.iter())
                .map(|(bit, r)| self.key.commit_as_projective(&G::ScalarField::from(*bit), r))
                .collect::<Vec<_>>(),
        );

        // delta = sum(2^j * r_j) - a * r
        let mut delta = -(self.a * randomness);
        let mut power = G::ScalarField::one();
        for r in &bit_randomness {
            delta += power * r;
            power.double_in_place();
        }

        let mut witnesses = Vec::with_capacity(1 + 2 * self.bits as usize);
        witnesses.push(Some(vec![delta]));
        for (bit, r) in x_bits[..self.bits as usize].iter().zip(bit_randomness) {
            if *bit {
                witnesses.push(None);
                witnesses.push(Some(vec![r]));
            } else {
                witnesses.push(Some(vec![r]));
                witnesses.push(None);
            }
        }
        let statement = self.verifier_statement(&bit_commitments)?;
        Ok((bit_commitments, statement, witnesses))
    }

    /// Bit commitments and statement for a claim the prover does not satisfy, with no leaf witnesses.
    /// Such a claim can only appear in a branch of an OR which the prover simulates.
    pub fn unsatisfied_prover_statement<R: RngCore>(
        &self,
        rng: &mut R,
    ) -> Result<(Vec<G>, SigmaStatement<G>, LeafWitnesses<G::ScalarField>), SigmaError> {
        check_bits(self.bits)?;
        let bit_commitments = G::Group::normalize_batch(
            &(0..self.bits)
                .map(|_| self.key.h * G::ScalarField::rand(rng))
                .collect::<Vec<_>>(),
        );
        let statement = self.verifier_statement(&bit_commitments)?;
        Ok((
            bit_commitments,
            statement,
            vec![None; 1 + 2 * self.bits as usize],
        ))
    }

    /// The statement as built by the verifier from the bit commitments received from the prover
    pub fn verifier_statement(&self, bit_commitments: &[G]) -> Result<SigmaStatement<G>, SigmaError> {
        check_bits(self.bits)?;
        if bit_commitments.len() != self.bits as usize {
            return Err(SigmaError::ExpectedSameSizeSequences(
                bit_commitments.len(),
                self.bits as usize,
            ));
        }
        let g = self.key.g.into_group();

        // sum(2^j * C_j) - a * P - g * b
        let mut sum_target = -(self.commitment * self.a) - g * self.b;
        let mut power = G::ScalarField::one();
        for c in bit_commitments {
            sum_target += *c * power;
            power.double_in_place();
        }
        let mut sum_rel = LinearRelation::new(1);
        sum_rel.add_equation(sum_target.into_affine(), vec![(0, self.key.h)])?;

        let shifted = G::Group::normalize_batch(
            &bit_commitments
                .iter()
                .map(|c| c.into_group() - g)
                .collect::<Vec<_>>(),
        );
        let mut children = Vec::with_capacity(1 + bit_commitments.len());
        children.push(SigmaStatement::leaf(sum_rel));
        for (c, c_minus_g) in bit_commitments.iter().zip(shifted) {
            let mut zero = LinearRelation::new(1);
            zero.add_equation(*c, vec![(0, self.key.h)])?;
            let mut one = LinearRelation::new(1);
            one.add_equation(c_minus_g, vec![(0, self.key.h)])?;
            children.push(SigmaStatement::or(
                SigmaStatement::leaf(zero),
                SigmaStatement::leaf(one),
            ));
        }
        Ok(SigmaStatement::and(children))
    }
}

impl<G: AffineRepr> AffineUpdateClaim<G> {
    pub fn statement(&self) -> Result<SigmaStatement<G>, SigmaError> {
        let target = self.new_commitment.into_group()
            - self.old_commitment * self.a
            - self.key.g * self.b;
        let mut rel = LinearRelation::new(1);
        rel.add_equation(target.into_affine(), vec![(0, self.key.h)])?;
        Ok(SigmaStatement::leaf(rel))
    }

    /// Witness `r' - a * r`. Fails if the values don't satisfy the update.
    pub fn witness(
        &self,
        old_value: &G::ScalarField,
        old_randomness: &G::ScalarField,
        new_value: &G::ScalarField,
        new_randomness: &G::ScalarField,
    ) -> Result<LeafWitnesses<G::ScalarField>, SigmaError> {
        if *new_value != self.a * old_value + self.b {
            return Err(SigmaError::UnsatisfiedRelation);
        }
        Ok(vec![Some(vec![*new_randomness - self.a * old_randomness])])
    }
}

fn check_bits(bits: u8) -> Result<(), SigmaError> {
    if bits == 0 || bits > MAX_RANGE_BITS {
        return Err(SigmaError::InvalidRangeBits(bits));
    }
    Ok(())
}

/// `value` as a field element, negative values mapping to their additive inverse
pub fn field_elem_from_i64<F: PrimeField>(value: i64) -> F {
    if value < 0 {
        -F::from(value.unsigned_abs())
    } else {
        F::from(value as u64)
    }
}

/// Whether `value` is less than `2^bits`
pub fn fits_in_bits<F: PrimeField>(value: &F, bits: u8) -> bool {
    value.into_bigint().num_bits() <= bits as u32
}
