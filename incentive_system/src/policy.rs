//! Spend policies and their compilation into Sigma protocol statements.
//!
//! A policy is a Boolean tree over two kinds of leaves:
//! - [`TokenPointsLeaf`]: inclusive lower and upper limits on the points of the spent token
//! - [`TokenUpdateLeaf`]: inclusive limits on the points of the new token and affine relations
//!   `v'_i = a_i * v_i + b_i` between old and new points
//!
//! A missing limit or coefficient leaves that point unconstrained. During a spend each point of the
//! old and the new token is committed in a Pedersen commitment and every constraint becomes a range
//! claim or an affine update claim on these commitments. Leaves are compiled depth first, left
//! before right, and the prover and verifier must traverse the tree in the same order.

use crate::{
    error::{IncentiveError, Result},
    setup::PublicParameters,
};
use ark_ec::{pairing::Pairing, AffineRepr};
use ark_std::{rand::RngCore, vec::Vec};
use incentive_utils::commitment::PedersenCommitmentKey;
use serde::{Deserialize, Serialize};
use sigma_proofs::{
    range::{field_elem_from_i64, AffineUpdateClaim, RangeClaim},
    LeafWitnesses, SigmaError, SigmaStatement,
};

/// `v' = a * v + b`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffineUpdate {
    pub a: i64,
    pub b: i64,
}

/// Limits on the points of the token being spent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPointsLeaf {
    pub lower_limits: Vec<Option<u64>>,
    pub upper_limits: Vec<Option<u64>>,
}

/// Limits on the points of the new token and their relation to the old points
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUpdateLeaf {
    pub lower_limits: Vec<Option<u64>>,
    pub upper_limits: Vec<Option<u64>>,
    pub coefficients: Vec<Option<AffineUpdate>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpendDeductTree {
    TokenPoints(TokenPointsLeaf),
    TokenUpdate(TokenUpdateLeaf),
    And(Box<SpendDeductTree>, Box<SpendDeductTree>),
    Or(Box<SpendDeductTree>, Box<SpendDeductTree>),
}

impl TokenPointsLeaf {
    /// Leaf without any constraint
    pub fn new(dimension: usize) -> Self {
        Self {
            lower_limits: vec![None; dimension],
            upper_limits: vec![None; dimension],
        }
    }

    /// Sets the lower limit of point `index`. An `index` beyond the dimension grows the leaf, which
    /// `SpendDeductTree::validate` rejects with `DimensionMismatch`. The same holds for the other
    /// builders of both leaves.
    pub fn with_lower_limit(mut self, index: usize, limit: u64) -> Self {
        set_at(&mut self.lower_limits, index, Some(limit));
        self
    }

    pub fn with_upper_limit(mut self, index: usize, limit: u64) -> Self {
        set_at(&mut self.upper_limits, index, Some(limit));
        self
    }

    pub fn is_satisfied_by(&self, old_points: &[u64]) -> bool {
        within_limits(&self.lower_limits, &self.upper_limits, old_points)
    }
}

impl TokenUpdateLeaf {
    /// Leaf without any constraint
    pub fn new(dimension: usize) -> Self {
        Self {
            lower_limits: vec![None; dimension],
            upper_limits: vec![None; dimension],
            coefficients: vec![None; dimension],
        }
    }

    pub fn with_lower_limit(mut self, index: usize, limit: u64) -> Self {
        set_at(&mut self.lower_limits, index, Some(limit));
        self
    }

    pub fn with_upper_limit(mut self, index: usize, limit: u64) -> Self {
        set_at(&mut self.upper_limits, index, Some(limit));
        self
    }

    pub fn with_update(mut self, index: usize, a: i64, b: i64) -> Self {
        set_at(&mut self.coefficients, index, Some(AffineUpdate { a, b }));
        self
    }

    pub fn is_satisfied_by(&self, old_points: &[u64], new_points: &[u64]) -> bool {
        if old_points.len() != self.coefficients.len() || new_points.len() != self.coefficients.len()
        {
            return false;
        }
        within_limits(&self.lower_limits, &self.upper_limits, new_points)
            && self
                .coefficients
                .iter()
                .zip(old_points.iter().zip(new_points))
                .all(|(c, (old, new))| match c {
                    Some(AffineUpdate { a, b }) => {
                        *a as i128 * *old as i128 + *b as i128 == *new as i128
                    }
                    None => true,
                })
    }
}

impl SpendDeductTree {
    pub fn points(leaf: TokenPointsLeaf) -> Self {
        Self::TokenPoints(leaf)
    }

    pub fn update(leaf: TokenUpdateLeaf) -> Self {
        Self::TokenUpdate(leaf)
    }

    pub fn and(left: Self, right: Self) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Self, right: Self) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    /// Checks the vector sizes of all leaves and that every limit is consistent and representable
    /// in `range_bits` bits
    pub fn validate(&self, dimension: usize, range_bits: u8) -> Result<()> {
        match self {
            Self::TokenPoints(leaf) => {
                check_len(dimension, leaf.lower_limits.len())?;
                check_len(dimension, leaf.upper_limits.len())?;
                check_limits(&leaf.lower_limits, &leaf.upper_limits, range_bits)
            }
            Self::TokenUpdate(leaf) => {
                check_len(dimension, leaf.lower_limits.len())?;
                check_len(dimension, leaf.upper_limits.len())?;
                check_len(dimension, leaf.coefficients.len())?;
                check_limits(&leaf.lower_limits, &leaf.upper_limits, range_bits)
            }
            Self::And(l, r) | Self::Or(l, r) => {
                l.validate(dimension, range_bits)?;
                r.validate(dimension, range_bits)
            }
        }
    }

    /// Evaluates the policy on plain point vectors
    pub fn is_satisfied_by(&self, old_points: &[u64], new_points: &[u64]) -> bool {
        match self {
            Self::TokenPoints(leaf) => leaf.is_satisfied_by(old_points),
            Self::TokenUpdate(leaf) => leaf.is_satisfied_by(old_points, new_points),
            Self::And(l, r) => {
                l.is_satisfied_by(old_points, new_points) && r.is_satisfied_by(old_points, new_points)
            }
            Self::Or(l, r) => {
                l.is_satisfied_by(old_points, new_points) || r.is_satisfied_by(old_points, new_points)
            }
        }
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Sets `values[index]`, padding with `None` if `values` is too short
fn set_at<T: Clone>(values: &mut Vec<Option<T>>, index: usize, value: Option<T>) {
    if index >= values.len() {
        values.resize(index + 1, None);
    }
    values[index] = value;
}

fn within_limits(lower: &[Option<u64>], upper: &[Option<u64>], points: &[u64]) -> bool {
    if lower.len() != points.len() || upper.len() != points.len() {
        return false;
    }
    points
        .iter()
        .zip(lower.iter().zip(upper))
        .all(|(v, (lo, hi))| lo.map_or(true, |lo| *v >= lo) && hi.map_or(true, |hi| *v <= hi))
}

fn check_len(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(IncentiveError::DimensionMismatch { expected, found });
    }
    Ok(())
}

fn check_limits(lower: &[Option<u64>], upper: &[Option<u64>], range_bits: u8) -> Result<()> {
    for (i, (lo, hi)) in lower.iter().zip(upper).enumerate() {
        if let (Some(lo), Some(hi)) = (lo, hi) {
            if lo > hi {
                return Err(IncentiveError::MalformedPolicy(format!(
                    "lower limit {} exceeds upper limit {} for point {}",
                    lo, hi, i
                )));
            }
        }
        for limit in [lo, hi].into_iter().flatten() {
            if range_bits < 64 && (*limit >> range_bits) != 0 {
                return Err(IncentiveError::MalformedPolicy(format!(
                    "limit {} for point {} does not fit in {} bits",
                    limit, i, range_bits
                )));
            }
        }
    }
    Ok(())
}

/// Pedersen commitments to each point of the old and the new token
pub(crate) struct PointCommitments<'a, G: AffineRepr> {
    pub old: &'a [G],
    pub new: &'a [G],
}

/// Openings of `PointCommitments`
pub(crate) struct PointOpenings<'a, F> {
    pub old_values: &'a [F],
    pub old_randomness: &'a [F],
    pub new_values: &'a [F],
    pub new_randomness: &'a [F],
}

/// Result of compiling a policy on the prover side
pub(crate) struct CompiledPolicy<G: AffineRepr> {
    pub statement: SigmaStatement<G>,
    /// Bit commitments of each range claim in compilation order. Sent to the verifier.
    pub bit_commitments: Vec<Vec<G>>,
    pub witnesses: LeafWitnesses<G::ScalarField>,
}

#[derive(Clone, Copy)]
enum Point {
    Old(usize),
    New(usize),
}

/// Turns the claims of leaves into statements. Implemented differently by prover and verifier.
trait ClaimCompiler<G: AffineRepr> {
    fn range(&mut self, claim: RangeClaim<G>, point: Point) -> Result<SigmaStatement<G>>;
    fn update(&mut self, claim: AffineUpdateClaim<G>, index: usize) -> Result<SigmaStatement<G>>;
}

struct ProverCompiler<'a, G: AffineRepr, R: RngCore> {
    rng: &'a mut R,
    openings: &'a PointOpenings<'a, G::ScalarField>,
    bit_commitments: Vec<Vec<G>>,
    witnesses: LeafWitnesses<G::ScalarField>,
}

struct VerifierCompiler<'a, G: AffineRepr> {
    bit_commitments: ark_std::slice::Iter<'a, Vec<G>>,
}

impl<'a, G: AffineRepr, R: RngCore> ClaimCompiler<G> for ProverCompiler<'a, G, R> {
    fn range(&mut self, claim: RangeClaim<G>, point: Point) -> Result<SigmaStatement<G>> {
        let (value, randomness) = match point {
            Point::Old(i) => (
                &self.openings.old_values[i],
                &self.openings.old_randomness[i],
            ),
            Point::New(i) => (
                &self.openings.new_values[i],
                &self.openings.new_randomness[i],
            ),
        };
        // A false claim still needs bit commitments in case it is in a simulated OR branch
        let (comms, statement, witnesses) =
            match claim.prover_statement(self.rng, value, randomness) {
                Ok(s) => s,
                Err(SigmaError::ValueOutOfRange) => claim.unsatisfied_prover_statement(self.rng)?,
                Err(e) => return Err(e.into()),
            };
        self.bit_commitments.push(comms);
        self.witnesses.extend(witnesses);
        Ok(statement)
    }

    fn update(&mut self, claim: AffineUpdateClaim<G>, index: usize) -> Result<SigmaStatement<G>> {
        let statement = claim.statement()?;
        match claim.witness(
            &self.openings.old_values[index],
            &self.openings.old_randomness[index],
            &self.openings.new_values[index],
            &self.openings.new_randomness[index],
        ) {
            Ok(w) => self.witnesses.extend(w),
            Err(SigmaError::UnsatisfiedRelation) => self.witnesses.push(None),
            Err(e) => return Err(e.into()),
        }
        Ok(statement)
    }
}

impl<'a, G: AffineRepr> ClaimCompiler<G> for VerifierCompiler<'a, G> {
    fn range(&mut self, claim: RangeClaim<G>, _point: Point) -> Result<SigmaStatement<G>> {
        let comms = self
            .bit_commitments
            .next()
            .ok_or(IncentiveError::InvalidSpendProof)?;
        claim
            .verifier_statement(comms)
            .map_err(|_| IncentiveError::InvalidSpendProof)
    }

    fn update(&mut self, claim: AffineUpdateClaim<G>, _index: usize) -> Result<SigmaStatement<G>> {
        Ok(claim.statement()?)
    }
}

impl SpendDeductTree {
    /// Statement, bit commitments and leaf witnesses for the policy. The statement is created even if
    /// the points don't satisfy the policy, proving it will then fail.
    pub(crate) fn compile_for_prover<E: Pairing, R: RngCore>(
        &self,
        rng: &mut R,
        params: &PublicParameters<E>,
        commitments: &PointCommitments<E::G1Affine>,
        openings: &PointOpenings<E::ScalarField>,
    ) -> Result<CompiledPolicy<E::G1Affine>> {
        let mut compiler = ProverCompiler {
            rng,
            openings,
            bit_commitments: Vec::new(),
            witnesses: Vec::new(),
        };
        let statement = self.compile(params, commitments, &mut compiler)?;
        Ok(CompiledPolicy {
            statement,
            bit_commitments: compiler.bit_commitments,
            witnesses: compiler.witnesses,
        })
    }

    /// Statement for the policy using the bit commitments sent by the prover
    pub(crate) fn compile_for_verifier<E: Pairing>(
        &self,
        params: &PublicParameters<E>,
        commitments: &PointCommitments<E::G1Affine>,
        bit_commitments: &[Vec<E::G1Affine>],
    ) -> Result<SigmaStatement<E::G1Affine>> {
        let mut compiler = VerifierCompiler {
            bit_commitments: bit_commitments.iter(),
        };
        let statement = self.compile(params, commitments, &mut compiler)?;
        if compiler.bit_commitments.next().is_some() {
            return Err(IncentiveError::InvalidSpendProof);
        }
        Ok(statement)
    }

    fn compile<E: Pairing, C: ClaimCompiler<E::G1Affine>>(
        &self,
        params: &PublicParameters<E>,
        commitments: &PointCommitments<E::G1Affine>,
        compiler: &mut C,
    ) -> Result<SigmaStatement<E::G1Affine>> {
        let key = &params.pedersen_key;
        let bits = params.config.range_bits;
        match self {
            Self::TokenPoints(leaf) => {
                let mut children = Vec::new();
                compile_limits(
                    key,
                    bits,
                    commitments.old,
                    &leaf.lower_limits,
                    &leaf.upper_limits,
                    Point::Old,
                    compiler,
                    &mut children,
                )?;
                Ok(SigmaStatement::and(children))
            }
            Self::TokenUpdate(leaf) => {
                let mut children = Vec::new();
                compile_limits(
                    key,
                    bits,
                    commitments.new,
                    &leaf.lower_limits,
                    &leaf.upper_limits,
                    Point::New,
                    compiler,
                    &mut children,
                )?;
                for (i, coefficients) in leaf.coefficients.iter().enumerate() {
                    if let Some(AffineUpdate { a, b }) = coefficients {
                        let claim = AffineUpdateClaim {
                            key: key.clone(),
                            old_commitment: commitments.old[i],
                            new_commitment: commitments.new[i],
                            a: field_elem_from_i64(*a),
                            b: field_elem_from_i64(*b),
                        };
                        children.push(compiler.update(claim, i)?);
                    }
                }
                Ok(SigmaStatement::and(children))
            }
            Self::And(l, r) => {
                let left = l.compile(params, commitments, compiler)?;
                let right = r.compile(params, commitments, compiler)?;
                Ok(SigmaStatement::and(vec![left, right]))
            }
            Self::Or(l, r) => {
                let left = l.compile(params, commitments, compiler)?;
                let right = r.compile(params, commitments, compiler)?;
                Ok(SigmaStatement::or(left, right))
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn compile_limits<G: AffineRepr, C: ClaimCompiler<G>>(
    key: &PedersenCommitmentKey<G>,
    bits: u8,
    commitments: &[G],
    lower_limits: &[Option<u64>],
    upper_limits: &[Option<u64>],
    point: fn(usize) -> Point,
    compiler: &mut C,
    children: &mut Vec<SigmaStatement<G>>,
) -> Result<()> {
    for (i, (lo, hi)) in lower_limits.iter().zip(upper_limits).enumerate() {
        if let Some(lo) = lo {
            let claim = RangeClaim::lower_bound(
                key.clone(),
                commitments[i],
                G::ScalarField::from(*lo),
                bits,
            );
            children.push(compiler.range(claim, point(i))?);
        }
        if let Some(hi) = hi {
            let claim = RangeClaim::upper_bound(
                key.clone(),
                commitments[i],
                G::ScalarField::from(*hi),
                bits,
            );
            children.push(compiler.range(claim, point(i))?);
        }
    }
    Ok(())
}
