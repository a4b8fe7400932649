//! Schnorr protocol for a system of linear equations over group elements. Each equation has the form
//! `target = bases[0] * x[i_0] + bases[1] * x[i_1] + ...` where `x` is a vector of witnesses shared
//! by all equations of the relation. Sharing witnesses across equations is what ties several claims,
//! like a commitment opening and a public key, to the same secret.

use crate::{error::SigmaError, ChallengeContributor};
use ark_ec::{AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{cfg_iter, io::Write, rand::RngCore, vec::Vec, UniformRand};
use incentive_utils::serde_utils::ArkObjectBytes;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LinearEquation<G: AffineRepr> {
    pub target: G,
    /// Pairs of (witness index, base)
    pub terms: Vec<(usize, G)>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LinearRelation<G: AffineRepr> {
    pub num_witnesses: usize,
    pub equations: Vec<LinearEquation<G>>,
}

/// First message and responses of the protocol for a `LinearRelation`. There is one `t` per
/// equation and one response per witness.
#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct LinearProof<G: AffineRepr> {
    #[serde_as(as = "Vec<ArkObjectBytes>")]
    pub t: Vec<G>,
    #[serde_as(as = "Vec<ArkObjectBytes>")]
    pub responses: Vec<G::ScalarField>,
}

impl<G: AffineRepr> LinearEquation<G> {
    /// `sum(bases[j] * scalars[idx_j])`
    pub fn evaluate(&self, scalars: &[G::ScalarField]) -> G::Group {
        let (bases, s): (Vec<G>, Vec<G::ScalarField>) = self
            .terms
            .iter()
            .map(|(i, b)| (*b, scalars[*i]))
            .unzip();
        G::Group::msm_unchecked(&bases, &s)
    }
}

impl<G: AffineRepr> LinearRelation<G> {
    pub fn new(num_witnesses: usize) -> Self {
        Self {
            num_witnesses,
            equations: Vec::new(),
        }
    }

    /// Add equation `target = sum(base_j * x[idx_j])`
    pub fn add_equation(&mut self, target: G, terms: Vec<(usize, G)>) -> Result<(), SigmaError> {
        for (i, _) in &terms {
            if *i >= self.num_witnesses {
                return Err(SigmaError::IndexOutOfBounds(*i, self.num_witnesses));
            }
        }
        self.equations.push(LinearEquation { target, terms });
        Ok(())
    }

    pub fn num_equations(&self) -> usize {
        self.equations.len()
    }

    pub fn is_satisfied_by(&self, witnesses: &[G::ScalarField]) -> bool {
        if witnesses.len() != self.num_witnesses {
            return false;
        }
        cfg_iter!(self.equations).all(|e| e.evaluate(witnesses).into_affine() == e.target)
    }

    /// Step 1 of the protocol: `t_i = sum(bases_j * blindings[idx_j])` for each equation `i`
    pub fn commit(&self, blindings: &[G::ScalarField]) -> Result<Vec<G>, SigmaError> {
        self.check_size(blindings.len())?;
        let t = cfg_iter!(self.equations)
            .map(|e| e.evaluate(blindings))
            .collect::<Vec<_>>();
        Ok(G::Group::normalize_batch(&t))
    }

    /// Responses `response[i] = blindings[i] + witnesses[i] * challenge`
    pub fn respond(
        &self,
        blindings: &[G::ScalarField],
        witnesses: &[G::ScalarField],
        challenge: &G::ScalarField,
    ) -> Result<Vec<G::ScalarField>, SigmaError> {
        self.check_size(blindings.len())?;
        self.check_size(witnesses.len())?;
        Ok(cfg_iter!(blindings)
            .zip(cfg_iter!(witnesses))
            .map(|(b, w)| *b + (*w * challenge))
            .collect())
    }

    /// The first message that makes `responses` valid for `challenge`:
    /// `t_i = sum(bases_j * responses[idx_j]) - target_i * challenge`
    pub fn simulate_commitment(
        &self,
        responses: &[G::ScalarField],
        challenge: &G::ScalarField,
    ) -> Result<Vec<G>, SigmaError> {
        self.check_size(responses.len())?;
        let t = cfg_iter!(self.equations)
            .map(|e| e.evaluate(responses) - e.target * challenge)
            .collect::<Vec<_>>();
        Ok(G::Group::normalize_batch(&t))
    }

    /// Random responses with the matching first message
    pub fn simulate<R: RngCore>(
        &self,
        rng: &mut R,
        challenge: &G::ScalarField,
    ) -> Result<LinearProof<G>, SigmaError> {
        let responses = (0..self.num_witnesses)
            .map(|_| G::ScalarField::rand(rng))
            .collect::<Vec<_>>();
        let t = self.simulate_commitment(&responses, challenge)?;
        Ok(LinearProof { t, responses })
    }

    /// Create a proof with the given blindings for a challenge that is already known
    pub fn prove_with_given_blindings(
        &self,
        blindings: &[G::ScalarField],
        witnesses: &[G::ScalarField],
        challenge: &G::ScalarField,
    ) -> Result<LinearProof<G>, SigmaError> {
        Ok(LinearProof {
            t: self.commit(blindings)?,
            responses: self.respond(blindings, witnesses, challenge)?,
        })
    }

    /// Checks `sum(bases_j * responses[idx_j]) == t_i + target_i * challenge` for each equation
    pub fn verify(
        &self,
        proof: &LinearProof<G>,
        challenge: &G::ScalarField,
    ) -> Result<(), SigmaError> {
        if proof.t.len() != self.equations.len() {
            return Err(SigmaError::ExpectedSameSizeSequences(
                proof.t.len(),
                self.equations.len(),
            ));
        }
        self.check_size(proof.responses.len())?;
        let valid = cfg_iter!(self.equations)
            .zip(cfg_iter!(proof.t))
            .all(|(e, t)| e.evaluate(&proof.responses) == e.target * challenge + t.into_group());
        if valid {
            Ok(())
        } else {
            Err(SigmaError::InvalidResponse)
        }
    }

    fn check_size(&self, size: usize) -> Result<(), SigmaError> {
        if size != self.num_witnesses {
            return Err(SigmaError::ExpectedSameSizeSequences(
                size,
                self.num_witnesses,
            ));
        }
        Ok(())
    }
}

impl<G: AffineRepr> ChallengeContributor for LinearRelation<G> {
    /// Writes the shape of the relation and all its group elements
    fn challenge_contribution<W: Write>(&self, mut writer: W) -> Result<(), SigmaError> {
        (self.num_witnesses as u64).serialize_compressed(&mut writer)?;
        (self.equations.len() as u64).serialize_compressed(&mut writer)?;
        for e in &self.equations {
            e.target.serialize_compressed(&mut writer)?;
            (e.terms.len() as u64).serialize_compressed(&mut writer)?;
            for (i, b) in &e.terms {
                (*i as u64).serialize_compressed(&mut writer)?;
                b.serialize_compressed(&mut writer)?;
            }
        }
        Ok(())
    }
}

impl<G: AffineRepr> ChallengeContributor for LinearProof<G> {
    fn challenge_contribution<W: Write>(&self, mut writer: W) -> Result<(), SigmaError> {
        for t in &self.t {
            t.serialize_compressed(&mut writer)?;
        }
        Ok(())
    }
}

/// Blindings for a relation with `count` witnesses
pub fn random_blindings<F: PrimeField, R: RngCore>(rng: &mut R, count: usize) -> Vec<F> {
    (0..count).map(|_| F::rand(rng)).collect()
}
