//! Boolean composition of linear Sigma protocols.
//!
//! A `SigmaStatement` is a tree whose leaves are `LinearRelation`s. An `And` node proves all of its
//! children under the same challenge. An `Or` node proves at least one of its two children: the
//! prover runs the protocol for a child it holds a witness for and simulates a transcript for the
//! other one, and the two branch challenges must add up to the challenge of the node. Only the left
//! challenge is part of the proof, the right one is derived by the verifier, so a proof looks the same
//! whichever branch was real.
//!
//! The prover supplies one optional witness vector per leaf, in depth first order of the tree. A
//! missing or wrong witness simply makes that leaf false. Proving fails with
//! `SigmaError::UnsatisfiedStatement` if the tree as a whole is false, so a proof that cannot verify
//! is never produced.
//!
//! The protocol is made non-interactive with Fiat-Shamir: the challenge is the hash of a context
//! string, the statement and all first messages.

use crate::{
    compute_random_oracle_challenge,
    error::SigmaError,
    linear::{random_blindings, LinearProof, LinearRelation},
    ChallengeContributor,
};
use ark_ec::AffineRepr;
use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, SerializationError, Valid, Validate,
};
use ark_std::{
    boxed::Box,
    io::{Read, Write},
    rand::RngCore,
    vec,
    vec::Vec,
    UniformRand,
};
use digest::Digest;
use incentive_utils::serde_utils::ArkObjectBytes;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use zeroize::Zeroize;

/// Witnesses of all leaves of a statement, depth first
pub type LeafWitnesses<F> = Vec<Option<Vec<F>>>;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SigmaStatement<G: AffineRepr> {
    Leaf(LinearRelation<G>),
    And(Vec<SigmaStatement<G>>),
    Or(Box<SigmaStatement<G>>, Box<SigmaStatement<G>>),
}

#[serde_as]
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub enum SigmaProof<G: AffineRepr> {
    Leaf(LinearProof<G>),
    And(Vec<SigmaProof<G>>),
    Or {
        #[serde_as(as = "ArkObjectBytes")]
        left_challenge: G::ScalarField,
        left: Box<SigmaProof<G>>,
        right: Box<SigmaProof<G>>,
    },
}

/// Prover state of a subtree after the first message
enum ProverNode<G: AffineRepr> {
    /// Leaf for which the protocol is run honestly. The response is computed once the challenge is known.
    Leaf {
        relation_blindings: Vec<G::ScalarField>,
        witness: Vec<G::ScalarField>,
        t: Vec<G>,
    },
    And(Vec<ProverNode<G>>),
    /// Exactly one of the children is real
    Or(Box<ProverNode<G>>, Box<ProverNode<G>>),
    /// Completely simulated subtree along with the challenge it was simulated for
    Simulated(SigmaProof<G>, G::ScalarField),
}

impl<G: AffineRepr> SigmaStatement<G> {
    pub const CHALLENGE_DST: &'static [u8] = b"SIGMA-STATEMENT-CHALLENGE";

    pub fn leaf(relation: LinearRelation<G>) -> Self {
        Self::Leaf(relation)
    }

    pub fn and(children: Vec<Self>) -> Self {
        Self::And(children)
    }

    pub fn or(left: Self, right: Self) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    /// A statement that is always true. It has no leaves.
    pub fn trivial() -> Self {
        Self::And(Vec::new())
    }

    pub fn num_leaves(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::And(c) => c.iter().map(|s| s.num_leaves()).sum(),
            Self::Or(l, r) => l.num_leaves() + r.num_leaves(),
        }
    }

    /// Evaluates the Boolean formula where a leaf is true iff its witness is given and satisfies it.
    pub fn is_satisfied_by(&self, witnesses: &[Option<Vec<G::ScalarField>>]) -> bool {
        if witnesses.len() != self.num_leaves() {
            return false;
        }
        self.is_satisfied_at(witnesses, 0)
    }

    fn is_satisfied_at(&self, witnesses: &[Option<Vec<G::ScalarField>>], offset: usize) -> bool {
        match self {
            Self::Leaf(rel) => matches!(&witnesses[offset], Some(w) if rel.is_satisfied_by(w)),
            Self::And(children) => {
                let mut offset = offset;
                children.iter().all(|c| {
                    let sat = c.is_satisfied_at(witnesses, offset);
                    offset += c.num_leaves();
                    sat
                })
            }
            Self::Or(l, r) => {
                l.is_satisfied_at(witnesses, offset)
                    || r.is_satisfied_at(witnesses, offset + l.num_leaves())
            }
        }
    }

    /// Create a non-interactive proof. `context` is bound into the challenge and the verifier must use the same.
    pub fn prove<R: RngCore, D: Digest>(
        &self,
        rng: &mut R,
        witnesses: &[Option<Vec<G::ScalarField>>],
        context: &[u8],
    ) -> Result<SigmaProof<G>, SigmaError> {
        if witnesses.len() != self.num_leaves() {
            return Err(SigmaError::WitnessCountMismatch(
                self.num_leaves(),
                witnesses.len(),
            ));
        }
        if !self.is_satisfied_at(witnesses, 0) {
            return Err(SigmaError::UnsatisfiedStatement);
        }
        let node = self.commit(rng, witnesses, 0)?;
        let mut t = Vec::new();
        node.collect_t(&mut t);
        let challenge = self.challenge::<D>(context, &t)?;
        node.respond(&challenge)
    }

    /// Verify a proof created by `prove` with the same `context`
    pub fn verify<D: Digest>(&self, proof: &SigmaProof<G>, context: &[u8]) -> Result<(), SigmaError> {
        let mut t = Vec::new();
        proof.collect_t(&mut t);
        let challenge = self.challenge::<D>(context, &t)?;
        self.verify_with_challenge(proof, &challenge)
    }

    /// Verify the proof for an externally chosen challenge, as in the interactive protocol
    pub fn verify_with_challenge(
        &self,
        proof: &SigmaProof<G>,
        challenge: &G::ScalarField,
    ) -> Result<(), SigmaError> {
        match (self, proof) {
            (Self::Leaf(rel), SigmaProof::Leaf(p)) => rel.verify(p, challenge),
            (Self::And(stmts), SigmaProof::And(proofs)) => {
                if stmts.len() != proofs.len() {
                    return Err(SigmaError::ProofShapeMismatch);
                }
                for (s, p) in stmts.iter().zip(proofs.iter()) {
                    s.verify_with_challenge(p, challenge)?;
                }
                Ok(())
            }
            (
                Self::Or(l, r),
                SigmaProof::Or {
                    left_challenge,
                    left,
                    right,
                },
            ) => {
                l.verify_with_challenge(left, left_challenge)?;
                r.verify_with_challenge(right, &(*challenge - left_challenge))
            }
            _ => Err(SigmaError::ProofShapeMismatch),
        }
    }

    /// Hash of `context`, the statement and the first messages `t`
    pub fn challenge<D: Digest>(
        &self,
        context: &[u8],
        t: &[G],
    ) -> Result<G::ScalarField, SigmaError> {
        let mut bytes = vec![];
        (context.len() as u64).serialize_compressed(&mut bytes)?;
        bytes.extend_from_slice(context);
        self.challenge_contribution(&mut bytes)?;
        for t_i in t {
            t_i.serialize_compressed(&mut bytes)?;
        }
        Ok(compute_random_oracle_challenge::<G::ScalarField, D>(
            Self::CHALLENGE_DST,
            &bytes,
        ))
    }

    /// First message for a subtree. Must only be called when the subtree is satisfied.
    fn commit<R: RngCore>(
        &self,
        rng: &mut R,
        witnesses: &[Option<Vec<G::ScalarField>>],
        offset: usize,
    ) -> Result<ProverNode<G>, SigmaError> {
        match self {
            Self::Leaf(rel) => {
                let witness = witnesses[offset]
                    .clone()
                    .ok_or(SigmaError::UnsatisfiedStatement)?;
                let relation_blindings = random_blindings(rng, rel.num_witnesses);
                let t = rel.commit(&relation_blindings)?;
                Ok(ProverNode::Leaf {
                    relation_blindings,
                    witness,
                    t,
                })
            }
            Self::And(children) => {
                let mut offset = offset;
                let mut nodes = Vec::with_capacity(children.len());
                for c in children {
                    nodes.push(c.commit(rng, witnesses, offset)?);
                    offset += c.num_leaves();
                }
                Ok(ProverNode::And(nodes))
            }
            Self::Or(l, r) => {
                let right_offset = offset + l.num_leaves();
                // The first true branch is the real one
                if l.is_satisfied_at(witnesses, offset) {
                    let c = G::ScalarField::rand(rng);
                    let sim = r.simulate(rng, &c)?;
                    Ok(ProverNode::Or(
                        Box::new(l.commit(rng, witnesses, offset)?),
                        Box::new(ProverNode::Simulated(sim, c)),
                    ))
                } else {
                    let c = G::ScalarField::rand(rng);
                    let sim = l.simulate(rng, &c)?;
                    Ok(ProverNode::Or(
                        Box::new(ProverNode::Simulated(sim, c)),
                        Box::new(r.commit(rng, witnesses, right_offset)?),
                    ))
                }
            }
        }
    }

    /// Transcript for the whole subtree with the given challenge without using any witness
    pub fn simulate<R: RngCore>(
        &self,
        rng: &mut R,
        challenge: &G::ScalarField,
    ) -> Result<SigmaProof<G>, SigmaError> {
        match self {
            Self::Leaf(rel) => Ok(SigmaProof::Leaf(rel.simulate(rng, challenge)?)),
            Self::And(children) => Ok(SigmaProof::And(
                children
                    .iter()
                    .map(|c| c.simulate(rng, challenge))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Self::Or(l, r) => {
                let left_challenge = G::ScalarField::rand(rng);
                let right_challenge = *challenge - left_challenge;
                Ok(SigmaProof::Or {
                    left_challenge,
                    left: Box::new(l.simulate(rng, &left_challenge)?),
                    right: Box::new(r.simulate(rng, &right_challenge)?),
                })
            }
        }
    }
}

impl<G: AffineRepr> ProverNode<G> {
    /// First messages in depth first order, left branch before right irrespective of which is real
    fn collect_t(&self, t: &mut Vec<G>) {
        match self {
            Self::Leaf { t: t_i, .. } => t.extend_from_slice(t_i),
            Self::And(children) => children.iter().for_each(|c| c.collect_t(t)),
            Self::Or(l, r) => {
                l.collect_t(t);
                r.collect_t(t);
            }
            Self::Simulated(p, _) => p.collect_t(t),
        }
    }

    fn respond(self, challenge: &G::ScalarField) -> Result<SigmaProof<G>, SigmaError> {
        match self {
            Self::Leaf {
                mut relation_blindings,
                mut witness,
                t,
            } => {
                let responses: Vec<G::ScalarField> = relation_blindings
                    .iter()
                    .zip(witness.iter())
                    .map(|(b, w)| *b + (*w * challenge))
                    .collect();
                relation_blindings.zeroize();
                witness.zeroize();
                Ok(SigmaProof::Leaf(LinearProof { t, responses }))
            }
            Self::And(children) => Ok(SigmaProof::And(
                children
                    .into_iter()
                    .map(|c| c.respond(challenge))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Self::Or(l, r) => match (*l, *r) {
                (Self::Simulated(left, left_challenge), real) => {
                    let right = real.respond(&(*challenge - left_challenge))?;
                    Ok(SigmaProof::Or {
                        left_challenge,
                        left: Box::new(left),
                        right: Box::new(right),
                    })
                }
                (real, Self::Simulated(right, right_challenge)) => {
                    let left_challenge = *challenge - right_challenge;
                    let left = real.respond(&left_challenge)?;
                    Ok(SigmaProof::Or {
                        left_challenge,
                        left: Box::new(left),
                        right: Box::new(right),
                    })
                }
                _ => Err(SigmaError::ProofShapeMismatch),
            },
            Self::Simulated(p, _) => Ok(p),
        }
    }
}

impl<G: AffineRepr> SigmaProof<G> {
    fn collect_t(&self, t: &mut Vec<G>) {
        match self {
            Self::Leaf(p) => t.extend_from_slice(&p.t),
            Self::And(children) => children.iter().for_each(|c| c.collect_t(t)),
            Self::Or { left, right, .. } => {
                left.collect_t(t);
                right.collect_t(t);
            }
        }
    }

    pub fn num_leaves(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::And(c) => c.iter().map(|p| p.num_leaves()).sum(),
            Self::Or { left, right, .. } => left.num_leaves() + right.num_leaves(),
        }
    }
}

impl<G: AffineRepr> ChallengeContributor for SigmaStatement<G> {
    fn challenge_contribution<W: Write>(&self, mut writer: W) -> Result<(), SigmaError> {
        self.write_contribution(&mut writer)
    }
}

impl<G: AffineRepr> SigmaStatement<G> {
    fn write_contribution<W: Write>(&self, writer: &mut W) -> Result<(), SigmaError> {
        match self {
            Self::Leaf(rel) => {
                LEAF_TAG.serialize_compressed(&mut *writer)?;
                rel.challenge_contribution(writer)
            }
            Self::And(children) => {
                AND_TAG.serialize_compressed(&mut *writer)?;
                (children.len() as u64).serialize_compressed(&mut *writer)?;
                for c in children {
                    c.write_contribution(writer)?;
                }
                Ok(())
            }
            Self::Or(l, r) => {
                OR_TAG.serialize_compressed(&mut *writer)?;
                l.write_contribution(writer)?;
                r.write_contribution(writer)
            }
        }
    }
}

impl<G: AffineRepr> ChallengeContributor for SigmaProof<G> {
    fn challenge_contribution<W: Write>(&self, mut writer: W) -> Result<(), SigmaError> {
        let mut t = Vec::new();
        self.collect_t(&mut t);
        for t_i in t {
            t_i.serialize_compressed(&mut writer)?;
        }
        Ok(())
    }
}

/// Deepest nesting of `And`/`Or` accepted when deserializing a proof
pub const MAX_PROOF_DEPTH: usize = 256;

const LEAF_TAG: u8 = 0;
const AND_TAG: u8 = 1;
const OR_TAG: u8 = 2;

impl<G: AffineRepr> CanonicalSerialize for SigmaProof<G> {
    fn serialize_with_mode<W: Write>(
        &self,
        mut writer: W,
        compress: Compress,
    ) -> Result<(), SerializationError> {
        self.serialize_to(&mut writer, compress)
    }

    fn serialized_size(&self, compress: Compress) -> usize {
        1 + match self {
            Self::Leaf(p) => p.serialized_size(compress),
            Self::And(children) => {
                8 + children
                    .iter()
                    .map(|c| c.serialized_size(compress))
                    .sum::<usize>()
            }
            Self::Or {
                left_challenge,
                left,
                right,
            } => {
                left_challenge.serialized_size(compress)
                    + left.as_ref().serialized_size(compress)
                    + right.as_ref().serialized_size(compress)
            }
        }
    }
}

impl<G: AffineRepr> SigmaProof<G> {
    /// A tag byte followed by the contents. Children of `And` are preceded by their count as `u64`.
    fn serialize_to<W: Write>(
        &self,
        writer: &mut W,
        compress: Compress,
    ) -> Result<(), SerializationError> {
        match self {
            Self::Leaf(p) => {
                LEAF_TAG.serialize_with_mode(&mut *writer, compress)?;
                p.serialize_with_mode(&mut *writer, compress)
            }
            Self::And(children) => {
                AND_TAG.serialize_with_mode(&mut *writer, compress)?;
                (children.len() as u64).serialize_with_mode(&mut *writer, compress)?;
                for c in children {
                    c.serialize_to(writer, compress)?;
                }
                Ok(())
            }
            Self::Or {
                left_challenge,
                left,
                right,
            } => {
                OR_TAG.serialize_with_mode(&mut *writer, compress)?;
                left_challenge.serialize_with_mode(&mut *writer, compress)?;
                left.serialize_to(writer, compress)?;
                right.serialize_to(writer, compress)
            }
        }
    }

    /// Inverse of `serialize_to`. Fails when the proof is nested deeper than `depth`.
    fn deserialize_from<R: Read>(
        reader: &mut R,
        compress: Compress,
        validate: Validate,
        depth: usize,
    ) -> Result<Self, SerializationError> {
        let tag = u8::deserialize_with_mode(&mut *reader, compress, validate)?;
        match tag {
            LEAF_TAG => Ok(Self::Leaf(LinearProof::deserialize_with_mode(
                &mut *reader,
                compress,
                validate,
            )?)),
            AND_TAG | OR_TAG if depth == 0 => Err(SerializationError::InvalidData),
            AND_TAG => {
                let count = u64::deserialize_with_mode(&mut *reader, compress, validate)?;
                let mut children = Vec::new();
                for _ in 0..count {
                    children.push(Self::deserialize_from(reader, compress, validate, depth - 1)?);
                }
                Ok(Self::And(children))
            }
            OR_TAG => {
                let left_challenge =
                    G::ScalarField::deserialize_with_mode(&mut *reader, compress, validate)?;
                let left = Self::deserialize_from(reader, compress, validate, depth - 1)?;
                let right = Self::deserialize_from(reader, compress, validate, depth - 1)?;
                Ok(Self::Or {
                    left_challenge,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            _ => Err(SerializationError::InvalidData),
        }
    }
}

impl<G: AffineRepr> Valid for SigmaProof<G> {
    fn check(&self) -> Result<(), SerializationError> {
        match self {
            Self::Leaf(p) => p.check(),
            Self::And(children) => children.iter().try_for_each(|c| c.check()),
            Self::Or {
                left_challenge,
                left,
                right,
            } => {
                left_challenge.check()?;
                left.check()?;
                right.check()
            }
        }
    }
}

impl<G: AffineRepr> CanonicalDeserialize for SigmaProof<G> {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        Self::deserialize_from(&mut reader, compress, validate, MAX_PROOF_DEPTH)
    }
}
