#![cfg_attr(not(feature = "std"), no_std)]

//! Sigma protocols to prove knowledge of witnesses of linear relations among group elements, and
//! their composition into arbitrary AND/OR formulas. Refer <https://crypto.stanford.edu/cs355/19sp/lec5.pdf>
//! for the basic protocol and [Cramer, Damgard, Schoenmakers](https://link.springer.com/chapter/10.1007/3-540-48658-5_19)
//! for the OR composition.
//!
//! - [`linear`]: a system of linear equations sharing witnesses, proven with one Schnorr protocol
//! - [`composite`]: trees of such relations combined with AND and OR, made non-interactive with Fiat-Shamir
//! - [`range`]: relations for Pedersen committed values, proving `a * v + b` is in `[0, 2^n)` and that two
//!   committed values satisfy `v' = a * v + b`

use ark_ff::PrimeField;
use ark_std::io::Write;
use digest::Digest;
use incentive_utils::hashing_utils::hash_to_field;

pub mod composite;
pub mod error;
pub mod linear;
pub mod range;

pub use composite::{LeafWitnesses, SigmaProof, SigmaStatement};
pub use error::SigmaError;
pub use linear::{LinearEquation, LinearProof, LinearRelation};

/// Trait implemented by Sigma protocol statements and proofs for returning their contribution to the overall challenge.
pub trait ChallengeContributor {
    fn challenge_contribution<W: Write>(&self, writer: W) -> Result<(), SigmaError>;
}

/// Hash the challenge bytes to a field element. The domain separation tag keeps challenges of
/// different protocols apart.
pub fn compute_random_oracle_challenge<F: PrimeField, D: Digest>(dst: &[u8], challenge_bytes: &[u8]) -> F {
    hash_to_field::<F, D>(dst, challenge_bytes)
}
