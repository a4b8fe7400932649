#![cfg_attr(not(feature = "std"), no_std)]
#![allow(non_snake_case)]

//! Structure preserving signatures on equivalence classes (SPS-EQ), the scheme from section 3 of
//! [Mercurial signatures](https://eprint.iacr.org/2018/923.pdf) with messages and signature in group G1
//! and public key in group G2.
//!
//! A signature on a vector of group elements `M` is also a signature on `M * mu` for any non-zero
//! scalar `mu`. `Signature::change_rep` moves a message-signature pair to a new random representative
//! of its class so that two uses of the same signature cannot be linked.

pub mod error;
pub mod signature;
pub mod util;

pub mod prelude {
    pub use crate::{
        error::SpsEqError,
        signature::{PreparedVerificationKey, Signature, SigningKey, VerificationKey},
        util::{generator_pair, generator_pair_deterministic, GeneratorPair},
    };
}
