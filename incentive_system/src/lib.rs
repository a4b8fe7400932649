#![allow(non_snake_case)]

//! An incentive system with anonymous, reloadable loyalty tokens.
//!
//! A user holds a token per promotion: a commitment to their secret key, a fresh per-token secret
//! and a vector of points, signed by the provider with an SPS-EQ signature. Because the signature
//! can be moved to any representative of the commitment's equivalence class, the user can show a
//! blinded version of the token each time and two interactions with the same token cannot be linked.
//!
//! - [`join`]: the user obtains a first token with zero points
//! - [`earn`]: the provider adds points to a token without learning its content
//! - [`spend`]: the user proves in zero knowledge that the token satisfies a spend policy
//!   ([`policy`]) and receives a new token with updated points. The old token's double-spending id
//!   is revealed and a double-spending tag ([`tag`]) is recorded.
//! - [`graph`]: the double-spending detector. Two spends of the same token reveal the user's
//!   secret key and all tokens derived from the double-spent one are traced and invalidated.
//!
//! All protocols are generic over the pairing. Hashes use Blake2b-512.

use blake2::Blake2b512;

pub mod earn;
pub mod error;
pub mod graph;
pub mod join;
pub mod keys;
pub mod policy;
pub mod promotion;
pub mod setup;
pub mod spend;
pub mod tag;
pub mod token;
mod util;

/// Hash function used for challenges, hashing to curve and the transaction hash `gamma`
pub type HashDigest = Blake2b512;

pub mod prelude {
    pub use crate::{
        earn::{EarnRequest, EarnResponse},
        error::{IncentiveError, Result},
        graph::{
            DoubleSpendEvidence, DoubleSpendingGraph, SharedDoubleSpendingGraph, SyncReport,
            TokenStatus, TransactionInfo,
        },
        join::{JoinRequest, JoinResponse, PendingJoin},
        keys::{ProviderKeyPair, ProviderPublicKey, UserKeyPair, UserPublicKey, UserSecretKey},
        policy::{AffineUpdate, SpendDeductTree, TokenPointsLeaf, TokenUpdateLeaf},
        promotion::PromotionParameters,
        setup::{PublicParameters, SystemConfig},
        spend::{PendingSpend, SpendInstance, SpendRequest, SpendResponse, SpendTransaction},
        tag::DoubleSpendingTag,
        token::{Token, TransactionId},
    };
}
