use ark_serialize::SerializationError;
use incentive_utils::{digits::DigitError, elgamal::DecryptionError, prf::InvalidLength};
use sigma_proofs::SigmaError;
use sps_eq::error::SpsEqError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IncentiveError {
    #[error("Invalid system configuration: {0}")]
    InvalidConfig(String),
    #[error("Token belongs to promotion {found} but promotion {expected} was used")]
    PromotionMismatch { expected: u64, found: u64 },
    #[error("Expected {expected} elements but found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Point dimension {0} is larger than the provider key supports ({1})")]
    UnsupportedPointDimension(usize, usize),
    #[error("Genesis signature on the user public key is invalid")]
    InvalidGenesisSignature,
    #[error("Signature on the token commitment is invalid")]
    InvalidSignature,
    #[error("Token does not open the signed commitment")]
    InvalidToken,
    #[error("Proof of the join request did not verify")]
    InvalidJoinProof,
    #[error("Proof of the spend request did not verify")]
    InvalidSpendProof,
    #[error("Earn request is invalid: {0}")]
    InvalidEarnRequest(&'static str),
    #[error("Malformed spend policy: {0}")]
    MalformedPolicy(String),
    #[error("Token points do not satisfy the spend policy")]
    PolicyNotSatisfied,
    #[error("Points overflow on earning")]
    PointsOverflow,
    #[error("New points must be less than 2^{0}")]
    PointsOutOfRange(u8),
    #[error("Double spending detected for dsid {0}")]
    DoubleSpendingDetected(String),
    #[error("Unknown transaction {0}")]
    UnknownTransaction(String),
    #[error("Unknown dsid {0}")]
    UnknownDsid(String),
    #[error("Double spending graph lock is poisoned")]
    LockPoisoned,
    #[error("PRF output length is invalid")]
    Prf,
    #[error("Digit decomposition failed: {0:?}")]
    Digit(DigitError),
    #[error("Decryption of the trace ciphertexts failed: {0:?}")]
    Decryption(DecryptionError),
    #[error("Sigma protocol error: {0:?}")]
    Sigma(SigmaError),
    #[error("SPS-EQ signature error: {0:?}")]
    SpsEq(SpsEqError),
    #[error("Serialization error: {0}")]
    Serialization(SerializationError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = IncentiveError> = core::result::Result<T, E>;

impl From<SerializationError> for IncentiveError {
    fn from(e: SerializationError) -> Self {
        Self::Serialization(e)
    }
}

impl From<SigmaError> for IncentiveError {
    fn from(e: SigmaError) -> Self {
        Self::Sigma(e)
    }
}

impl From<SpsEqError> for IncentiveError {
    fn from(e: SpsEqError) -> Self {
        Self::SpsEq(e)
    }
}

impl From<DigitError> for IncentiveError {
    fn from(e: DigitError) -> Self {
        Self::Digit(e)
    }
}

impl From<DecryptionError> for IncentiveError {
    fn from(e: DecryptionError) -> Self {
        Self::Decryption(e)
    }
}

impl From<InvalidLength> for IncentiveError {
    fn from(_: InvalidLength) -> Self {
        Self::Prf
    }
}
