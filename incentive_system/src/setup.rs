//! System wide configuration and the public parameters every party derives from it.

use crate::{
    error::{IncentiveError, Result},
    HashDigest,
};
use ark_ec::{pairing::Pairing, AffineRepr};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use incentive_utils::{
    commitment::PedersenCommitmentKey, concat_slices, digits::MAX_DIGIT_BIT_SIZE,
    hashing_utils::affine_group_elem_from_try_and_incr, serde_utils::ArkObjectBytes,
};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use sigma_proofs::range::MAX_RANGE_BITS;
use sps_eq::prelude::generator_pair_deterministic;

/// Tunable sizes of the system. Every party must use the same configuration.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    CanonicalSerialize,
    CanonicalDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(default)]
pub struct SystemConfig {
    /// Bit size of the digits of the secret key that is encrypted for tracing. The provider needs a
    /// table of `2^esk_digit_bits` elements to decrypt.
    pub esk_digit_bits: u8,
    /// Points and bounds in spend policies must be in `[0, 2^range_bits)`
    pub range_bits: u8,
    /// Largest number of point types a promotion can have
    pub max_point_dimension: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            esk_digit_bits: 8,
            range_bits: 32,
            max_point_dimension: 4,
        }
    }
}

impl SystemConfig {
    pub fn validate(&self) -> Result<()> {
        if self.esk_digit_bits == 0 || self.esk_digit_bits > MAX_DIGIT_BIT_SIZE {
            return Err(IncentiveError::InvalidConfig(format!(
                "esk_digit_bits must be in [1, {}], found {}",
                MAX_DIGIT_BIT_SIZE, self.esk_digit_bits
            )));
        }
        if self.range_bits == 0 || self.range_bits > MAX_RANGE_BITS {
            return Err(IncentiveError::InvalidConfig(format!(
                "range_bits must be in [1, {}], found {}",
                MAX_RANGE_BITS, self.range_bits
            )));
        }
        if self.max_point_dimension == 0 {
            return Err(IncentiveError::InvalidConfig(
                "max_point_dimension must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Parse a JSON configuration. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/// Group generators and commitment key shared by users, the provider and the double-spending detector.
/// All of them are derived from a public label so anyone can check how they were created.
#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct PublicParameters<E: Pairing> {
    #[serde_as(as = "ArkObjectBytes")]
    pub g1: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub g2: E::G2Affine,
    /// Base of user public keys and double-spending ids
    #[serde_as(as = "ArkObjectBytes")]
    pub w: E::G1Affine,
    /// Key for commitments to individual point values in spend proofs
    pub pedersen_key: PedersenCommitmentKey<E::G1Affine>,
    pub config: SystemConfig,
}

impl<E: Pairing> PublicParameters<E> {
    pub fn new(label: &[u8], config: SystemConfig) -> Result<Self> {
        config.validate()?;
        let (g1, g2) =
            generator_pair_deterministic::<E, HashDigest>(&concat_slices![label, b" : generators"]);
        let w = affine_group_elem_from_try_and_incr::<E::G1Affine, HashDigest>(&concat_slices![
            label, b" : W"
        ]);
        let pedersen_key = PedersenCommitmentKey::new::<HashDigest>(&concat_slices![
            label,
            b" : point commitments"
        ]);
        Ok(Self {
            g1,
            g2,
            w,
            pedersen_key,
            config,
        })
    }

    pub fn prepared_g2(&self) -> E::G2Prepared {
        E::G2Prepared::from(self.g2)
    }

    /// Number of ciphertexts encrypting the digits of a secret key
    pub fn esk_digit_count(&self) -> usize {
        incentive_utils::digits::digits_count::<E::ScalarField>(self.config.esk_digit_bits)
    }

    pub fn is_valid(&self) -> bool {
        !self.g1.is_zero()
            && !self.g2.is_zero()
            && !self.w.is_zero()
            && self.w != self.g1
            && self.config.validate().is_ok()
    }
}
