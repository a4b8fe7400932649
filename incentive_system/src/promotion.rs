use crate::{
    error::{IncentiveError, Result},
    setup::PublicParameters,
};
use ark_ec::pairing::Pairing;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::{Deserialize, Serialize};

/// A promotion run by the provider. Tokens of different promotions are independent of each other.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    CanonicalSerialize,
    CanonicalDeserialize,
    Serialize,
    Deserialize,
)]
pub struct PromotionParameters {
    pub promotion_id: u64,
    /// Number of point types a token of this promotion holds
    pub point_dimension: u32,
}

impl PromotionParameters {
    pub fn new<E: Pairing>(
        promotion_id: u64,
        point_dimension: u32,
        params: &PublicParameters<E>,
    ) -> Result<Self> {
        let promotion = Self {
            promotion_id,
            point_dimension,
        };
        promotion.validate(params)?;
        Ok(promotion)
    }

    pub fn validate<E: Pairing>(&self, params: &PublicParameters<E>) -> Result<()> {
        if self.point_dimension == 0 {
            return Err(IncentiveError::InvalidConfig(
                "point dimension of a promotion must be non-zero".into(),
            ));
        }
        if self.point_dimension > params.config.max_point_dimension {
            return Err(IncentiveError::UnsupportedPointDimension(
                self.point_dimension as usize,
                params.config.max_point_dimension as usize,
            ));
        }
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.point_dimension as usize
    }

    pub(crate) fn check_id(&self, promotion_id: u64) -> Result<()> {
        if self.promotion_id != promotion_id {
            return Err(IncentiveError::PromotionMismatch {
                expected: self.promotion_id,
                found: promotion_id,
            });
        }
        Ok(())
    }

    pub(crate) fn check_dimension(&self, found: usize) -> Result<()> {
        if found != self.dimension() {
            return Err(IncentiveError::DimensionMismatch {
                expected: self.dimension(),
                found,
            });
        }
        Ok(())
    }
}
