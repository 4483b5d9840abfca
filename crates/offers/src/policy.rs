use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, Money};

/// Minimum acceptable offer, as a percentage of the snapshot list price.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferFloor {
    percent: u32,
}

impl OfferFloor {
    pub const DEFAULT_PERCENT: u32 = 50;

    pub fn new(percent: u32) -> DomainResult<Self> {
        if percent > 100 {
            return Err(DomainError::validation(
                "offer floor percent must be between 0 and 100",
            ));
        }
        Ok(Self { percent })
    }

    pub fn percent(&self) -> u32 {
        self.percent
    }

    pub fn minimum(&self, original_price: Money) -> Money {
        original_price.percent(self.percent)
    }

    /// Reject offers below the floor.
    pub fn check(&self, offer_price: Money, original_price: Money) -> DomainResult<()> {
        let minimum = self.minimum(original_price);
        if offer_price < minimum {
            return Err(DomainError::validation(format!(
                "offer price {offer_price} is below the minimum of {minimum} ({}% of {original_price})",
                self.percent
            )));
        }
        Ok(())
    }
}

impl Default for OfferFloor {
    fn default() -> Self {
        Self {
            percent: Self::DEFAULT_PERCENT,
        }
    }
}
