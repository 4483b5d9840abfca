//! Value objects: equality by value, not identity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are domain objects that are **immutable** and **compared by value**.
/// Two `Money` amounts of `100` are equal no matter where they came from; two
/// devices with the same name are still different devices.
///
/// The trait requires:
/// - **Clone**: value objects are cheap to copy
/// - **PartialEq**: compared by their attribute values
/// - **Debug**: helpful for logging and tests
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A monetary amount in the store currency.
///
/// Backed by a decimal so list prices like `3899.99` stay exact through
/// multiplication and summation.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build a strictly positive amount.
    pub fn positive(amount: Decimal, field: &str) -> DomainResult<Self> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation(format!("{field} must be positive")));
        }
        Ok(Self(amount))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Line total: `self × quantity`. Fails instead of overflowing.
    pub fn times(self, quantity: i64) -> DomainResult<Money> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::validation(format!("amount {self} × {quantity} is too large")))
    }

    pub fn checked_add(self, rhs: Money) -> DomainResult<Money> {
        self.0
            .checked_add(rhs.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation(format!("amount {self} + {rhs} is too large")))
    }

    /// Sum of `amounts`, failing on overflow.
    pub fn total<I>(amounts: I) -> DomainResult<Money>
    where
        I: IntoIterator<Item = DomainResult<Money>>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, amount| acc.checked_add(amount?))
    }

    /// `percent`% of this amount; never larger than `self` for `percent <= 100`.
    pub fn percent(self, percent: u32) -> Money {
        Money(self.0 * Decimal::new(i64::from(percent), 2))
    }
}

/// Quantities on cart lines, offers and reservation items are positive integers.
pub fn ensure_positive_quantity(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }
    Ok(())
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_rejects_zero_and_negative() {
        assert!(Money::positive(Decimal::ZERO, "price").is_err());
        assert!(Money::positive(Decimal::from(-1), "price").is_err());
        assert_eq!(Money::positive(Decimal::from(5), "price").unwrap(), Money::from(5));
    }

    #[test]
    fn times_and_sum_are_exact() {
        let price = Money::new(Decimal::new(389999, 2));
        let total = Money::total([price.times(2), Ok(Money::from(1))]).unwrap();
        assert_eq!(total, Money::new(Decimal::new(780098, 2)));
    }

    #[test]
    fn overflow_is_a_validation_error_not_a_panic() {
        let huge = Money::new(Decimal::MAX);
        assert!(matches!(huge.times(2), Err(DomainError::Validation(_))));
        assert!(matches!(huge.checked_add(Money::from(1)), Err(DomainError::Validation(_))));
        assert!(matches!(
            Money::total([Ok(huge), Ok(huge)]),
            Err(DomainError::Validation(_))
        ));
        assert_eq!(huge.times(1).unwrap(), huge);
    }

    #[test]
    fn percent_of_amount() {
        assert_eq!(Money::from(100).percent(50), Money::from(50));
        assert_eq!(Money::from(99).percent(50), Money::new(Decimal::new(495, 1)));
    }
}
