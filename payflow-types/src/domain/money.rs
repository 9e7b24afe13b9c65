//! Non-negative decimal money amount.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// A non-negative monetary amount.
///
/// Backed by a [`Decimal`] so balances never go through floating point.
/// Serialized as a decimal string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Creates a new Money value.
    pub fn new(amount: Decimal) -> Result<Self, DomainError> {
        if amount < Decimal::ZERO {
            return Err(DomainError::NegativeAmount);
        }
        Ok(Self(amount))
    }

    /// Returns the decimal amount.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checked addition.
    pub fn checked_add(&self, other: Money) -> Result<Money, DomainError> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or(DomainError::BalanceOverflow)
    }

    /// Checked subtraction - fails with `InsufficientFunds` if the result would be negative.
    pub fn checked_sub(&self, other: Money) -> Result<Money, DomainError> {
        if self.0 < other.0 {
            return Err(DomainError::InsufficientFunds {
                available: self.0,
                requested: other.0,
            });
        }
        Ok(Money(self.0 - other.0))
    }
}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_creation() {
        let money = Money::new(dec!(10.50)).unwrap();
        assert_eq!(money.amount(), dec!(10.50));
    }

    #[test]
    fn test_negative_money_fails() {
        let result = Money::new(dec!(-1));
        assert!(matches!(result, Err(DomainError::NegativeAmount)));
    }

    #[test]
    fn test_money_addition() {
        let a = Money::new(dec!(100)).unwrap();
        let b = Money::new(dec!(0.25)).unwrap();
        assert_eq!(a.checked_add(b).unwrap().amount(), dec!(100.25));
    }

    #[test]
    fn test_subtraction_below_zero_is_insufficient_funds() {
        let a = Money::new(dec!(10)).unwrap();
        let b = Money::new(dec!(50)).unwrap();
        let result = a.checked_sub(b);
        assert!(matches!(
            result,
            Err(DomainError::InsufficientFunds { available, requested })
                if available == dec!(10) && requested == dec!(50)
        ));
    }

    #[test]
    fn test_money_serializes_as_string() {
        let money = Money::new(dec!(40.00)).unwrap();
        assert_eq!(serde_json::to_string(&money).unwrap(), "\"40.00\"");
    }

    #[test]
    fn test_negative_money_rejected_on_deserialize() {
        let result: Result<Money, _> = serde_json::from_str("\"-5\"");
        assert!(result.is_err());
    }
}
