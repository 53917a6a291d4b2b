use core::iter::Sum;
use core::ops::{Add, Neg, Sub};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use shopledger_core::{DomainError, DomainResult, ValueObject};

/// An exact amount in the smallest currency subunit (e.g. cents, paise).
///
/// Sub-unit fractions (from tax percentages) are kept as-is; only
/// [`Money::to_minor_units`] rounds, and only presentation code calls it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn from_minor(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("amount overflow"))
    }

    pub fn checked_sub(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("amount overflow"))
    }

    /// `self × quantity`, e.g. a rate times a line quantity.
    pub fn checked_times(self, quantity: i64) -> DomainResult<Money> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::invariant("amount overflow"))
    }

    /// Whole minor units, rounding half away from zero. Presentation only.
    pub fn to_minor_units(&self) -> i64 {
        let rounded = self
            .0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        rounded.to_i64().unwrap_or(if self.is_negative() { i64::MIN } else { i64::MAX })
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0.normalize(), f)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

/// A tax rate expressed in percent (18 = 18%), between 0 and 100 inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct TaxPercent(Decimal);

impl ValueObject for TaxPercent {}

impl TaxPercent {
    pub const ZERO: TaxPercent = TaxPercent(Decimal::ZERO);

    pub fn new(percent: Decimal) -> DomainResult<Self> {
        if percent.is_sign_negative() && !percent.is_zero() {
            return Err(DomainError::validation("tax percent cannot be negative"));
        }
        if percent > Decimal::ONE_HUNDRED {
            return Err(DomainError::validation("tax percent cannot exceed 100"));
        }
        Ok(Self(percent))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// The tax owed on `net`, exact.
    pub fn of(&self, net: Money) -> DomainResult<Money> {
        net.0
            .checked_mul(self.0)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .map(Money)
            .ok_or_else(|| DomainError::invariant("tax overflow"))
    }
}

impl TryFrom<Decimal> for TaxPercent {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        TaxPercent::new(value)
    }
}

impl From<TaxPercent> for Decimal {
    fn from(value: TaxPercent) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn presentation_rounds_half_away_from_zero() {
        assert_eq!(Money::new(dec!(12.5)).to_minor_units(), 13);
        assert_eq!(Money::new(dec!(12.49)).to_minor_units(), 12);
        assert_eq!(Money::new(dec!(-12.5)).to_minor_units(), -13);
        assert_eq!(Money::from_minor(1000).to_minor_units(), 1000);
    }

    #[test]
    fn tax_percent_bounds() {
        assert!(TaxPercent::new(dec!(0)).is_ok());
        assert!(TaxPercent::new(dec!(100)).is_ok());
        assert!(matches!(
            TaxPercent::new(dec!(-1)),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            TaxPercent::new(dec!(100.01)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn tax_keeps_sub_unit_fractions() {
        let tax = TaxPercent::new(dec!(12.5)).unwrap();
        assert_eq!(tax.of(Money::from_minor(3)).unwrap(), Money::new(dec!(0.375)));
    }

    #[test]
    fn display_is_normalized() {
        assert_eq!(Money::new(dec!(600.00)).to_string(), "600");
    }
}
