//! Value objects: equality by value, not identity.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. Two value objects
/// with the same attributes are interchangeable.
///
/// - **Value Object**: `Money(1250)` equals any other `Money(1250)`
/// - **Entity**: a `Product` with a given id stays the same product as its stock changes
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Non-negative monetary amount with fixed 2-decimal precision.
///
/// Stored in the smallest currency unit (cents), so the sign and the precision
/// are enforced by the representation itself.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub fn cents(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Amount multiplied by a unit count (e.g. stock on hand).
    ///
    /// Returns `None` on overflow.
    pub fn checked_times(self, units: u64) -> Option<Money> {
        self.0.checked_mul(units).map(Money)
    }

    pub fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    /// Signed difference `self - other` in cents.
    pub fn diff_cents(self, other: Money) -> i128 {
        i128::from(self.0) - i128::from(other.0)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    /// Parses `"12"`, `"12.5"` or `"12.50"`. Signs and more than two decimals are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (s, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_amount(format!("'{s}' is not a non-negative amount")));
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_amount(format!(
                "'{s}' must have at most two decimal places"
            )));
        }

        let whole: u64 = whole
            .parse()
            .map_err(|e| DomainError::invalid_amount(format!("'{s}': {e}")))?;
        let frac: u64 = match frac.len() {
            0 => 0,
            1 => u64::from(frac.as_bytes()[0] - b'0') * 10,
            _ => frac
                .parse()
                .map_err(|e| DomainError::invalid_amount(format!("'{s}': {e}")))?,
        };

        whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .map(Money)
            .ok_or_else(|| DomainError::invalid_amount(format!("'{s}' is out of range")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn displays_two_decimals() {
        assert_eq!(Money::from_cents(1250).to_string(), "12.50");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!("12".parse::<Money>().unwrap(), Money::from_cents(1200));
        assert_eq!("12.5".parse::<Money>().unwrap(), Money::from_cents(1250));
        assert_eq!("0.05".parse::<Money>().unwrap(), Money::from_cents(5));
        assert_eq!(" 3.10 ".parse::<Money>().unwrap(), Money::from_cents(310));
    }

    #[test]
    fn rejects_signs_and_extra_precision() {
        for bad in ["-1.00", "+1", "1.234", "", ".5", "1.a", "abc"] {
            assert!(bad.parse::<Money>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn checked_times_detects_overflow() {
        assert_eq!(Money::from_cents(250).checked_times(4), Some(Money::from_cents(1000)));
        assert_eq!(Money::from_cents(u64::MAX).checked_times(2), None);
    }

    #[test]
    fn diff_can_be_negative() {
        assert_eq!(Money::from_cents(100).diff_cents(Money::from_cents(250)), -150);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: Display output always parses back to the same amount.
        #[test]
        fn display_parses_back(cents in 0u64..10_000_000_000u64) {
            let money = Money::from_cents(cents);
            prop_assert_eq!(money.to_string().parse::<Money>().unwrap(), money);
        }
    }
}
