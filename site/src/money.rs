//! Prices and totals
//!
//! The API publishes prices as decimal euros; everything here works in cents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero euros
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole euros
    #[must_use]
    pub const fn from_euros(euros: u64) -> Self {
        Self(euros.saturating_mul(100))
    }

    /// Converts a decimal euro amount, rounding to the nearest cent
    ///
    /// Returns `None` for negative, non-finite, or absurdly large amounts.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // range checked above
    pub fn from_decimal_euros(euros: f64) -> Option<Self> {
        let cents = (euros * 100.0).round();
        if !cents.is_finite() || cents < 0.0 || cents > 1e15 {
            return None;
        }
        Some(Self(cents as u64))
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts, saturating at the maximum
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Multiplies money by a quantity, saturating at the maximum
    #[must_use]
    pub const fn saturating_multiply(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as u64))
    }
}

impl fmt::Display for Money {
    /// `15€`, or `7.50€` when there are cents
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let euros = self.0 / 100;
        let cents = self.0 % 100;
        if cents == 0 {
            write!(f, "{euros}€")
        } else {
            write!(f, "{euros}.{cents:02}€")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_euros_round_to_cents() {
        assert_eq!(Money::from_decimal_euros(15.0), Some(Money::from_cents(1500)));
        assert_eq!(Money::from_decimal_euros(7.5), Some(Money::from_cents(750)));
        assert_eq!(Money::from_decimal_euros(0.1 + 0.2), Some(Money::from_cents(30)));
        assert_eq!(Money::from_decimal_euros(-1.0), None);
        assert_eq!(Money::from_decimal_euros(f64::NAN), None);
    }

    #[test]
    fn display_drops_zero_cents() {
        assert_eq!(Money::from_euros(15).to_string(), "15€");
        assert_eq!(Money::from_cents(750).to_string(), "7.50€");
        assert_eq!(Money::from_cents(5).to_string(), "0.05€");
    }

    #[test]
    fn arithmetic_saturates() {
        assert_eq!(Money::from_euros(15).saturating_multiply(2), Money::from_euros(30));
        assert_eq!(
            Money::from_cents(u64::MAX).saturating_add(Money::from_cents(1)),
            Money::from_cents(u64::MAX)
        );
    }
}
