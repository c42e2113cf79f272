//! Yen amounts.
//!
//! The store only sells in Japanese yen, which has no minor unit, so amounts
//! are whole numbers. The payment provider also expects integer amounts.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use serde::{Deserialize, Serialize};

/// An amount of Japanese yen.
///
/// Arithmetic saturates instead of overflowing; no real cart gets close to the
/// limit, and a saturated total is rejected by the provider anyway.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Yen(u64);

impl Yen {
    /// Zero yen.
    pub const ZERO: Self = Self(0);

    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: u64) -> Self {
        Self(amount)
    }

    /// Get the amount as a plain integer.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Multiply by a quantity (line total).
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(u64::from(quantity)))
    }

    /// Whether the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Add for Yen {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Yen {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}

impl From<u64> for Yen {
    fn from(amount: u64) -> Self {
        Self(amount)
    }
}

/// Formats as `¥1,200`.
impl fmt::Display for Yen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        write!(f, "¥{grouped}")
    }
}

/// ISO 4217 currency codes accepted by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    JPY,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Yen::new(0).to_string(), "¥0");
        assert_eq!(Yen::new(999).to_string(), "¥999");
        assert_eq!(Yen::new(1200).to_string(), "¥1,200");
        assert_eq!(Yen::new(1_234_567).to_string(), "¥1,234,567");
    }

    #[test]
    fn test_times_and_sum() {
        let total: Yen = [Yen::new(1200).times(2), Yen::new(1500)].into_iter().sum();
        assert_eq!(total, Yen::new(3900));
    }

    #[test]
    fn test_saturating_arithmetic() {
        assert_eq!(Yen::new(u64::MAX).times(2), Yen::new(u64::MAX));
        assert_eq!(Yen::new(u64::MAX) + Yen::new(1), Yen::new(u64::MAX));
    }

    #[test]
    fn test_currency_serializes_as_iso_code() {
        assert_eq!(
            serde_json::to_string(&CurrencyCode::JPY).ok().as_deref(),
            Some("\"JPY\"")
        );
    }
}
