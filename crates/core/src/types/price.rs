//! Type-safe price representation using decimal arithmetic.
//!
//! The store trades in pounds sterling only, so a `Price` is a bare decimal
//! amount in GBP. The backend sends and expects prices as JSON numbers.

use std::iter::Sum;
use std::ops::Add;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize, Serializer};

/// An amount of money in pounds sterling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero pounds.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of pence.
    #[must_use]
    pub fn from_pence(pence: i64) -> Self {
        Self(Decimal::new(pence, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Multiply by a quantity.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Format for display, e.g. `£1,234.50`.
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };
        let text = format!("{:.2}", rounded.abs());
        let (whole, pence) = text.split_once('.').unwrap_or((text.as_str(), "00"));
        format!("{sign}£{}.{pence}", group_thousands(whole))
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

/// Subtotal for a line of `quantity` units at `unit_price`.
#[must_use]
pub fn line_subtotal(unit_price: Price, quantity: u32) -> Price {
    unit_price.times(quantity)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats_pounds() {
        assert_eq!(Price::from_pence(2500).display(), "£25.00");
        assert_eq!(Price::from_pence(350).display(), "£3.50");
        assert_eq!(Price::from_pence(123_456_789).display(), "£1,234,567.89");
        assert_eq!(Price::ZERO.display(), "£0.00");
    }

    #[test]
    fn test_display_rounds_half_up() {
        let price = Price::new(Decimal::new(10_005, 3));
        assert_eq!(price.display(), "£10.01");
    }

    #[test]
    fn test_sum_and_times() {
        let total: Price = [
            line_subtotal(Price::from_pence(1000), 2),
            line_subtotal(Price::from_pence(500), 1),
        ]
        .into_iter()
        .sum();
        assert_eq!(total, Price::from_pence(2500));
    }

    #[test]
    fn test_deserializes_json_numbers() {
        let price: Price = serde_json::from_str("10.99").unwrap();
        assert_eq!(price, Price::from_pence(1099));

        let whole: Price = serde_json::from_str("5").unwrap();
        assert_eq!(whole, Price::from_pence(500));
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_value(Price::from_pence(350)).unwrap();
        assert_eq!(json, serde_json::json!(3.5));
    }
}
