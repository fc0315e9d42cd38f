//! Exact decimal money type backed by rust_decimal.
//!
//! All prices, fees, taxes and gains in the ledger are `Decimal`. Values
//! round-trip through canonical strings (no exponent notation) so they can
//! live in SQLite TEXT columns without drift.

use rust_decimal::{Decimal as RustDecimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exact decimal amount for financial calculations.
///
/// Backed by rust_decimal to avoid floating-point drift.
/// Serializes to a JSON number (not a string) by default.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    /// Wrap a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Format as a canonical string: no exponent, no trailing zeros.
    ///
    /// This is the storage representation; parsing it back yields an
    /// equal value.
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// Get the underlying RustDecimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    /// Returns the value 100.
    pub fn hundred() -> Self {
        Decimal(RustDecimal::ONE_HUNDRED)
    }

    /// Exact conversion from a whole-unit quantity.
    pub fn from_i64(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    /// Round to 2 decimal places, midpoints away from zero.
    ///
    /// Currency convention for tax and gain amounts: 0.125 rounds to
    /// 0.13 and -0.125 to -0.13.
    pub fn round2(&self) -> Self {
        Decimal(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal::from_i64(value)
    }
}

// Arithmetic operations
impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Div for Decimal {
    type Output = Decimal;

    fn div(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 / rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_parse_roundtrip() {
        let test_cases = vec![
            "123.456",
            "0.0001",
            "1000000",
            "-123.456",
            "0",
            "999999999.999999999",
        ];

        for s in test_cases {
            let decimal = Decimal::from_str_canonical(s).expect("parse failed");
            let formatted = decimal.to_canonical_string();
            let reparsed = Decimal::from_str_canonical(&formatted).expect("reparse failed");
            assert_eq!(decimal, reparsed, "roundtrip failed for {}", s);
        }
    }

    #[test]
    fn test_decimal_canonical_strips_trailing_zeros() {
        let decimal = Decimal::from_str_canonical("1.2300").expect("parse failed");
        assert_eq!(decimal.to_canonical_string(), "1.23");

        let whole = Decimal::from_str_canonical("75.00").expect("parse failed");
        assert_eq!(whole.to_canonical_string(), "75");
        assert!(!whole.to_canonical_string().contains('e'));
    }

    #[test]
    fn test_decimal_arithmetic() {
        let a = Decimal::from_str_canonical("10.5").unwrap();
        let b = Decimal::from_str_canonical("2.5").unwrap();

        assert_eq!((a + b).to_canonical_string(), "13");
        assert_eq!((a - b).to_canonical_string(), "8");
        assert_eq!((a * b).to_canonical_string(), "26.25");
        assert_eq!((a / b).to_canonical_string(), "4.2");
        assert_eq!((-a).to_canonical_string(), "-10.5");
    }

    #[test]
    fn test_decimal_round2_midpoint_away_from_zero() {
        let up = Decimal::from_str_canonical("0.125").unwrap();
        assert_eq!(up.round2().to_canonical_string(), "0.13");

        let down = Decimal::from_str_canonical("-0.125").unwrap();
        assert_eq!(down.round2().to_canonical_string(), "-0.13");

        let exact = Decimal::from_str_canonical("75").unwrap();
        assert_eq!(exact.round2(), exact);

        let truncates = Decimal::from_str_canonical("83.4599").unwrap();
        assert_eq!(truncates.round2().to_canonical_string(), "83.46");
    }

    #[test]
    fn test_decimal_from_i64() {
        assert_eq!(Decimal::from_i64(12).to_canonical_string(), "12");
        assert_eq!(Decimal::from(-3i64).to_canonical_string(), "-3");
    }

    #[test]
    fn test_decimal_sign_helpers() {
        let positive = Decimal::from_str_canonical("0.01").unwrap();
        let negative = Decimal::from_str_canonical("-0.01").unwrap();

        assert!(positive.is_positive() && !positive.is_negative());
        assert!(negative.is_negative() && !negative.is_positive());
        assert!(Decimal::zero().is_zero());
        assert!(!Decimal::zero().is_positive());
        assert!(!Decimal::zero().is_negative());
        assert_eq!(negative.abs(), positive);
    }

    #[test]
    fn test_decimal_json_serialization() {
        let decimal = Decimal::from_str_canonical("123.456").unwrap();
        let json = serde_json::to_value(decimal).unwrap();
        // Serializes as a JSON number, not a string
        assert!(json.is_number());
        assert_eq!(json.to_string(), "123.456");
    }

    #[test]
    fn test_decimal_ordering() {
        let a = Decimal::from_str_canonical("10").unwrap();
        let b = Decimal::from_str_canonical("20").unwrap();
        assert!(a < b);
        assert_eq!(a.min(b), a);
        assert_eq!(a.max(b), b);
    }
}
